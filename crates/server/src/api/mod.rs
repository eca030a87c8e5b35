pub mod artifacts;
pub mod handlers;
pub mod items;
pub mod middleware;
pub mod processing;
pub mod routes;
pub mod ws;

pub use routes::create_router;
pub use ws::WsMessage;
