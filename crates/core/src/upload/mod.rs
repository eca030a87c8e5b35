//! Upload intake.
//!
//! Accepted files are written under the configured upload directory as
//! `<id>.<ext>` and registered as `Uploaded` items.

mod error;
mod store;

pub use error::UploadError;
pub use store::{UploadStore, ID_LEN};
