//! Remote processing client.
//!
//! The processor only depends on the [`ProcessingClient`] success/failure
//! contract. [`HttpProcessingClient`] is the production implementation.
//!
//! # Example
//!
//! ```ignore
//! use qform_core::client::{HttpProcessingClient, ProcessingClient, ProcessingRequest};
//! use qform_core::config::ProcessingConfig;
//!
//! let client = HttpProcessingClient::new(&ProcessingConfig::new("http://localhost:8000"))?;
//! let request = ProcessingRequest::new("f1", "survey.xml").with_path("/uploads/f1.xml");
//! let result = client.process_item(&request).await?;
//! println!("{} flowcharts", result.flowcharts.len());
//! ```

mod error;
mod http;
mod traits;
mod types;

pub use error::ProcessingError;
pub use http::HttpProcessingClient;
pub use traits::ProcessingClient;
pub use types::{ProcessingRequest, ProcessingResult};
