//! Sequential processing of uploaded items.
//!
//! [`SequentialProcessor`] runs a snapshot of item ids through the remote
//! [`ProcessingClient`](crate::client::ProcessingClient) one item at a time:
//! - each item is marked `Processing` before its remote call
//! - a success marks it `Succeeded` and stores its derived artifacts
//! - a failure marks it `Failed` and the run continues with the next item
//!
//! [`ProcessingQueue`] puts a single background worker in front of the
//! processor, so "process all" requests return immediately and runs never
//! overlap.
//!
//! # Example
//!
//! ```ignore
//! use qform_core::processor::{ArtifactPolicy, ProcessingQueue, ProcessorConfig, SequentialProcessor};
//!
//! let processor = Arc::new(SequentialProcessor::new(
//!     registry.clone(),
//!     client,
//!     ArtifactPolicy::default(),
//! ));
//! let queue = ProcessingQueue::new(ProcessorConfig::default(), processor, registry);
//! queue.start().await;
//!
//! let ticket = queue.process_pending().await?;
//! let summary = ticket.wait().await;
//! ```

mod artifacts;
mod config;
mod queue;
mod runner;
mod types;

pub use artifacts::ArtifactPolicy;
pub use config::ProcessorConfig;
pub use queue::{ProcessingQueue, RunTicket};
pub use runner::{RunSummary, SequentialProcessor};
pub use types::{ItemOutcome, ProcessorError, ProcessorStatus, RunStatus};
