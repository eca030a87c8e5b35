//! Testing utilities and mock implementations.
//!
//! This module provides a mock of the remote processing client plus small
//! fixtures, so the processor and the HTTP surface can be exercised without
//! a processing service.
//!
//! # Example
//!
//! ```rust,ignore
//! use qform_core::testing::{fixtures, MockProcessingClient};
//!
//! let client = MockProcessingClient::new();
//! client.fail_item("f2", fixtures::transport_error()).await;
//!
//! let registry = fixtures::registry_with(&["f1", "f2"]);
//! // Use in a SequentialProcessor...
//! ```

mod mock_processing_client;

pub use mock_processing_client::{MockProcessingClient, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use crate::auth::{hash_password_with, HashParams};
    use crate::client::{ProcessingError, ProcessingResult};
    use crate::config::{Config, ProcessingConfig};
    use crate::item::{InMemoryItemRegistry, ItemId, ItemRegistry};

    /// Create a registry holding one `Uploaded` item per id, in order.
    ///
    /// Display names are `<id>.xml`.
    pub fn registry_with(ids: &[&str]) -> Arc<InMemoryItemRegistry> {
        let registry = Arc::new(InMemoryItemRegistry::new());
        for id in ids {
            registry
                .register(ItemId::from(*id), &format!("{}.xml", id))
                .expect("fixture ids must be unique");
        }
        registry
    }

    /// Ids as `ItemId`s.
    pub fn ids(ids: &[&str]) -> Vec<ItemId> {
        ids.iter().map(|id| ItemId::from(*id)).collect()
    }

    /// A successful result carrying `count` flowchart views, served from
    /// `https://views.example/<id>_<n>.svg`.
    pub fn result_with_flowcharts(id: &str, count: usize) -> ProcessingResult {
        ProcessingResult::new("success").with_flowcharts(
            (0..count)
                .map(|i| format!("https://views.example/{}_{}.svg", id, i))
                .collect(),
        )
    }

    /// A connection-level failure.
    pub fn transport_error() -> ProcessingError {
        ProcessingError::Transport("connection refused".to_string())
    }

    /// A failure reported by the processing service.
    pub fn application_error(message: &str) -> ProcessingError {
        ProcessingError::Application {
            status: 400,
            message: message.to_string(),
        }
    }

    /// A password hash that is cheap to verify.
    pub fn password_hash(password: &str) -> String {
        hash_password_with(password, HashParams::new(4, 1, 1))
            .expect("light scrypt parameters are valid")
    }

    /// A minimal valid configuration.
    pub fn config() -> Config {
        Config {
            auth: Default::default(),
            server: Default::default(),
            processing: ProcessingConfig::new("http://127.0.0.1:8000"),
            processor: Default::default(),
            uploads: Default::default(),
        }
    }
}
