//! Upload error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::item::RegistryError;

/// Errors that can occur when accepting or removing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No usable file name was provided.
    #[error("No file name provided")]
    EmptyFileName,

    /// The file extension is not in the allowed list.
    #[error("File type not allowed: {extension:?}")]
    ExtensionNotAllowed { extension: String },

    /// The payload exceeds the configured limit.
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    /// Failed to write or delete the stored file.
    #[error("Failed to store file: {path}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registry refused the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
