//! Error types for the processing client.

use thiserror::Error;

/// Errors returned by a processing call.
///
/// The processor folds all of them into a `Failed` item; the variants are
/// kept for logging and metrics.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    /// The call could not complete (connection refused, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service completed the call but reported a failure.
    #[error("processing failed with status {status}: {message}")]
    Application { status: u16, message: String },

    /// The service answered 2xx with a body we could not read.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The stored upload could not be read.
    #[error("cannot read upload: {0}")]
    LocalFile(String),
}

impl ProcessingError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Application { .. } => "application",
            Self::InvalidResponse(_) => "invalid_response",
            Self::LocalFile(_) => "local_file",
        }
    }
}

impl From<reqwest::Error> for ProcessingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
