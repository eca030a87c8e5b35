//! Request authentication.
//!
//! The server either runs open (`method = "none"`) or restricted to a single
//! configured user checked through HTTP Basic credentials. Failed attempts
//! are limited per client by [`LoginLimiter`].

mod basic;
mod limiter;
mod password;

pub use basic::BasicAuthenticator;
pub use limiter::{LoginLimiter, TokenBucket};
pub use password::{
    hash_password, hash_password_with, is_password_hash, verify_password, HashParams,
};

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AuthConfig, AuthMethod};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Request information for authentication.
///
/// Header names are expected in lowercase.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
}

impl AuthRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request and return the identity
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}

/// Authenticator that accepts every request as anonymous.
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

/// Build the authenticator selected by the config.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator)),
        AuthMethod::Basic => {
            let username = config.username.clone().ok_or_else(|| {
                AuthError::ConfigurationError("auth.username must be set for basic auth".into())
            })?;
            let password_hash = config.password_hash.clone().ok_or_else(|| {
                AuthError::ConfigurationError(
                    "auth.password_hash must be set for basic auth".into(),
                )
            })?;
            if !is_password_hash(&password_hash) {
                return Err(AuthError::ConfigurationError(
                    "auth.password_hash is not a $s0$ scrypt hash".into(),
                ));
            }
            Ok(Box::new(BasicAuthenticator::new(username, password_hash)))
        }
    }
}
