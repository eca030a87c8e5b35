use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::processor::ProcessorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5000
}

/// Authentication configuration.
///
/// With `method = "basic"` every API route requires the configured
/// user. The password is stored as a salted scrypt hash
/// (`$s0$<params>$<salt>$<hash>`, see `qform hash-password`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub method: AuthMethod,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Failed attempts allowed per client per minute
    #[serde(default = "default_failures_per_minute")]
    pub max_failures_per_minute: u32,
    /// Failed attempts allowed per client per day
    #[serde(default = "default_failures_per_day")]
    pub max_failures_per_day: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: AuthMethod::default(),
            username: None,
            password_hash: None,
            max_failures_per_minute: default_failures_per_minute(),
            max_failures_per_day: default_failures_per_day(),
        }
    }
}

fn default_failures_per_minute() -> u32 {
    10
}

fn default_failures_per_day() -> u32 {
    100
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    None,
    Basic,
}

/// Remote processing service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Base URL of the processing service (e.g., "http://localhost:8000")
    pub base_url: String,
    /// Request timeout in seconds (default: 120)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Basic auth user for the processing service
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_timeout() -> u32 {
    120
}

impl ProcessingConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout(),
            username: None,
            password: None,
        }
    }
}

/// Upload storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    /// Accepted file extensions, compared case-insensitively
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            allowed_extensions: default_extensions(),
            max_size_bytes: default_max_size(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join("qform-uploads")
}

fn default_extensions() -> Vec<String> {
    vec!["xml".to_string()]
}

fn default_max_size() -> u64 {
    16 * 1024 * 1024
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub processing: SanitizedProcessingConfig,
    pub processor: ProcessorConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProcessingConfig {
    pub base_url: String,
    pub timeout_secs: u32,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::Basic => "basic".to_string(),
                },
                username: config.auth.username.clone(),
            },
            server: config.server.clone(),
            processing: SanitizedProcessingConfig {
                base_url: config.processing.base_url.clone(),
                timeout_secs: config.processing.timeout_secs,
                credentials_configured: config.processing.username.is_some()
                    && config.processing.password.is_some(),
            },
            processor: config.processor.clone(),
            uploads: config.uploads.clone(),
        }
    }
}
