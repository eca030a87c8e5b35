use super::{
    types::{AuthMethod, Config},
    ConfigError,
};
use crate::auth::is_password_hash;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Basic auth has a username, a scrypt password hash and non-zero
///   failure limits
/// - Processing base URL is an http(s) URL
/// - Upload extensions are not empty
/// - The run queue can hold at least one pending run
/// - The artifact route is a plain segment outside `api` and `metrics`
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::Basic {
        let has_user = config
            .auth
            .username
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        let has_hash = config
            .auth
            .password_hash
            .as_deref()
            .is_some_and(is_password_hash);
        if !has_user || !has_hash {
            return Err(ConfigError::ValidationError(
                "auth.method = \"basic\" requires username and a $s0$ scrypt password_hash"
                    .to_string(),
            ));
        }
        if config.auth.max_failures_per_minute == 0 || config.auth.max_failures_per_day == 0 {
            return Err(ConfigError::ValidationError(
                "auth failure limits must be greater than 0".to_string(),
            ));
        }
    }

    let base_url = config.processing.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "processing.base_url must be an http(s) URL, got '{}'",
            config.processing.base_url
        )));
    }

    if config.uploads.allowed_extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "uploads.allowed_extensions cannot be empty".to_string(),
        ));
    }

    if config.processor.max_pending_runs == 0 {
        return Err(ConfigError::ValidationError(
            "processor.max_pending_runs cannot be 0".to_string(),
        ));
    }

    let route = config.processor.artifact_route.trim_matches('/');
    let plain = !route.is_empty()
        && route
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !plain || route == "api" || route == "metrics" {
        return Err(ConfigError::ValidationError(format!(
            "processor.artifact_route must be a single path segment other than api or metrics, got '{}'",
            config.processor.artifact_route
        )));
    }

    Ok(())
}
