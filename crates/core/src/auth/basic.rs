//! HTTP Basic authentication against a single configured user.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::password::{constant_time_eq, verify_password};
use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Validates `Authorization: Basic <base64(user:password)>` headers.
///
/// The password is checked against a salted scrypt hash. Browsers resend
/// the same credentials on every request, so the SHA-256 digest of the last
/// pair that verified is kept and matched first.
pub struct BasicAuthenticator {
    username: String,
    password_hash: String,
    verified: RwLock<Option<[u8; 32]>>,
}

impl BasicAuthenticator {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            username,
            password_hash,
            verified: RwLock::new(None),
        }
    }

    /// Decode the user/password pair from the request, if present.
    fn extract_credentials(request: &AuthRequest) -> Option<(String, String)> {
        let header = request.header("authorization")?;
        let encoded = header
            .strip_prefix("Basic ")
            .or_else(|| header.strip_prefix("basic "))?;
        let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }

    fn credential_digest(user: &str, password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(user.as_bytes());
        hasher.update([0u8]);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }

    async fn is_cached(&self, digest: &[u8; 32]) -> bool {
        match self.verified.read().await.as_ref() {
            Some(cached) => constant_time_eq(cached, digest),
            None => false,
        }
    }

    async fn verify(&self, password: String) -> Result<bool, AuthError> {
        let stored = self.password_hash.clone();
        // CPU-bound
        tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| AuthError::ConfigurationError(format!("password check failed: {}", e)))?
    }
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let (user, password) =
            Self::extract_credentials(request).ok_or(AuthError::NotAuthenticated)?;

        let digest = Self::credential_digest(&user, &password);
        if !self.is_cached(&digest).await {
            let user_ok = constant_time_eq(user.as_bytes(), self.username.as_bytes());
            let password_ok = self.verify(password).await?;
            if !(user_ok && password_ok) {
                return Err(AuthError::InvalidCredentials(
                    "wrong user or password".to_string(),
                ));
            }
            *self.verified.write().await = Some(digest);
        }

        Ok(Identity {
            user_id: user,
            method: "basic".to_string(),
        })
    }

    fn method_name(&self) -> &'static str {
        "basic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password_with, HashParams};

    fn request_with(header: Option<&str>) -> AuthRequest {
        let mut request = AuthRequest::default();
        if let Some(value) = header {
            request
                .headers
                .insert("authorization".to_string(), value.to_string());
        }
        request
    }

    fn basic_header(user: &str, password: &str) -> String {
        format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{}:{}", user, password))
        )
    }

    fn light_hash(password: &str) -> String {
        hash_password_with(password, HashParams::new(4, 1, 1)).unwrap()
    }

    fn authenticator() -> BasicAuthenticator {
        BasicAuthenticator::new("editor".to_string(), light_hash("pass123"))
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let request = request_with(Some(&basic_header("editor", "pass123")));
        let identity = authenticator().authenticate(&request).await.unwrap();
        assert_eq!(identity.user_id, "editor");
        assert_eq!(identity.method, "basic");
    }

    #[tokio::test]
    async fn test_repeated_credentials_use_cache() {
        let auth = authenticator();
        let request = request_with(Some(&basic_header("editor", "pass123")));
        auth.authenticate(&request).await.unwrap();
        assert!(auth.verified.read().await.is_some());
        assert!(auth.authenticate(&request).await.is_ok());

        // A different password still goes through the full check
        let wrong = request_with(Some(&basic_header("editor", "pass1234")));
        assert!(auth.authenticate(&wrong).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let request = request_with(Some(&basic_header("editor", "nope")));
        let result = authenticator().authenticate(&request).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_wrong_user() {
        let request = request_with(Some(&basic_header("admin", "pass123")));
        let result = authenticator().authenticate(&request).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_missing_header() {
        let result = authenticator().authenticate(&request_with(None)).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let result = authenticator()
            .authenticate(&request_with(Some("Basic !!not-base64!!")))
            .await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));

        let result = authenticator()
            .authenticate(&request_with(Some("Bearer token")))
            .await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_password_containing_colon() {
        let auth = BasicAuthenticator::new("editor".to_string(), light_hash("a:b"));
        let request = request_with(Some(&basic_header("editor", "a:b")));
        assert!(auth.authenticate(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreadable_stored_hash() {
        let auth = BasicAuthenticator::new("editor".to_string(), "not-a-hash".to_string());
        let request = request_with(Some(&basic_header("editor", "pass123")));
        let result = auth.authenticate(&request).await;
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }
}
