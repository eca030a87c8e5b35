use std::sync::Arc;

use qform_core::{
    ArtifactPolicy, Authenticator, Config, ItemRegistry, LoginLimiter, ProcessingQueue,
    SanitizedConfig, UploadStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    registry: Arc<dyn ItemRegistry>,
    uploads: Arc<UploadStore>,
    queue: Arc<ProcessingQueue>,
    login_limiter: LoginLimiter,
    artifacts: ArtifactPolicy,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        registry: Arc<dyn ItemRegistry>,
        uploads: Arc<UploadStore>,
        queue: Arc<ProcessingQueue>,
    ) -> Self {
        let login_limiter = LoginLimiter::from_config(&config.auth);
        let artifacts = ArtifactPolicy::from_config(&config.processor);
        Self {
            config,
            authenticator,
            registry,
            uploads,
            queue,
            login_limiter,
            artifacts,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn registry(&self) -> &Arc<dyn ItemRegistry> {
        &self.registry
    }

    pub fn uploads(&self) -> &UploadStore {
        self.uploads.as_ref()
    }

    pub fn queue(&self) -> &ProcessingQueue {
        self.queue.as_ref()
    }

    /// Failed login attempts per client.
    pub fn login_limiter(&self) -> &LoginLimiter {
        &self.login_limiter
    }

    /// How artifact links are keyed and routed.
    pub fn artifacts(&self) -> &ArtifactPolicy {
        &self.artifacts
    }
}
