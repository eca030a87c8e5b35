pub mod auth;
pub mod client;
pub mod config;
pub mod item;
pub mod metrics;
pub mod processor;
pub mod testing;
pub mod upload;

pub use auth::{
    create_authenticator, hash_password, hash_password_with, verify_password, AuthError,
    AuthRequest, Authenticator, BasicAuthenticator, HashParams, Identity, LoginLimiter,
    NoneAuthenticator,
};
pub use client::{
    HttpProcessingClient, ProcessingClient, ProcessingError, ProcessingRequest, ProcessingResult,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, ProcessingConfig, SanitizedConfig, ServerConfig, UploadConfig,
};
pub use item::{
    Artifact, InMemoryItemRegistry, Item, ItemEvent, ItemId, ItemRegistry, ItemStatus,
    RegistryError,
};
pub use processor::{
    ArtifactPolicy, ItemOutcome, ProcessingQueue, ProcessorConfig, ProcessorError,
    ProcessorStatus, RunStatus, RunSummary, RunTicket, SequentialProcessor,
};
pub use upload::{UploadError, UploadStore};
