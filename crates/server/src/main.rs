use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qform_core::{
    create_authenticator, hash_password, load_config, validate_config, ArtifactPolicy,
    Authenticator, HttpProcessingClient, InMemoryItemRegistry, ItemRegistry, ProcessingClient,
    ProcessingQueue, SequentialProcessor, UploadStore,
};
use qform_server::{create_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    if std::env::args().nth(1).as_deref() == Some("hash-password") {
        return print_password_hash();
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("QFORM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Processing service: {}", config.processing.base_url);
    info!("Upload directory: {:?}", config.uploads.dir);

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let registry: Arc<dyn ItemRegistry> = Arc::new(InMemoryItemRegistry::new());

    let client: Arc<dyn ProcessingClient> = Arc::new(
        HttpProcessingClient::new(&config.processing)
            .context("Failed to create processing client")?,
    );

    let uploads = Arc::new(UploadStore::new(
        config.uploads.clone(),
        Arc::clone(&registry),
    ));

    let restored = uploads
        .restore()
        .await
        .with_context(|| format!("Failed to restore uploads from {:?}", config.uploads.dir))?;
    info!("Restored {} stored uploads", restored.len());

    let processor = Arc::new(
        SequentialProcessor::new(
            Arc::clone(&registry),
            client,
            ArtifactPolicy::from_config(&config.processor),
        )
        .with_files(Arc::clone(&uploads)),
    );

    let queue = Arc::new(ProcessingQueue::new(
        config.processor.clone(),
        processor,
        Arc::clone(&registry),
    ));
    queue.start().await;

    if config.processor.process_on_startup {
        match queue.process_pending().await {
            Ok(ticket) => info!("Startup run {} queued", ticket.run_id),
            Err(e) => error!("Failed to queue startup run: {}", e),
        }
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        registry,
        uploads,
        Arc::clone(&queue),
    ));

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");
    if queue.is_running() {
        queue.stop().await;
    }

    Ok(())
}

/// `qform hash-password`: read a password from stdin and print the value
/// for `auth.password_hash`.
fn print_password_hash() -> Result<()> {
    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read password from stdin")?;
    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        anyhow::bail!("Empty password");
    }
    println!("{}", hash_password(password)?);
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
