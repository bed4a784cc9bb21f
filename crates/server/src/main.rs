use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelgate_core::{
    create_oracle, create_signer, load_config, validate_config, BlobStore, Encoder, EncoderConfig,
    FfmpegEncoder, FsBlobStore, JobRunner, JobScheduler, MediaStore, SqliteMediaStore,
    StreamingGate, SystemClock, TokenIssuer,
};

use reelgate_server::api::create_router;
use reelgate_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("reelgate {} starting", VERSION);

    // Determine config path
    let config_path = std::env::var("REELGATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Storage root: {:?}", config.storage.root);

    // Compute a config fingerprint so deployments can be told apart in logs
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Configuration fingerprint: {}", &config_hash[..16]);

    // Create token signer
    let clock = Arc::new(SystemClock);
    let signer = create_signer(&config.auth, clock).context("Failed to create token signer")?;

    // Create permission oracle if a document API is configured
    let oracle = create_oracle(&config.auth).context("Failed to create permission oracle")?;
    match &oracle {
        Some(o) => info!("Using permission oracle: {}", o.name()),
        None => warn!(
            "No document API configured; page checks are skipped and \
             private videos deny all viewer tokens"
        ),
    }

    // Create SQLite media store
    let store: Arc<dyn MediaStore> = Arc::new(
        SqliteMediaStore::new(&config.database.path).context("Failed to create media store")?,
    );
    info!("Media store initialized");

    // Create filesystem blob store
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(config.storage.root.clone()));

    // Create encoder and job pipeline
    let encoder: Arc<dyn Encoder> =
        Arc::new(FfmpegEncoder::new(EncoderConfig::from(&config.encoder)));
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&store),
        Arc::clone(&blobs),
        encoder,
        config.encoder.clone(),
        config.pipeline.clone(),
    ));

    // Create and start the job scheduler
    let scheduler = Arc::new(JobScheduler::new(
        config.pipeline.clone(),
        Arc::clone(&store),
        runner,
    ));
    scheduler.start().await;
    info!("Job scheduler started ({} workers)", config.pipeline.workers);

    // Create streaming authorization components
    let issuer = TokenIssuer::new(signer.clone(), oracle.clone());
    let gate = StreamingGate::new(signer, oracle.clone());

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        blobs,
        Arc::clone(&scheduler),
        issuer,
        gate,
        oracle,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the scheduler so running jobs abort at their next check point
    info!("Server shutting down...");
    scheduler.stop().await;
    info!("Job scheduler stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
