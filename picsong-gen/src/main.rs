//! picsong-gen - Picture to music service
//!
//! Accepts an uploaded image, has a multimodal model describe the music that
//! would fit it, synthesizes that music and keeps image, prompt and audio on
//! disk for the gallery at `/api/files`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use picsong_common::config::{self, AppConfig, ConfigOverrides};
use picsong_gen::services::{token_source_from_config, GeminiAnalyzer, LyriaSynthesizer};
use picsong_gen::AppState;

/// Command-line arguments for picsong-gen
#[derive(Parser, Debug)]
#[command(name = "picsong-gen")]
#[command(about = "Generate music from pictures")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PICSONG_PORT")]
    port: Option<u16>,

    /// Cloud project id
    #[arg(long, env = "PICSONG_PROJECT_ID")]
    project_id: Option<String>,

    /// Cloud region of the AI endpoints
    #[arg(long, env = "PICSONG_LOCATION")]
    location: Option<String>,

    /// Service-account JSON key
    #[arg(long, env = "PICSONG_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Bearer token to use instead of a service-account key
    #[arg(long, env = "PICSONG_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Directory holding uploads, outputs and prompts
    #[arg(short, long, env = "PICSONG_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// TOML bootstrap file
    #[arg(short, long, env = "PICSONG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PICSONG_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the log level
    let config_path = args.config.clone().or_else(config::default_config_path);
    let toml_config = match &config_path {
        Some(path) => config::load_toml_config(path)?,
        None => config::TomlConfig::default(),
    };

    let overrides = ConfigOverrides {
        port: args.port,
        project_id: args.project_id,
        location: args.location,
        credentials_path: args
            .credentials
            .or_else(|| std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from)),
        access_token: args.access_token,
        storage_root: args.storage_root,
        log_level: args.log_level,
    };
    let config = AppConfig::resolve(overrides, toml_config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("picsong_gen={0},picsong_common={0},tower_http={0}", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting picsong-gen v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => warn!("Config file {} not present, running on defaults", path.display()),
        None => warn!("No config directory on this platform, running on defaults"),
    }

    config.validate().context("Invalid configuration")?;
    info!(
        project_id = %config.project_id,
        location = %config.location,
        analysis_model = %config.analysis_model,
        synthesis_model = %config.synthesis_model,
        "AI endpoint: {}",
        config.api_endpoint
    );

    let storage = config.storage();
    storage
        .ensure_directories()
        .context("Failed to initialize storage directories")?;
    info!("Storage root: {}", storage.root().display());

    let tokens = token_source_from_config(&config).context("Failed to load credentials")?;
    let analyzer = GeminiAnalyzer::new(&config, tokens.clone()).context("Failed to create analysis client")?;
    let synthesizer = LyriaSynthesizer::new(&config, tokens).context("Failed to create synthesis client")?;

    let state = AppState::new(storage, Arc::new(analyzer), Arc::new(synthesizer));
    let app = picsong_gen::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
