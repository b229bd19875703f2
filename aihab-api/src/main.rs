//! aihab-api - Habitat classification HTTP service
//!
//! Startup order: configuration, logging, taxonomy (fatal if unusable),
//! label table check (fatal), then the HTTP listener. The model loads in the
//! background; `/predict` answers 503 until it is ready.

use std::path::PathBuf;
use std::sync::Arc;

use aihab_api::inference::{open_model, ModelHandle};
use aihab_api::labels::LabelTable;
use aihab_api::{build_router, AppState, Predictor, PredictorSettings};
use aihab_common::config::{ConfigOverrides, ServiceConfig};
use aihab_common::TaxonomyStore;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments for aihab-api
#[derive(Parser, Debug)]
#[command(name = "aihab-api")]
#[command(about = "Habitat classification service (UK Habitat Classification)")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "AIHAB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Habitat taxonomy JSON
    #[arg(long)]
    taxonomy: Option<PathBuf>,

    /// Model weights (ONNX)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Version string reported for the loaded model
    #[arg(long)]
    model_version: Option<String>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        Self {
            config_file: args.config,
            host: args.host,
            port: args.port,
            taxonomy_path: args.taxonomy,
            model_path: args.model,
            model_version: args.model_version,
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let overrides = ConfigOverrides::from(Args::parse());
    let config = ServiceConfig::resolve(&overrides).context("Failed to resolve configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .init();

    info!(
        "Starting AI-HAB habitat classification service (aihab-api) v{}",
        env!("CARGO_PKG_VERSION")
    );
    match &config.config_file {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using environment and defaults"),
    }

    let taxonomy = TaxonomyStore::load(&config.taxonomy_path, &config.irregular_codes)
        .with_context(|| format!("Failed to load taxonomy {}", config.taxonomy_path.display()))?;
    for gap in taxonomy.check_integrity() {
        warn!("Taxonomy integrity: {}", gap);
    }

    let labels = match &config.labels {
        Some(codes) => LabelTable::from_codes(codes.clone())?,
        None => LabelTable::default_ukhab(),
    };
    if let Err(e) = labels.verify(&taxonomy) {
        error!("Label table does not match taxonomy: {}", e);
        return Err(e).context("Label table verification failed");
    }
    info!("✓ {} labels verified against taxonomy", labels.len());

    let model = Arc::new(ModelHandle::new());
    {
        let model = Arc::clone(&model);
        let model_path = config.model_path.clone();
        let model_version = config.model_version.clone();
        // Failures are logged and surfaced on /health
        tokio::spawn(async move {
            let _ = model
                .load_with(move || open_model(model_path.as_deref(), &model_version))
                .await;
        });
    }

    let predictor = Predictor::new(Arc::new(taxonomy), Arc::new(labels), model).with_settings(
        PredictorSettings {
            taxonomy_version: config.taxonomy_version.clone(),
            user_message: config.user_message.clone(),
        },
    );

    let state = AppState::new(Arc::new(predictor), config.max_upload_bytes);
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("aihab-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
