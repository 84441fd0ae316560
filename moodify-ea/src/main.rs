//! moodify-ea - Emotion Analysis microservice
//!
//! Accepts a face image, detects the dominant emotion through an external
//! facial analyzer and recommends a music genre (and optionally tracks) for
//! the requested language and era.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use moodify_common::config::{
    resolve_config_path, resolve_emotions_path, ConfigSource, TomlConfig, TrackSearchConfig,
};
use moodify_common::EmotionTable;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use moodify_ea::services::{classifier_from_config, MoodAnalyzer, SpotifyClient, TrackFinder};
use moodify_ea::{build_router_with, AppState};

/// Command-line arguments for moodify-ea
#[derive(Parser, Debug)]
#[command(name = "moodify-ea")]
#[command(about = "Emotion Analysis microservice for Moodify")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MOODIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "MOODIFY_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides TOML)
    #[arg(long, env = "MOODIFY_HOST")]
    host: Option<String>,

    /// Emotion table JSON file (overrides TOML)
    #[arg(short, long, env = "MOODIFY_EMOTIONS")]
    emotions: Option<PathBuf>,

    /// Spotify client id (enables track search)
    #[arg(long, env = "MOODIFY_SPOTIFY_CLIENT_ID", hide_env_values = true)]
    spotify_client_id: Option<String>,

    /// Spotify client secret (enables track search)
    #[arg(long, env = "MOODIFY_SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    spotify_client_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration comes before tracing so the TOML log level can apply;
    // where it came from is logged once the subscriber is installed
    let config_path = resolve_config_path(args.config.as_deref());
    let (config, config_source) = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("moodify_ea={0},moodify_common={0},tower_http=info", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Moodify Emotion Analysis (moodify-ea) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_source {
        ConfigSource::File(path) => info!("Loaded TOML configuration from {}", path.display()),
        ConfigSource::Missing(path) => warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        ),
        ConfigSource::Defaults => warn!("No config file found, using built-in defaults"),
    }

    // The service cannot answer without its emotion table
    let emotions_path =
        resolve_emotions_path(args.emotions.as_deref(), &config, config_source.file());
    let table = Arc::new(
        EmotionTable::load(&emotions_path)
            .with_context(|| format!("Failed to load emotion table {}", emotions_path.display()))?,
    );
    if table.is_empty() {
        warn!("Emotion table is empty; every label will resolve to the default emotion");
    }

    let classifier =
        classifier_from_config(&config.classifier).context("Failed to set up classifier")?;
    info!(
        backend = classifier.backend_id(),
        timeout_secs = config.classifier.timeout_secs,
        "Emotion classifier ready"
    );

    let analyzer = MoodAnalyzer::with_random_picker(table, classifier);

    let track_finder = match track_search_config(&args, &config) {
        Some(search) => {
            let client = SpotifyClient::new(&search).context("Failed to set up track search")?;
            info!(market = %search.market, "Track search enabled");
            Some(TrackFinder::new(Arc::new(client), search.max_results))
        }
        None => {
            info!("Track search disabled (no Spotify credentials)");
            None
        }
    };

    let state = AppState::new(analyzer, track_finder);
    let app = build_router_with(state, &config.server);

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("moodify-ea listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Track search settings: CLI/env credentials override the TOML section
fn track_search_config(args: &Args, config: &TomlConfig) -> Option<TrackSearchConfig> {
    match (&args.spotify_client_id, &args.spotify_client_secret) {
        (Some(id), Some(secret)) if !id.trim().is_empty() && !secret.trim().is_empty() => {
            let mut search = config
                .track_search
                .clone()
                .unwrap_or_else(|| TrackSearchConfig::with_credentials(id.clone(), secret.clone()));
            search.client_id = id.clone();
            search.client_secret = secret.clone();
            Some(search)
        }
        _ => config.track_search.clone(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
