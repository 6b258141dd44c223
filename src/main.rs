//! trackstream -- track metadata and signed download link server.
//!
//! Startup opens the metadata store and builds the link issuer before the
//! listener binds; any missing setting or unreachable store aborts the
//! process.  SIGTERM/SIGINT stop accepting connections and wait for
//! in-flight requests, then the store is closed.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use trackstream::config::{Config, MetadataEngine};
use trackstream::metadata::mysql::MySqlTrackStore;
use trackstream::metadata::sqlite::SqliteTrackStore;
use trackstream::metadata::store::TrackStore;
use trackstream::storage::aws::S3LinkIssuer;
use trackstream::storage::backend::LinkIssuer;

/// Command-line arguments for the trackstream server.
#[derive(Parser, Debug)]
#[command(
    name = "trackstream",
    version,
    about = "Track metadata and signed download link server"
)]
struct Cli {
    /// Path to the YAML configuration file (optional; env vars override it).
    #[arg(short, long, default_value = "trackstream.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

/// Initialize tracing from the logging config. `RUST_LOG` wins over
/// `logging.level` when set.
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Open the configured metadata engine.
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn TrackStore>> {
    let store: Arc<dyn TrackStore> = match config.metadata.engine {
        MetadataEngine::Mysql => Arc::new(MySqlTrackStore::connect(&config.metadata.mysql).await?),
        MetadataEngine::Sqlite => {
            let path = &config.metadata.sqlite.path;
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let store = SqliteTrackStore::new(path)?;
            store.ensure_schema()?;
            info!("SQLite track store opened at {}", path);
            Arc::new(store)
        }
    };

    // Fail fast on a store that opened but cannot answer.
    store.ping().await?;
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trackstream::config::load_dotenv()?;

    let cli = Cli::parse();
    let config = trackstream::config::load(&cli.config)?;

    init_tracing(&config);
    info!("Configuration loaded (file: {})", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics && trackstream::metrics::init_metrics().is_some() {
        trackstream::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let tracks = open_store(&config).await?;
    let links: Arc<dyn LinkIssuer> = Arc::new(S3LinkIssuer::new(&config.storage).await?);

    let state = Arc::new(trackstream::AppState {
        config: config.clone(),
        tracks: tracks.clone(),
        links,
    });

    let app = trackstream::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("trackstream listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Duration::from_secs(
            config.server.shutdown_timeout,
        )))
        .await?;

    tracks.close().await;
    info!("trackstream shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful
/// shutdown.  Arms a watchdog that exits the process if draining takes
/// longer than `timeout`.
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!("Shutdown timeout of {:?} exceeded, exiting", timeout);
        std::process::exit(1);
    });
}
