//! GroceryStore -- in-memory grocery item tracking server.
//!
//! State lives only in memory; every startup begins with an empty store.
//! SIGTERM/SIGINT stop the listener and wait for in-flight requests up to
//! `server.shutdown_timeout` seconds.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use grocerystore::config::{Config, LoggingConfig};
use grocerystore::store::memory::MemoryFoodStore;
use grocerystore::store::store::FoodStore;

const DEFAULT_CONFIG_PATH: &str = "grocerystore.yaml";

/// Command-line arguments for the GroceryStore server.
#[derive(Parser, Debug)]
#[command(
    name = "grocerystore",
    version,
    about = "In-memory grocery item tracking server"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,

    /// Certificate PEM file (overrides `tls.cert_file`).
    #[arg(long)]
    certfile: Option<String>,

    /// Private key PEM file (overrides `tls.key_file`).
    #[arg(long)]
    keyfile: Option<String>,
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the config file. A missing file at the default path means "use
/// defaults"; an explicitly requested file must exist.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match &cli.config {
        Some(path) => grocerystore::config::load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            grocerystore::config::load_config(DEFAULT_CONFIG_PATH)
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli)?;
    if let Some(cert) = &cli.certfile {
        config.tls.cert_file = cert.clone();
    }
    if let Some(key) = &cli.keyfile {
        config.tls.key_file = key.clone();
    }

    init_logging(&config.logging);
    match &cli.config {
        Some(path) => info!("Configuration loaded from {}", path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            info!("Configuration loaded from {}", DEFAULT_CONFIG_PATH)
        }
        None => info!("No configuration file, using defaults"),
    }

    let bind_addr = cli
        .bind
        .clone()
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        grocerystore::metrics::init_metrics()?;
        grocerystore::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let store: Arc<dyn FoodStore> = Arc::new(MemoryFoodStore::new());
    info!("In-memory food store initialized");

    let state = Arc::new(grocerystore::AppState::new(config.clone(), store));
    if state.credentials.is_empty() {
        warn!("No users configured; POST /food/ will reject every request");
    } else {
        info!("{} user(s) configured for Basic auth", state.credentials.len());
    }

    let app = grocerystore::server::app(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let grace = Duration::from_secs(config.server.shutdown_timeout);

    if config.tls.enabled {
        let tls_config =
            grocerystore::tls::load_server_config(&config.tls.cert_file, &config.tls.key_file)?;
        info!("GroceryStore listening on https://{}", bind_addr);
        grocerystore::tls::serve_tls(listener, tls_config, app, shutdown_signal(), grace).await?;
    } else {
        warn!("TLS disabled; serving plain HTTP");
        info!("GroceryStore listening on http://{}", bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    info!("GroceryStore shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
