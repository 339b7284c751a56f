//! Order Service Binary
//!
//! Serves the order API over HTTP and runs the execution worker pool.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-service -- [config.yaml]
//! ```
//!
//! # Environment Variables
//!
//! - `ORDER_SERVICE_CONFIG`: Config file path when no argument is given
//! - `RUST_LOG`: Overrides `observability.logging.level`
//!
//! Any `${VAR}` or `${VAR:-default}` in the config file is interpolated.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use order_service::config::{Config, load_config};
use order_service::infrastructure::config::Container;
use order_service::observability::{init_logging, init_metrics};
use tokio::net::TcpListener;
use tokio::signal;

/// Upper bound on draining workers after the HTTP server stops.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let config_path = std::env::args().nth(1);
    let config = load_config(config_path.as_deref()).context("loading configuration")?;
    init_logging(&config.observability.logging).context("initializing logging")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting order service");
    log_config(&config);

    if config.observability.metrics.enabled {
        let addr: SocketAddr = config
            .observability
            .metrics
            .listen_addr
            .parse()
            .context("parsing observability.metrics.listen_addr")?;
        init_metrics(addr).context("starting metrics exporter")?;
    }

    let http_addr = config.server.http_addr()?;
    let container = Container::from_config(config)
        .await
        .context("opening backends")?;

    let workers = container.start_workers();
    tracing::info!(workers = workers.workers(), "Worker pool started");

    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding {http_addr}"))?;
    tracing::info!(%http_addr, "HTTP server listening");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /orders");
    tracing::info!("  GET  /orders/history");
    tracing::info!("  GET  /orders/{{id}}");
    tracing::info!("  GET  /orders/{{id}}/status");
    tracing::info!("  PUT  /orders/{{id}}/cancel");

    let served = axum::serve(listener, container.router())
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server error");
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Draining worker pool"
    );
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, workers.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Worker pool did not stop in time");
    }

    tracing::info!("Order service stopped");
    served.context("serving HTTP")
}

/// Log the effective backend selection.
fn log_config(config: &Config) {
    tracing::info!(
        http_port = config.server.http_port,
        persistence = ?config.persistence.backend,
        idempotency = ?config.idempotency.backend,
        broker = ?config.broker.backend,
        market_data = ?config.market_data.backend,
        concurrency = config.worker.concurrency,
        max_redeliveries = config.worker.max_redeliveries,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
