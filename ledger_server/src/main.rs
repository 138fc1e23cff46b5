//! Wagering ledger server.
//!
//! Serves the ledger's HTTP API on top of PostgreSQL, or on process memory
//! with `--memory`.

use anyhow::{Context, Error};
use ledger_server::{
    api,
    config::{ServerConfig, StoreBackend},
    logging, metrics,
};
use pico_args::Arguments;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use wager_ledger::{
    WagerEngine,
    db::{Database, LedgerStore, MemoryLedgerStore},
};

const HELP: &str = "\
Run the wagering ledger server

USAGE:
  ledger_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:7070]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --memory                 Keep all state in memory instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus exporter address (disabled when unset)
  DATABASE_URL             PostgreSQL connection string
  INITIAL_BALANCE          Balance credited to new accounts
  LEDGER_MAX_COMMIT_RETRIES  Attempts on a conflicting commit
  LEDGER_RETRY_BACKOFF_MS  Pause between those attempts
  VIP_SCHEDULE_FILE        JSON file with VIP levels
  RUST_LOG                 Log filter (default: info,sqlx=warn)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let in_memory = pargs.contains("--memory");
    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unexpected arguments: {remaining:?}");
    }

    logging::init();

    let config = ServerConfig::from_env(bind, database_url, in_memory)?;
    config.validate()?;

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(Error::msg)?;
        info!("Prometheus metrics exported on {}", metrics_bind);
    }

    let store: Arc<dyn LedgerStore> = match &config.store {
        StoreBackend::Postgres(database) => {
            info!("Connecting to database");
            let db = Database::new(database)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to run migrations")?;
            info!("Database connected and migrated");
            Arc::new(db.store())
        }
        StoreBackend::Memory => {
            warn!("Running on the in-memory store; state is lost on exit");
            Arc::new(MemoryLedgerStore::new())
        }
    };

    let engine = Arc::new(WagerEngine::new(store, config.ledger.clone()));

    let repaired = engine
        .ledger()
        .reconcile_all()
        .await
        .context("Failed to reconcile wager totals")?;
    if !repaired.is_empty() {
        warn!("Repaired total_wagered on accounts {repaired:?}");
    }
    let app = api::create_router(api::AppState { engine });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
