//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use wager_ledger::{ConfigError, LedgerConfig, db::DatabaseConfig};

const DEFAULT_BIND: &str = "127.0.0.1:7070";

/// Where the ledger keeps its state
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// PostgreSQL, migrated on startup
    Postgres(DatabaseConfig),
    /// Process memory; state is lost on exit
    Memory,
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus scrape address, if metrics are exported
    pub metrics_bind: Option<SocketAddr>,
    /// Storage backend
    pub store: StoreBackend,
    /// Ledger settings
    pub ledger: LedgerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `in_memory` - Use the in-memory store instead of PostgreSQL
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        in_memory: bool,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND")?.unwrap_or(default_bind()?),
        };

        let metrics_bind = parse_addr("METRICS_BIND")?;

        let store = if in_memory {
            StoreBackend::Memory
        } else {
            let mut database = DatabaseConfig::from_env();
            if let Some(url) = database_url_override {
                database.database_url = url;
            }
            StoreBackend::Postgres(database)
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            store,
            ledger: LedgerConfig::from_env()?,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;

        if let StoreBackend::Postgres(database) = &self.store {
            if database.database_url.is_empty() {
                return Err(ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "Set a PostgreSQL URL or start with --memory".to_string(),
                });
            }
            if database.min_connections > database.max_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MIN_CONNECTIONS".to_string(),
                    reason: format!(
                        "Must not exceed max connections ({})",
                        database.max_connections
                    ),
                });
            }
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: "Must differ from the server bind address".to_string(),
            });
        }

        Ok(())
    }
}

fn default_bind() -> Result<SocketAddr, ConfigError> {
    DEFAULT_BIND.parse().map_err(|_| ConfigError::Invalid {
        var: "SERVER_BIND".to_string(),
        reason: format!("Default {DEFAULT_BIND} does not parse"),
    })
}

/// Read an optional socket address; present but unparseable is an error
fn parse_addr(var: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("'{raw}' is not an IP:PORT address"),
        }),
        Err(_) => Ok(None),
    }
}
