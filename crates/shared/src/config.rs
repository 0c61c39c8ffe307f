//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine tunables.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Slack tolerated when deciding whether settlements cover a root.
    #[serde(default = "default_settlement_epsilon")]
    pub settlement_epsilon: Decimal,
    /// Months materialized for a FIXED recurring entry without an explicit count.
    #[serde(default = "default_fixed_horizon_months")]
    pub fixed_horizon_months: u32,
    /// Upper bound on installments or occurrences per recurring entry.
    #[serde(default = "default_max_installments")]
    pub max_installments: u32,
}

fn default_settlement_epsilon() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_fixed_horizon_months() -> u32 {
    12
}

fn default_max_installments() -> u32 {
    360
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            settlement_epsilon: default_settlement_epsilon(),
            fixed_horizon_months: default_fixed_horizon_months(),
            max_installments: default_max_installments(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SALDO").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
