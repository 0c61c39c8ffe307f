//! Database layer with `SeaORM` entities and the SQL ledger store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - [`LedgerRepository`], the Postgres implementation of the ledger store
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::LedgerRepository;

use saldo_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Connects with the pool limits from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
