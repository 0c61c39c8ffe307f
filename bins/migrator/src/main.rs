//! Database migration runner for Saldo.
//!
//! Usage:
//!   migrator up      - Create the ledger tables
//!   migrator down    - Drop them again
//!   migrator status  - Show migration status
//!
//! Reads `DATABASE_URL` (a `.env` file is honoured).

use sea_orm_migration::prelude::*;
use saldo_db::migration::Migrator;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The CLI sets up its own tracing
    cli::run_cli(Migrator).await;
}
