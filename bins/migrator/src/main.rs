//! Database migration runner for Ledgerbook.
//!
//! Usage:
//!   migrator up      - Apply the journal schema
//!   migrator down    - Roll back the last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop everything and re-apply
//!
//! The connection string comes from `DATABASE_URL`, read from `.env` when present.

use ledgerbook_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // run_cli installs its own tracing subscriber
    cli::run_cli(Migrator).await;
}
