//! SQLite backend for the commerce engine.
//!
//! One module per table, each exposing free async functions that take a
//! `&mut SqliteConnection` so callers can compose them inside a single transaction.
//! [`db::SqliteDatabase`] ties them together and implements the engine traits.

pub mod audit;
pub mod db;
pub mod inventory;
pub mod journal;
pub mod orders;
pub mod payment_intents;
pub mod periods;

use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

const SQLITE_DB_URL: &str = "sqlite://data/commerce_store.db";

pub fn db_url() -> String {
    let result = env::var("COMMERCE_DATABASE_URL").unwrap_or_else(|_| {
        info!("COMMERCE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./src/sqlite/migrations").run(pool).await
}

/// Connection pool with WAL and a busy timeout, so concurrent checkout transactions
/// queue on the write lock instead of failing immediately.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
