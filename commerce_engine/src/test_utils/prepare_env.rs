use std::path::Path;

use chrono::Duration;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{db_types::OrderId, sqlite, SqliteDatabase};

/// Creates a fresh database at `url` and runs the migrations. Call once at the top of
/// each integration test.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

/// A unique throwaway database path under the system temp directory.
pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/commerce_test_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    sqlite::run_migrations(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Shift an order's `created_at` into the past. Lets tests age an order without waiting.
pub async fn backdate_order(db: &SqliteDatabase, order_id: &OrderId, age: Duration) {
    sqlx::query("UPDATE orders SET created_at = datetime('now', '-' || $1 || ' minutes') WHERE order_id = $2")
        .bind(age.num_minutes())
        .bind(order_id)
        .execute(db.pool())
        .await
        .expect("Error backdating order");
}

/// Shift a payment intent's `expires_at` into the past, as if its TTL had lapsed.
pub async fn expire_intent(db: &SqliteDatabase, intent_id: &str) {
    sqlx::query("UPDATE payment_intents SET expires_at = datetime('now', '-1 minutes') WHERE intent_id = $1")
        .bind(intent_id)
        .execute(db.pool())
        .await
        .expect("Error expiring intent");
}
