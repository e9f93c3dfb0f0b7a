//! Best-effort audit log. Writes happen on their own connection after the business
//! transaction has committed; a failure here is logged and swallowed, never propagated —
//! the audit trail is a side channel, not a correctness dependency.

use log::warn;
use sqlx::SqlitePool;

use crate::db_types::AuditEntry;

pub async fn record(
    actor: &str,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    details: serde_json::Value,
    pool: &SqlitePool,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_log (actor, action, entity_type, entity_id, details)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(actor)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(details.to_string())
    .execute(pool)
    .await;
    if let Err(e) = result {
        warn!("🧾️ Audit log write failed for {action} on {entity_type} {entity_id}: {e}");
    }
}

/// Most recent audit rows, newest first. Used by admin tooling and tests.
pub async fn fetch_recent(limit: i64, pool: &SqlitePool) -> Result<Vec<AuditEntry>, sqlx::Error> {
    sqlx::query_as::<_, AuditEntry>("SELECT * FROM audit_log ORDER BY id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(pool)
        .await
}
