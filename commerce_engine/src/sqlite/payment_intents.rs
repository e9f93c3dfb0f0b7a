//! Payment intent persistence. Status changes go through a conditional update keyed on
//! the current `pending` status, which is what makes webhook retries harmless.

use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{new_intent_id, Money, OrderId, PaymentIntent, PaymentIntentStatus},
    traits::{OrderFlowError, PaymentError},
};

pub async fn insert_intent(
    order_id: &OrderId,
    amount: Money,
    expires_at: DateTime<Utc>,
    provider: &str,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, OrderFlowError> {
    let intent_id = new_intent_id();
    let result = sqlx::query(
        r#"
        INSERT INTO payment_intents (intent_id, order_id, amount, expires_at, provider)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&intent_id)
    .bind(order_id)
    .bind(amount)
    .bind(expires_at)
    .bind(provider)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => {},
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(PaymentError::IntentAlreadyExists(order_id.clone()).into());
        },
        Err(e) => return Err(e.into()),
    }
    debug!("💳️ Payment intent {intent_id} created for order {order_id} ({amount})");
    let intent = fetch_intent(&intent_id, conn)
        .await?
        .ok_or_else(|| OrderFlowError::DatabaseError(format!("Intent {intent_id} vanished after insert")))?;
    Ok(intent)
}

pub async fn fetch_intent(
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, OrderFlowError> {
    let intent = sqlx::query_as::<_, PaymentIntent>("SELECT * FROM payment_intents WHERE intent_id = $1")
        .bind(intent_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(intent)
}

pub async fn fetch_intent_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, OrderFlowError> {
    let intent = sqlx::query_as::<_, PaymentIntent>("SELECT * FROM payment_intents WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(intent)
}

/// Moves a `pending` intent into a terminal status. Returns `false` when the intent was
/// not pending any more — the caller lost a race or is a webhook retry.
pub async fn finalize_intent(
    intent_id: &str,
    to_status: PaymentIntentStatus,
    provider_reference: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderFlowError> {
    let result = sqlx::query(
        r#"
        UPDATE payment_intents
        SET status = $1,
            provider_reference = COALESCE($2, provider_reference),
            updated_at = CURRENT_TIMESTAMP
        WHERE intent_id = $3 AND status = 'pending'
        "#,
    )
    .bind(to_status)
    .bind(provider_reference)
    .bind(intent_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Intents still pending whose TTL has lapsed.
pub async fn fetch_expired(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, OrderFlowError> {
    let intents = sqlx::query_as::<_, PaymentIntent>(
        r#"
        SELECT * FROM payment_intents
        WHERE status = 'pending' AND datetime(expires_at) < datetime($1)
        ORDER BY id
        "#,
    )
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;
    Ok(intents)
}
