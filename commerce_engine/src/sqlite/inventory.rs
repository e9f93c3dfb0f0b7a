//! The inventory ledger: per-warehouse, per-variant stock counters.
//!
//! Every mutation here is a single conditional `UPDATE` — the guard predicate lives in
//! the same statement as the write, so two concurrent checkouts racing for the last unit
//! cannot both succeed. Callers pass their own connection/transaction; nothing in this
//! module commits.

use log::{debug, error, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{InventoryLevel, OrderStatusType},
    traits::OrderFlowError,
};

/// Stock movement tags written to `inventory_log`.
pub mod actions {
    pub const ORDER_FULFILL: &str = "ORDER_FULFILL";
    pub const ORDER_CANCEL_RETURN: &str = "ORDER_CANCEL_RETURN";
    pub const RESTOCK: &str = "RESTOCK";
}

/// Moves `quantity` from `available` to `reserved`, but only if enough is available.
pub async fn reserve_stock(
    warehouse_id: &str,
    variant_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET available = available - $1, reserved = reserved + $2, updated_at = CURRENT_TIMESTAMP
        WHERE warehouse_id = $3 AND variant_id = $4 AND available >= $5
        "#,
    )
    .bind(quantity)
    .bind(quantity)
    .bind(warehouse_id)
    .bind(variant_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return match fetch_level(warehouse_id, variant_id, conn).await? {
            None => {
                error!("📦️ Stock reservation failed: no inventory record for {variant_id} in {warehouse_id}");
                Err(OrderFlowError::Inventory(format!(
                    "No inventory record for variant {variant_id} in warehouse {warehouse_id}"
                )))
            },
            Some(level) => {
                warn!(
                    "📦️ Stock reservation failed for {variant_id}: requested {quantity}, available {}",
                    level.available
                );
                Err(OrderFlowError::InsufficientStock {
                    variant_id: variant_id.to_string(),
                    requested: quantity,
                    available: level.available,
                })
            },
        };
    }
    debug!("📦️ Reserved {quantity} × {variant_id} in {warehouse_id}");
    Ok(())
}

/// Removes `quantity` from `reserved` once payment is confirmed — the stock is now sold.
/// When an `order_status` is supplied, commits are only allowed from a payment-eligible
/// status.
pub async fn commit_stock(
    warehouse_id: &str,
    variant_id: &str,
    quantity: i64,
    order_status: Option<OrderStatusType>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    if let Some(status) = order_status {
        if !matches!(status, OrderStatusType::Paid | OrderStatusType::Shipped | OrderStatusType::Delivered) {
            return Err(OrderFlowError::Inventory(format!(
                "Cannot commit stock for an order in {status} status"
            )));
        }
    }
    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET reserved = reserved - $1, updated_at = CURRENT_TIMESTAMP
        WHERE warehouse_id = $2 AND variant_id = $3 AND reserved >= $4
        "#,
    )
    .bind(quantity)
    .bind(warehouse_id)
    .bind(variant_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        error!("📦️ Stock commit failed: insufficient reserved stock for {variant_id} in {warehouse_id}");
        return Err(OrderFlowError::Inventory(format!(
            "Stock reservation expired or invalid for variant {variant_id}"
        )));
    }
    debug!("📦️ Committed {quantity} × {variant_id} in {warehouse_id}");
    Ok(())
}

/// Moves `quantity` back from `reserved` to `available` — a pending order let its claim go.
pub async fn release_stock(
    warehouse_id: &str,
    variant_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET reserved = reserved - $1, available = available + $2, updated_at = CURRENT_TIMESTAMP
        WHERE warehouse_id = $3 AND variant_id = $4 AND reserved >= $5
        "#,
    )
    .bind(quantity)
    .bind(quantity)
    .bind(warehouse_id)
    .bind(variant_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        error!("📦️ Stock release failed for {variant_id}: reservation smaller than {quantity}");
        return Err(OrderFlowError::Inventory(format!(
            "Cannot release {quantity} units of {variant_id}: invalid reservation state"
        )));
    }
    debug!("📦️ Released {quantity} × {variant_id} in {warehouse_id}");
    Ok(())
}

/// Adds committed (sold) stock back to `available` — goods coming back from a cancelled
/// paid/shipped order.
pub async fn return_stock(
    warehouse_id: &str,
    variant_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET available = available + $1, updated_at = CURRENT_TIMESTAMP
        WHERE warehouse_id = $2 AND variant_id = $3
        "#,
    )
    .bind(quantity)
    .bind(warehouse_id)
    .bind(variant_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(OrderFlowError::Inventory(format!(
            "No inventory record for variant {variant_id} in warehouse {warehouse_id}"
        )));
    }
    debug!("📦️ Returned {quantity} × {variant_id} to {warehouse_id}");
    Ok(())
}

/// Unconditional increase of `available`, creating the row if needed. Restocking,
/// transfers, purchase receipts.
pub async fn increase_stock(
    warehouse_id: &str,
    variant_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<InventoryLevel, OrderFlowError> {
    sqlx::query(
        r#"
        INSERT INTO inventory (warehouse_id, variant_id, available, reserved)
        VALUES ($1, $2, $3, 0)
        ON CONFLICT (warehouse_id, variant_id)
        DO UPDATE SET available = available + excluded.available, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(warehouse_id)
    .bind(variant_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;
    debug!("📦️ Increased stock of {variant_id} in {warehouse_id} by {quantity}");
    let level = fetch_level(warehouse_id, variant_id, conn).await?.ok_or_else(|| {
        OrderFlowError::Inventory(format!("Inventory record for {variant_id} vanished after upsert"))
    })?;
    Ok(level)
}

pub async fn fetch_level(
    warehouse_id: &str,
    variant_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<InventoryLevel>, OrderFlowError> {
    let level = sqlx::query_as::<_, InventoryLevel>(
        "SELECT * FROM inventory WHERE warehouse_id = $1 AND variant_id = $2",
    )
    .bind(warehouse_id)
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(level)
}

/// Stock movement audit row. Written inside the caller's transaction so the movement and
/// its log line commit (or roll back) together.
pub async fn write_log(
    warehouse_id: &str,
    variant_id: &str,
    action: &str,
    quantity: i64,
    reason: &str,
    reference_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    sqlx::query(
        r#"
        INSERT INTO inventory_log (warehouse_id, variant_id, action, quantity, reason, reference_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(warehouse_id)
    .bind(variant_id)
    .bind(action)
    .bind(quantity)
    .bind(reason)
    .bind(reference_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
