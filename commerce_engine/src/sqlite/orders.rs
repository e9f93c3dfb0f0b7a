//! Order, order-item and status-history persistence.

use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    api::order_objects::OrderQueryFilter,
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusHistory, OrderStatusType},
    traits::Pagination,
};

/// Inserts the order plus its line items. Not atomic on its own; run it inside the
/// caller's transaction.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            order_id, customer_id, total_price, discount_amount, payment_method,
            warehouse_id, customer_name, customer_email, shipping_address
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.customer_id)
    .bind(order.total_price)
    .bind(order.discount_amount)
    .bind(order.payment_method)
    .bind(&order.warehouse_id)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.shipping_address)
    .execute(&mut *conn)
    .await?;

    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, variant_id, name, unit_price, cost_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&order.order_id)
        .bind(&item.product_id)
        .bind(&item.variant_id)
        .bind(&item.name)
        .bind(item.unit_price)
        .bind(item.cost_price)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Order {} saved with {} line(s)", order.order_id, order.items.len());

    let created = fetch_order(&order.order_id, conn).await?;
    created.ok_or(sqlx::Error::RowNotFound)
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await
}

/// Transition history, newest first.
pub async fn fetch_history(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusHistory>, sqlx::Error> {
    sqlx::query_as::<_, OrderStatusHistory>(
        "SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY id DESC",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
}

/// Flips the status column, but only while the row still holds the status the caller
/// read — a conditional write, so two racing transitions cannot both apply their side
/// effects. Returns `false` when the guard lost the race. `delivered` also stamps
/// `delivered_at`, so the refund window can be measured from receipt rather than from
/// checkout.
pub async fn update_status(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = if to == OrderStatusType::Delivered {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, updated_at = CURRENT_TIMESTAMP, delivered_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status = $3
            "#,
        )
        .bind(to)
        .bind(order_id)
        .bind(from)
        .execute(&mut *conn)
        .await?
    } else {
        sqlx::query(
            "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = $3",
        )
        .bind(to)
        .bind(order_id)
        .bind(from)
        .execute(&mut *conn)
        .await?
    };
    Ok(result.rows_affected() == 1)
}

pub async fn insert_history(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO order_status_history (order_id, from_status, to_status, reason)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &OrderQueryFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(order_id) = &filter.order_id {
        builder.push(" AND order_id = ").push_bind(order_id.clone());
    }
    if let Some(customer_id) = &filter.customer_id {
        builder.push(" AND customer_id = ").push_bind(customer_id.clone());
    }
    if let Some(method) = filter.payment_method {
        builder.push(" AND payment_method = ").push_bind(method);
    }
    if !filter.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in &filter.statuses {
            separated.push_bind(*status);
        }
        builder.push(")");
    }
    if let Some(since) = filter.since {
        builder.push(" AND datetime(created_at) >= datetime(").push_bind(since).push(")");
    }
    if let Some(until) = filter.until {
        builder.push(" AND datetime(created_at) <= datetime(").push_bind(until).push(")");
    }
}

/// Filtered, paginated order listing plus the total match count for the filter.
pub async fn fetch_orders(
    filter: &OrderQueryFilter,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM orders");
    push_filter(&mut count_builder, filter);
    let total: i64 = count_builder.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM orders");
    push_filter(&mut builder, filter);
    builder.push(if filter.oldest_first { " ORDER BY id ASC" } else { " ORDER BY id DESC" });
    builder.push(" LIMIT ").push_bind(pagination.limit);
    builder.push(" OFFSET ").push_bind(pagination.offset());
    let orders = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    Ok((orders, total))
}

/// Abandoned checkouts: pending, created before `cutoff`, no payment intent, and not
/// cash-on-delivery. COD orders never acquire an intent and are excluded by design —
/// a blanket "no intent after N minutes" rule would cancel every one of them.
pub async fn fetch_zombie_orders(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT o.*
        FROM orders o
        LEFT JOIN payment_intents pi ON pi.order_id = o.order_id
        WHERE o.status = 'pending'
          AND pi.id IS NULL
          AND o.payment_method <> 'cod'
          AND datetime(o.created_at) < datetime($1)
        ORDER BY o.id
        "#,
    )
    .bind(cutoff)
    .fetch_all(&mut *conn)
    .await
}

/// Pending orders created inside a date range. Feeds the period-close preview.
pub async fn count_pending_in_range(
    starts_on: chrono::NaiveDate,
    ends_on: chrono::NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE status = 'pending' AND date(created_at) BETWEEN $1 AND $2
        "#,
    )
    .bind(starts_on)
    .bind(ends_on)
    .fetch_one(&mut *conn)
    .await
}
