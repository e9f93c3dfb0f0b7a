//! Financial period persistence: the rows behind the accounting period guard.

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::db_types::FinancialPeriod;

/// The period covering `date`, if one has been defined. Dates with no period are
/// implicitly open.
pub async fn period_covering(
    date: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<Option<FinancialPeriod>, sqlx::Error> {
    sqlx::query_as::<_, FinancialPeriod>(
        "SELECT * FROM financial_periods WHERE starts_on <= $1 AND ends_on >= $2 LIMIT 1",
    )
    .bind(date)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn fetch_period(period_id: i64, conn: &mut SqliteConnection) -> Result<Option<FinancialPeriod>, sqlx::Error> {
    sqlx::query_as::<_, FinancialPeriod>("SELECT * FROM financial_periods WHERE id = $1")
        .bind(period_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_periods(conn: &mut SqliteConnection) -> Result<Vec<FinancialPeriod>, sqlx::Error> {
    sqlx::query_as::<_, FinancialPeriod>("SELECT * FROM financial_periods ORDER BY starts_on DESC")
        .fetch_all(&mut *conn)
        .await
}

pub async fn insert_period(
    name: &str,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO financial_periods (name, starts_on, ends_on, status)
        VALUES ($1, $2, $3, 'open')
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(starts_on)
    .bind(ends_on)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.0)
}

pub async fn mark_closed(period_id: i64, admin_id: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE financial_periods
        SET status = 'closed', closed_at = CURRENT_TIMESTAMP, closed_by = $1
        WHERE id = $2
        "#,
    )
    .bind(admin_id)
    .bind(period_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn mark_reopened(
    period_id: i64,
    admin_id: &str,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE financial_periods
        SET status = 'open', reopened_at = CURRENT_TIMESTAMP, reopened_by = $1, reopen_reason = $2
        WHERE id = $3
        "#,
    )
    .bind(admin_id)
    .bind(reason)
    .bind(period_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
