//! Journal entry, transaction line, account balance and revenue recognition persistence.

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::db_types::{
    Account, JournalEntry, Money, NewTransactionLine, OrderId, RevenueRecognition, TransactionLine,
};

pub async fn fetch_account(code: &str, conn: &mut SqliteConnection) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE code = $1")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_accounts(conn: &mut SqliteConnection) -> Result<Vec<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY code").fetch_all(&mut *conn).await
}

pub async fn insert_entry(
    entry_date: NaiveDate,
    description: &str,
    reference: Option<&str>,
    order_id: Option<&OrderId>,
    created_by: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO journal_entries (entry_date, description, reference, order_id, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(entry_date)
    .bind(description)
    .bind(reference)
    .bind(order_id)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.0)
}

pub async fn fetch_entry(entry_id: i64, conn: &mut SqliteConnection) -> Result<Option<JournalEntry>, sqlx::Error> {
    sqlx::query_as::<_, JournalEntry>("SELECT * FROM journal_entries WHERE id = $1")
        .bind(entry_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_lines(entry_id: i64, conn: &mut SqliteConnection) -> Result<Vec<TransactionLine>, sqlx::Error> {
    sqlx::query_as::<_, TransactionLine>(
        "SELECT * FROM transaction_lines WHERE journal_entry_id = $1 ORDER BY id",
    )
    .bind(entry_id)
    .fetch_all(&mut *conn)
    .await
}

/// Inserts one line and applies its effect to the account's cached balance.
/// Asset/expense accounts grow on debit; liability/equity/revenue grow on credit.
pub async fn insert_line(
    entry_id: i64,
    line: &NewTransactionLine,
    account: &Account,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transaction_lines (journal_entry_id, account_code, debit, credit, description)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry_id)
    .bind(&line.account_code)
    .bind(line.debit)
    .bind(line.credit)
    .bind(&line.description)
    .execute(&mut *conn)
    .await?;

    let balance_change = if account.kind.is_debit_normal() {
        line.debit - line.credit
    } else {
        line.credit - line.debit
    };
    sqlx::query("UPDATE accounts SET balance = balance + $1 WHERE code = $2")
        .bind(balance_change)
        .bind(&line.account_code)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Entry count and debit/credit totals for entries dated inside a range.
pub async fn period_totals(
    starts_on: NaiveDate,
    ends_on: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<(i64, Money, Money), sqlx::Error> {
    let row: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT je.id), COALESCE(SUM(tl.debit), 0), COALESCE(SUM(tl.credit), 0)
        FROM journal_entries je
        LEFT JOIN transaction_lines tl ON tl.journal_entry_id = je.id
        WHERE je.entry_date BETWEEN $1 AND $2
        "#,
    )
    .bind(starts_on)
    .bind(ends_on)
    .fetch_one(&mut *conn)
    .await?;
    Ok((row.0, Money::from(row.1), Money::from(row.2)))
}

/// Debit and credit totals over the whole journal.
pub async fn ledger_totals(conn: &mut SqliteConnection) -> Result<(Money, Money), sqlx::Error> {
    let row: (i64, i64) =
        sqlx::query_as("SELECT COALESCE(SUM(debit), 0), COALESCE(SUM(credit), 0) FROM transaction_lines")
            .fetch_one(&mut *conn)
            .await?;
    Ok((Money::from(row.0), Money::from(row.1)))
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_recognition(
    order_id: &OrderId,
    gross_revenue: Money,
    discount_amount: Money,
    net_revenue: Money,
    cogs_amount: Money,
    gross_profit: Money,
    revenue_entry_id: i64,
    cogs_entry_id: Option<i64>,
    recognized_by: &str,
    conn: &mut SqliteConnection,
) -> Result<RevenueRecognition, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO revenue_recognitions (
            order_id, gross_revenue, discount_amount, net_revenue, cogs_amount, gross_profit,
            revenue_entry_id, cogs_entry_id, recognized_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(order_id)
    .bind(gross_revenue)
    .bind(discount_amount)
    .bind(net_revenue)
    .bind(cogs_amount)
    .bind(gross_profit)
    .bind(revenue_entry_id)
    .bind(cogs_entry_id)
    .bind(recognized_by)
    .execute(&mut *conn)
    .await?;
    let recognition = fetch_recognition(order_id, conn).await?;
    recognition.ok_or(sqlx::Error::RowNotFound)
}

pub async fn fetch_recognition(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<RevenueRecognition>, sqlx::Error> {
    sqlx::query_as::<_, RevenueRecognition>("SELECT * FROM revenue_recognitions WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn delete_recognition(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM revenue_recognitions WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Shrinks a recognition after a partial refund. The reversed fractions have already been
/// posted as journal entries by the caller.
pub async fn update_recognition_amounts(
    order_id: &OrderId,
    gross_revenue: Money,
    net_revenue: Money,
    cogs_amount: Money,
    gross_profit: Money,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE revenue_recognitions
        SET gross_revenue = $1, net_revenue = $2, cogs_amount = $3, gross_profit = $4
        WHERE order_id = $5
        "#,
    )
    .bind(gross_revenue)
    .bind(net_revenue)
    .bind(cogs_amount)
    .bind(gross_profit)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
