use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    db_types::{
        Account, FinancialPeriod, JournalEntry, Money, NewJournalEntry, OrderId, PeriodStatus,
        RevenueRecognition,
    },
    traits::data_objects::{PeriodClosePreview, TrialBalance},
};

/// The double-entry journal, revenue recognition and the financial period guard.
///
/// Every posting is validated against the period guard and the balance rule before
/// anything is written, and entry + lines + cached account balances land in one
/// transaction.
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone {
    /// Posts one balanced journal entry.
    ///
    /// Rejected when the entry date falls in a closed/locked period, when
    /// `sum(debit) != sum(credit)` beyond [`Money::EPSILON`], or when a line references an
    /// account code that is not in the chart of accounts. Account balances are updated by
    /// normal-balance sign rules: asset/expense grow on debit, the rest grow on credit.
    async fn create_journal_entry(&self, entry: NewJournalEntry) -> Result<JournalEntry, LedgerError>;

    /// Records earned revenue for a delivered order: one entry debiting Cash (COD) or
    /// Accounts Receivable (online) against Sales Revenue, and — when the order carries
    /// cost snapshots — one entry debiting COGS against Inventory. Stores the
    /// `RevenueRecognition` row linking both entries.
    ///
    /// Idempotent: when a recognition already exists for the order it is returned
    /// unchanged and nothing is posted.
    async fn recognize_revenue(
        &self,
        order_id: &OrderId,
        recognized_by: &str,
    ) -> Result<RevenueRecognition, LedgerError>;

    async fn fetch_revenue_recognition(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<RevenueRecognition>, LedgerError>;

    /// Mirror-image entries netting an order's recognition to zero, then deletion of the
    /// recognition row. Returns the recognition that was reversed, or `None` when there
    /// was nothing to reverse.
    async fn reverse_revenue(
        &self,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<Option<RevenueRecognition>, LedgerError>;

    /// Partial reversal for a refund, proportional to `refund_amount / order_total`.
    /// The stored recognition keeps the remaining fraction rather than being deleted.
    /// This is an approximation: refunds scale the whole recognition, they do not track
    /// per-line detail. Returns the updated recognition, or `None` when the order has no
    /// recognition to refund against.
    async fn create_refund_entry(
        &self,
        order_id: &OrderId,
        refund_amount: Money,
        reason: &str,
    ) -> Result<Option<RevenueRecognition>, LedgerError>;

    /// True unless a financial period covering `date` is closed or locked.
    async fn validate_transaction_date(&self, date: NaiveDate) -> Result<bool, LedgerError>;

    async fn fetch_account(&self, code: &str) -> Result<Option<Account>, LedgerError>;

    async fn fetch_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// All periods, newest first.
    async fn fetch_periods(&self) -> Result<Vec<FinancialPeriod>, LedgerError>;

    async fn create_period(
        &self,
        name: &str,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Result<FinancialPeriod, LedgerError>;

    /// Seals a period against further postings. Admin-audited.
    async fn close_period(&self, period_id: i64, admin_id: &str) -> Result<FinancialPeriod, LedgerError>;

    /// Reopens a closed period. Admin-audited; the reason is stored with the period.
    async fn reopen_period(
        &self,
        period_id: i64,
        admin_id: &str,
        reason: &str,
    ) -> Result<FinancialPeriod, LedgerError>;

    /// Journal totals and warnings an operator should see before sealing the period.
    /// Advisory only — nothing here is enforced.
    async fn preview_period_close(&self, period_id: i64) -> Result<PeriodClosePreview, LedgerError>;

    /// Sum of all debits vs all credits across every transaction line.
    async fn trial_balance(&self) -> Result<TrialBalance, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Financial period is {status} for date {date}; no postings allowed")]
    PeriodClosed { date: NaiveDate, status: PeriodStatus },
    #[error("Journal entry not balanced: debit={debit}, credit={credit}")]
    Unbalanced { debit: Money, credit: Money },
    #[error("Journal entry must have at least one line")]
    EmptyEntry,
    #[error("Account {0} not found in the chart of accounts")]
    AccountNotFound(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Financial period {0} not found")]
    PeriodNotFound(i64),
    #[error("Period is already {0}")]
    PeriodStatusUnchanged(PeriodStatus),
    #[error("Refund amount {refund} exceeds the order total {total}")]
    RefundTooLarge { refund: Money, total: Money },
    #[error("Refund amount must be positive, got {0}")]
    InvalidRefundAmount(Money),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
