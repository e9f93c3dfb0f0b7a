use std::fmt::Debug;

use chrono::NaiveDate;
use log::debug;

use crate::{
    db_types::{
        Account, FinancialPeriod, JournalEntry, Money, NewJournalEntry, OrderId, RevenueRecognition,
    },
    traits::{LedgerDatabase, LedgerError, PeriodClosePreview, TrialBalance},
};

/// `LedgerApi` fronts the double-entry journal, revenue recognition and the accounting
/// period guard.
pub struct LedgerApi<B> {
    db: B,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> LedgerApi<B>
where B: LedgerDatabase
{
    /// Post one balanced journal entry. The period guard runs first, then the balance
    /// rule; entry, lines and cached account balances commit together.
    pub async fn create_journal_entry(&self, entry: NewJournalEntry) -> Result<JournalEntry, LedgerError> {
        self.db.create_journal_entry(entry).await
    }

    /// Recognize revenue for a delivered order. Idempotent — a second call returns the
    /// existing recognition and posts nothing.
    pub async fn recognize_revenue(
        &self,
        order_id: &OrderId,
        recognized_by: &str,
    ) -> Result<RevenueRecognition, LedgerError> {
        self.db.recognize_revenue(order_id, recognized_by).await
    }

    pub async fn fetch_revenue_recognition(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<RevenueRecognition>, LedgerError> {
        self.db.fetch_revenue_recognition(order_id).await
    }

    /// Net an order's recognition back to zero and delete the recognition row. No-op when
    /// nothing has been recognized.
    pub async fn reverse_revenue(
        &self,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<Option<RevenueRecognition>, LedgerError> {
        self.db.reverse_revenue(order_id, reason).await
    }

    /// Partial refund: reverse the fraction `refund_amount / order_total` of the
    /// recognized revenue and COGS, shrinking the stored recognition accordingly. This
    /// scales the whole recognition — it does not track which line came back.
    pub async fn create_refund_entry(
        &self,
        order_id: &OrderId,
        refund_amount: Money,
        reason: &str,
    ) -> Result<Option<RevenueRecognition>, LedgerError> {
        if !refund_amount.is_positive() {
            return Err(LedgerError::InvalidRefundAmount(refund_amount));
        }
        self.db.create_refund_entry(order_id, refund_amount, reason).await
    }

    /// True unless a closed/locked period covers the date.
    pub async fn validate_transaction_date(&self, date: NaiveDate) -> Result<bool, LedgerError> {
        let open = self.db.validate_transaction_date(date).await?;
        debug!("📒️ Period check for {date}: {}", if open { "open" } else { "closed" });
        Ok(open)
    }

    pub async fn fetch_account(&self, code: &str) -> Result<Option<Account>, LedgerError> {
        self.db.fetch_account(code).await
    }

    pub async fn fetch_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.db.fetch_accounts().await
    }

    pub async fn fetch_periods(&self) -> Result<Vec<FinancialPeriod>, LedgerError> {
        self.db.fetch_periods().await
    }

    pub async fn create_period(
        &self,
        name: &str,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Result<FinancialPeriod, LedgerError> {
        self.db.create_period(name, starts_on, ends_on).await
    }

    /// Seal a period. Run [`Self::preview_period_close`] first and show the operator the
    /// warnings; the close itself does not enforce them.
    pub async fn close_period(&self, period_id: i64, admin_id: &str) -> Result<FinancialPeriod, LedgerError> {
        self.db.close_period(period_id, admin_id).await
    }

    pub async fn reopen_period(
        &self,
        period_id: i64,
        admin_id: &str,
        reason: &str,
    ) -> Result<FinancialPeriod, LedgerError> {
        self.db.reopen_period(period_id, admin_id, reason).await
    }

    pub async fn preview_period_close(&self, period_id: i64) -> Result<PeriodClosePreview, LedgerError> {
        self.db.preview_period_close(period_id).await
    }

    /// Reconciliation check: total debits vs total credits over the whole journal.
    /// A variance beyond one cent means corrupted postings.
    pub async fn trial_balance(&self) -> Result<TrialBalance, LedgerError> {
        self.db.trial_balance().await
    }
}
