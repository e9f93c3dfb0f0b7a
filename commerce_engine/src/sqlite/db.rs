use std::fmt::Debug;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};

use super::{audit, db_url, inventory, journal, new_pool, orders, payment_intents, periods};
use crate::{
    api::order_objects::OrderQueryFilter,
    chart_of_accounts,
    db_types::{
        Account, ActorRole, FinancialPeriod, InventoryLevel, JournalEntry, Money, NewJournalEntry,
        NewOrder, NewTransactionLine, Order, OrderId, OrderItem, OrderStatusHistory, OrderStatusType,
        PaymentIntent, PaymentIntentStatus, RevenueRecognition, SYSTEM_ACTOR,
    },
    order_policy,
    traits::{
        CommerceDatabase, LedgerDatabase, LedgerError, OrderChange, OrderDetails, OrderFlowError,
        OrderListing, OrderManagement, Pagination, PaymentError, PeriodClosePreview, TrialBalance,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using `COMMERCE_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        debug!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

//--------------------------------- internal cancellation routine ----------------------------------------------------

/// The single source of truth for order cancellation. Every trigger — manual admin or
/// customer action, payment failure, the zombie sweep — funnels through here, so the
/// stock-return logic exists exactly once.
///
/// Idempotent: an already-cancelled order is returned unchanged.
async fn cancel_order_in_tx(
    order: Order,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<OrderChange, OrderFlowError> {
    if order.status == OrderStatusType::Cancelled {
        warn!("🔄️ Order {} is already cancelled; nothing to do", order.order_id);
        return Ok(OrderChange { previous_status: OrderStatusType::Cancelled, order });
    }

    let items = orders::fetch_items(&order.order_id, conn).await?;
    match order.status {
        OrderStatusType::Pending => {
            // Stock is only reserved at this point; hand the claim back.
            for item in &items {
                inventory::release_stock(&order.warehouse_id, &item.variant_id, item.quantity, conn).await?;
            }
        },
        OrderStatusType::Paid | OrderStatusType::Shipped => {
            // Stock was committed at payment; the goods come back to the shelf.
            for item in &items {
                inventory::return_stock(&order.warehouse_id, &item.variant_id, item.quantity, conn).await?;
                inventory::write_log(
                    &order.warehouse_id,
                    &item.variant_id,
                    inventory::actions::ORDER_CANCEL_RETURN,
                    item.quantity,
                    reason,
                    Some(order.order_id.as_str()),
                    conn,
                )
                .await?;
            }
        },
        // Goods are with the customer; nothing to restock. Financial reversal is the
        // lifecycle dispatcher's job.
        OrderStatusType::Delivered => {},
        OrderStatusType::Cancelled => unreachable!("handled by the idempotency check above"),
    }

    if !orders::update_status(&order.order_id, order.status, OrderStatusType::Cancelled, conn).await? {
        // Someone else moved the order while this transaction held it; bail out rather
        // than apply stock returns against a stale status.
        return Err(OrderFlowError::InvalidTransition { from: order.status, to: OrderStatusType::Cancelled });
    }
    orders::insert_history(&order.order_id, order.status, OrderStatusType::Cancelled, reason, conn).await?;
    let updated = orders::fetch_order(&order.order_id, conn)
        .await?
        .ok_or_else(|| OrderFlowError::OrderNotFound(order.order_id.clone()))?;
    info!("🔄️ Order {} cancelled. Reason: {reason}", updated.order_id);
    Ok(OrderChange { previous_status: order.status, order: updated })
}

impl CommerceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        order.validate().map_err(OrderFlowError::Validation)?;
        let mut tx = self.pool.begin().await?;
        // Reserve first, fail fast: if any line cannot be covered the whole transaction
        // rolls back and no order row is left behind.
        for item in &order.items {
            inventory::reserve_stock(&order.warehouse_id, &item.variant_id, item.quantity, &mut tx).await?;
        }
        let created = match orders::insert_order(&order, &mut tx).await {
            Ok(o) => o,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(OrderFlowError::Validation(format!("Order {} already exists", order.order_id)));
            },
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        info!(
            "🔄️ Order {} created for customer {} ({} line(s), total {})",
            created.order_id,
            created.customer_id,
            order.items.len(),
            created.total_price
        );
        Ok(created)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        actor: ActorRole,
        actor_id: Option<&str>,
    ) -> Result<OrderChange, OrderFlowError> {
        if actor == ActorRole::Admin && actor_id.is_none() {
            return Err(OrderFlowError::Validation(
                "Admin transitions require an actor id for the audit trail".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        order_policy::validate_transition(order.status, new_status, actor)?;
        let previous_status = order.status;

        let change = if new_status == OrderStatusType::Cancelled {
            cancel_order_in_tx(order, &format!("Cancelled by {actor}"), &mut tx).await?
        } else {
            if new_status == OrderStatusType::Paid && !order.payment_method.is_cod() {
                // Reached only through the payment pathway (the policy enforces this);
                // the reservation becomes a sale.
                let items = orders::fetch_items(order_id, &mut tx).await?;
                for item in &items {
                    inventory::commit_stock(
                        &order.warehouse_id,
                        &item.variant_id,
                        item.quantity,
                        Some(new_status),
                        &mut tx,
                    )
                    .await?;
                    inventory::write_log(
                        &order.warehouse_id,
                        &item.variant_id,
                        inventory::actions::ORDER_FULFILL,
                        -item.quantity,
                        &format!("Online order paid: {order_id}"),
                        Some(order_id.as_str()),
                        &mut tx,
                    )
                    .await?;
                }
            }
            if !orders::update_status(order_id, previous_status, new_status, &mut tx).await? {
                return Err(OrderFlowError::InvalidTransition { from: previous_status, to: new_status });
            }
            orders::insert_history(order_id, previous_status, new_status, &format!("Status update by {actor}"), &mut tx)
                .await?;
            let updated = orders::fetch_order(order_id, &mut tx)
                .await?
                .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
            OrderChange { previous_status, order: updated }
        };
        tx.commit().await?;

        let audit_actor = match actor {
            ActorRole::Admin => actor_id.unwrap_or_default().to_string(),
            ActorRole::System => SYSTEM_ACTOR.to_string(),
            ActorRole::Customer => actor_id.map(str::to_string).unwrap_or_else(|| "customer".to_string()),
        };
        audit::record(
            &audit_actor,
            "UPDATE_ORDER_STATUS",
            "ORDER",
            order_id.as_str(),
            json!({ "from": previous_status, "to": change.order.status }),
            &self.pool,
        )
        .await;
        info!("🔄️ Order {order_id} moved from {previous_status} to {} by {actor}", change.order.status);
        Ok(change)
    }

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<OrderChange, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let change = cancel_order_in_tx(order, reason, &mut tx).await?;
        tx.commit().await?;
        audit::record(
            SYSTEM_ACTOR,
            "CANCEL_ORDER",
            "ORDER",
            order_id.as_str(),
            json!({ "reason": reason }),
            &self.pool,
        )
        .await;
        Ok(change)
    }

    async fn create_payment_intent(
        &self,
        order_id: &OrderId,
        amount: Money,
        ttl: Duration,
    ) -> Result<PaymentIntent, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if order.payment_method.is_cod() {
            return Err(PaymentError::CashOrder.into());
        }
        if order.status != OrderStatusType::Pending {
            return Err(OrderFlowError::Validation(format!(
                "Cannot create a payment intent for an order in {} status",
                order.status
            )));
        }
        let expires_at = Utc::now() + ttl;
        let intent = payment_intents::insert_intent(order_id, amount, expires_at, "manual", &mut tx).await?;
        tx.commit().await?;
        Ok(intent)
    }

    async fn confirm_payment_intent(&self, intent_id: &str) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let intent = payment_intents::fetch_intent(intent_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))?;
        if intent.status.is_terminal() {
            return Err(PaymentError::AlreadyFinalized(intent.status).into());
        }
        if Utc::now() > intent.expires_at {
            return Err(PaymentError::IntentExpired.into());
        }

        let order = orders::fetch_order(&intent.order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(intent.order_id.clone()))?;
        // The intent amount was fixed at checkout; the order's stored total is the
        // authority. A gap beyond one cent means a tampered or stale confirmation.
        if !intent.amount.matches(order.total_price) {
            return Err(PaymentError::AmountMismatch {
                intent_amount: intent.amount,
                order_total: order.total_price,
            }
            .into());
        }
        order_policy::validate_transition(order.status, OrderStatusType::Paid, ActorRole::System)?;

        if !payment_intents::finalize_intent(intent_id, PaymentIntentStatus::Succeeded, None, &mut tx).await? {
            // A concurrent confirmation won the conditional update.
            let current = payment_intents::fetch_intent(intent_id, &mut tx)
                .await?
                .map(|i| i.status)
                .unwrap_or(PaymentIntentStatus::Succeeded);
            return Err(PaymentError::AlreadyFinalized(current).into());
        }

        let items = orders::fetch_items(&order.order_id, &mut tx).await?;
        for item in &items {
            inventory::commit_stock(
                &order.warehouse_id,
                &item.variant_id,
                item.quantity,
                Some(OrderStatusType::Paid),
                &mut tx,
            )
            .await?;
            inventory::write_log(
                &order.warehouse_id,
                &item.variant_id,
                inventory::actions::ORDER_FULFILL,
                -item.quantity,
                &format!("Online order paid: {}", order.order_id),
                Some(order.order_id.as_str()),
                &mut tx,
            )
            .await?;
        }
        if !orders::update_status(&order.order_id, order.status, OrderStatusType::Paid, &mut tx).await? {
            return Err(OrderFlowError::InvalidTransition { from: order.status, to: OrderStatusType::Paid });
        }
        orders::insert_history(
            &order.order_id,
            order.status,
            OrderStatusType::Paid,
            "Payment confirmed",
            &mut tx,
        )
        .await?;
        let updated = orders::fetch_order(&order.order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order.order_id.clone()))?;
        tx.commit().await?;

        audit::record(
            SYSTEM_ACTOR,
            "PAYMENT_CONFIRMED",
            "ORDER",
            updated.order_id.as_str(),
            json!({
                "intent_id": intent.intent_id,
                "amount": intent.amount,
                "provider": intent.provider,
            }),
            &self.pool,
        )
        .await;
        info!("💳️ Payment intent {intent_id} confirmed; order {} is paid", updated.order_id);
        Ok(updated)
    }

    async fn fail_payment_intent(
        &self,
        intent_id: &str,
        reason: &str,
        expire: bool,
    ) -> Result<Option<Order>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let intent = match payment_intents::fetch_intent(intent_id, &mut tx).await? {
            Some(i) => i,
            None => {
                debug!("💳️ Ignoring failure report for unknown intent {intent_id}");
                return Ok(None);
            },
        };
        if intent.status.is_terminal() {
            debug!("💳️ Intent {intent_id} is already {}; failure report ignored", intent.status);
            return Ok(None);
        }
        let to_status = if expire { PaymentIntentStatus::Expired } else { PaymentIntentStatus::Failed };
        if !payment_intents::finalize_intent(intent_id, to_status, None, &mut tx).await? {
            return Ok(None);
        }
        let order = orders::fetch_order(&intent.order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(intent.order_id.clone()))?;
        let change = cancel_order_in_tx(order, &format!("Payment failed: {reason}"), &mut tx).await?;
        tx.commit().await?;
        info!("💳️ Payment intent {intent_id} marked {to_status}; order {} cancelled", change.order.order_id);
        Ok(Some(change.order))
    }

    async fn fetch_expired_intents(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        payment_intents::fetch_expired(now, &mut conn).await
    }

    async fn fetch_zombie_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let zombies = orders::fetch_zombie_orders(cutoff, &mut conn).await?;
        Ok(zombies)
    }

    async fn increase_stock(
        &self,
        warehouse_id: &str,
        variant_id: &str,
        quantity: i64,
    ) -> Result<InventoryLevel, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let level = inventory::increase_stock(warehouse_id, variant_id, quantity, &mut tx).await?;
        inventory::write_log(
            warehouse_id,
            variant_id,
            inventory::actions::RESTOCK,
            quantity,
            "Stock increase",
            None,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        Ok(level)
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = match orders::fetch_order(order_id, &mut conn).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let items = orders::fetch_items(order_id, &mut conn).await?;
        let history = orders::fetch_history(order_id, &mut conn).await?;
        Ok(Some(OrderDetails { order, items, history }))
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_order_history(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<OrderStatusHistory>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let history = orders::fetch_history(order_id, &mut conn).await?;
        Ok(history)
    }

    async fn fetch_orders(
        &self,
        filter: OrderQueryFilter,
        pagination: Pagination,
    ) -> Result<OrderListing, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let (orders, total) = orders::fetch_orders(&filter, pagination, &mut conn).await?;
        Ok(OrderListing { orders, total, page: pagination.page, limit: pagination.limit })
    }

    async fn fetch_inventory_level(
        &self,
        warehouse_id: &str,
        variant_id: &str,
    ) -> Result<Option<InventoryLevel>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_level(warehouse_id, variant_id, &mut conn).await
    }

    async fn fetch_payment_intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        payment_intents::fetch_intent(intent_id, &mut conn).await
    }

    async fn fetch_payment_intent_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentIntent>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        payment_intents::fetch_intent_for_order(order_id, &mut conn).await
    }
}

//--------------------------------------- ledger backend -------------------------------------------------------------

/// Validates and posts one journal entry inside the caller's transaction: period guard,
/// balance rule, entry + lines + cached account balances. Returns the new entry id.
async fn post_entry_in_tx(entry: &NewJournalEntry, conn: &mut SqliteConnection) -> Result<i64, LedgerError> {
    if entry.lines.is_empty() {
        return Err(LedgerError::EmptyEntry);
    }
    let entry_date = entry.entry_date.unwrap_or_else(|| Utc::now().date_naive());
    if let Some(period) = periods::period_covering(entry_date, conn).await? {
        if period.status.blocks_postings() {
            return Err(LedgerError::PeriodClosed { date: entry_date, status: period.status });
        }
    }
    let (debit, credit) = (entry.total_debit(), entry.total_credit());
    if !debit.matches(credit) {
        return Err(LedgerError::Unbalanced { debit, credit });
    }

    let entry_id = journal::insert_entry(
        entry_date,
        &entry.description,
        entry.reference.as_deref(),
        entry.order_id.as_ref(),
        &entry.created_by,
        conn,
    )
    .await?;
    for line in &entry.lines {
        let account = journal::fetch_account(&line.account_code, conn)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(line.account_code.clone()))?;
        journal::insert_line(entry_id, line, &account, conn).await?;
    }
    debug!("📒️ Journal entry #{entry_id} posted: {} ({debit} / {credit})", entry.description);
    Ok(entry_id)
}

/// The receivable-or-cash account for an order: COD collects cash at the door, online
/// payments land as a receivable against the provider.
fn settlement_account(order: &Order) -> &'static str {
    if order.payment_method.is_cod() {
        chart_of_accounts::CASH
    } else {
        chart_of_accounts::ACCOUNTS_RECEIVABLE
    }
}

fn order_reference(order_id: &OrderId) -> String {
    let tail = order_id.as_str();
    let short = &tail[..tail.len().min(12)];
    format!("ORD-{short}")
}

impl LedgerDatabase for SqliteDatabase {
    async fn create_journal_entry(&self, entry: NewJournalEntry) -> Result<JournalEntry, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let entry_id = post_entry_in_tx(&entry, &mut tx).await?;
        let created = journal::fetch_entry(entry_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::DatabaseError(format!("Journal entry #{entry_id} vanished after insert")))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn recognize_revenue(
        &self,
        order_id: &OrderId,
        recognized_by: &str,
    ) -> Result<RevenueRecognition, LedgerError> {
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = journal::fetch_recognition(order_id, &mut tx).await? {
            warn!("📒️ Revenue already recognized for order {order_id}; skipping");
            return Ok(existing);
        }
        let order = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        let items = orders::fetch_items(order_id, &mut tx).await?;

        let gross_revenue = order.total_price;
        let net_revenue = gross_revenue;
        let cogs_amount: Money = items.iter().map(|i| i.cost_price * i.quantity).sum();
        let gross_profit = net_revenue - cogs_amount;
        let reference = order_reference(order_id);

        let revenue_entry = NewJournalEntry::new(
            format!("Revenue recognized - Order {reference}"),
            vec![
                NewTransactionLine::debit(
                    settlement_account(&order),
                    gross_revenue,
                    if order.payment_method.is_cod() { "Cash collected on delivery" } else { "Receivable from online payment" },
                ),
                NewTransactionLine::credit(chart_of_accounts::SALES_REVENUE, net_revenue, "Sales revenue"),
            ],
        )
        .with_reference(reference.clone())
        .for_order(order_id.clone())
        .created_by(recognized_by);
        let revenue_entry_id = post_entry_in_tx(&revenue_entry, &mut tx).await?;

        let cogs_entry_id = if cogs_amount.is_positive() {
            let cogs_entry = NewJournalEntry::new(
                format!("COGS recognized - Order {reference}"),
                vec![
                    NewTransactionLine::debit(chart_of_accounts::COST_OF_GOODS_SOLD, cogs_amount, "Cost of goods sold"),
                    NewTransactionLine::credit(chart_of_accounts::INVENTORY, cogs_amount, "Inventory reduction"),
                ],
            )
            .with_reference(reference.clone())
            .for_order(order_id.clone())
            .created_by(recognized_by);
            Some(post_entry_in_tx(&cogs_entry, &mut tx).await?)
        } else {
            None
        };

        let recognition = journal::insert_recognition(
            order_id,
            gross_revenue,
            order.discount_amount,
            net_revenue,
            cogs_amount,
            gross_profit,
            revenue_entry_id,
            cogs_entry_id,
            recognized_by,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        info!(
            "📒️ Revenue recognized for order {order_id}: net {net_revenue}, COGS {cogs_amount}, profit {gross_profit}"
        );
        Ok(recognition)
    }

    async fn fetch_revenue_recognition(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<RevenueRecognition>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let recognition = journal::fetch_recognition(order_id, &mut conn).await?;
        Ok(recognition)
    }

    async fn reverse_revenue(
        &self,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<Option<RevenueRecognition>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let recognition = match journal::fetch_recognition(order_id, &mut tx).await? {
            Some(r) => r,
            None => {
                debug!("📒️ No revenue to reverse for order {order_id}");
                return Ok(None);
            },
        };
        let order = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        let reference = format!("{}-REV", order_reference(order_id));

        let reversal = NewJournalEntry::new(
            format!("Revenue reversal - {reason}"),
            vec![
                NewTransactionLine::debit(chart_of_accounts::SALES_REVENUE, recognition.net_revenue, "Reversal of sales revenue"),
                NewTransactionLine::credit(settlement_account(&order), recognition.net_revenue, "Cash/receivable reversal"),
            ],
        )
        .with_reference(reference.clone())
        .for_order(order_id.clone());
        post_entry_in_tx(&reversal, &mut tx).await?;

        if recognition.cogs_amount.is_positive() {
            let cogs_reversal = NewJournalEntry::new(
                format!("COGS reversal - {reason}"),
                vec![
                    NewTransactionLine::debit(chart_of_accounts::INVENTORY, recognition.cogs_amount, "Inventory restoration"),
                    NewTransactionLine::credit(chart_of_accounts::COST_OF_GOODS_SOLD, recognition.cogs_amount, "Reversal of COGS"),
                ],
            )
            .with_reference(reference)
            .for_order(order_id.clone());
            post_entry_in_tx(&cogs_reversal, &mut tx).await?;
        }

        journal::delete_recognition(order_id, &mut tx).await?;
        tx.commit().await?;
        info!(
            "📒️ Revenue reversed for order {order_id}: net {}, COGS {}",
            recognition.net_revenue, recognition.cogs_amount
        );
        Ok(Some(recognition))
    }

    async fn create_refund_entry(
        &self,
        order_id: &OrderId,
        refund_amount: Money,
        reason: &str,
    ) -> Result<Option<RevenueRecognition>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let recognition = match journal::fetch_recognition(order_id, &mut tx).await? {
            Some(r) => r,
            None => {
                debug!("📒️ No recognition to refund against for order {order_id}");
                return Ok(None);
            },
        };
        let order = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        if refund_amount > order.total_price {
            return Err(LedgerError::RefundTooLarge { refund: refund_amount, total: order.total_price });
        }

        // Proportional reversal: scale the recognition by refund/total rather than
        // tracking per-line detail. An approximation, not an exact per-item reversal.
        let revenue_share = recognition.net_revenue.proportion(refund_amount, order.total_price);
        let cogs_share = recognition.cogs_amount.proportion(refund_amount, order.total_price);
        let reference = format!("{}-REF", order_reference(order_id));

        let refund_entry = NewJournalEntry::new(
            format!("Refund - {reason}"),
            vec![
                NewTransactionLine::debit(chart_of_accounts::SALES_REVENUE, revenue_share, "Revenue reduction from refund"),
                NewTransactionLine::credit(settlement_account(&order), revenue_share, "Refund paid"),
            ],
        )
        .with_reference(reference.clone())
        .for_order(order_id.clone());
        post_entry_in_tx(&refund_entry, &mut tx).await?;

        if cogs_share.is_positive() {
            let cogs_entry = NewJournalEntry::new(
                format!("Refund inventory return - {reason}"),
                vec![
                    NewTransactionLine::debit(chart_of_accounts::INVENTORY, cogs_share, "Inventory returned"),
                    NewTransactionLine::credit(chart_of_accounts::COST_OF_GOODS_SOLD, cogs_share, "COGS reduction"),
                ],
            )
            .with_reference(reference)
            .for_order(order_id.clone());
            post_entry_in_tx(&cogs_entry, &mut tx).await?;
        }

        let gross = recognition.gross_revenue - refund_amount;
        let net = recognition.net_revenue - revenue_share;
        let cogs = recognition.cogs_amount - cogs_share;
        journal::update_recognition_amounts(order_id, gross, net, cogs, net - cogs, &mut tx).await?;
        let updated = journal::fetch_recognition(order_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::DatabaseError(format!("Recognition for {order_id} vanished mid-update")))?;
        tx.commit().await?;
        info!("📒️ Refund of {refund_amount} posted for order {order_id} (revenue share {revenue_share})");
        Ok(Some(updated))
    }

    async fn validate_transaction_date(&self, date: NaiveDate) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let period = periods::period_covering(date, &mut conn).await?;
        Ok(!period.map(|p| p.status.blocks_postings()).unwrap_or(false))
    }

    async fn fetch_account(&self, code: &str) -> Result<Option<Account>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = journal::fetch_account(code, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let accounts = journal::fetch_accounts(&mut conn).await?;
        Ok(accounts)
    }

    async fn fetch_periods(&self) -> Result<Vec<FinancialPeriod>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let periods = periods::fetch_periods(&mut conn).await?;
        Ok(periods)
    }

    async fn create_period(
        &self,
        name: &str,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Result<FinancialPeriod, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let id = periods::insert_period(name, starts_on, ends_on, &mut conn).await?;
        let period = periods::fetch_period(id, &mut conn)
            .await?
            .ok_or(LedgerError::PeriodNotFound(id))?;
        Ok(period)
    }

    async fn close_period(&self, period_id: i64, admin_id: &str) -> Result<FinancialPeriod, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let period = periods::fetch_period(period_id, &mut tx)
            .await?
            .ok_or(LedgerError::PeriodNotFound(period_id))?;
        if period.status.blocks_postings() {
            return Err(LedgerError::PeriodStatusUnchanged(period.status));
        }
        periods::mark_closed(period_id, admin_id, &mut tx).await?;
        let updated = periods::fetch_period(period_id, &mut tx)
            .await?
            .ok_or(LedgerError::PeriodNotFound(period_id))?;
        tx.commit().await?;
        audit::record(
            admin_id,
            "CLOSE_PERIOD",
            "FINANCIAL_PERIOD",
            &period_id.to_string(),
            json!({ "name": updated.name }),
            &self.pool,
        )
        .await;
        info!("📒️ Financial period '{}' closed by {admin_id}", updated.name);
        Ok(updated)
    }

    async fn reopen_period(
        &self,
        period_id: i64,
        admin_id: &str,
        reason: &str,
    ) -> Result<FinancialPeriod, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let period = periods::fetch_period(period_id, &mut tx)
            .await?
            .ok_or(LedgerError::PeriodNotFound(period_id))?;
        if period.status == crate::db_types::PeriodStatus::Open {
            return Err(LedgerError::PeriodStatusUnchanged(period.status));
        }
        periods::mark_reopened(period_id, admin_id, reason, &mut tx).await?;
        let updated = periods::fetch_period(period_id, &mut tx)
            .await?
            .ok_or(LedgerError::PeriodNotFound(period_id))?;
        tx.commit().await?;
        audit::record(
            admin_id,
            "REOPEN_PERIOD",
            "FINANCIAL_PERIOD",
            &period_id.to_string(),
            json!({ "name": updated.name, "reason": reason }),
            &self.pool,
        )
        .await;
        warn!("📒️ Financial period '{}' reopened by {admin_id}: {reason}", updated.name);
        Ok(updated)
    }

    async fn preview_period_close(&self, period_id: i64) -> Result<PeriodClosePreview, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let period = periods::fetch_period(period_id, &mut conn)
            .await?
            .ok_or(LedgerError::PeriodNotFound(period_id))?;
        let (journal_entries, total_debits, total_credits) =
            journal::period_totals(period.starts_on, period.ends_on, &mut conn).await?;
        let pending_orders = orders::count_pending_in_range(period.starts_on, period.ends_on, &mut conn).await?;

        let mut warnings = Vec::new();
        if !total_debits.matches(total_credits) {
            warnings.push(format!(
                "Journal entries in this period are unbalanced: debits {total_debits} vs credits {total_credits}"
            ));
        }
        if pending_orders > 0 {
            warnings.push(format!("{pending_orders} order(s) inside this period are still pending"));
        }
        Ok(PeriodClosePreview { period, journal_entries, total_debits, total_credits, pending_orders, warnings })
    }

    async fn trial_balance(&self) -> Result<TrialBalance, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let (total_debits, total_credits) = journal::ledger_totals(&mut conn).await?;
        Ok(TrialBalance { total_debits, total_credits })
    }
}
