//! Double-entry journal, revenue recognition and period guard tests.

use chrono::{Duration, Utc};
use commerce_engine::{
    chart_of_accounts as coa,
    db_types::{
        ActorRole, Money, NewJournalEntry, NewOrder, NewOrderItem, NewTransactionLine,
        OrderStatusType, PaymentMethod, PeriodStatus, SYSTEM_ACTOR,
    },
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    LedgerApi, LedgerError, LifecycleDispatcher, OrderFlowApi, SqliteDatabase,
};

async fn new_engine() -> (SqliteDatabase, OrderFlowApi<SqliteDatabase>, LedgerApi<SqliteDatabase>) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 8).await.expect("Error creating database");
    let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
    let ledger = LedgerApi::new(db.clone());
    (db, orders, ledger)
}

async fn balance(ledger: &LedgerApi<SqliteDatabase>, code: &str) -> Money {
    ledger.fetch_account(code).await.unwrap().expect("account missing").balance
}

/// A delivered COD order: total 20.00, cost 8.00.
async fn delivered_order(
    orders: &OrderFlowApi<SqliteDatabase>,
    dispatcher: &LifecycleDispatcher<SqliteDatabase>,
) -> commerce_engine::db_types::Order {
    orders.increase_stock("main", "var-led", 10).await.unwrap();
    let item = NewOrderItem::new("prod-led", "var-led", "Ledger Widget", Money::from(10_000), 2)
        .with_cost_price(Money::from(4_000));
    let new_order =
        NewOrder::new("cust-led", vec![item], Money::from(20_000)).with_payment_method(PaymentMethod::Cod);
    let order = orders.create_order(new_order).await.unwrap();
    dispatcher
        .update_order_status(&order.order_id, OrderStatusType::Shipped, ActorRole::Admin, Some("adm-1"))
        .await
        .unwrap();
    dispatcher
        .update_order_status(&order.order_id, OrderStatusType::Delivered, ActorRole::Admin, Some("adm-1"))
        .await
        .unwrap();
    order
}

#[tokio::test]
async fn unbalanced_entries_are_rejected() {
    let (_db, _orders, ledger) = new_engine().await;

    let entry = NewJournalEntry::new(
        "Lopsided",
        vec![
            NewTransactionLine::debit(coa::CASH, Money::from(10_000), "cash"),
            NewTransactionLine::credit(coa::SALES_REVENUE, Money::from(9_000), "revenue"),
        ],
    );
    let err = ledger.create_journal_entry(entry).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unbalanced { .. }));

    // Nothing was half-posted.
    let tb = ledger.trial_balance().await.unwrap();
    assert_eq!(tb.total_debits, Money::ZERO);
    assert_eq!(tb.total_credits, Money::ZERO);
    assert_eq!(balance(&ledger, coa::CASH).await, Money::ZERO);
}

#[tokio::test]
async fn empty_and_unknown_account_entries_are_rejected() {
    let (_db, _orders, ledger) = new_engine().await;

    let err = ledger.create_journal_entry(NewJournalEntry::new("Empty", vec![])).await.unwrap_err();
    assert!(matches!(err, LedgerError::EmptyEntry));

    let entry = NewJournalEntry::new(
        "Bad account",
        vec![
            NewTransactionLine::debit("9999", Money::from(100), "nowhere"),
            NewTransactionLine::credit(coa::SALES_REVENUE, Money::from(100), "revenue"),
        ],
    );
    let err = ledger.create_journal_entry(entry).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(code) if code == "9999"));
    // The rejected entry must not leave a partial posting behind.
    let tb = ledger.trial_balance().await.unwrap();
    assert_eq!(tb.total_debits, Money::ZERO);
}

#[tokio::test]
async fn balances_follow_normal_balance_rules() {
    let (_db, _orders, ledger) = new_engine().await;

    let entry = NewJournalEntry::new(
        "Cash sale",
        vec![
            NewTransactionLine::debit(coa::CASH, Money::from(5_000), "cash in"),
            NewTransactionLine::credit(coa::SALES_REVENUE, Money::from(5_000), "revenue"),
        ],
    );
    ledger.create_journal_entry(entry).await.unwrap();

    // Asset grows on debit, revenue grows on credit.
    assert_eq!(balance(&ledger, coa::CASH).await, Money::from(5_000));
    assert_eq!(balance(&ledger, coa::SALES_REVENUE).await, Money::from(5_000));

    let entry = NewJournalEntry::new(
        "Supplier invoice",
        vec![
            NewTransactionLine::debit(coa::INVENTORY, Money::from(3_000), "goods in"),
            NewTransactionLine::credit(coa::ACCOUNTS_PAYABLE, Money::from(3_000), "owed"),
        ],
    );
    ledger.create_journal_entry(entry).await.unwrap();
    assert_eq!(balance(&ledger, coa::INVENTORY).await, Money::from(3_000));
    // Liability also grows on credit.
    assert_eq!(balance(&ledger, coa::ACCOUNTS_PAYABLE).await, Money::from(3_000));

    let tb = ledger.trial_balance().await.unwrap();
    assert!(tb.is_balanced());
    assert_eq!(tb.total_debits, Money::from(8_000));
}

#[tokio::test]
async fn delivery_recognizes_revenue_exactly_once() {
    let (db, orders, ledger) = new_engine().await;
    let dispatcher = LifecycleDispatcher::new(db.clone(), EventProducers::default());
    let order = delivered_order(&orders, &dispatcher).await;

    let recognition = ledger
        .fetch_revenue_recognition(&order.order_id)
        .await
        .unwrap()
        .expect("delivery must create a recognition");
    assert_eq!(recognition.net_revenue, Money::from(20_000));
    assert_eq!(recognition.cogs_amount, Money::from(8_000));
    assert_eq!(recognition.gross_profit, Money::from(12_000));
    assert!(recognition.cogs_entry_id.is_some());

    // The revenue entry itself is two balanced lines.
    let mut conn = db.pool().acquire().await.unwrap();
    let lines = commerce_engine::sqlite::journal::fetch_lines(recognition.revenue_entry_id, &mut conn).await.unwrap();
    assert_eq!(lines.len(), 2);
    let debits: Money = lines.iter().map(|l| l.debit).sum();
    let credits: Money = lines.iter().map(|l| l.credit).sum();
    assert_eq!(debits, credits);
    drop(conn);

    // COD revenue lands in Cash; COGS moves inventory value out.
    assert_eq!(balance(&ledger, coa::CASH).await, Money::from(20_000));
    assert_eq!(balance(&ledger, coa::SALES_REVENUE).await, Money::from(20_000));
    assert_eq!(balance(&ledger, coa::COST_OF_GOODS_SOLD).await, Money::from(8_000));
    assert_eq!(balance(&ledger, coa::INVENTORY).await, Money::from(-8_000));

    // A repeated recognition call is a no-op returning the existing row.
    let again = ledger.recognize_revenue(&order.order_id, SYSTEM_ACTOR).await.unwrap();
    assert_eq!(again.id, recognition.id);
    assert_eq!(balance(&ledger, coa::SALES_REVENUE).await, Money::from(20_000));

    let tb = ledger.trial_balance().await.unwrap();
    assert!(tb.is_balanced());
}

#[tokio::test]
async fn reversal_nets_a_recognition_to_zero() {
    let (db, orders, ledger) = new_engine().await;
    let dispatcher = LifecycleDispatcher::new(db.clone(), EventProducers::default());
    let order = delivered_order(&orders, &dispatcher).await;

    let reversed = ledger
        .reverse_revenue(&order.order_id, "Goods returned in full")
        .await
        .unwrap()
        .expect("there was a recognition to reverse");
    assert_eq!(reversed.net_revenue, Money::from(20_000));

    assert_eq!(balance(&ledger, coa::CASH).await, Money::ZERO);
    assert_eq!(balance(&ledger, coa::SALES_REVENUE).await, Money::ZERO);
    assert_eq!(balance(&ledger, coa::COST_OF_GOODS_SOLD).await, Money::ZERO);
    assert_eq!(balance(&ledger, coa::INVENTORY).await, Money::ZERO);
    assert!(ledger.fetch_revenue_recognition(&order.order_id).await.unwrap().is_none());

    // Reversing twice finds nothing.
    assert!(ledger.reverse_revenue(&order.order_id, "again").await.unwrap().is_none());
    let tb = ledger.trial_balance().await.unwrap();
    assert!(tb.is_balanced());
}

#[tokio::test]
async fn partial_refunds_scale_the_recognition() {
    let (db, orders, ledger) = new_engine().await;
    let dispatcher = LifecycleDispatcher::new(db.clone(), EventProducers::default());
    let order = delivered_order(&orders, &dispatcher).await;

    // Refund half of the 20.00 order.
    let updated = dispatcher
        .refund_order(&order.order_id, Money::from(10_000), "One of two widgets returned")
        .await
        .unwrap()
        .expect("recognition exists");
    assert_eq!(updated.net_revenue, Money::from(10_000));
    assert_eq!(updated.cogs_amount, Money::from(4_000));
    assert_eq!(updated.gross_profit, Money::from(6_000));

    assert_eq!(balance(&ledger, coa::SALES_REVENUE).await, Money::from(10_000));
    assert_eq!(balance(&ledger, coa::CASH).await, Money::from(10_000));
    assert_eq!(balance(&ledger, coa::COST_OF_GOODS_SOLD).await, Money::from(4_000));
    let tb = ledger.trial_balance().await.unwrap();
    assert!(tb.is_balanced());

    // A refund larger than the order is refused.
    let err = ledger
        .create_refund_entry(&order.order_id, Money::from(50_000), "too much")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::RefundTooLarge { .. }));
}

#[tokio::test]
async fn closed_periods_reject_postings() {
    let (_db, _orders, ledger) = new_engine().await;
    let today = Utc::now().date_naive();
    let period = ledger
        .create_period("Test period", today - Duration::days(5), today + Duration::days(5))
        .await
        .unwrap();
    assert_eq!(period.status, PeriodStatus::Open);
    assert!(ledger.validate_transaction_date(today).await.unwrap());

    let closed = ledger.close_period(period.id, "adm-1").await.unwrap();
    assert_eq!(closed.status, PeriodStatus::Closed);
    assert!(!ledger.validate_transaction_date(today).await.unwrap());

    let entry = NewJournalEntry::new(
        "Posting into a sealed period",
        vec![
            NewTransactionLine::debit(coa::CASH, Money::from(100), "cash"),
            NewTransactionLine::credit(coa::SALES_REVENUE, Money::from(100), "revenue"),
        ],
    );
    let err = ledger.create_journal_entry(entry.clone()).await.unwrap_err();
    assert!(matches!(err, LedgerError::PeriodClosed { .. }));

    // Dates outside the period are unaffected.
    let outside = entry.clone().with_date(today + Duration::days(30));
    ledger.create_journal_entry(outside).await.unwrap();

    // Closing twice is refused; reopening lets postings through again.
    let err = ledger.close_period(period.id, "adm-1").await.unwrap_err();
    assert!(matches!(err, LedgerError::PeriodStatusUnchanged(_)));
    let reopened = ledger.reopen_period(period.id, "adm-1", "posted the wrong month").await.unwrap();
    assert_eq!(reopened.status, PeriodStatus::Open);
    assert_eq!(reopened.reopen_reason.as_deref(), Some("posted the wrong month"));
    ledger.create_journal_entry(entry).await.unwrap();
}

#[tokio::test]
async fn period_close_preview_surfaces_warnings() {
    let (_db, orders, ledger) = new_engine().await;
    let today = Utc::now().date_naive();
    let period = ledger
        .create_period("Preview period", today - Duration::days(1), today + Duration::days(1))
        .await
        .unwrap();

    ledger
        .create_journal_entry(NewJournalEntry::new(
            "In-period entry",
            vec![
                NewTransactionLine::debit(coa::CASH, Money::from(2_000), "cash"),
                NewTransactionLine::credit(coa::SALES_REVENUE, Money::from(2_000), "revenue"),
            ],
        ))
        .await
        .unwrap();

    // A lingering pending order inside the period should be flagged.
    orders.increase_stock("main", "var-p", 5).await.unwrap();
    let item = NewOrderItem::new("prod-p", "var-p", "Pending thing", Money::from(1_000), 1);
    orders.create_order(NewOrder::new("cust-p", vec![item], Money::from(1_000))).await.unwrap();

    let preview = ledger.preview_period_close(period.id).await.unwrap();
    assert_eq!(preview.journal_entries, 1);
    assert_eq!(preview.total_debits, Money::from(2_000));
    assert_eq!(preview.total_credits, Money::from(2_000));
    assert_eq!(preview.pending_orders, 1);
    assert_eq!(preview.warnings.len(), 1);
    assert!(preview.warnings[0].contains("still pending"));
}

#[tokio::test]
async fn dispatcher_cancellation_without_recognition_skips_the_ledger() {
    let (db, orders, ledger) = new_engine().await;
    let dispatcher = LifecycleDispatcher::new(db.clone(), EventProducers::default());

    // paid -> cancelled goes through the dispatcher with no recognition yet: reversal is
    // a silent no-op and the cancellation still lands.
    orders.increase_stock("main", "var-c", 5).await.unwrap();
    let item = NewOrderItem::new("prod-c", "var-c", "Cancel me", Money::from(2_000), 1);
    let order = orders
        .create_order(NewOrder::new("cust-c", vec![item], Money::from(2_000)))
        .await
        .unwrap();
    let intent = orders.create_payment_intent(&order.order_id, order.total_price).await.unwrap();
    orders.confirm_payment_intent(&intent.intent_id).await.unwrap();

    let change = dispatcher
        .update_order_status(&order.order_id, OrderStatusType::Cancelled, ActorRole::Admin, Some("adm-1"))
        .await
        .unwrap();
    assert_eq!(change.order.status, OrderStatusType::Cancelled);
    assert!(ledger.fetch_revenue_recognition(&order.order_id).await.unwrap().is_none());
    assert_eq!(balance(&ledger, coa::SALES_REVENUE).await, Money::ZERO);
}
