//! End-to-end order lifecycle tests against a throwaway SQLite database.

use std::sync::Arc;

use chrono::Duration;
use commerce_engine::{
    db_types::{
        ActorRole, Money, NewOrder, NewOrderItem, OrderStatusType, PaymentIntentStatus, PaymentMethod,
    },
    events::EventProducers,
    order_objects::OrderQueryFilter,
    sqlite::audit,
    test_utils::prepare_env::{backdate_order, expire_intent, prepare_test_env, random_db_path},
    OrderFlowApi, OrderFlowError, Pagination, PaymentError, SqliteDatabase,
};
use futures_util::future::join_all;

async fn new_api() -> (SqliteDatabase, OrderFlowApi<SqliteDatabase>) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 8).await.expect("Error creating database");
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    (db, api)
}

fn one_line_order(variant: &str, qty: i64, unit_price: Money, method: PaymentMethod) -> NewOrder {
    let item = NewOrderItem::new("prod-1", variant, "Trail Mix 500g", unit_price, qty)
        .with_cost_price(Money::from(unit_price.value() / 2));
    NewOrder::new("cust-1", vec![item], unit_price * qty).with_payment_method(method)
}

async fn level(api: &OrderFlowApi<SqliteDatabase>, variant: &str) -> (i64, i64) {
    let level = api
        .fetch_inventory_level("main", variant)
        .await
        .expect("Error fetching inventory")
        .expect("No inventory record");
    (level.available, level.reserved)
}

#[tokio::test]
async fn create_order_reserves_stock() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 10).await.unwrap();

    let order = api
        .create_order(one_line_order("var-1", 5, Money::from(2_000), PaymentMethod::Online))
        .await
        .expect("Error creating order");

    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.total_price, Money::from(10_000));
    assert_eq!(level(&api, "var-1").await, (5, 5));
}

#[tokio::test]
async fn insufficient_stock_rolls_back_the_whole_order() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-a", 10).await.unwrap();
    api.increase_stock("main", "var-b", 2).await.unwrap();

    let items = vec![
        NewOrderItem::new("prod-a", "var-a", "Alpha", Money::from(1_000), 4),
        NewOrderItem::new("prod-b", "var-b", "Beta", Money::from(1_000), 5),
    ];
    let order = NewOrder::new("cust-1", items, Money::from(9_000));
    let err = api.create_order(order.clone()).await.unwrap_err();
    match err {
        OrderFlowError::InsufficientStock { variant_id, requested, available } => {
            assert_eq!(variant_id, "var-b");
            assert_eq!(requested, 5);
            assert_eq!(available, 2);
        },
        e => panic!("Expected InsufficientStock, got {e}"),
    }

    // The reservation on var-a must have rolled back with the failed line.
    assert_eq!(level(&api, "var-a").await, (10, 0));
    assert_eq!(level(&api, "var-b").await, (2, 0));
    assert!(api.fetch_order(&order.order_id).await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_checkout_is_rejected() {
    let (_db, api) = new_api().await;

    let empty = NewOrder::new("cust-1", vec![], Money::from(0));
    assert!(matches!(api.create_order(empty).await.unwrap_err(), OrderFlowError::Validation(_)));

    let zero_qty = NewOrder::new(
        "cust-1",
        vec![NewOrderItem::new("p", "v", "Thing", Money::from(1_000), 0)],
        Money::from(0),
    );
    assert!(matches!(api.create_order(zero_qty).await.unwrap_err(), OrderFlowError::Validation(_)));

    // Client-side total that disagrees with the line sum.
    let bad_total = NewOrder::new(
        "cust-1",
        vec![NewOrderItem::new("p", "v", "Thing", Money::from(1_000), 2)],
        Money::from(1_500),
    );
    assert!(matches!(api.create_order(bad_total).await.unwrap_err(), OrderFlowError::Validation(_)));
}

#[tokio::test]
async fn confirming_a_matching_intent_pays_the_order() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 10).await.unwrap();
    let order = api
        .create_order(one_line_order("var-1", 5, Money::from(2_000), PaymentMethod::Online))
        .await
        .unwrap();

    let intent = api.create_payment_intent(&order.order_id, order.total_price).await.unwrap();
    assert_eq!(intent.status, PaymentIntentStatus::Pending);

    let paid = api.confirm_payment_intent(&intent.intent_id).await.expect("Error confirming intent");
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(level(&api, "var-1").await, (5, 0));

    let history = api.fetch_order_history(&order.order_id).await.unwrap();
    let paid_rows: Vec<_> = history.iter().filter(|h| h.to_status == OrderStatusType::Paid).collect();
    assert_eq!(paid_rows.len(), 1);
    assert_eq!(paid_rows[0].from_status, OrderStatusType::Pending);
}

#[tokio::test]
async fn confirmation_is_idempotent() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 10).await.unwrap();
    let order = api
        .create_order(one_line_order("var-1", 5, Money::from(2_000), PaymentMethod::Online))
        .await
        .unwrap();
    let intent = api.create_payment_intent(&order.order_id, order.total_price).await.unwrap();

    api.confirm_payment_intent(&intent.intent_id).await.unwrap();
    let err = api.confirm_payment_intent(&intent.intent_id).await.unwrap_err();
    assert!(matches!(
        err,
        OrderFlowError::Payment(PaymentError::AlreadyFinalized(PaymentIntentStatus::Succeeded))
    ));

    // Stock must have been committed exactly once.
    assert_eq!(level(&api, "var-1").await, (5, 0));
    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
}

#[tokio::test]
async fn tampered_amount_is_rejected() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 10).await.unwrap();
    let order = api
        .create_order(one_line_order("var-1", 5, Money::from(2_000), PaymentMethod::Online))
        .await
        .unwrap();

    // An intent created with a client-tampered amount must not confirm against the
    // order's authoritative total.
    let intent = api.create_payment_intent(&order.order_id, Money::from(500)).await.unwrap();
    let err = api.confirm_payment_intent(&intent.intent_id).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Payment(PaymentError::AmountMismatch { .. })));

    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(level(&api, "var-1").await, (5, 5));
}

#[tokio::test]
async fn expired_intents_are_swept_and_orders_cancelled() {
    let (db, api) = new_api().await;
    api.increase_stock("main", "var-1", 10).await.unwrap();
    let order = api
        .create_order(one_line_order("var-1", 4, Money::from(2_500), PaymentMethod::Online))
        .await
        .unwrap();
    let intent = api.create_payment_intent(&order.order_id, order.total_price).await.unwrap();
    expire_intent(&db, &intent.intent_id).await;

    // A late webhook for an expired intent is rejected...
    let err = api.confirm_payment_intent(&intent.intent_id).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Payment(PaymentError::IntentExpired)));

    // ...and the sweeper reclaims the reservation.
    let result = api.process_expired_payments().await.unwrap();
    assert_eq!(result.processed, 1);
    assert_eq!(result.failed, 0);

    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(level(&api, "var-1").await, (10, 0));
    let intent = api.fetch_payment_intent(&intent.intent_id).await.unwrap().unwrap();
    assert_eq!(intent.status, PaymentIntentStatus::Expired);

    // Running the sweep again finds nothing.
    let result = api.process_expired_payments().await.unwrap();
    assert_eq!(result.processed, 0);
}

#[tokio::test]
async fn zombie_sweep_spares_cash_orders() {
    let (db, api) = new_api().await;
    api.increase_stock("main", "var-1", 20).await.unwrap();

    let zombie = api
        .create_order(one_line_order("var-1", 3, Money::from(1_000), PaymentMethod::Online))
        .await
        .unwrap();
    let cod = api
        .create_order(one_line_order("var-1", 2, Money::from(1_000), PaymentMethod::Cod))
        .await
        .unwrap();
    let fresh = api
        .create_order(one_line_order("var-1", 1, Money::from(1_000), PaymentMethod::Online))
        .await
        .unwrap();

    backdate_order(&db, &zombie.order_id, Duration::minutes(60)).await;
    backdate_order(&db, &cod.order_id, Duration::minutes(60)).await;

    let result = api.process_zombie_orders().await.unwrap();
    assert_eq!(result.processed, 1);
    assert_eq!(result.failed, 0);

    let zombie = api.fetch_order(&zombie.order_id).await.unwrap().unwrap();
    assert_eq!(zombie.status, OrderStatusType::Cancelled);
    // An hour-old COD order is alive and well, and the fresh order is untouched.
    let cod = api.fetch_order(&cod.order_id).await.unwrap().unwrap();
    assert_eq!(cod.status, OrderStatusType::Pending);
    let fresh = api.fetch_order(&fresh.order_id).await.unwrap().unwrap();
    assert_eq!(fresh.status, OrderStatusType::Pending);

    // Only the zombie's reservation came back: 20 - 3(cod+fresh reserved) = 17.
    assert_eq!(level(&api, "var-1").await, (17, 3));
}

#[tokio::test]
async fn reserve_then_release_round_trips_exactly() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 7).await.unwrap();
    let order = api
        .create_order(one_line_order("var-1", 3, Money::from(900), PaymentMethod::Online))
        .await
        .unwrap();
    assert_eq!(level(&api, "var-1").await, (4, 3));

    api.update_order_status(&order.order_id, OrderStatusType::Cancelled, ActorRole::Customer, None)
        .await
        .expect("Error cancelling order");
    assert_eq!(level(&api, "var-1").await, (7, 0));
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 5).await.unwrap();
    let api = Arc::new(api);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let api = Arc::clone(&api);
            tokio::spawn(async move {
                api.create_order(one_line_order("var-1", 2, Money::from(1_000), PaymentMethod::Online)).await
            })
        })
        .collect();
    let outcomes = join_all(tasks).await;

    let mut successes = 0;
    let mut stock_failures = 0;
    for outcome in outcomes {
        match outcome.expect("task panicked") {
            Ok(_) => successes += 1,
            Err(OrderFlowError::InsufficientStock { .. }) => stock_failures += 1,
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }
    // floor(5 / 2) = 2 winners; everyone else must see InsufficientStock.
    assert_eq!(successes, 2);
    assert_eq!(stock_failures, 6);
    let (available, reserved) = level(&api, "var-1").await;
    assert_eq!(available, 1);
    assert_eq!(reserved, 4);
    assert!(available >= 0 && reserved >= 0);
}

#[tokio::test]
async fn illegal_and_unauthorized_transitions_are_rejected() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 5).await.unwrap();
    let order = api
        .create_order(one_line_order("var-1", 1, Money::from(1_000), PaymentMethod::Online))
        .await
        .unwrap();

    // pending -> delivered skips the machine entirely.
    let err = api
        .update_order_status(&order.order_id, OrderStatusType::Delivered, ActorRole::Admin, Some("adm-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidTransition { .. }));

    // Only the payment pathway may mark an order paid; a manual admin attempt is refused.
    let err = api
        .update_order_status(&order.order_id, OrderStatusType::Paid, ActorRole::Admin, Some("adm-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden { .. }));

    // Admin actions without an actor id cannot be audited and are refused.
    let err = api
        .update_order_status(&order.order_id, OrderStatusType::Shipped, ActorRole::Admin, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::Validation(_)));

    // Customers cannot ship orders.
    let err = api
        .update_order_status(&order.order_id, OrderStatusType::Shipped, ActorRole::Customer, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden { .. }));

    let err = api
        .update_order_status(&"ord-does-not-exist".parse().unwrap(), OrderStatusType::Cancelled, ActorRole::Admin, Some("adm-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderNotFound(_)));
}

#[tokio::test]
async fn cancelling_a_paid_order_returns_committed_stock() {
    let (db, api) = new_api().await;
    api.increase_stock("main", "var-1", 10).await.unwrap();
    let order = api
        .create_order(one_line_order("var-1", 5, Money::from(2_000), PaymentMethod::Online))
        .await
        .unwrap();
    let intent = api.create_payment_intent(&order.order_id, order.total_price).await.unwrap();
    api.confirm_payment_intent(&intent.intent_id).await.unwrap();
    assert_eq!(level(&api, "var-1").await, (5, 0));

    api.update_order_status(&order.order_id, OrderStatusType::Cancelled, ActorRole::Admin, Some("adm-7"))
        .await
        .unwrap();
    assert_eq!(level(&api, "var-1").await, (10, 0));

    // The admin action landed in the audit log under the admin's id.
    let entries = audit::fetch_recent(5, db.pool()).await.unwrap();
    assert!(entries.iter().any(|e| e.actor == "adm-7" && e.action == "UPDATE_ORDER_STATUS"));
}

#[tokio::test]
async fn cod_orders_ship_and_deliver_without_an_intent() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 4).await.unwrap();
    let order = api
        .create_order(one_line_order("var-1", 2, Money::from(3_000), PaymentMethod::Cod))
        .await
        .unwrap();

    // COD never takes a payment intent.
    let err = api.create_payment_intent(&order.order_id, order.total_price).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Payment(PaymentError::CashOrder)));

    api.update_order_status(&order.order_id, OrderStatusType::Shipped, ActorRole::Admin, Some("adm-1"))
        .await
        .unwrap();
    let change = api
        .update_order_status(&order.order_id, OrderStatusType::Delivered, ActorRole::Admin, Some("adm-1"))
        .await
        .unwrap();
    assert_eq!(change.order.status, OrderStatusType::Delivered);
    assert!(change.order.delivered_at.is_some());
}

#[tokio::test]
async fn order_listings_filter_and_paginate() {
    let (_db, api) = new_api().await;
    api.increase_stock("main", "var-1", 10).await.unwrap();
    for _ in 0..3 {
        api.create_order(one_line_order("var-1", 1, Money::from(1_000), PaymentMethod::Online)).await.unwrap();
    }

    let filter = OrderQueryFilter::default().with_status(OrderStatusType::Pending);
    let page = api.fetch_orders(filter.clone(), Pagination::new(1, 2)).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.orders.len(), 2);
    assert_eq!(page.total_pages(), 2);

    let page2 = api.fetch_orders(filter, Pagination::new(2, 2)).await.unwrap();
    assert_eq!(page2.orders.len(), 1);

    let none = api
        .fetch_orders(
            OrderQueryFilter::default().with_status(OrderStatusType::Delivered),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(none.total, 0);
}
