//! Route handlers. Thin adapters: deserialize, call the engine, serialize. No business
//! logic lives here.

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use commerce_engine::{
    db_types::{ActorRole, OrderId},
    order_objects::OrderQueryFilter,
    LifecycleDispatcher, OrderFlowError, Pagination, PaymentError, SqliteDatabase,
};
use log::info;
use serde_json::json;

use crate::{
    auth::{verify_webhook_signature, AdminKey},
    config::ServerConfig,
    data_objects::{
        CheckoutRequest, CheckoutResponse, ListOrdersQuery, PaymentWebhook, PeriodCloseRequest,
        PeriodCreateRequest, PeriodReopenRequest, RefundRequest, StatusUpdateRequest,
        StockIncreaseRequest, WebhookOutcome,
    },
    errors::ServerError,
};

type Dispatcher = web::Data<LifecycleDispatcher<SqliteDatabase>>;

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Checkout: create the order (reserving stock) and, for online payments, a payment
/// intent pinned to the order total.
#[post("/checkout")]
pub async fn checkout(
    dispatcher: Dispatcher,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, ServerError> {
    let new_order = body.into_inner().into_new_order();
    let order = dispatcher.orders().create_order(new_order).await?;
    let payment_intent = if order.payment_method.is_cod() {
        None
    } else {
        Some(dispatcher.orders().create_payment_intent(&order.order_id, order.total_price).await?)
    };
    Ok(HttpResponse::Ok().json(CheckoutResponse { order, payment_intent }))
}

/// Payment provider callback. Signature-checked. Already-processed intents are
/// acknowledged with 200 so the provider stops retrying.
#[post("/webhook/payment")]
pub async fn payment_webhook(
    dispatcher: Dispatcher,
    config: web::Data<ServerConfig>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError> {
    verify_webhook_signature(&config, &req, &body)?;
    let payload: PaymentWebhook =
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    info!("💳️ Webhook for intent {}: {:?}", payload.intent_id, payload.outcome);

    match payload.outcome {
        WebhookOutcome::Success => {
            match dispatcher.orders().confirm_payment_intent(&payload.intent_id).await {
                Ok(order) => {
                    Ok(HttpResponse::Ok().json(json!({ "status": "confirmed", "order_id": order.order_id })))
                },
                Err(OrderFlowError::Payment(PaymentError::AlreadyFinalized(status))) => Ok(HttpResponse::Ok()
                    .json(json!({ "status": "already_processed", "intent_status": status }))),
                Err(e) => Err(e.into()),
            }
        },
        WebhookOutcome::Failure => {
            let reason = payload.reason.as_deref().unwrap_or("Provider rejected payment");
            let cancelled = dispatcher.orders().fail_payment_intent(&payload.intent_id, reason).await?;
            Ok(HttpResponse::Ok().json(json!({
                "status": "acknowledged",
                "cancelled_order": cancelled.map(|o| o.order_id),
            })))
        },
    }
}

#[get("/orders")]
pub async fn list_orders(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    let mut filter = OrderQueryFilter::default();
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(customer_id) = query.customer_id {
        filter = filter.with_customer_id(customer_id);
    }
    if query.oldest_first {
        filter = filter.oldest_first();
    }
    let pagination = Pagination::new(query.page.unwrap_or(1), query.limit.unwrap_or(10));
    let listing = dispatcher.orders().fetch_orders(filter, pagination).await?;
    Ok(HttpResponse::Ok().json(listing))
}

#[get("/orders/{order_id}")]
pub async fn order_details(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let details = dispatcher
        .orders()
        .fetch_order_details(&order_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound(order_id))?;
    Ok(HttpResponse::Ok().json(details))
}

/// Admin status transition. `paid` is refused here by the engine's role policy — orders
/// become paid through the webhook only.
#[post("/orders/{order_id}/status")]
pub async fn update_order_status(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let request = body.into_inner();
    let change = dispatcher
        .update_order_status(&order_id, request.status, ActorRole::Admin, Some(&request.actor_id))
        .await?;
    Ok(HttpResponse::Ok().json(change))
}

#[post("/orders/{order_id}/refund")]
pub async fn refund_order(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    path: web::Path<String>,
    body: web::Json<RefundRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let request = body.into_inner();
    let reason = request.reason.unwrap_or_else(|| format!("Refund approved by {}", request.actor_id));
    let recognition = dispatcher.refund_order(&order_id, request.amount, &reason).await?;
    Ok(HttpResponse::Ok().json(json!({ "recognition": recognition })))
}

#[post("/inventory/increase")]
pub async fn increase_stock(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    body: web::Json<StockIncreaseRequest>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let warehouse = request.warehouse_id.unwrap_or_else(|| "main".to_string());
    let level = dispatcher.orders().increase_stock(&warehouse, &request.variant_id, request.quantity).await?;
    Ok(HttpResponse::Ok().json(level))
}

#[get("/periods")]
pub async fn list_periods(_admin: AdminKey, dispatcher: Dispatcher) -> Result<HttpResponse, ServerError> {
    let periods = dispatcher.ledger().fetch_periods().await?;
    Ok(HttpResponse::Ok().json(periods))
}

#[post("/periods")]
pub async fn create_period(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    body: web::Json<PeriodCreateRequest>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let period = dispatcher.ledger().create_period(&request.name, request.starts_on, request.ends_on).await?;
    Ok(HttpResponse::Ok().json(period))
}

#[get("/periods/{period_id}/preview")]
pub async fn preview_period_close(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError> {
    let preview = dispatcher.ledger().preview_period_close(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(preview))
}

#[post("/periods/{period_id}/close")]
pub async fn close_period(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    path: web::Path<i64>,
    body: web::Json<PeriodCloseRequest>,
) -> Result<HttpResponse, ServerError> {
    let period = dispatcher.ledger().close_period(path.into_inner(), &body.admin_id).await?;
    Ok(HttpResponse::Ok().json(period))
}

#[post("/periods/{period_id}/reopen")]
pub async fn reopen_period(
    _admin: AdminKey,
    dispatcher: Dispatcher,
    path: web::Path<i64>,
    body: web::Json<PeriodReopenRequest>,
) -> Result<HttpResponse, ServerError> {
    let period = dispatcher.ledger().reopen_period(path.into_inner(), &body.admin_id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(period))
}

#[get("/trial-balance")]
pub async fn trial_balance(_admin: AdminKey, dispatcher: Dispatcher) -> Result<HttpResponse, ServerError> {
    let tb = dispatcher.ledger().trial_balance().await?;
    Ok(HttpResponse::Ok().json(json!({
        "total_debits": tb.total_debits,
        "total_credits": tb.total_credits,
        "variance": tb.variance(),
        "is_balanced": tb.is_balanced(),
    })))
}
