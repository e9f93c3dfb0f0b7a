use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use commerce_engine::{LedgerError, LifecycleError, OrderFlowError, PaymentError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Missing or invalid API key")]
    Unauthorized,
    #[error("Webhook signature missing or invalid")]
    InvalidWebhookSignature,
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl From<LifecycleError> for ServerError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::OrderFlow(e) => Self::OrderFlow(e),
            LifecycleError::Ledger(e) => Self::Ledger(e),
        }
    }
}

fn order_flow_status(e: &OrderFlowError) -> StatusCode {
    match e {
        OrderFlowError::Validation(_) => StatusCode::BAD_REQUEST,
        OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderFlowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        OrderFlowError::Forbidden { .. } => StatusCode::FORBIDDEN,
        OrderFlowError::InsufficientStock { .. } => StatusCode::CONFLICT,
        OrderFlowError::Inventory(_) => StatusCode::INTERNAL_SERVER_ERROR,
        OrderFlowError::Payment(e) => payment_status(e),
        OrderFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn payment_status(e: &PaymentError) -> StatusCode {
    match e {
        PaymentError::IntentNotFound(_) => StatusCode::NOT_FOUND,
        // Webhook handlers intercept this one and answer 200; anywhere else it is a
        // conflict with the intent's terminal state.
        PaymentError::AlreadyFinalized(_) => StatusCode::CONFLICT,
        PaymentError::IntentExpired => StatusCode::GONE,
        PaymentError::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
        PaymentError::IntentAlreadyExists(_) => StatusCode::CONFLICT,
        PaymentError::CashOrder => StatusCode::BAD_REQUEST,
    }
}

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::PeriodClosed { .. } => StatusCode::CONFLICT,
        LedgerError::Unbalanced { .. } => StatusCode::BAD_REQUEST,
        LedgerError::EmptyEntry => StatusCode::BAD_REQUEST,
        LedgerError::AccountNotFound(_) => StatusCode::BAD_REQUEST,
        LedgerError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::PeriodNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::PeriodStatusUnchanged(_) => StatusCode::CONFLICT,
        LedgerError::RefundTooLarge { .. } => StatusCode::BAD_REQUEST,
        LedgerError::InvalidRefundAmount(_) => StatusCode::BAD_REQUEST,
        LedgerError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OrderFlow(e) => order_flow_status(e),
            Self::Ledger(e) => ledger_status(e),
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}
