//! Commerce Engine
//!
//! The engine that turns a shopping-cart checkout into a consistent, auditable sequence
//! of stock movements and double-entry accounting records. It guarantees that stock is
//! never oversold under concurrent checkouts, that revenue is recognized exactly once (at
//! delivery) and reversed exactly once on cancellation or refund, that every transition
//! is tied to an authorized actor, and that abandoned purchase attempts are reclaimed
//! automatically.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    query it directly; go through the public APIs. The row types it returns live in
//!    [`db_types`] and are public.
//! 2. The public API ([`mod@api`]): [`OrderFlowApi`] for the order lifecycle,
//!    [`LedgerApi`] for the journal, and [`LifecycleDispatcher`] tying the two together.
//!    Backends implement the traits in [`mod@traits`] to plug in.
//! 3. Events ([`mod@events`]): a small hook system for reacting to paid / annulled /
//!    delivered orders without touching the engine's transactions.

pub mod api;
pub mod chart_of_accounts;
pub mod db_types;
pub mod events;
pub mod order_policy;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    dispatcher::{LifecycleDispatcher, LifecycleError},
    ledger_api::LedgerApi,
    order_flow_api::OrderFlowApi,
    order_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::db::SqliteDatabase;
pub use traits::{
    CommerceDatabase, LedgerDatabase, LedgerError, OrderChange, OrderDetails, OrderFlowError,
    OrderListing, OrderManagement, Pagination, PaymentError, PeriodClosePreview, SweepResult,
    TrialBalance,
};
