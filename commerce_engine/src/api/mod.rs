//! # Commerce engine public API
//!
//! The API is modular: clients pick the surface they need and supply a database backend
//! implementing the matching traits.
//!
//! * [`order_flow_api`] drives the order lifecycle — checkout, status transitions,
//!   payment intents, and the reclamation sweepers.
//! * [`ledger_api`] drives the double-entry journal — postings, revenue recognition,
//!   refunds, and financial periods.
//! * [`dispatcher`] composes the two so a delivery or cancellation carries its financial
//!   consequences with it.
//!
//! The pattern for all of them is the same:
//!
//! ```rust,ignore
//! use commerce_engine::{OrderFlowApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url("sqlite://data/store.db", 25).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.create_order(new_order).await?;
//! ```

pub mod dispatcher;
pub mod ledger_api;
pub mod order_flow_api;
pub mod order_objects;
