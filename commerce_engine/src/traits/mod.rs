//! Interface contracts for engine storage backends.
//!
//! The engine never talks to a database directly; it goes through the traits in this
//! module, and a backend (currently SQLite, see [`crate::sqlite`]) implements them.
//!
//! * [`CommerceDatabase`] covers the mutating order/payment/inventory flows. Every method
//!   is one logical operation inside one database transaction.
//! * [`OrderManagement`] covers the read models: single orders, filtered listings,
//!   histories, inventory levels.
//! * [`LedgerDatabase`] covers the double-entry journal, revenue recognition, and the
//!   financial period guard.

mod commerce_database;
mod data_objects;
mod ledger_database;
mod order_management;

pub use commerce_database::{CommerceDatabase, OrderFlowError, PaymentError};
pub use data_objects::{OrderChange, OrderDetails, OrderListing, Pagination, PeriodClosePreview, SweepResult, TrialBalance};
pub use ledger_database::{LedgerDatabase, LedgerError};
pub use order_management::OrderManagement;
