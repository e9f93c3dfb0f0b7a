//! The fixed chart of accounts the revenue ledger posts against.
//!
//! The codes match the rows seeded by the initial migration. Postings against a code
//! that is not in the `accounts` table are rejected.

pub const CASH: &str = "1000";
pub const ACCOUNTS_RECEIVABLE: &str = "1100";
pub const INVENTORY: &str = "1200";
pub const ACCOUNTS_PAYABLE: &str = "2000";
pub const DEFERRED_REVENUE: &str = "2100";
pub const OWNERS_EQUITY: &str = "3000";
pub const SALES_REVENUE: &str = "4000";
pub const COST_OF_GOODS_SOLD: &str = "5000";
pub const INVENTORY_ADJUSTMENT: &str = "5300";
