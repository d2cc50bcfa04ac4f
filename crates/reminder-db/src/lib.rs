//! # Reminder DB
//!
//! One explicit SQLite handle ([`ReminderDb`]) opened and migrated at startup,
//! then shared through `Arc` with every component that needs it:
//! - message log — dedupe ledger storage, dashboard history
//! - audit trail — append-only structured events
//! - tenant settings — tenants, WhatsApp credentials, sheet configs
//! - customers — local-table row source

pub mod audit;
pub mod customers;
pub mod db;
pub mod message_log;
pub mod tenants;

pub use customers::{NewCustomer, TableRowStore};
pub use db::ReminderDb;
