//! # Reminder Sheets
//!
//! Google Sheets v4 REST adapter for [`RowStore`](reminder_core::traits::RowStore).
//! Authenticates as a service account (RS256 JWT bearer grant), reads the tab
//! with row 1 as header and writes single status cells back.

pub mod auth;
pub mod client;
pub mod columns;

pub use auth::ServiceAccountAuth;
pub use client::SheetsRowStore;
