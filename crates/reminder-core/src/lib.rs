//! # Reminder Core
//!
//! Shared vocabulary for the reminder worker: the error type, configuration,
//! data model and the collaborator traits the dispatch engine depends on.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::ReminderConfig;
pub use error::{ReminderError, Result};
