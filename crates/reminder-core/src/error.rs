//! Unified error type for every reminder crate.

use thiserror::Error;

/// Errors raised anywhere in the worker.
///
/// Row- and tenant-level failures are caught by the dispatch engine, so most
/// variants only ever surface in logs and audit records.
#[derive(Debug, Error)]
pub enum ReminderError {
    /// Missing or invalid configuration (credentials, row-source settings, modes).
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite failure in the message log, audit trail or settings tables.
    #[error("Database error: {0}")]
    Database(String),

    /// The external row source (sheet or table) could not be read or written.
    #[error("Row source error: {0}")]
    RowSource(String),

    /// Messaging provider failure that could not be folded into a send outcome.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Token exchange or credential parsing failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A tenant pass ran past its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReminderError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn row_source(msg: impl Into<String>) -> Self {
        Self::RowSource(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ReminderError>;
