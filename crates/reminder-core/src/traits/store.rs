//! Persistent stores shared with the admin app: message log, audit trail, tenant settings.

use crate::error::Result;
use crate::types::{MessageLogEntry, Tenant, WhatsAppCredentials};

/// Send history. Doubles as the dedupe ledger's backing store.
pub trait MessageLog: Send + Sync {
    fn insert(&self, entry: &MessageLogEntry) -> Result<i64>;

    /// Count rows for `tenant` + `phone` with a successful status whose
    /// timestamp lies in `[start_ms, end_ms]`.
    fn count_successful(&self, tenant: &str, phone: &str, start_ms: i64, end_ms: i64)
    -> Result<u64>;
}

/// Append-only structured event log. Fire-and-forget: implementations swallow
/// (and trace) their own failures.
pub trait AuditSink: Send + Sync {
    fn record(&self, tenant: Option<&str>, action: &str, details: serde_json::Value);
}

/// Tenant settings source.
pub trait TenantDirectory: Send + Sync {
    fn list_tenants(&self) -> Result<Vec<Tenant>>;

    fn credentials(&self, tenant_id: &str) -> Result<Option<WhatsAppCredentials>>;
}
