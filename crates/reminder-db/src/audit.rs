//! `audit_logs` table.

use reminder_core::error::{ReminderError, Result};
use reminder_core::traits::AuditSink;
use reminder_core::types::AuditEvent;
use rusqlite::params;

use crate::db::ReminderDb;

impl ReminderDb {
    fn insert_audit(
        &self,
        tenant: Option<&str>,
        action: &str,
        details: &serde_json::Value,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO audit_logs (tenant, action, details, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                tenant,
                action,
                details.to_string(),
                chrono::Utc::now().timestamp_millis()
            ],
        )
        .map_err(|e| ReminderError::database(format!("Insert audit: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest-first audit events, optionally for one tenant.
    pub fn recent_events(&self, tenant: Option<&str>, limit: usize) -> Result<Vec<AuditEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, tenant, action, details, created_at FROM audit_logs
                 WHERE (?1 IS NULL OR tenant = ?1)
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| ReminderError::database(format!("Prepare: {e}")))?;

        let rows = stmt
            .query_map(params![tenant, limit as i64], |row| {
                let details: String = row.get(3)?;
                Ok(AuditEvent {
                    id: row.get(0)?,
                    tenant: row.get(1)?,
                    action: row.get(2)?,
                    details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
                    created_at: row.get(4)?,
                })
            })
            .map_err(|e| ReminderError::database(format!("Query: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ReminderError::database(format!("Row: {e}")))
    }
}

impl AuditSink for ReminderDb {
    fn record(&self, tenant: Option<&str>, action: &str, details: serde_json::Value) {
        if let Err(e) = self.insert_audit(tenant, action, &details) {
            tracing::warn!("⚠️ Audit write failed ({action}): {e}");
        }
    }
}
