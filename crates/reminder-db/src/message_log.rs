//! `message_logs` table: send history and dedupe ledger storage.

use reminder_core::error::{ReminderError, Result};
use reminder_core::traits::MessageLog;
use reminder_core::types::{MessageLogEntry, message_status};
use rusqlite::params;

use crate::db::ReminderDb;

impl MessageLog for ReminderDb {
    fn insert(&self, entry: &MessageLogEntry) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO message_logs (tenant, phone, message_id, status, timestamp, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.tenant,
                entry.phone,
                entry.message_id,
                entry.status,
                entry.timestamp,
                entry.error
            ],
        )
        .map_err(|e| ReminderError::database(format!("Insert message log: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    fn count_successful(
        &self,
        tenant: &str,
        phone: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<u64> {
        let [sent, delivered, read] = message_status::SUCCESSFUL;
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM message_logs
                 WHERE tenant = ?1 AND phone = ?2
                   AND status IN (?3, ?4, ?5)
                   AND timestamp BETWEEN ?6 AND ?7",
                params![tenant, phone, sent, delivered, read, start_ms, end_ms],
                |r| r.get(0),
            )
            .map_err(|e| ReminderError::database(format!("Count message logs: {e}")))?;
        Ok(count.max(0) as u64)
    }
}

impl ReminderDb {
    /// Newest-first send history, optionally for one tenant.
    pub fn recent_messages(&self, tenant: Option<&str>, limit: usize) -> Result<Vec<MessageLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT tenant, phone, message_id, status, timestamp, error FROM message_logs
                 WHERE (?1 IS NULL OR tenant = ?1)
                 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            )
            .map_err(|e| ReminderError::database(format!("Prepare: {e}")))?;

        let rows = stmt
            .query_map(params![tenant, limit as i64], |row| {
                Ok(MessageLogEntry {
                    tenant: row.get(0)?,
                    phone: row.get(1)?,
                    message_id: row.get(2)?,
                    status: row.get(3)?,
                    timestamp: row.get(4)?,
                    error: row.get(5)?,
                })
            })
            .map_err(|e| ReminderError::database(format!("Query: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ReminderError::database(format!("Row: {e}")))
    }

    /// Delete a tenant's `failed` entries in `[start_ms, end_ms]`. Returns rows removed.
    pub fn clear_failed_between(&self, tenant: &str, start_ms: i64, end_ms: i64) -> Result<usize> {
        self.conn()?
            .execute(
                "DELETE FROM message_logs
                 WHERE tenant = ?1 AND status = ?2 AND timestamp BETWEEN ?3 AND ?4",
                params![tenant, message_status::FAILED, start_ms, end_ms],
            )
            .map_err(|e| ReminderError::database(format!("Clear failed logs: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tenant: &str, phone: &str, status: &str, ts: i64) -> MessageLogEntry {
        MessageLogEntry {
            tenant: tenant.into(),
            phone: phone.into(),
            message_id: Some("wamid.X".into()),
            status: status.into(),
            timestamp: ts,
            error: None,
        }
    }

    #[test]
    fn test_count_successful_statuses_only() {
        let db = ReminderDb::open_in_memory().unwrap();
        db.insert(&entry("FIRMA_A", "905551112233", "sent", 1_000)).unwrap();
        db.insert(&entry("FIRMA_A", "905551112233", "read", 2_000)).unwrap();
        db.insert(&entry("FIRMA_A", "905551112233", "failed", 3_000)).unwrap();
        db.insert(&entry("FIRMA_A", "905551112233", "Sent", 4_000)).unwrap();

        assert_eq!(db.count_successful("FIRMA_A", "905551112233", 0, 10_000).unwrap(), 2);
    }

    #[test]
    fn test_count_successful_respects_window_and_keys() {
        let db = ReminderDb::open_in_memory().unwrap();
        db.insert(&entry("FIRMA_A", "905551112233", "sent", 5_000)).unwrap();

        // Window edges are inclusive
        assert_eq!(db.count_successful("FIRMA_A", "905551112233", 5_000, 5_000).unwrap(), 1);
        assert_eq!(db.count_successful("FIRMA_A", "905551112233", 5_001, 9_000).unwrap(), 0);
        assert_eq!(db.count_successful("FIRMA_B", "905551112233", 0, 9_000).unwrap(), 0);
        assert_eq!(db.count_successful("FIRMA_A", "905550000000", 0, 9_000).unwrap(), 0);
    }

    #[test]
    fn test_recent_messages_newest_first() {
        let db = ReminderDb::open_in_memory().unwrap();
        db.insert(&entry("A", "1", "sent", 1)).unwrap();
        db.insert(&entry("B", "2", "failed", 2)).unwrap();
        db.insert(&entry("A", "3", "sent", 3)).unwrap();

        let all = db.recent_messages(None, 10).unwrap();
        assert_eq!(all.iter().map(|e| e.timestamp).collect::<Vec<_>>(), vec![3, 2, 1]);

        let only_a = db.recent_messages(Some("A"), 1).unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].phone, "3");
    }

    #[test]
    fn test_clear_failed_keeps_successful() {
        let db = ReminderDb::open_in_memory().unwrap();
        db.insert(&entry("A", "1", "failed", 10)).unwrap();
        db.insert(&entry("A", "1", "sent", 20)).unwrap();
        db.insert(&entry("B", "1", "failed", 30)).unwrap();

        assert_eq!(db.clear_failed_between("A", 0, 100).unwrap(), 1);
        let left = db.recent_messages(None, 10).unwrap();
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|e| !(e.tenant == "A" && e.status == "failed")));
    }
}
