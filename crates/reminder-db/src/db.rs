//! Database handle and schema migration.

use reminder_core::error::{ReminderError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Owned SQLite handle. Open once, wrap in `Arc`, inject everywhere.
pub struct ReminderDb {
    conn: Mutex<Connection>,
}

impl ReminderDb {
    /// Open or create the database file and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| ReminderError::database(format!("DB open error: {e}")))?;

        // The admin app writes the same file; WAL + busy_timeout avoid "database is locked".
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| ReminderError::database(format!("DB pragma error: {e}")))?;

        Self::with_connection(conn)
    }

    /// Fresh in-memory database (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ReminderError::database(format!("DB open error: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Idempotent schema migration.
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                name TEXT,
                row_source TEXT NOT NULL DEFAULT 'sheet',   -- 'sheet' | 'table'
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tenant_whatsapp_settings (
                tenant_id TEXT PRIMARY KEY,
                access_token TEXT,
                phone_number_id TEXT,
                business_id TEXT,
                verify_token TEXT,
                webhook_url TEXT
            );

            CREATE TABLE IF NOT EXISTS tenant_sheet_configs (
                tenant_id TEXT PRIMARY KEY,
                spreadsheet_id TEXT NOT NULL,
                sheet_title TEXT NOT NULL DEFAULT 'Sayfa1',
                plate_col INTEGER,                          -- 0-based, NULL = resolve from header
                name_col INTEGER,
                phone_col INTEGER,
                date_col INTEGER,
                status_col INTEGER
            );

            CREATE TABLE IF NOT EXISTS message_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant TEXT NOT NULL,
                phone TEXT NOT NULL,
                message_id TEXT,
                status TEXT NOT NULL,
                timestamp INTEGER NOT NULL,                 -- epoch millis
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_message_logs_dedupe
                ON message_logs (tenant, phone, timestamp);

            CREATE TABLE IF NOT EXISTS audit_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant TEXT,
                action TEXT NOT NULL,
                details TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL                 -- epoch millis
            );

            CREATE TABLE IF NOT EXISTS customers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant TEXT NOT NULL,
                plate TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                date_raw TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_customers_tenant ON customers (tenant, id);
            ",
            )
            .map_err(|e| ReminderError::database(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Lock the connection for one unit of work.
    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReminderError::database(format!("DB lock poisoned: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let db = ReminderDb::open_in_memory().unwrap();
        db.migrate().unwrap();
        let tables: i64 = db
            .conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('tenants','tenant_whatsapp_settings','tenant_sheet_configs','message_logs','audit_logs','customers')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }

    #[test]
    fn test_open_file_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("reminder-test-db-{}", std::process::id()));
        let path = dir.join("nested").join("reminder.db");
        let db = ReminderDb::open(&path);
        assert!(db.is_ok());
        assert!(path.exists());
        drop(db);
        std::fs::remove_dir_all(&dir).ok();
    }
}
