//! `customers` table as a row source.
//!
//! Row indices are positions within the tenant's rows ordered by `id`. Each
//! listing remembers the `id` behind every position, and writes go to that
//! `id`, so rows deleted mid-pass never shift a write onto a neighbour.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reminder_core::error::{ReminderError, Result};
use reminder_core::traits::RowStore;
use reminder_core::types::{CustomerRow, Tenant};
use rusqlite::params;

use crate::db::ReminderDb;

/// Fields for a new customer row.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub plate: String,
    pub name: String,
    pub phone: String,
    pub date_raw: String,
    pub status: String,
}

/// [`RowStore`] over the local `customers` table.
pub struct TableRowStore {
    db: Arc<ReminderDb>,
    /// Customer ids by row index, from the latest listing of each tenant.
    ids: Mutex<HashMap<String, Vec<i64>>>,
}

impl TableRowStore {
    pub fn new(db: Arc<ReminderDb>) -> Self {
        Self {
            db,
            ids: Mutex::new(HashMap::new()),
        }
    }

    fn remember(&self, tenant: &str, ids: Vec<i64>) {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tenant.to_string(), ids);
    }

    fn listed_id(&self, tenant: &str, row_index: usize) -> Option<Option<i64>> {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(tenant)
            .map(|ids| ids.get(row_index).copied())
    }

    /// Customer id behind `row_index`, listing the tenant first if it never was.
    fn customer_id(&self, tenant: &str, row_index: usize) -> Result<i64> {
        let id = match self.listed_id(tenant, row_index) {
            Some(id) => id,
            None => {
                let ids: Vec<i64> = self
                    .db
                    .customer_rows(tenant)?
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect();
                let id = ids.get(row_index).copied();
                self.remember(tenant, ids);
                id
            }
        };
        id.ok_or_else(|| {
            ReminderError::row_source(format!("No customer row {row_index} for tenant {tenant}"))
        })
    }
}

impl ReminderDb {
    pub fn add_customer(&self, tenant: &str, customer: &NewCustomer) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO customers (tenant, plate, name, phone, date_raw, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tenant,
                customer.plate,
                customer.name,
                customer.phone,
                customer.date_raw,
                customer.status,
                chrono::Utc::now().timestamp_millis()
            ],
        )
        .map_err(|e| ReminderError::database(format!("Insert customer: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    /// The tenant's customers ordered by id, each with its id.
    fn customer_rows(&self, tenant: &str) -> Result<Vec<(i64, CustomerRow)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, plate, name, phone, date_raw, status FROM customers
                 WHERE tenant = ?1 ORDER BY id",
            )
            .map_err(|e| ReminderError::database(format!("Prepare: {e}")))?;

        let rows = stmt
            .query_map(params![tenant], |row| {
                Ok((
                    row.get(0)?,
                    CustomerRow {
                        row_index: 0,
                        plate: row.get(1)?,
                        name: row.get(2)?,
                        phone: row.get(3)?,
                        date_raw: row.get(4)?,
                        status: row.get(5)?,
                    },
                ))
            })
            .map_err(|e| ReminderError::database(format!("Query: {e}")))?;

        let mut out = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ReminderError::database(format!("Row: {e}")))?;
        for (i, (_, row)) in out.iter_mut().enumerate() {
            row.row_index = i;
        }
        Ok(out)
    }

    fn update_customer_status(&self, tenant: &str, id: i64, status: &str) -> Result<()> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE customers SET status = ?1 WHERE id = ?2 AND tenant = ?3",
                params![status, id, tenant],
            )
            .map_err(|e| ReminderError::database(format!("Update customer status: {e}")))?;
        if changed == 0 {
            return Err(ReminderError::row_source(format!(
                "Customer {id} of tenant {tenant} no longer exists"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for TableRowStore {
    async fn list_rows(&self, tenant: &Tenant) -> Result<Vec<CustomerRow>> {
        let (ids, rows): (Vec<i64>, Vec<CustomerRow>) =
            self.db.customer_rows(&tenant.id)?.into_iter().unzip();
        self.remember(&tenant.id, ids);
        Ok(rows)
    }

    async fn write_status(&self, tenant: &Tenant, row_index: usize, status: &str) -> Result<()> {
        let id = self.customer_id(&tenant.id, row_index)?;
        self.db.update_customer_status(&tenant.id, id, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reminder_core::types::RowSourceConfig;

    fn customer(plate: &str, phone: &str) -> NewCustomer {
        NewCustomer {
            plate: plate.into(),
            name: "Ali".into(),
            phone: phone.into(),
            date_raw: "2026-10-17".into(),
            status: String::new(),
        }
    }

    #[tokio::test]
    async fn test_rows_are_partitioned_and_indexed() {
        let db = Arc::new(ReminderDb::open_in_memory().unwrap());
        db.add_customer("A", &customer("34 ABC 1", "5551112233")).unwrap();
        db.add_customer("B", &customer("06 XYZ 9", "5559998877")).unwrap();
        db.add_customer("A", &customer("34 ABC 2", "5551112244")).unwrap();

        let store = TableRowStore::new(db);
        let tenant = Tenant::new("A", Some(RowSourceConfig::Table));
        let rows = store.list_rows(&tenant).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_index, 0);
        assert_eq!(rows[1].row_index, 1);
        assert_eq!(rows[1].plate, "34 ABC 2");
    }

    #[tokio::test]
    async fn test_write_status_targets_row() {
        let db = Arc::new(ReminderDb::open_in_memory().unwrap());
        db.add_customer("B", &customer("06 XYZ 9", "5559998877")).unwrap();
        db.add_customer("A", &customer("34 ABC 1", "5551112233")).unwrap();
        db.add_customer("A", &customer("34 ABC 2", "5551112244")).unwrap();

        let store = TableRowStore::new(db.clone());
        let tenant = Tenant::new("A", Some(RowSourceConfig::Table));
        store.write_status(&tenant, 1, "GÖNDERİLDİ 09:00").await.unwrap();

        let rows = store.list_rows(&tenant).await.unwrap();
        assert_eq!(rows[0].status, "");
        assert_eq!(rows[1].status, "GÖNDERİLDİ 09:00");

        let other = TableRowStore::new(db)
            .list_rows(&Tenant::new("B", None))
            .await
            .unwrap();
        assert_eq!(other[0].status, "");
    }

    #[tokio::test]
    async fn test_delete_mid_pass_never_marks_neighbour() {
        let db = Arc::new(ReminderDb::open_in_memory().unwrap());
        db.add_customer("A", &customer("34 ABC 1", "5551112233")).unwrap();
        let second = db.add_customer("A", &customer("34 ABC 2", "5551112244")).unwrap();
        db.add_customer("A", &customer("34 ABC 3", "5551112255")).unwrap();

        let store = TableRowStore::new(db.clone());
        let tenant = Tenant::new("A", Some(RowSourceConfig::Table));
        let rows = store.list_rows(&tenant).await.unwrap();
        assert_eq!(rows.len(), 3);

        // Another writer removes the second customer while the pass runs
        db.conn()
            .unwrap()
            .execute("DELETE FROM customers WHERE id = ?1", params![second])
            .unwrap();

        let err = store.write_status(&tenant, 1, "OK 10:00").await.unwrap_err();
        assert!(matches!(err, ReminderError::RowSource(_)));
        store.write_status(&tenant, 2, "OK 10:01").await.unwrap();

        let rows = store.list_rows(&tenant).await.unwrap();
        assert_eq!(rows[0].status, "");
        assert_eq!(rows[1].plate, "34 ABC 3");
        assert_eq!(rows[1].status, "OK 10:01");
    }

    #[tokio::test]
    async fn test_write_status_missing_row_errors() {
        let db = Arc::new(ReminderDb::open_in_memory().unwrap());
        let store = TableRowStore::new(db);
        let err = store
            .write_status(&Tenant::new("A", None), 5, "OK")
            .await
            .unwrap_err();
        assert!(matches!(err, ReminderError::RowSource(_)));
    }
}
