//! Tenant settings: `tenants`, `tenant_whatsapp_settings`, `tenant_sheet_configs`.

use reminder_core::error::{ReminderError, Result};
use reminder_core::traits::TenantDirectory;
use reminder_core::types::{ColumnMap, RowSourceConfig, Tenant, WhatsAppCredentials};
use rusqlite::{OptionalExtension, params};

use crate::db::ReminderDb;

fn col_to_sql(col: Option<usize>) -> Option<i64> {
    col.map(|c| c as i64)
}

fn col_from_sql(col: Option<i64>) -> Option<usize> {
    col.and_then(|c| usize::try_from(c).ok())
}

impl ReminderDb {
    /// Insert or rename a tenant and set its row-source kind.
    pub fn upsert_tenant(&self, id: &str, name: Option<&str>, row_source: &str) -> Result<()> {
        if !matches!(row_source, "sheet" | "table") {
            return Err(ReminderError::config(format!(
                "Unknown row source '{row_source}' (expected 'sheet' or 'table')"
            )));
        }
        self.conn()?
            .execute(
                "INSERT INTO tenants (id, name, row_source, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, row_source = excluded.row_source",
                params![id, name, row_source, chrono::Utc::now().timestamp_millis()],
            )
            .map_err(|e| ReminderError::database(format!("Upsert tenant: {e}")))?;
        Ok(())
    }

    pub fn set_whatsapp_settings(&self, tenant_id: &str, creds: &WhatsAppCredentials) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO tenant_whatsapp_settings
                    (tenant_id, access_token, phone_number_id, business_id, verify_token)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                    access_token = excluded.access_token,
                    phone_number_id = excluded.phone_number_id,
                    business_id = excluded.business_id,
                    verify_token = excluded.verify_token",
                params![
                    tenant_id,
                    creds.access_token,
                    creds.phone_number_id,
                    creds.business_id,
                    creds.verify_token
                ],
            )
            .map_err(|e| ReminderError::database(format!("Save WhatsApp settings: {e}")))?;
        Ok(())
    }

    pub fn set_sheet_config(
        &self,
        tenant_id: &str,
        spreadsheet_id: &str,
        sheet_title: &str,
        columns: &ColumnMap,
    ) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO tenant_sheet_configs
                    (tenant_id, spreadsheet_id, sheet_title, plate_col, name_col, phone_col, date_col, status_col)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                    spreadsheet_id = excluded.spreadsheet_id,
                    sheet_title = excluded.sheet_title,
                    plate_col = excluded.plate_col,
                    name_col = excluded.name_col,
                    phone_col = excluded.phone_col,
                    date_col = excluded.date_col,
                    status_col = excluded.status_col",
                params![
                    tenant_id,
                    spreadsheet_id,
                    sheet_title,
                    col_to_sql(columns.plate),
                    col_to_sql(columns.name),
                    col_to_sql(columns.phone),
                    col_to_sql(columns.date),
                    col_to_sql(columns.status)
                ],
            )
            .map_err(|e| ReminderError::database(format!("Save sheet config: {e}")))?;
        Ok(())
    }
}

impl TenantDirectory for ReminderDb {
    /// Tenants in id order. A `sheet` tenant without a sheet config row gets
    /// `row_source: None` so the caller can apply its own fallback.
    fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.row_source, s.spreadsheet_id, s.sheet_title,
                        s.plate_col, s.name_col, s.phone_col, s.date_col, s.status_col
                 FROM tenants t
                 LEFT JOIN tenant_sheet_configs s ON s.tenant_id = t.id
                 ORDER BY t.id",
            )
            .map_err(|e| ReminderError::database(format!("Prepare: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let spreadsheet_id: Option<String> = row.get(2)?;
                let row_source = match (kind.as_str(), spreadsheet_id) {
                    ("table", _) => Some(RowSourceConfig::Table),
                    (_, Some(spreadsheet_id)) => Some(RowSourceConfig::Sheet {
                        spreadsheet_id,
                        sheet_title: row.get(3)?,
                        columns: ColumnMap {
                            plate: col_from_sql(row.get(4)?),
                            name: col_from_sql(row.get(5)?),
                            phone: col_from_sql(row.get(6)?),
                            date: col_from_sql(row.get(7)?),
                            status: col_from_sql(row.get(8)?),
                        },
                    }),
                    _ => None,
                };
                Ok(Tenant { id, row_source })
            })
            .map_err(|e| ReminderError::database(format!("Query: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ReminderError::database(format!("Row: {e}")))
    }

    fn credentials(&self, tenant_id: &str) -> Result<Option<WhatsAppCredentials>> {
        let creds = self
            .conn()?
            .query_row(
                "SELECT access_token, phone_number_id, business_id, verify_token
                 FROM tenant_whatsapp_settings WHERE tenant_id = ?1",
                params![tenant_id],
                |row| {
                    Ok(WhatsAppCredentials {
                        access_token: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        phone_number_id: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        business_id: row.get(2)?,
                        verify_token: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| ReminderError::database(format!("Load WhatsApp settings: {e}")))?;
        Ok(creds)
    }
}
