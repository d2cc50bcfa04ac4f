//! Sheets v4 `values` endpoint as a [`RowStore`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reminder_core::config::SheetsConfig;
use reminder_core::error::{ReminderError, Result};
use reminder_core::traits::RowStore;
use reminder_core::types::{ColumnMap, CustomerRow, RowSourceConfig, Tenant};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::ServiceAccountAuth;
use crate::columns::{self, quote_title};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// What a write needs from the last read of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SheetLayout {
    status_col: Option<usize>,
    data_rows: usize,
}

/// Cache key: spreadsheet id and tab title.
type LayoutKey = (String, String);

/// Google Sheets row source. One instance serves every sheet-backed tenant.
pub struct SheetsRowStore {
    client: reqwest::Client,
    api_base_url: String,
    /// None when no service account is configured; every call then fails for that tenant.
    auth: Option<ServiceAccountAuth>,
    /// Layout seen by the latest `list_rows` of each tab, reused by `write_status`
    /// so a pass costs one read however many rows it marks.
    layouts: Mutex<HashMap<LayoutKey, SheetLayout>>,
}

struct SheetTarget<'a> {
    spreadsheet_id: &'a str,
    sheet_title: &'a str,
    columns: &'a ColumnMap,
}

impl SheetTarget<'_> {
    fn key(&self) -> LayoutKey {
        (self.spreadsheet_id.to_string(), self.sheet_title.to_string())
    }
}

fn sheet_target(tenant: &Tenant) -> Result<SheetTarget<'_>> {
    match &tenant.row_source {
        Some(RowSourceConfig::Sheet {
            spreadsheet_id,
            sheet_title,
            columns,
        }) if !spreadsheet_id.trim().is_empty() => Ok(SheetTarget {
            spreadsheet_id,
            sheet_title,
            columns,
        }),
        _ => Err(ReminderError::config(format!(
            "Tenant {} has no spreadsheet configured",
            tenant.id
        ))),
    }
}

impl SheetsRowStore {
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let auth = if config.client_email.trim().is_empty() || config.private_key.trim().is_empty() {
            tracing::debug!("Google Sheets service account not configured");
            None
        } else {
            Some(ServiceAccountAuth::new(
                &config.client_email,
                &config.private_key,
                &config.token_url,
                timeout,
            )?)
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReminderError::row_source(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.clone(),
            auth,
            layouts: Mutex::new(HashMap::new()),
        })
    }

    fn cached_layout(&self, target: &SheetTarget<'_>) -> Option<SheetLayout> {
        self.layouts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&target.key())
            .copied()
    }

    fn store_layout(&self, target: &SheetTarget<'_>, layout: SheetLayout) {
        self.layouts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(target.key(), layout);
    }

    /// Layout from the latest listing, or a fresh read when the tab was never listed.
    async fn layout(&self, target: &SheetTarget<'_>) -> Result<SheetLayout> {
        if let Some(layout) = self.cached_layout(target) {
            return Ok(layout);
        }
        let values = self.read_values(target).await?;
        let Some((header, data)) = values.split_first() else {
            return Err(ReminderError::row_source("Sheet is empty, no header row"));
        };
        let cols = columns::resolve(header, target.columns)?;
        let layout = SheetLayout {
            status_col: cols.status,
            data_rows: data.len(),
        };
        self.store_layout(target, layout);
        Ok(layout)
    }

    async fn token(&self) -> Result<String> {
        match &self.auth {
            Some(auth) => auth.access_token().await,
            None => Err(ReminderError::config(
                "Google Sheets ENV missing: GOOGLE_SHEETS_CLIENT_EMAIL, GOOGLE_SHEETS_PRIVATE_KEY",
            )),
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| ReminderError::config(format!("Invalid Sheets API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ReminderError::config("Sheets API URL cannot be a base"))?
            .pop_if_empty()
            .extend(["spreadsheets", spreadsheet_id, "values", range]);
        Ok(url)
    }

    /// Every populated row of the tab, header included, as display strings.
    async fn read_values(&self, target: &SheetTarget<'_>) -> Result<Vec<Vec<String>>> {
        let token = self.token().await?;
        let url = self.values_url(target.spreadsheet_id, &quote_title(target.sheet_title))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "FORMATTED_VALUE"),
            ])
            .send()
            .await
            .map_err(|e| ReminderError::row_source(format!("Sheets read failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReminderError::row_source(format!(
                "Sheets read error {status} ({}): {text}",
                target.sheet_title
            )));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| ReminderError::row_source(format!("Invalid Sheets response: {e}")))?;

        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

#[async_trait]
impl RowStore for SheetsRowStore {
    async fn list_rows(&self, tenant: &Tenant) -> Result<Vec<CustomerRow>> {
        let target = sheet_target(tenant)?;
        let values = self.read_values(&target).await?;
        let Some((header, data)) = values.split_first() else {
            return Ok(Vec::new());
        };
        let cols = columns::resolve(header, target.columns)?;
        self.store_layout(
            &target,
            SheetLayout {
                status_col: cols.status,
                data_rows: data.len(),
            },
        );
        let rows = columns::to_customer_rows(data, &cols);
        tracing::debug!(
            "📄 Sheet '{}' for {}: {} data rows",
            target.sheet_title,
            tenant.id,
            rows.len()
        );
        Ok(rows)
    }

    async fn write_status(&self, tenant: &Tenant, row_index: usize, status: &str) -> Result<()> {
        let target = sheet_target(tenant)?;
        let layout = self.layout(&target).await?;
        let status_col = layout
            .status_col
            .ok_or_else(|| ReminderError::row_source("Status column not found (Durum/Status)"))?;
        if row_index >= layout.data_rows {
            return Err(ReminderError::row_source(format!(
                "Invalid row index {row_index} (rows={})",
                layout.data_rows
            )));
        }

        let a1 = columns::data_cell_a1(target.sheet_title, status_col, row_index);
        let url = self.values_url(target.spreadsheet_id, &a1)?;
        let token = self.token().await?;
        let body = serde_json::json!({
            "range": a1,
            "majorDimension": "ROWS",
            "values": [[status]],
        });

        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await
            .map_err(|e| ReminderError::row_source(format!("Sheets write failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReminderError::row_source(format!(
                "Sheets write error {status} ({a1}): {text}"
            )));
        }

        tracing::debug!("✏️ {} {a1} ← {status}", tenant.id);
        Ok(())
    }
}
