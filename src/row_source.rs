//! Row-source routing by tenant configuration.

use std::sync::Arc;

use async_trait::async_trait;
use reminder_core::error::{ReminderError, Result};
use reminder_core::traits::RowStore;
use reminder_core::types::{CustomerRow, RowSourceConfig, Tenant};

/// Sends each tenant to the sheet or table adapter its config names.
pub struct RoutedRowStore {
    sheets: Arc<dyn RowStore>,
    table: Arc<dyn RowStore>,
}

impl RoutedRowStore {
    pub fn new(sheets: Arc<dyn RowStore>, table: Arc<dyn RowStore>) -> Self {
        Self { sheets, table }
    }

    fn route(&self, tenant: &Tenant) -> Result<&dyn RowStore> {
        match &tenant.row_source {
            Some(RowSourceConfig::Sheet { .. }) => Ok(self.sheets.as_ref()),
            Some(RowSourceConfig::Table) => Ok(self.table.as_ref()),
            None => Err(ReminderError::config(format!(
                "No row source configured for tenant {}",
                tenant.id
            ))),
        }
    }
}

#[async_trait]
impl RowStore for RoutedRowStore {
    async fn list_rows(&self, tenant: &Tenant) -> Result<Vec<CustomerRow>> {
        self.route(tenant)?.list_rows(tenant).await
    }

    async fn write_status(&self, tenant: &Tenant, row_index: usize, status: &str) -> Result<()> {
        self.route(tenant)?
            .write_status(tenant, row_index, status)
            .await
    }
}
