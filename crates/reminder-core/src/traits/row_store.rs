//! Customer row source (spreadsheet or local table).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CustomerRow, Tenant};

/// Reads a tenant's rows and writes a status back to one of them.
///
/// `row_index` values returned by [`RowStore::list_rows`] must stay valid for
/// [`RowStore::write_status`] for the rest of the same pass.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn list_rows(&self, tenant: &Tenant) -> Result<Vec<CustomerRow>>;

    async fn write_status(&self, tenant: &Tenant, row_index: usize, status: &str) -> Result<()>;
}
