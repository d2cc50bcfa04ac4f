//! One pass over every tenant, each behind its own error boundary and deadline.
//!
//! The deadline is checked between rows, never mid-send: a message handed to
//! the gateway is always logged. Hung network calls are bounded by the
//! adapters' request timeouts.

use std::sync::Arc;
use std::time::Duration;

use reminder_core::error::{ReminderError, Result};
use reminder_core::traits::{AuditSink, TenantDirectory};
use reminder_core::types::{RowSourceConfig, Tenant, WhatsAppCredentials};
use serde_json::json;
use tokio::time::Instant;

use crate::dispatch::DispatchEngine;
use crate::summary::TenantSummary;

/// What happened to one tenant in a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantRun {
    Completed(TenantSummary),
    /// Deadline reached; the summary covers the rows handled before it.
    TimedOut(TenantSummary),
    Failed { tenant: String, error: String },
}

impl TenantRun {
    pub fn summary(&self) -> Option<&TenantSummary> {
        match self {
            Self::Completed(s) | Self::TimedOut(s) => Some(s),
            Self::Failed { .. } => None,
        }
    }

    pub fn tenant(&self) -> &str {
        match self {
            Self::Completed(s) | Self::TimedOut(s) => &s.tenant,
            Self::Failed { tenant, .. } => tenant,
        }
    }
}

pub struct Orchestrator {
    directory: Arc<dyn TenantDirectory>,
    engine: DispatchEngine,
    audit: Arc<dyn AuditSink>,
    tenant_timeout: Duration,
    fallback_credentials: Option<WhatsAppCredentials>,
    fallback_row_source: Option<RowSourceConfig>,
}

impl Orchestrator {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        engine: DispatchEngine,
        audit: Arc<dyn AuditSink>,
        tenant_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            engine,
            audit,
            tenant_timeout,
            fallback_credentials: None,
            fallback_row_source: None,
        }
    }

    /// Credentials used by tenants that have none of their own.
    pub fn with_fallback_credentials(mut self, creds: Option<WhatsAppCredentials>) -> Self {
        self.fallback_credentials = creds.filter(WhatsAppCredentials::is_complete);
        self
    }

    /// Row source used by tenants without a configured one.
    pub fn with_fallback_row_source(mut self, source: Option<RowSourceConfig>) -> Self {
        self.fallback_row_source = source;
        self
    }

    /// Tenant's own complete credentials, else the global fallback.
    pub fn resolve_credentials(&self, tenant_id: &str) -> Result<WhatsAppCredentials> {
        self.directory
            .credentials(tenant_id)?
            .filter(WhatsAppCredentials::is_complete)
            .or_else(|| self.fallback_credentials.clone())
            .ok_or_else(|| {
                ReminderError::config(format!("No WhatsApp credentials for tenant {tenant_id}"))
            })
    }

    fn resolve_tenant(&self, mut tenant: Tenant) -> Result<Tenant> {
        if tenant.row_source.is_none() {
            tenant.row_source = self.fallback_row_source.clone();
        }
        if tenant.row_source.is_none() {
            return Err(ReminderError::config(format!(
                "No row source configured for tenant {}",
                tenant.id
            )));
        }
        Ok(tenant)
    }

    async fn run_tenant(&self, tenant: Tenant) -> Result<TenantSummary> {
        let deadline = Instant::now() + self.tenant_timeout;
        let tenant = self.resolve_tenant(tenant)?;
        let credentials = self.resolve_credentials(&tenant.id)?;
        self.engine
            .run_tenant_until(&tenant, &credentials, Some(deadline))
            .await
    }

    /// Sequential pass over all tenants. Only a failure to list tenants is an
    /// error; per-tenant failures and deadline overruns are reported in the result.
    pub async fn run_once_all_tenants(&self) -> Result<Vec<TenantRun>> {
        let tenants = self.directory.list_tenants()?;
        tracing::info!("🚀 Reminder pass started ({} tenants)", tenants.len());
        self.audit
            .record(None, "worker.run.started", json!({ "tenants": tenants.len() }));

        let mut results = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            let id = tenant.id.clone();
            match self.run_tenant(tenant).await {
                Ok(summary) if summary.unprocessed > 0 => {
                    let e = ReminderError::Timeout(format!(
                        "tenant {id} exceeded {:?}, {} rows left",
                        self.tenant_timeout, summary.unprocessed
                    ));
                    tracing::error!("⏱️ [{id}] {e}");
                    self.audit.record(
                        Some(&id),
                        "worker.tenant.error",
                        json!({ "error": e.to_string(), "summary": &summary }),
                    );
                    results.push(TenantRun::TimedOut(summary));
                }
                Ok(summary) => results.push(TenantRun::Completed(summary)),
                Err(e) => {
                    tracing::error!("❌ [{id}] pass failed: {e}");
                    self.audit.record(
                        Some(&id),
                        "worker.tenant.error",
                        json!({ "error": e.to_string() }),
                    );
                    results.push(TenantRun::Failed {
                        tenant: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let failed = results
            .iter()
            .filter(|r| !matches!(r, TenantRun::Completed(_)))
            .count();
        let sent: usize = results
            .iter()
            .filter_map(TenantRun::summary)
            .map(|s| s.sent)
            .sum();
        tracing::info!(
            "🏁 Reminder pass finished: {} tenants, {sent} sent, {failed} tenant errors",
            results.len()
        );
        self.audit.record(
            None,
            "worker.run.finished",
            json!({ "tenants": results.len(), "sent": sent, "tenant_errors": failed }),
        );
        Ok(results)
    }
}
