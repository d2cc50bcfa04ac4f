//! Per-tenant dispatch: read rows, decide, send, record, write back.
//!
//! Row decisions run in a fixed order and the first match wins:
//! sent marker → date filter → phone sanity → same-day dedupe → send.
//! A failing row is recorded and the pass moves on to the next one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use reminder_core::ReminderConfig;
use reminder_core::error::Result;
use reminder_core::traits::{AuditSink, MessageGateway, MessageLog, RowStore};
use reminder_core::types::{
    CustomerRow, DispatchOrder, FilterMode, MessageLogEntry, SendOutcome, TemplateMessage, Tenant,
    WhatsAppCredentials, message_status,
};
use reminder_rules::phone::is_dispatchable;
use reminder_rules::{PhoneNormalizer, format_sent_status, has_sent_marker, passes_date_filter, sort_by_date_asc};
use serde_json::json;
use tokio::time::Instant;

use crate::dedupe::DedupeLedger;
use crate::summary::{RowOutcome, TenantSummary};

const DEFAULT_CUSTOMER_NAME: &str = "Müşteri";
const EMPTY_PARAM: &str = "-";

/// Knobs for one dispatch engine, resolved from [`ReminderConfig`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub date_filter: FilterMode,
    pub order: DispatchOrder,
    pub throttle: Duration,
    /// First marker is the one written back.
    pub sent_markers: Vec<String>,
    pub min_phone_len: usize,
    pub template_name: String,
    pub template_language: String,
    pub normalizer: PhoneNormalizer,
}

impl DispatchSettings {
    pub fn from_config(config: &ReminderConfig) -> Self {
        Self {
            date_filter: config.dispatch.date_filter,
            order: config.dispatch.order,
            throttle: Duration::from_millis(config.dispatch.throttle_ms),
            sent_markers: config.dispatch.sent_markers.clone(),
            min_phone_len: config.dispatch.min_phone_len,
            template_name: config.whatsapp.template_name.clone(),
            template_language: config.whatsapp.template_language.clone(),
            normalizer: PhoneNormalizer::new(config.dispatch.country_code.clone())
                .with_national_len(config.dispatch.national_len),
        }
    }

    fn write_back_marker(&self) -> &str {
        self.sent_markers
            .first()
            .map(String::as_str)
            .unwrap_or("GÖNDERİLDİ")
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&ReminderConfig::default())
    }
}

/// Template body parameters `[name, plate, date]` with placeholders for blanks.
pub fn template_params(row: &CustomerRow) -> Vec<String> {
    let or = |value: &str, fallback: &str| {
        if value.trim().is_empty() {
            fallback.to_string()
        } else {
            value.to_string()
        }
    };
    vec![
        or(&row.name, DEFAULT_CUSTOMER_NAME),
        or(&row.plate, EMPTY_PARAM),
        or(&row.date_raw, EMPTY_PARAM),
    ]
}

/// Runs the per-row state machine for one tenant at a time.
pub struct DispatchEngine {
    rows: Arc<dyn RowStore>,
    gateway: Arc<dyn MessageGateway>,
    log: Arc<dyn MessageLog>,
    audit: Arc<dyn AuditSink>,
    ledger: DedupeLedger,
    settings: DispatchSettings,
}

impl DispatchEngine {
    pub fn new(
        rows: Arc<dyn RowStore>,
        gateway: Arc<dyn MessageGateway>,
        log: Arc<dyn MessageLog>,
        audit: Arc<dyn AuditSink>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            rows,
            gateway,
            ledger: DedupeLedger::new(log.clone()),
            log,
            audit,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// One full pass over a tenant's rows. Only a failure to read the rows
    /// aborts the pass; per-row errors are counted as `failed`.
    pub async fn run_tenant(
        &self,
        tenant: &Tenant,
        credentials: &WhatsAppCredentials,
    ) -> Result<TenantSummary> {
        self.run_tenant_until(tenant, credentials, None).await
    }

    /// Like [`run_tenant`](Self::run_tenant), but no new row is started once
    /// `deadline` has passed. A row already in progress always runs to the end
    /// so its send is logged; rows never reached are counted as `unprocessed`.
    pub async fn run_tenant_until(
        &self,
        tenant: &Tenant,
        credentials: &WhatsAppCredentials,
        deadline: Option<Instant>,
    ) -> Result<TenantSummary> {
        let mut rows = self.rows.list_rows(tenant).await?;
        let today = Local::now().date_naive();
        let mut summary = TenantSummary::new(&tenant.id);
        summary.total = rows.len();

        if self.settings.order == DispatchOrder::DueDate {
            sort_by_date_asc(&mut rows);
        }
        tracing::info!(
            "➡️ [{}] {} rows (filter={}, order={:?})",
            tenant.id,
            rows.len(),
            self.settings.date_filter,
            self.settings.order
        );

        for (i, row) in rows.iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                summary.unprocessed = rows.len() - i;
                tracing::warn!(
                    "⏱️ [{}] deadline reached, {} rows left for the next pass",
                    tenant.id,
                    summary.unprocessed
                );
                break;
            }
            let outcome = match self.process_row(tenant, credentials, row, today).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("⚠️ [{}] row {} error: {e}", tenant.id, row.row_index);
                    self.audit.record(
                        Some(&tenant.id),
                        "worker.row.error",
                        json!({ "row_index": row.row_index, "error": e.to_string() }),
                    );
                    RowOutcome::Failed
                }
            };
            summary.record(outcome);
        }

        tracing::info!("📊 {summary}");
        self.audit.record(
            Some(&tenant.id),
            "worker.tenant.summary",
            serde_json::to_value(&summary)?,
        );
        Ok(summary)
    }

    async fn process_row(
        &self,
        tenant: &Tenant,
        credentials: &WhatsAppCredentials,
        row: &CustomerRow,
        today: NaiveDate,
    ) -> Result<RowOutcome> {
        if has_sent_marker(&row.status, &self.settings.sent_markers) {
            return Ok(RowOutcome::SkippedStatus);
        }
        if !passes_date_filter(self.settings.date_filter, row, today) {
            return Ok(RowOutcome::SkippedDate);
        }

        let phone = self.settings.normalizer.normalize(&row.phone);
        if !is_dispatchable(&phone, self.settings.min_phone_len) {
            tracing::debug!(
                "⏭️ [{}] row {} invalid phone '{}'",
                tenant.id,
                row.row_index,
                row.phone
            );
            return Ok(RowOutcome::SkippedStatus);
        }

        if self.ledger.already_sent_today(&tenant.id, &phone)? {
            tracing::info!("⏭️ [{}] {phone} already messaged today", tenant.id);
            return Ok(RowOutcome::SkippedDedupe);
        }

        if !self.settings.throttle.is_zero() {
            tokio::time::sleep(self.settings.throttle).await;
        }

        let message = TemplateMessage {
            phone: phone.clone(),
            template_name: self.settings.template_name.clone(),
            template_language: self.settings.template_language.clone(),
            body_params: template_params(row),
        };

        match self.gateway.send_template(credentials, &message).await {
            SendOutcome::Sent { message_id } => {
                self.log.insert(&MessageLogEntry {
                    tenant: tenant.id.clone(),
                    phone: phone.clone(),
                    message_id: message_id.clone(),
                    status: message_status::SENT.into(),
                    timestamp: Local::now().timestamp_millis(),
                    error: None,
                })?;
                self.audit.record(
                    Some(&tenant.id),
                    "worker.message.sent",
                    json!({ "row_index": row.row_index, "phone": phone, "message_id": message_id }),
                );
                tracing::info!(
                    "✅ [{}] sent to {phone} (msg: {})",
                    tenant.id,
                    message_id.as_deref().unwrap_or("-")
                );

                let status = format_sent_status(self.settings.write_back_marker(), Local::now().time());
                self.rows.write_status(tenant, row.row_index, &status).await?;
                Ok(RowOutcome::Sent)
            }
            SendOutcome::Failed { error } => {
                let error_text = match &error {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                self.log.insert(&MessageLogEntry {
                    tenant: tenant.id.clone(),
                    phone: phone.clone(),
                    message_id: None,
                    status: message_status::FAILED.into(),
                    timestamp: Local::now().timestamp_millis(),
                    error: Some(error_text.clone()),
                })?;
                self.audit.record(
                    Some(&tenant.id),
                    "worker.message.failed",
                    json!({ "row_index": row.row_index, "phone": phone, "error": error }),
                );
                tracing::warn!(
                    "❌ [{}] send failed for {phone}: {}",
                    tenant.id,
                    error_text.chars().take(500).collect::<String>()
                );
                Ok(RowOutcome::Failed)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Hand-written fakes shared by the dispatch and orchestrator tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reminder_core::error::{ReminderError, Result};
    use reminder_core::traits::{MessageGateway, RowStore};
    use reminder_core::types::{CustomerRow, SendOutcome, TemplateMessage, Tenant, WhatsAppCredentials};

    /// In-memory row source keyed by tenant id.
    #[derive(Default)]
    pub struct FakeRows {
        pub rows: Mutex<HashMap<String, Vec<CustomerRow>>>,
        pub failing_tenants: HashSet<String>,
        pub fail_writes: bool,
    }

    impl FakeRows {
        pub fn with(tenant: &str, rows: Vec<CustomerRow>) -> Self {
            let fake = Self::default();
            fake.rows.lock().unwrap().insert(tenant.to_string(), rows);
            fake
        }

        pub fn status(&self, tenant: &str, index: usize) -> String {
            self.rows.lock().unwrap()[tenant][index].status.clone()
        }
    }

    #[async_trait]
    impl RowStore for FakeRows {
        async fn list_rows(&self, tenant: &Tenant) -> Result<Vec<CustomerRow>> {
            if self.failing_tenants.contains(&tenant.id) {
                return Err(ReminderError::row_source("Sheet not found: Sayfa1"));
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(&tenant.id)
                .cloned()
                .unwrap_or_default())
        }

        async fn write_status(&self, tenant: &Tenant, row_index: usize, status: &str) -> Result<()> {
            if self.fail_writes {
                return Err(ReminderError::row_source("write rejected"));
            }
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .get_mut(&tenant.id)
                .and_then(|r| r.iter_mut().find(|r| r.row_index == row_index))
                .ok_or_else(|| ReminderError::row_source("no such row"))?;
            row.status = status.to_string();
            Ok(())
        }
    }

    /// Records every message; fails for phones listed in `fail_phones`.
    #[derive(Default)]
    pub struct FakeGateway {
        pub sent: Mutex<Vec<TemplateMessage>>,
        pub fail_phones: HashSet<String>,
        /// Provider latency, applied after the call is recorded.
        pub delay: Option<std::time::Duration>,
    }

    impl FakeGateway {
        pub fn calls(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn phones(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.phone.clone()).collect()
        }
    }

    #[async_trait]
    impl MessageGateway for FakeGateway {
        fn name(&self) -> &str {
            "fake"
        }

        async fn send_template(
            &self,
            _credentials: &WhatsAppCredentials,
            message: &TemplateMessage,
        ) -> SendOutcome {
            self.sent.lock().unwrap().push(message.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_phones.contains(&message.phone) {
                SendOutcome::Failed {
                    error: serde_json::json!({ "message": "Recipient not on allow list", "code": 131030 }),
                }
            } else {
                SendOutcome::Sent {
                    message_id: Some(format!("wamid.{}", message.phone)),
                }
            }
        }
    }

    pub fn row(index: usize, phone: &str, date_raw: &str, status: &str) -> CustomerRow {
        CustomerRow {
            row_index: index,
            plate: format!("34 ABC {index}"),
            name: format!("Müşteri {index}"),
            phone: phone.into(),
            date_raw: date_raw.into(),
            status: status.into(),
        }
    }

    pub fn creds() -> WhatsAppCredentials {
        WhatsAppCredentials {
            access_token: "EAAG-test".into(),
            phone_number_id: "10987".into(),
            ..Default::default()
        }
    }
}
