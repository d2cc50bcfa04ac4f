//! Shared data model: tenants, customer rows, log entries, outbound messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReminderError;

/// A tenant as resolved by the settings source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    /// Where this tenant's customer rows live (None = not configured yet).
    pub row_source: Option<RowSourceConfig>,
}

impl Tenant {
    pub fn new(id: impl Into<String>, row_source: Option<RowSourceConfig>) -> Self {
        Self {
            id: id.into(),
            row_source,
        }
    }
}

/// Row-source configuration for a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowSourceConfig {
    /// Google Sheets tab.
    Sheet {
        spreadsheet_id: String,
        sheet_title: String,
        #[serde(default)]
        columns: ColumnMap,
    },
    /// Local `customers` table, partitioned by tenant.
    Table,
}

/// Optional 0-based column pins. Unpinned columns are resolved from the header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub plate: Option<usize>,
    pub name: Option<usize>,
    pub phone: Option<usize>,
    pub date: Option<usize>,
    pub status: Option<usize>,
}

/// WhatsApp Cloud API credentials for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppCredentials {
    pub access_token: String,
    pub phone_number_id: String,
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub verify_token: Option<String>,
}

impl WhatsAppCredentials {
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.phone_number_id.trim().is_empty()
    }
}

/// One reminder candidate, re-read from the row source every cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRow {
    /// 0-based position among data rows; handed back verbatim to `write_status`.
    pub row_index: usize,
    pub plate: String,
    pub name: String,
    /// Raw phone as typed in the source, not normalized.
    pub phone: String,
    pub date_raw: String,
    pub status: String,
}

/// Message-log statuses written by the worker.
pub mod message_status {
    pub const SENT: &str = "sent";
    pub const DELIVERED: &str = "delivered";
    pub const READ: &str = "read";
    pub const FAILED: &str = "failed";

    /// Statuses that count as "already messaged" for dedupe. Case-sensitive.
    pub const SUCCESSFUL: [&str; 3] = [SENT, DELIVERED, READ];
}

/// Persisted record of a send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub tenant: String,
    pub phone: String,
    pub message_id: Option<String>,
    pub status: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub error: Option<String>,
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub tenant: Option<String>,
    pub action: String,
    pub details: serde_json::Value,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Outbound template message. Phone must already be normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMessage {
    pub phone: String,
    pub template_name: String,
    pub template_language: String,
    /// Positional `{{1}}`, `{{2}}`, ... placeholders, in order.
    #[serde(default)]
    pub body_params: Vec<String>,
}

/// Result of one gateway call. Failures carry the provider payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Sent { message_id: Option<String> },
    Failed { error: serde_json::Value },
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }

    pub fn failed(error: impl Into<String>) -> Self {
        SendOutcome::Failed {
            error: serde_json::Value::String(error.into()),
        }
    }
}

/// Date-filter mode applied by the dispatch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterMode {
    /// Due today only.
    OnlyToday,
    /// Due today or tomorrow.
    #[default]
    TodayOrTomorrow,
    /// Due between today and today + N days.
    NextDays(u32),
    /// Due today or any day before.
    DueOrOverdue,
    /// No date filtering.
    Off,
}

impl FromStr for FilterMode {
    type Err = ReminderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = s.trim().to_ascii_lowercase();
        match mode.as_str() {
            "only_today" => Ok(Self::OnlyToday),
            "today_or_tomorrow" => Ok(Self::TodayOrTomorrow),
            "due_or_overdue" => Ok(Self::DueOrOverdue),
            "off" => Ok(Self::Off),
            other => other
                .strip_prefix("next_")
                .and_then(|rest| rest.strip_suffix("_days"))
                .and_then(|n| n.parse::<u32>().ok())
                .map(Self::NextDays)
                .ok_or_else(|| ReminderError::config(format!("Unknown date filter mode: '{s}'"))),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnlyToday => write!(f, "only_today"),
            Self::TodayOrTomorrow => write!(f, "today_or_tomorrow"),
            Self::NextDays(n) => write!(f, "next_{n}_days"),
            Self::DueOrOverdue => write!(f, "due_or_overdue"),
            Self::Off => write!(f, "off"),
        }
    }
}

impl TryFrom<String> for FilterMode {
    type Error = ReminderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilterMode> for String {
    fn from(mode: FilterMode) -> Self {
        mode.to_string()
    }
}

/// Order in which a tenant's rows are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOrder {
    /// Nearest due date first, unparseable dates last.
    #[default]
    DueDate,
    /// Sheet/table order.
    Source,
}
