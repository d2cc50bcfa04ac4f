//! Reminder worker configuration system.
//!
//! Values come from `~/.reminder/config.toml` (or `--config`), then the
//! environment overrides them. Every field has a default so an empty file,
//! or no file at all, is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReminderError, Result};
use crate::types::{DispatchOrder, FilterMode, WhatsAppCredentials};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl ReminderConfig {
    /// Load config from the default path (~/.reminder/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReminderError::config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ReminderError::config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the worker home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".reminder")
    }

    /// Overlay process environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay variables from an arbitrary lookup. Empty values are ignored.
    /// Where two names exist for one setting, the first one listed wins.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        if let Some(v) = get(&["DB_PATH"]) {
            self.database.path = v;
        }

        if let Some(v) = get(&["SEND_DATE_FILTER"]) {
            self.dispatch.date_filter = v.parse()?;
        }
        if let Some(v) = get(&["SEND_THROTTLE_MS"]) {
            self.dispatch.throttle_ms = parse_number("SEND_THROTTLE_MS", &v)?;
        }
        if let Some(v) = get(&["SHEETS_STATUS_SENT"]) {
            // Configured marker becomes the one written back; the rest still match.
            self.dispatch.sent_markers.retain(|m| !m.eq_ignore_ascii_case(&v));
            self.dispatch.sent_markers.insert(0, v);
        }
        if let Some(v) = get(&["PHONE_COUNTRY_CODE"]) {
            self.dispatch.country_code = v.trim_start_matches('+').to_string();
        }
        if let Some(v) = get(&["PHONE_NATIONAL_LEN"]) {
            self.dispatch.national_len = parse_number("PHONE_NATIONAL_LEN", &v)?;
        }

        if let Some(v) = get(&["WA_TEMPLATE_NAME", "WHATSAPP_TEMPLATE_NAME"]) {
            self.whatsapp.template_name = v;
        }
        if let Some(v) = get(&["WA_TEMPLATE_LANG", "WHATSAPP_TEMPLATE_LANG"]) {
            self.whatsapp.template_language = v;
        }
        if let Some(v) = get(&["WHATSAPP_GRAPH_VERSION"]) {
            self.whatsapp.graph_version = v;
        }
        if let Some(v) = get(&["WHATSAPP_API_BASE"]) {
            self.whatsapp.api_base_url = v;
        }
        if let Some(v) = get(&["WHATSAPP_TOKEN", "WA_ACCESS_TOKEN"]) {
            self.whatsapp.access_token = v;
        }
        if let Some(v) = get(&["WHATSAPP_PHONE_NUMBER_ID", "WA_PHONE_NUMBER_ID"]) {
            self.whatsapp.phone_number_id = v;
        }

        if let Some(v) = get(&["GOOGLE_SHEETS_CLIENT_EMAIL"]) {
            self.sheets.client_email = v;
        }
        if let Some(v) = get(&["GOOGLE_SHEETS_PRIVATE_KEY"]) {
            // Hosting dashboards store the PEM on one line with literal "\n".
            self.sheets.private_key = v.replace("\\n", "\n");
        }
        if let Some(v) = get(&["GOOGLE_SHEETS_SPREADSHEET_ID"]) {
            self.sheets.spreadsheet_id = v;
        }
        if let Some(v) = get(&["GOOGLE_SHEETS_SHEET_TITLE"]) {
            self.sheets.sheet_title = v;
        }

        if let Some(v) = get(&["WORKER_CRON"]) {
            self.schedule.cron = v;
        }
        if let Some(v) = get(&["WORKER_INTERVAL_MS"]) {
            let ms: u64 = parse_number("WORKER_INTERVAL_MS", &v)?;
            self.schedule.interval_secs = Some((ms / 1000).max(1));
        }

        Ok(())
    }

    /// Resolved database path (tilde expanded).
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ReminderError::config(format!("{key} must be a number, got '{value}'")))
}

/// SQLite location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "~/.reminder/reminder.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Business rules applied per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub date_filter: FilterMode,
    #[serde(default)]
    pub order: DispatchOrder,
    /// Pause before each send, to stay under provider rate limits.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Status prefixes meaning "already handled". The first one is written back.
    #[serde(default = "default_sent_markers")]
    pub sent_markers: Vec<String>,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Digits in a national number written without trunk `0` or country code.
    #[serde(default = "default_national_len")]
    pub national_len: usize,
    #[serde(default = "default_min_phone_len")]
    pub min_phone_len: usize,
    /// Upper bound for one tenant's pass.
    #[serde(default = "default_tenant_timeout_secs")]
    pub tenant_timeout_secs: u64,
}

fn default_throttle_ms() -> u64 { 200 }
fn default_sent_markers() -> Vec<String> { vec!["GÖNDERİLDİ".into(), "OK".into()] }
fn default_country_code() -> String { "90".into() }
fn default_national_len() -> usize { 10 }
fn default_min_phone_len() -> usize { 10 }
fn default_tenant_timeout_secs() -> u64 { 600 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            date_filter: FilterMode::default(),
            order: DispatchOrder::default(),
            throttle_ms: default_throttle_ms(),
            sent_markers: default_sent_markers(),
            country_code: default_country_code(),
            national_len: default_national_len(),
            min_phone_len: default_min_phone_len(),
            tenant_timeout_secs: default_tenant_timeout_secs(),
        }
    }
}

/// WhatsApp Cloud API settings. Token and phone-number id act as the
/// fallback for tenants without their own credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_graph_version")]
    pub graph_version: String,
    #[serde(default = "default_template_name")]
    pub template_name: String,
    #[serde(default = "default_template_language")]
    pub template_language: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String { "https://graph.facebook.com".into() }
fn default_graph_version() -> String { "v24.0".into() }
fn default_template_name() -> String { "muayene_hatirlatma".into() }
fn default_template_language() -> String { "tr".into() }
fn default_request_timeout_secs() -> u64 { 15 }

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            graph_version: default_graph_version(),
            template_name: default_template_name(),
            template_language: default_template_language(),
            access_token: String::new(),
            phone_number_id: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl WhatsAppConfig {
    /// Global credentials, if both token and phone-number id are set.
    pub fn fallback_credentials(&self) -> Option<WhatsAppCredentials> {
        let creds = WhatsAppCredentials {
            access_token: self.access_token.clone(),
            phone_number_id: self.phone_number_id.clone(),
            business_id: None,
            verify_token: None,
        };
        creds.is_complete().then_some(creds)
    }
}

/// Google Sheets service account and default sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub private_key: String,
    /// Spreadsheet used by tenants without their own sheet config.
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_title")]
    pub sheet_title: String,
    #[serde(default = "default_sheets_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_sheet_title() -> String { "Sayfa1".into() }
fn default_sheets_api_base() -> String { "https://sheets.googleapis.com/v4".into() }
fn default_token_url() -> String { "https://oauth2.googleapis.com/token".into() }

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            client_email: String::new(),
            private_key: String::new(),
            spreadsheet_id: String::new(),
            sheet_title: default_sheet_title(),
            api_base_url: default_sheets_api_base(),
            token_url: default_token_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// When passes run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// 5-field cron expression, evaluated in local time.
    #[serde(default = "default_cron")]
    pub cron: String,
    /// Fixed interval; takes precedence over `cron` when set.
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Run one pass immediately when the scheduler starts.
    #[serde(default)]
    pub run_on_start: bool,
}

fn default_cron() -> String { "0 * * * *".into() }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            interval_secs: None,
            run_on_start: false,
        }
    }
}
