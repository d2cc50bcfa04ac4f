//! Same-day dedupe over the message log.

use std::sync::Arc;

use chrono::{DateTime, Local};
use reminder_core::error::Result;
use reminder_core::traits::MessageLog;
use reminder_rules::day_bounds_millis;

/// "Already messaged today" check, independent of which due date triggered the send.
#[derive(Clone)]
pub struct DedupeLedger {
    log: Arc<dyn MessageLog>,
}

impl DedupeLedger {
    pub fn new(log: Arc<dyn MessageLog>) -> Self {
        Self { log }
    }

    pub fn already_sent_today(&self, tenant: &str, phone: &str) -> Result<bool> {
        self.already_sent_on(tenant, phone, Local::now())
    }

    /// True if a `sent`/`delivered`/`read` entry exists within `now`'s local day.
    pub fn already_sent_on(&self, tenant: &str, phone: &str, now: DateTime<Local>) -> Result<bool> {
        let (start, end) = day_bounds_millis(now);
        Ok(self.log.count_successful(tenant, phone, start, end)? > 0)
    }
}
