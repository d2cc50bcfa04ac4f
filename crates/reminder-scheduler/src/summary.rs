//! Per-tenant pass counters.

use serde::Serialize;

/// Terminal state of one row in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Sent,
    Failed,
    SkippedStatus,
    SkippedDate,
    SkippedDedupe,
}

/// Counters for one tenant pass. Every row lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenantSummary {
    pub tenant: String,
    pub total: usize,
    pub sent: usize,
    pub skipped_status: usize,
    pub skipped_dedupe: usize,
    pub skipped_date: usize,
    pub failed: usize,
    /// Rows not reached before the tenant deadline.
    pub unprocessed: usize,
}

impl TenantSummary {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Sent => self.sent += 1,
            RowOutcome::Failed => self.failed += 1,
            RowOutcome::SkippedStatus => self.skipped_status += 1,
            RowOutcome::SkippedDate => self.skipped_date += 1,
            RowOutcome::SkippedDedupe => self.skipped_dedupe += 1,
        }
    }

    /// Rows that reached the gateway.
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }
}

impl std::fmt::Display for TenantSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] total={} sent={} skipped_status={} skipped_date={} skipped_dedupe={} failed={}",
            self.tenant,
            self.total,
            self.sent,
            self.skipped_status,
            self.skipped_date,
            self.skipped_dedupe,
            self.failed
        )?;
        if self.unprocessed > 0 {
            write!(f, " unprocessed={}", self.unprocessed)?;
        }
        Ok(())
    }
}
