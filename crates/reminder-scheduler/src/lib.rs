//! # Reminder Scheduler
//!
//! Wakes up on a cron or interval trigger and runs one reminder pass over
//! every tenant.
//!
//! ## Architecture
//! ```text
//! SchedulerEngine (cron "0 * * * *" | interval, reentrancy guard)
//!   └── Orchestrator::run_once_all_tenants
//!         ├── TenantDirectory → tenants + credentials (global fallback)
//!         └── per tenant, under a deadline → DispatchEngine::run_tenant
//!               ├── RowStore::list_rows → order by due date
//!               ├── per row: marker? date? phone? dedupe? → throttle → send
//!               ├── MessageLog + AuditSink records
//!               └── RowStore::write_status on success
//! ```

pub mod cron;
pub mod dedupe;
pub mod dispatch;
pub mod engine;
pub mod orchestrator;
pub mod summary;

pub use dedupe::DedupeLedger;
pub use dispatch::{DispatchEngine, DispatchSettings};
pub use engine::{FireOutcome, SchedulerEngine, Trigger};
pub use orchestrator::{Orchestrator, TenantRun};
pub use summary::{RowOutcome, TenantSummary};
