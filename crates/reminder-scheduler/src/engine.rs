//! Scheduler Engine — sleeps until the next trigger and fires one pass at a time.
//! Uses tokio timers only: zero overhead between passes.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use reminder_core::config::ScheduleConfig;
use reminder_core::error::{ReminderError, Result};

use crate::cron::CronSchedule;

/// When the worker wakes up.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Wall-clock cron schedule in local time.
    Cron(CronSchedule),
    /// Fixed delay from the end of one pass to the start of the next.
    Interval(Duration),
}

impl Trigger {
    /// A fixed interval wins over the cron expression when configured.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        match config.interval_secs {
            Some(0) => Err(ReminderError::config("Schedule interval must be at least 1s")),
            Some(secs) => Ok(Self::Interval(Duration::from_secs(secs))),
            None => Ok(Self::Cron(config.cron.parse()?)),
        }
    }

    /// Delay from `now` until the next fire. None when a cron never matches again.
    pub fn next_delay(&self, now: DateTime<Local>) -> Option<Duration> {
        match self {
            Self::Interval(every) => Some(*every),
            Self::Cron(schedule) => {
                let next = schedule.next_after(&now)?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cron(schedule) => write!(f, "cron '{schedule}'"),
            Self::Interval(every) => write!(f, "every {}ms", every.as_millis()),
        }
    }
}

/// Result of a [`SchedulerEngine::fire`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome<T> {
    Completed(T),
    /// A pass was already running; the job was not started.
    Skipped,
}

/// Resets the running flag when the pass ends, including on panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs reminder passes without ever overlapping them.
#[derive(Debug, Default)]
pub struct SchedulerEngine {
    running: AtomicBool,
}

impl SchedulerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one pass unless another is in flight.
    pub async fn fire<F, Fut, T>(&self, job: F) -> FireOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("⏭️ Previous pass still running, skipping this tick");
            return FireOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);
        FireOutcome::Completed(job().await)
    }

    /// Sleep until each trigger and fire `job`. Job errors are logged and the
    /// loop continues. Only returns when the trigger can never fire again.
    pub async fn run<F, Fut, T, E>(&self, trigger: &Trigger, run_on_start: bool, mut job: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        tracing::info!("⏰ Scheduler started ({trigger})");

        if run_on_start {
            self.fire_logged(&mut job).await;
        }

        loop {
            let Some(delay) = trigger.next_delay(Local::now()) else {
                return Err(ReminderError::config(format!(
                    "Trigger {trigger} has no upcoming run"
                )));
            };
            tracing::debug!("💤 Next pass in {}s", delay.as_secs());
            tokio::time::sleep(delay).await;
            self.fire_logged(&mut job).await;
        }
    }

    async fn fire_logged<F, Fut, T, E>(&self, job: &mut F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        tracing::info!("🔔 Scheduler tick");
        match self.fire(|| job()).await {
            FireOutcome::Completed(Ok(_)) => {}
            FireOutcome::Completed(Err(e)) => tracing::error!("❌ Scheduled pass failed: {e}"),
            FireOutcome::Skipped => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_trigger_from_config() {
        let mut cfg = ScheduleConfig::default();
        assert!(matches!(Trigger::from_config(&cfg).unwrap(), Trigger::Cron(_)));

        cfg.interval_secs = Some(30);
        assert_eq!(
            Trigger::from_config(&cfg).unwrap(),
            Trigger::Interval(Duration::from_secs(30))
        );

        cfg.interval_secs = None;
        cfg.cron = "every hour".into();
        assert!(Trigger::from_config(&cfg).is_err());
    }

    #[test]
    fn test_cron_delay_to_top_of_hour() {
        let trigger = Trigger::Cron("0 * * * *".parse().unwrap());
        let now = Local.with_ymd_and_hms(2026, 10, 17, 10, 45, 0).unwrap();
        assert_eq!(trigger.next_delay(now), Some(Duration::from_secs(15 * 60)));
    }

    #[tokio::test]
    async fn test_fire_skips_when_running() {
        let engine = Arc::new(SchedulerEngine::new());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .fire(|| async move {
                        started_tx.send(()).ok();
                        release_rx.await.ok();
                        1
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        assert!(engine.is_running());
        let second = engine.fire(|| async { 2 }).await;
        assert_eq!(second, FireOutcome::Skipped);

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), FireOutcome::Completed(1));
        assert!(!engine.is_running());
        assert_eq!(engine.fire(|| async { 3 }).await, FireOutcome::Completed(3));
    }

    #[tokio::test]
    async fn test_run_continues_after_job_error() {
        let engine = SchedulerEngine::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let trigger = Trigger::Interval(Duration::from_millis(10));

        let counter = calls.clone();
        let _ = tokio::time::timeout(
            Duration::from_millis(200),
            engine.run(&trigger, true, move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err("sheet unavailable".to_string())
                    } else {
                        Ok(n)
                    }
                }
            }),
        )
        .await;

        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_interval_counts_from_end_of_pass() {
        let engine = SchedulerEngine::new();
        let spans = Arc::new(std::sync::Mutex::new(Vec::new()));
        let trigger = Trigger::Interval(Duration::from_millis(100));

        let log = spans.clone();
        let _ = tokio::time::timeout(
            Duration::from_millis(400),
            engine.run(&trigger, true, move || {
                let log = log.clone();
                async move {
                    let start = tokio::time::Instant::now();
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    log.lock().unwrap().push((start, tokio::time::Instant::now()));
                    Ok::<_, String>(())
                }
            }),
        )
        .await;

        let spans = spans.lock().unwrap();
        assert!(spans.len() >= 2);
        for pair in spans.windows(2) {
            assert!(pair[1].0 - pair[0].1 >= Duration::from_millis(100));
        }
    }
}
