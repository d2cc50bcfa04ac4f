//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Fields: *, */N, N, A-B, A-B/N and comma lists of those.
//! DOW: 0-6 with 0 = Sunday (7 is accepted as Sunday too).
//! Example: "0 * * * *" = every hour on the hour
//!
//! Evaluated on wall-clock time in any chrono time zone; no cron crate dependency.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use reminder_core::error::{ReminderError, Result};

/// How far ahead a next run is searched for.
const SEARCH_DAYS: i64 = 366;

/// A parsed 5-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl FromStr for CronSchedule {
    type Err = ReminderError;

    fn from_str(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(ReminderError::config(format!(
                "Invalid cron expression: '{expression}' (need 5 fields: MIN HOUR DOM MON DOW)"
            )));
        }

        let field = |spec: &str, min: u32, max: u32, name: &str| {
            parse_field(spec, min, max).ok_or_else(|| {
                ReminderError::config(format!("Invalid cron {name} field '{spec}' in '{expression}'"))
            })
        };

        let mut days_of_week = field(parts[4], 0, 7, "day-of-week")?;
        for d in days_of_week.iter_mut() {
            if *d == 7 {
                *d = 0;
            }
        }
        days_of_week.sort_unstable();
        days_of_week.dedup();

        Ok(Self {
            expression: parts.join(" "),
            minutes: field(parts[0], 0, 59, "minute")?,
            hours: field(parts[1], 0, 23, "hour")?,
            days_of_month: field(parts[2], 1, 31, "day-of-month")?,
            months: field(parts[3], 1, 12, "month")?,
            days_of_week,
            dom_restricted: parts[2] != "*",
            dow_restricted: parts[4] != "*",
        })
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

impl CronSchedule {
    /// Classic cron day rule: when both DOM and DOW are restricted, either may match.
    fn matches_day(&self, date: NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&date.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// First matching minute strictly after `after`, in `after`'s time zone.
    /// Wall-clock times skipped by a DST jump are skipped; repeated ones fire once.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let local = after.naive_local();
        let start: NaiveDateTime = local
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local)
            + Duration::minutes(1);

        for day in 0..=SEARCH_DAYS {
            let date = start.date() + Duration::days(day);
            if !self.matches_day(date) {
                continue;
            }
            for &h in &self.hours {
                for &m in &self.minutes {
                    let Some(time) = NaiveTime::from_hms_opt(h, m, 0) else {
                        continue;
                    };
                    let candidate = date.and_time(time);
                    if candidate < start {
                        continue;
                    }
                    match tz.from_local_datetime(&candidate).earliest() {
                        Some(at) if at > *after => return Some(at),
                        _ => {}
                    }
                }
            }
        }
        None
    }
}

/// Parse a cron expression and compute the next run time after `after`.
pub fn next_run_from_cron<Tz: TimeZone>(expression: &str, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
    match expression.parse::<CronSchedule>() {
        Ok(schedule) => schedule.next_after(&after),
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    }
}

/// Parse a cron field into a sorted list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let mut values = Vec::new();
    for part in field.split(',') {
        values.extend(parse_part(part.trim(), min, max)?);
    }
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    values.dedup();
    Some(values)
}

fn parse_part(part: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => {
            let n: u32 = step.parse().ok()?;
            if n == 0 {
                return None;
            }
            (range, n)
        }
        None => (part, 1),
    };

    let (lo, hi) = if range == "*" {
        (min, max)
    } else if let Some((a, b)) = range.split_once('-') {
        (a.parse().ok()?, b.parse().ok()?)
    } else {
        let n: u32 = range.parse().ok()?;
        // "N/S" runs from N to the field maximum
        if step > 1 { (n, max) } else { (n, n) }
    };

    if lo < min || hi > max || lo > hi {
        return None;
    }
    Some((lo..=hi).step_by(step as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_every_hour() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 30, 0).unwrap();
        let next = next_run_from_cron("0 * * * *", after).unwrap();
        assert_eq!(next.hour(), 11);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_exact_boundary_moves_forward() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 11, 0, 0).unwrap();
        let next = next_run_from_cron("0 * * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_specific_time() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 7, 0, 0).unwrap();
        let next = next_run_from_cron("0 8 * * *", after).unwrap();
        assert_eq!(next.hour(), 8);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_every_15_minutes() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 2, 0).unwrap();
        let next = next_run_from_cron("*/15 * * * *", after).unwrap();
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn test_weekday_range() {
        // 2026-10-17 is a Saturday
        let after = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let next = next_run_from_cron("30 9 * * 1-5", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_sunday_as_seven() {
        let after = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let a = next_run_from_cron("0 10 * * 7", after).unwrap();
        let b = next_run_from_cron("0 10 * * 0", after).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_day_of_month_and_month() {
        let after = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let next = next_run_from_cron("0 9 1 1 *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2027, 1, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_dom_or_dow_when_both_restricted() {
        // 15th of the month OR any Monday; Monday 19 Oct comes first
        let after = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let next = next_run_from_cron("0 9 15 * 1", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_leap_day_within_search_window() {
        let after = Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap();
        let next = next_run_from_cron("0 0 29 2 *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2028, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_wall_clock_in_fixed_offset() {
        let istanbul = FixedOffset::east_opt(3 * 3600).unwrap();
        let after = istanbul.with_ymd_and_hms(2026, 10, 17, 8, 59, 30).unwrap();
        let next = next_run_from_cron("0 9 * * *", after).unwrap();
        assert_eq!(next.hour(), 9);
        assert_eq!(next.naive_utc().hour(), 6);
    }

    #[test]
    fn test_lists_and_stepped_ranges() {
        assert_eq!(parse_field("0,15,30,45", 0, 59), Some(vec![0, 15, 30, 45]));
        assert_eq!(parse_field("9-17/4", 0, 23), Some(vec![9, 13, 17]));
        assert_eq!(parse_field("5/20", 0, 59), Some(vec![5, 25, 45]));
        assert_eq!(parse_field("60", 0, 59), None);
        assert_eq!(parse_field("*/0", 0, 59), None);
        assert_eq!(parse_field("10-5", 0, 59), None);
    }

    #[test]
    fn test_invalid_expression() {
        let after = Utc::now();
        assert!(next_run_from_cron("bad", after).is_none());
        assert!(next_run_from_cron("0 25 * * *", after).is_none());
        assert!("0 * * *".parse::<CronSchedule>().is_err());
    }
}
