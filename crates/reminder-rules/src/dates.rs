//! Date rules: parse the free-form date column and decide whether a row is due.
//!
//! Parsing order is fixed and locale-independent. Strict patterns are tried
//! first, in this order:
//!
//! ```text
//! YYYY-MM-DD  DD.MM.YYYY  DD/MM/YYYY  D.M.YYYY  D/M/YYYY  YYYY.MM.DD  YYYY/MM/DD
//! ```
//!
//! so `01/02/2025` is always 1 February 2025. A strict match must also be a
//! real calendar date: `31.02.2025` is rejected, never clamped. Only when no
//! strict pattern matches does the permissive fallback run.

use std::sync::LazyLock;

use chrono::{DateTime, Days, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;
use reminder_core::types::{CustomerRow, FilterMode};

#[derive(Debug, Clone, Copy)]
enum FieldOrder {
    YearMonthDay,
    DayMonthYear,
}

struct StrictPattern {
    regex: Regex,
    order: FieldOrder,
}

static STRICT_PATTERNS: LazyLock<Vec<StrictPattern>> = LazyLock::new(|| {
    [
        (r"^(\d{4})-(\d{2})-(\d{2})$", FieldOrder::YearMonthDay), // YYYY-MM-DD
        (r"^(\d{2})\.(\d{2})\.(\d{4})$", FieldOrder::DayMonthYear), // DD.MM.YYYY
        (r"^(\d{2})/(\d{2})/(\d{4})$", FieldOrder::DayMonthYear), // DD/MM/YYYY
        (r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$", FieldOrder::DayMonthYear), // D.M.YYYY
        (r"^(\d{1,2})/(\d{1,2})/(\d{4})$", FieldOrder::DayMonthYear), // D/M/YYYY
        (r"^(\d{4})\.(\d{2})\.(\d{2})$", FieldOrder::YearMonthDay), // YYYY.MM.DD
        (r"^(\d{4})/(\d{2})/(\d{2})$", FieldOrder::YearMonthDay), // YYYY/MM/DD
    ]
    .into_iter()
    .map(|(pattern, order)| StrictPattern {
        regex: Regex::new(pattern).expect("static date pattern"),
        order,
    })
    .collect()
});

const FALLBACK_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const FALLBACK_DATE_FORMATS: [&str; 5] = [
    "%Y-%m-%d",
    "%d %b %Y",
    "%b %d %Y",
    "%B %d, %Y",
    "%a %b %d %Y",
];

/// Parse a date cell. Returns local wall-clock time (midnight for plain dates).
pub fn parse_flexible(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    parse_strict(input)
        .map(start_of_day)
        .or_else(|| parse_permissive(input))
}

fn parse_strict(input: &str) -> Option<NaiveDate> {
    for pattern in STRICT_PATTERNS.iter() {
        let Some(caps) = pattern.regex.captures(input) else {
            continue;
        };
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let (a, b, c) = (field(1)?, field(2)?, field(3)?);
        let date = match pattern.order {
            FieldOrder::YearMonthDay => NaiveDate::from_ymd_opt(a as i32, b, c),
            FieldOrder::DayMonthYear => NaiveDate::from_ymd_opt(c as i32, b, a),
        };
        // Shape matched but the date is impossible: later patterns have the
        // same field order, so keep looking rather than failing outright.
        if date.is_some() {
            return date;
        }
    }
    None
}

fn parse_permissive(input: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Some(dt) = FALLBACK_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
    {
        return Some(dt);
    }
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .map(start_of_day)
}

/// 00:00:00.000 of `date`.
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// 23:59:59.999 of `date`.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + Duration::days(1) - Duration::milliseconds(1)
}

/// Epoch-millisecond bounds `[00:00:00.000, 23:59:59.999]` of the local day containing `now`.
pub fn day_bounds_millis(now: DateTime<Local>) -> (i64, i64) {
    let today = now.date_naive();
    let to_millis = |local: NaiveDateTime| {
        Local
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.timestamp_millis())
            // Midnight skipped by a DST jump: fall back to the UTC reading.
            .unwrap_or_else(|| local.and_utc().timestamp_millis())
    };
    (to_millis(start_of_day(today)), to_millis(end_of_day(today)))
}

/// Due today or already overdue. Unparseable dates are never due.
pub fn is_due_or_overdue(row: &CustomerRow, today: NaiveDate) -> bool {
    parse_flexible(&row.date_raw).is_some_and(|d| d <= end_of_day(today))
}

/// Due between today (or tomorrow, when `include_today` is false) and the end
/// of `today + days`, inclusive.
pub fn is_due_within_days(
    row: &CustomerRow,
    days: u32,
    today: NaiveDate,
    include_today: bool,
) -> bool {
    let Some(d) = parse_flexible(&row.date_raw) else {
        return false;
    };
    let first_day = if include_today {
        today
    } else {
        today.succ_opt().unwrap_or(NaiveDate::MAX)
    };
    let last_day = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);
    d >= start_of_day(first_day) && d <= end_of_day(last_day)
}

/// Window filter when `within_days > 0`, otherwise the due-or-overdue filter.
pub fn filter_due(
    rows: &[CustomerRow],
    within_days: u32,
    include_today: bool,
    today: NaiveDate,
) -> Vec<CustomerRow> {
    rows.iter()
        .filter(|row| {
            if within_days > 0 {
                is_due_within_days(row, within_days, today, include_today)
            } else {
                is_due_or_overdue(row, today)
            }
        })
        .cloned()
        .collect()
}

/// Single-row check for the configured filter mode.
pub fn passes_date_filter(mode: FilterMode, row: &CustomerRow, today: NaiveDate) -> bool {
    match mode {
        FilterMode::OnlyToday => is_due_within_days(row, 0, today, true),
        FilterMode::TodayOrTomorrow => is_due_within_days(row, 1, today, true),
        FilterMode::NextDays(days) => is_due_within_days(row, days, today, true),
        FilterMode::DueOrOverdue => is_due_or_overdue(row, today),
        FilterMode::Off => true,
    }
}

/// Nearest date first; unparseable dates sink to the end. Stable.
pub fn sort_by_date_asc(rows: &mut [CustomerRow]) {
    rows.sort_by_cached_key(|row| {
        let parsed = parse_flexible(&row.date_raw);
        (parsed.is_none(), parsed)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(date_raw: &str) -> CustomerRow {
        CustomerRow {
            date_raw: date_raw.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_day_bounds_contain_now() {
        let now = Local::now();
        let (start, end) = day_bounds_millis(now);
        assert!(start <= now.timestamp_millis());
        assert!(now.timestamp_millis() <= end);
        assert!(end - start < 25 * 3600 * 1000);
    }

    #[test]
    fn test_same_day_across_formats() {
        let expected = start_of_day(ymd(2025, 11, 30));
        assert_eq!(parse_flexible("2025-11-30"), Some(expected));
        assert_eq!(parse_flexible("30.11.2025"), Some(expected));
        assert_eq!(parse_flexible("30/11/2025"), Some(expected));
        assert_eq!(parse_flexible("2025.11.30"), Some(expected));
        assert_eq!(parse_flexible("2025/11/30"), Some(expected));
        assert_eq!(parse_flexible("  30.11.2025 "), Some(expected));
    }

    #[test]
    fn test_single_digit_day_month() {
        assert_eq!(parse_flexible("5.3.2025"), Some(start_of_day(ymd(2025, 3, 5))));
        assert_eq!(parse_flexible("5/3/2025"), Some(start_of_day(ymd(2025, 3, 5))));
    }

    #[test]
    fn test_impossible_date_rejected() {
        assert_eq!(parse_flexible("31.02.2025"), None);
        assert_eq!(parse_flexible("2025-02-30"), None);
        assert_eq!(parse_flexible("00.01.2025"), None);
    }

    #[test]
    fn test_ambiguous_slash_is_day_first() {
        assert_eq!(parse_flexible("01/02/2025"), Some(start_of_day(ymd(2025, 2, 1))));
    }

    #[test]
    fn test_permissive_fallback() {
        assert_eq!(parse_flexible("2025-1-5"), Some(start_of_day(ymd(2025, 1, 5))));
        assert_eq!(parse_flexible("30 Nov 2025"), Some(start_of_day(ymd(2025, 11, 30))));
        assert_eq!(parse_flexible("November 30, 2025"), Some(start_of_day(ymd(2025, 11, 30))));
        assert_eq!(
            parse_flexible("2025-11-30 14:45"),
            Some(ymd(2025, 11, 30).and_hms_opt(14, 45, 0).unwrap())
        );
        assert!(parse_flexible("2025-11-30T10:00:00Z").is_some());
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(parse_flexible(""), None);
        assert_eq!(parse_flexible("yarın"), None);
        assert_eq!(parse_flexible("34ABC123"), None);
    }

    #[test]
    fn test_due_or_overdue() {
        let today = ymd(2025, 11, 30);
        assert!(is_due_or_overdue(&row("30.11.2025"), today));
        assert!(is_due_or_overdue(&row("01.01.2020"), today));
        assert!(is_due_or_overdue(&row("2025-11-30 23:59"), today));
        assert!(!is_due_or_overdue(&row("01.12.2025"), today));
        assert!(!is_due_or_overdue(&row("bilinmiyor"), today));
    }

    #[test]
    fn test_due_within_days_window() {
        let today = ymd(2025, 11, 30);
        assert!(is_due_within_days(&row("30.11.2025"), 3, today, true));
        assert!(is_due_within_days(&row("03.12.2025"), 3, today, true));
        assert!(!is_due_within_days(&row("04.12.2025"), 3, today, true));
        assert!(!is_due_within_days(&row("29.11.2025"), 3, today, true));
        assert!(!is_due_within_days(&row("garbage"), 3, today, true));
    }

    #[test]
    fn test_due_within_days_excluding_today() {
        let today = ymd(2025, 11, 30);
        assert!(!is_due_within_days(&row("30.11.2025"), 1, today, false));
        assert!(is_due_within_days(&row("01.12.2025"), 1, today, false));
    }

    #[test]
    fn test_filter_due_today_or_tomorrow() {
        let today = ymd(2025, 11, 30);
        let rows = vec![
            row("29.11.2025"), // yesterday
            row("30.11.2025"), // today
            row("01.12.2025"), // tomorrow
            row("02.12.2025"), // day after tomorrow
        ];
        let due = filter_due(&rows, 1, true, today);
        let dates: Vec<&str> = due.iter().map(|r| r.date_raw.as_str()).collect();
        assert_eq!(dates, vec!["30.11.2025", "01.12.2025"]);
    }

    #[test]
    fn test_filter_due_zero_days_uses_overdue() {
        let today = ymd(2025, 11, 30);
        let rows = vec![row("29.11.2025"), row("30.11.2025"), row("01.12.2025")];
        assert_eq!(filter_due(&rows, 0, true, today).len(), 2);
    }

    #[test]
    fn test_filter_modes() {
        let today = ymd(2025, 11, 30);
        let yesterday = row("29.11.2025");
        let today_row = row("30.11.2025");
        let next_week = row("06.12.2025");

        assert!(passes_date_filter(FilterMode::OnlyToday, &today_row, today));
        assert!(!passes_date_filter(FilterMode::OnlyToday, &yesterday, today));
        assert!(!passes_date_filter(FilterMode::TodayOrTomorrow, &next_week, today));
        assert!(passes_date_filter(FilterMode::NextDays(7), &next_week, today));
        assert!(passes_date_filter(FilterMode::DueOrOverdue, &yesterday, today));
        assert!(passes_date_filter(FilterMode::Off, &row("???"), today));
    }

    #[test]
    fn test_sort_unparseable_last_and_stable() {
        let mut rows = vec![
            CustomerRow { row_index: 0, date_raw: "?".into(), ..Default::default() },
            CustomerRow { row_index: 1, date_raw: "05.12.2025".into(), ..Default::default() },
            CustomerRow { row_index: 2, date_raw: "2025-12-01".into(), ..Default::default() },
            CustomerRow { row_index: 3, date_raw: "".into(), ..Default::default() },
            CustomerRow { row_index: 4, date_raw: "01/12/2025".into(), ..Default::default() },
        ];
        sort_by_date_asc(&mut rows);
        let order: Vec<usize> = rows.iter().map(|r| r.row_index).collect();
        assert_eq!(order, vec![2, 4, 1, 0, 3]);
    }
}
