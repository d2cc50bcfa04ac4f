//! "Already sent" markers in the row status column.

use chrono::NaiveTime;

/// Uppercase with Turkish dotted capital I folded to plain I, so that
/// `gönderildi`, `Gönderildi` and `GÖNDERİLDİ` compare equal.
fn fold(s: &str) -> String {
    s.trim().to_uppercase().replace('İ', "I")
}

/// True if `status` starts with any non-empty marker, ignoring case.
pub fn has_sent_marker(status: &str, markers: &[String]) -> bool {
    let status = fold(status);
    markers
        .iter()
        .map(|m| fold(m))
        .any(|m| !m.is_empty() && status.starts_with(&m))
}

/// Status written back after a successful send, e.g. `GÖNDERİLDİ 09:05`.
pub fn format_sent_status(marker: &str, at: NaiveTime) -> String {
    format!("{marker} {}", at.format("%H:%M"))
}
