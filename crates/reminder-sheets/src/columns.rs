//! Header resolution and A1 notation.

use reminder_core::error::{ReminderError, Result};
use reminder_core::types::{ColumnMap, CustomerRow};

const PLATE_ALIASES: &[&str] = &["Plaka", "Plate", "plate"];
const NAME_ALIASES: &[&str] = &["Müşteri Adı", "Musteri Adi", "Ad Soyad", "Name", "Customer"];
const PHONE_ALIASES: &[&str] = &["Telefon", "Phone"];
const DATE_ALIASES: &[&str] = &["Muayene Tarihi", "Tarih", "Date", "dateRaw"];
const STATUS_ALIASES: &[&str] = &["Durum", "Status"];

/// 0-based column positions for one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub plate: Option<usize>,
    pub name: Option<usize>,
    pub phone: usize,
    pub date: usize,
    pub status: Option<usize>,
}

fn find_header(header: &[String], aliases: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    aliases.iter().find_map(|alias| {
        let alias = alias.trim().to_lowercase();
        normalized.iter().position(|h| *h == alias)
    })
}

/// Pinned columns win; the rest are looked up in the header row.
pub fn resolve(header: &[String], pins: &ColumnMap) -> Result<ResolvedColumns> {
    let phone = pins
        .phone
        .or_else(|| find_header(header, PHONE_ALIASES))
        .ok_or_else(|| ReminderError::row_source("Phone column not found (Telefon/Phone)"))?;
    let date = pins
        .date
        .or_else(|| find_header(header, DATE_ALIASES))
        .ok_or_else(|| {
            ReminderError::row_source("Date column not found (Muayene Tarihi/Tarih/Date)")
        })?;

    Ok(ResolvedColumns {
        plate: pins.plate.or_else(|| find_header(header, PLATE_ALIASES)),
        name: pins.name.or_else(|| find_header(header, NAME_ALIASES)),
        phone,
        date,
        status: pins.status.or_else(|| find_header(header, STATUS_ALIASES)),
    })
}

fn cell(row: &[String], col: Option<usize>) -> String {
    col.and_then(|c| row.get(c))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Map data rows (header already stripped) to customer rows. Ragged rows are padded.
pub fn to_customer_rows(data: &[Vec<String>], cols: &ResolvedColumns) -> Vec<CustomerRow> {
    data.iter()
        .enumerate()
        .map(|(i, row)| CustomerRow {
            row_index: i,
            plate: cell(row, cols.plate),
            name: cell(row, cols.name),
            phone: cell(row, Some(cols.phone)),
            date_raw: cell(row, Some(cols.date)),
            status: cell(row, cols.status),
        })
        .collect()
}

/// 0-based column index to letters: 0 → A, 25 → Z, 26 → AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let m = (n - 1) % 26;
        out.push(b'A' + m as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Quote a tab title for A1 ranges (`'Bob''s'`).
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Single-cell range for a data row: header is sheet row 1, data row 0 is sheet row 2.
pub fn data_cell_a1(title: &str, col: usize, row_index: usize) -> String {
    format!("{}!{}{}", quote_title(title), column_letter(col), row_index + 2)
}
