//! # Reminder Rules
//!
//! Pure business rules applied to customer rows before anything is sent:
//! - `dates` — flexible date parsing, due / due-within-N-days predicates, ordering
//! - `phone` — E.164-style normalization for a single country dial code
//! - `status` — "already sent" markers in the row's status column

pub mod dates;
pub mod phone;
pub mod status;

pub use dates::{day_bounds_millis, filter_due, parse_flexible, passes_date_filter, sort_by_date_asc};
pub use phone::PhoneNormalizer;
pub use status::{format_sent_status, has_sent_marker};
