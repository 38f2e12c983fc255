//! Cell encoding for exported rows
//!
//! Turns raw record values into the text of one or more cells. Quoting is
//! left to the individual writers; everything here produces unquoted text
//! that has already passed the formula-injection guard.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;

use crate::store::RawValue;

/// Display format of the creation timestamp column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Neutralize spreadsheet formulas: a leading `=` gets an apostrophe in front
pub fn guard_formula(value: String) -> String {
    if value.starts_with('=') {
        format!("'{value}")
    } else {
        value
    }
}

/// Wrap a value in double quotes, doubling any quote inside it
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render a UTC timestamp in the export's local timezone
pub fn local_timestamp(at: DateTime<Utc>, tz: FixedOffset) -> String {
    at.with_timezone(&tz).format(TIMESTAMP_FORMAT).to_string()
}

/// Text of a single-column value
///
/// Serialized lists are decoded and joined with `|`.
pub fn plain_cell(raw: &RawValue) -> String {
    let text = match raw.decode_list() {
        Some(items) => items.join("|"),
        None => raw.to_text(),
    };
    guard_formula(text)
}

/// Cells of a multi-row value, exactly `width` of them
///
/// Each sub-row becomes one cell with its values joined by `|`. Missing
/// sub-rows are padded with empty cells; a value that cannot be decoded is
/// treated as having no sub-rows.
pub fn sub_row_cells(raw: &RawValue, width: usize, field_id: &str, record_id: u64) -> Vec<String> {
    let rows = match raw.decode_sub_rows() {
        Ok(rows) => rows,
        Err(reason) => {
            warn!(
                "Entry #{}: field {} is not a valid row list ({}), exporting it empty",
                record_id, field_id, reason
            );
            Vec::new()
        }
    };

    if rows.len() > width {
        warn!(
            "Entry #{}: field {} has {} rows but only {} columns, extra rows dropped",
            record_id,
            field_id,
            rows.len(),
            width
        );
    }

    rows.into_iter()
        .map(|row| guard_formula(row.join("|")))
        .chain(std::iter::repeat_with(String::new))
        .take(width)
        .collect()
}
