//! # Tables
//!
//! Generic access to a model's tabular database, whose column layout is not
//! fixed and whose write API is a two-phase stage → apply transaction.
//!
//! - [`service`] - The capability trait a model backend implements
//! - [`fields`] - Token-based column resolution per schema
//! - [`read`] - Display reads returning row snapshots
//! - [`staging`] - The staging state machine with bounded retry
//!
//! Bodies travel as flat row-major cell buffers (`record_count × field_count`),
//! matching the models' calling convention.

pub mod fields;
pub mod read;
pub mod service;
pub mod staging;

pub use fields::{FieldPattern, FieldResolution, Token};
pub use read::{read_table, FieldRecord, TableSnapshot};
pub use service::{ApplyReport, DisplayTable, FieldInfo, ServiceResult, ServiceStatus, TableFields, TableService};
pub use staging::{EditRow, InitCause, StagingSession, StagingState};

use serde::{Deserialize, Serialize};

use crate::errors::{TransferError, TransferResult};

/// Group filter selecting every object in a model
pub const ALL_GROUP: &str = "All";

/// Schema of one table as of one fetch.
///
/// `version` is echoed back unchanged on every edit within a staging session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_key: String,
    pub version: i32,
    pub field_keys: Vec<String>,
}

impl TableSchema {
    pub fn new(table_key: impl Into<String>, version: i32, field_keys: Vec<String>) -> Self {
        TableSchema {
            table_key: table_key.into(),
            version,
            field_keys,
        }
    }

    pub fn field_count(&self) -> usize {
        self.field_keys.len()
    }
}

/// Row-major flattened table body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableData {
    field_count: usize,
    cells: Vec<String>,
}

impl TableData {
    /// Empty body for a schema with `field_count` columns
    pub fn new(field_count: usize) -> Self {
        TableData {
            field_count,
            cells: Vec::new(),
        }
    }

    /// Wrap a buffer received from a model. Trailing partial rows are kept
    /// and read as blank cells.
    pub fn from_flat(field_count: usize, cells: Vec<String>) -> Self {
        TableData { field_count, cells }
    }

    /// Append one row; its width must equal the schema's field count.
    pub fn push_row(&mut self, table_key: &str, row: Vec<String>) -> TransferResult<()> {
        if row.len() != self.field_count {
            return Err(TransferError::RowWidthMismatch {
                table_key: table_key.to_string(),
                row: self.record_count(),
                expected: self.field_count,
                actual: row.len(),
            });
        }
        self.cells.extend(row);
        Ok(())
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn record_count(&self) -> usize {
        if self.field_count == 0 {
            return 0;
        }
        self.cells.len().div_ceil(self.field_count)
    }

    /// Cell text, or `""` when out of range
    pub fn cell(&self, record: usize, column: usize) -> &str {
        if column >= self.field_count {
            return "";
        }
        self.cells
            .get(record * self.field_count + column)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }
}

/// Serialize a magnitude with `.` as decimal separator regardless of locale.
pub fn format_magnitude(value: f64) -> String {
    format!("{value}")
}

/// Parse a magnitude cell. Blank, malformed, or non-finite text reads as `0`.
///
/// # Example
/// ```
/// use loadset_core::tables::parse_magnitude;
///
/// assert_eq!(parse_magnitude(" 2.5 "), 2.5);
/// assert_eq!(parse_magnitude("1e-3"), 0.001);
/// assert_eq!(parse_magnitude("2,5"), 0.0);
/// assert_eq!(parse_magnitude(""), 0.0);
/// ```
pub fn parse_magnitude(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut data = TableData::new(3);
        data.push_row("T", row(&["a", "b", "c"])).unwrap();
        let err = data.push_row("T", row(&["a", "b"])).unwrap_err();
        assert_eq!(
            err,
            TransferError::RowWidthMismatch {
                table_key: "T".to_string(),
                row: 1,
                expected: 3,
                actual: 2,
            }
        );
        assert_eq!(data.record_count(), 1);
    }

    #[test]
    fn test_flat_layout_is_row_major() {
        let mut data = TableData::new(2);
        data.push_row("T", row(&["r0c0", "r0c1"])).unwrap();
        data.push_row("T", row(&["r1c0", "r1c1"])).unwrap();
        assert_eq!(data.cells(), &row(&["r0c0", "r0c1", "r1c0", "r1c1"])[..]);
        assert_eq!(data.cell(1, 0), "r1c0");
        assert_eq!(data.cell(1, 2), "");
        assert_eq!(data.cell(5, 0), "");
    }

    #[test]
    fn test_partial_trailing_row_reads_blank() {
        let data = TableData::from_flat(3, row(&["a", "b", "c", "d"]));
        assert_eq!(data.record_count(), 2);
        assert_eq!(data.cell(1, 0), "d");
        assert_eq!(data.cell(1, 1), "");
    }

    #[test]
    fn test_magnitude_text_is_invariant() {
        assert_eq!(format_magnitude(0.4351), "0.4351");
        assert_eq!(format_magnitude(-2.0), "-2");
        assert_eq!(format_magnitude(1250.5), "1250.5");
        assert_eq!(parse_magnitude(&format_magnitude(0.1 + 0.2)), 0.1 + 0.2);
    }

    #[test]
    fn test_lenient_parse() {
        assert_eq!(parse_magnitude("-0.75"), -0.75);
        assert_eq!(parse_magnitude("abc"), 0.0);
        assert_eq!(parse_magnitude("NaN"), 0.0);
        assert_eq!(parse_magnitude("inf"), 0.0);
        assert_eq!(parse_magnitude("1,000.5"), 0.0);
    }
}
