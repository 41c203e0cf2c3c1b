//! Table Gateway - read path
//!
//! Reads never fail on data: a missing table, a non-zero status, or an
//! empty body all produce an empty [`TableSnapshot`]. Only a detached model
//! is an error.

use tracing::debug;

use crate::errors::{TransferError, TransferResult};

use super::fields::{FieldPattern, FieldResolution};
use super::service::TableService;
use super::{TableData, TableSchema};

/// Rows of one table as returned by one display read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub schema: TableSchema,
    data: TableData,
}

impl TableSnapshot {
    /// Valid empty result for a table that has no rows to offer
    pub fn no_data(table_key: &str) -> Self {
        TableSnapshot {
            schema: TableSchema::new(table_key, 0, Vec::new()),
            data: TableData::new(0),
        }
    }

    pub fn new(schema: TableSchema, cells: Vec<String>) -> Self {
        let data = TableData::from_flat(schema.field_count(), cells);
        TableSnapshot { schema, data }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    pub fn record_count(&self) -> usize {
        self.data.record_count()
    }

    pub fn cell(&self, record: usize, column: usize) -> &str {
        self.data.cell(record, column)
    }

    /// Records keyed by semantic field, resolved against this read's keys.
    ///
    /// Unresolved fields read as blank cells.
    pub fn records(&self, patterns: &[FieldPattern]) -> Vec<FieldRecord> {
        let resolution = FieldResolution::resolve(&self.schema, patterns);
        (0..self.record_count())
            .map(|record| FieldRecord {
                cells: patterns
                    .iter()
                    .map(|pattern| {
                        let value = resolution
                            .index(pattern.field)
                            .map(|column| self.cell(record, column).trim().to_string())
                            .unwrap_or_default();
                        (pattern.field, value)
                    })
                    .collect(),
            })
            .collect()
    }
}

/// One row as ordered semantic field → trimmed cell text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRecord {
    cells: Vec<(&'static str, String)>,
}

impl FieldRecord {
    /// Cell text, `""` for unknown or unresolved fields
    pub fn get(&self, field: &str) -> &str {
        self.cells
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.cells.iter().map(|(name, value)| (*name, value.as_str()))
    }
}

/// Read the current rows of `table_key` restricted to `group`.
pub fn read_table<S: TableService + ?Sized>(service: &S, table_key: &str, group: &str) -> TransferResult<TableSnapshot> {
    if !service.is_attached() {
        return Err(TransferError::connectivity(service.model_label()));
    }

    let table = match service.table_for_display(table_key, group) {
        Ok(table) => table,
        Err(status) => {
            debug!(table_key, %status, "display read returned no data");
            return Ok(TableSnapshot::no_data(table_key));
        }
    };

    if table.record_count == 0 || table.field_keys.is_empty() || table.data.is_empty() {
        debug!(table_key, "table is empty");
        return Ok(TableSnapshot::no_data(table_key));
    }

    let expected = table.record_count * table.field_keys.len();
    if table.data.len() != expected {
        debug!(
            table_key,
            expected,
            actual = table.data.len(),
            "display buffer length differs from record count"
        );
    }

    let mut cells = table.data;
    cells.truncate(expected);
    let schema = TableSchema::new(table_key, table.version, table.field_keys);
    Ok(TableSnapshot::new(schema, cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::fields::Token;
    use crate::tables::service::{ApplyReport, DisplayTable, ServiceResult, ServiceStatus, TableFields};

    struct DisplayOnly {
        attached: bool,
        result: ServiceResult<DisplayTable>,
    }

    impl TableService for DisplayOnly {
        fn model_label(&self) -> String {
            "ETABS".to_string()
        }

        fn is_attached(&self) -> bool {
            self.attached
        }

        fn available_tables(&self) -> ServiceResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn all_fields_in_table(&self, _table_key: &str) -> ServiceResult<TableFields> {
            Err(ServiceStatus(1))
        }

        fn table_for_display(&self, _table_key: &str, _group: &str) -> ServiceResult<DisplayTable> {
            self.result.clone()
        }

        fn set_table_for_editing(
            &mut self,
            _table_key: &str,
            _version: i32,
            _field_keys: &[String],
            _record_count: usize,
            _data: &[String],
        ) -> ServiceResult<()> {
            Err(ServiceStatus(1))
        }

        fn apply_edited_tables(&mut self, _fill_import_log: bool) -> ApplyReport {
            ApplyReport::default()
        }
    }

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const PATTERNS: &[FieldPattern] = &[
        FieldPattern::new("SetName", &[Token::AllOf(&["set", "name"]), Token::Exact("name")]),
        FieldPattern::new("LoadPattern", &[Token::Contains("pattern"), Token::Contains("loadpat")]),
        FieldPattern::new("Value", &[Token::Contains("value"), Token::Contains("val")]),
    ];

    #[test]
    fn test_records_follow_each_reads_column_order() {
        let service = DisplayOnly {
            attached: true,
            result: Ok(DisplayTable {
                version: 4,
                field_keys: strings(&["Value", "GUID", "LoadPattern", "Name"]),
                record_count: 2,
                data: strings(&["1.5", "g1", "Dead", " ULoadSet1 ", "bad", "g2", "Live", "ULoadSet2"]),
            }),
        };
        let snapshot = read_table(&service, "Shell Uniform Load Sets", "All").unwrap();
        assert_eq!(snapshot.schema.version, 4);

        let records = snapshot.records(PATTERNS);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("SetName"), "ULoadSet1");
        assert_eq!(records[0].get("LoadPattern"), "Dead");
        assert_eq!(records[0].get("Value"), "1.5");
        assert_eq!(records[1].get("Value"), "bad");
        assert_eq!(records[1].get("Missing"), "");
    }

    #[test]
    fn test_status_failure_is_no_data() {
        let service = DisplayOnly {
            attached: true,
            result: Err(ServiceStatus(1)),
        };
        let snapshot = read_table(&service, "T", "All").unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.records(PATTERNS).is_empty());
    }

    #[test]
    fn test_zero_rows_is_no_data() {
        let service = DisplayOnly {
            attached: true,
            result: Ok(DisplayTable {
                version: 1,
                field_keys: strings(&["Name", "LoadPattern", "Value"]),
                record_count: 0,
                data: Vec::new(),
            }),
        };
        assert!(read_table(&service, "T", "All").unwrap().is_empty());
    }

    #[test]
    fn test_detached_model_is_connectivity_error() {
        let service = DisplayOnly {
            attached: false,
            result: Err(ServiceStatus(1)),
        };
        let err = read_table(&service, "T", "All").unwrap_err();
        assert_eq!(err, TransferError::connectivity("ETABS"));
    }

    #[test]
    fn test_short_buffer_reads_blank_cells() {
        let service = DisplayOnly {
            attached: true,
            result: Ok(DisplayTable {
                version: 1,
                field_keys: strings(&["Name", "LoadPattern", "Value"]),
                record_count: 2,
                data: strings(&["A", "Dead", "1", "B"]),
            }),
        };
        let records = read_table(&service, "T", "All").unwrap().records(PATTERNS);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("SetName"), "B");
        assert_eq!(records[1].get("Value"), "");
    }
}
