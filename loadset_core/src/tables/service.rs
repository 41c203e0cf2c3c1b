//! Table service capability
//!
//! The narrow interface a model backend exposes for its database tables.
//! Every call returns a typed result; a non-zero status from the model is a
//! [`ServiceStatus`].

use serde::{Deserialize, Serialize};

/// Non-zero status code returned by a model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus(pub i32);

impl ServiceStatus {
    pub fn code(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}", self.0)
    }
}

pub type ServiceResult<T> = Result<T, ServiceStatus>;

/// Metadata of one column, independent of any rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub units: String,
    #[serde(default = "default_importable")]
    pub importable: bool,
}

fn default_importable() -> bool {
    true
}

impl FieldInfo {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        FieldInfo {
            name: key.clone(),
            key,
            description: String::new(),
            units: String::new(),
            importable: true,
        }
    }
}

/// Result of `getAllFieldsInTable`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFields {
    pub version: i32,
    pub fields: Vec<FieldInfo>,
}

impl TableFields {
    pub fn field_keys(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.key.clone()).collect()
    }
}

/// Result of `getTableForDisplay`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayTable {
    pub version: i32,
    pub field_keys: Vec<String>,
    pub record_count: usize,
    pub data: Vec<String>,
}

/// Result of `applyEditedTables`.
///
/// A zero `status` with a nonzero `fatal_count` is still a failure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplyReport {
    pub status: i32,
    pub fatal_count: u32,
    pub error_count: u32,
    pub warning_count: u32,
    pub info_count: u32,
    pub import_log: String,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.status == 0 && self.fatal_count == 0
    }
}

/// Database table operations of one attached model.
///
/// Implementations are driven from a single thread; the models are not safe
/// for concurrent writers.
pub trait TableService {
    /// Name used in messages, e.g. `"ETABS"` or a snapshot file name
    fn model_label(&self) -> String;

    /// Whether a live model is reachable
    fn is_attached(&self) -> bool;

    /// Keys of every table the model currently holds
    fn available_tables(&self) -> ServiceResult<Vec<String>>;

    /// Canonical column list of a table, available even before the table
    /// holds any rows
    fn all_fields_in_table(&self, table_key: &str) -> ServiceResult<TableFields>;

    /// Current rows of a table restricted to a group
    fn table_for_display(&self, table_key: &str, group: &str) -> ServiceResult<DisplayTable>;

    /// Stage a complete replacement body for a table
    fn set_table_for_editing(
        &mut self,
        table_key: &str,
        version: i32,
        field_keys: &[String],
        record_count: usize,
        data: &[String],
    ) -> ServiceResult<()>;

    /// Commit every staged table
    fn apply_edited_tables(&mut self, fill_import_log: bool) -> ApplyReport;
}

impl<T: TableService + ?Sized> TableService for &mut T {
    fn model_label(&self) -> String {
        (**self).model_label()
    }

    fn is_attached(&self) -> bool {
        (**self).is_attached()
    }

    fn available_tables(&self) -> ServiceResult<Vec<String>> {
        (**self).available_tables()
    }

    fn all_fields_in_table(&self, table_key: &str) -> ServiceResult<TableFields> {
        (**self).all_fields_in_table(table_key)
    }

    fn table_for_display(&self, table_key: &str, group: &str) -> ServiceResult<DisplayTable> {
        (**self).table_for_display(table_key, group)
    }

    fn set_table_for_editing(
        &mut self,
        table_key: &str,
        version: i32,
        field_keys: &[String],
        record_count: usize,
        data: &[String],
    ) -> ServiceResult<()> {
        (**self).set_table_for_editing(table_key, version, field_keys, record_count, data)
    }

    fn apply_edited_tables(&mut self, fill_import_log: bool) -> ApplyReport {
        (**self).apply_edited_tables(fill_import_log)
    }
}
