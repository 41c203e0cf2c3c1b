//! # Model Snapshots
//!
//! A model snapshot is a JSON file holding one model's database tables,
//! present units, and area geometry. It implements the same services as a
//! live model, so transfers can run between two files.
//!
//! ## Structure
//!
//! ```text
//! ModelSnapshot
//! ├── meta: SnapshotMeta (schema version, model name, timestamps)
//! ├── units: present units, absent when unknown
//! ├── catalog: table key → field metadata, for tables that may not exist yet
//! ├── tables: table key → StoredTable (version, fields, rows)
//! └── areas: area objects with control points and selection
//! ```
//!
//! Edits follow the live protocol: `set_table_for_editing` validates and
//! buffers a replacement body, `apply_edited_tables` commits every buffered
//! body and bumps each table's version.
//!
//! ## Example
//!
//! ```rust
//! use loadset_core::snapshot::ModelSnapshot;
//! use loadset_core::tables::TableService;
//! use loadset_core::units::UnitSystem;
//!
//! let model = ModelSnapshot::new("Tower", UnitSystem::new("kN", "m", "C"));
//! assert!(model.available_tables().unwrap().is_empty());
//! ```

pub mod file_io;

pub use file_io::{load_snapshot, save_snapshot, FileLock};

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{AreaIdentifier, GeometryService, PlanPoint};
use crate::model::ModelInfoSource;
use crate::tables::{
    ApplyReport, DisplayTable, FieldInfo, ServiceResult, ServiceStatus, TableFields, TableService,
};
use crate::units::UnitSystem;

/// Current schema version for snapshot files
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Stage status: version token does not match the table
pub const STATUS_STALE_VERSION: i32 = 1;
/// Stage or read status: table key is unknown to the model
pub const STATUS_UNKNOWN_TABLE: i32 = 2;
/// Stage status: a field key is not a column of the table
pub const STATUS_UNKNOWN_FIELD: i32 = 3;
/// Stage status: buffer length differs from records × fields
pub const STATUS_BAD_BUFFER: i32 = 4;
/// Query status: requested object or data is not available
pub const STATUS_NOT_FOUND: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Schema version of the file
    pub version: String,
    pub model_name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// One materialized table. Rows are stored in `fields` order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTable {
    pub version: i32,
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl StoredTable {
    pub fn field_keys(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.key.clone()).collect()
    }

    fn column(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaObject {
    pub unique_name: String,
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub label: String,
    pub points: Vec<PlanPoint>,
    #[serde(default)]
    pub selected: bool,
}

#[derive(Debug, Clone)]
struct PendingEdit {
    table_key: String,
    field_keys: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// A model held in memory, loaded from or saved to a snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub meta: SnapshotMeta,
    #[serde(default)]
    pub units: Option<UnitSystem>,
    #[serde(default)]
    pub catalog: BTreeMap<String, Vec<FieldInfo>>,
    #[serde(default)]
    pub tables: BTreeMap<String, StoredTable>,
    #[serde(default)]
    pub areas: Vec<AreaObject>,

    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(skip, default = "attached_default")]
    attached: bool,
    #[serde(skip)]
    pending: Vec<PendingEdit>,
}

fn attached_default() -> bool {
    true
}

impl ModelSnapshot {
    pub fn new(model_name: impl Into<String>, units: UnitSystem) -> Self {
        let now = Utc::now();
        ModelSnapshot {
            meta: SnapshotMeta {
                version: SCHEMA_VERSION.to_string(),
                model_name: model_name.into(),
                created: now,
                modified: now,
            },
            units: Some(units),
            catalog: BTreeMap::new(),
            tables: BTreeMap::new(),
            areas: Vec::new(),
            path: None,
            attached: true,
            pending: Vec::new(),
        }
    }

    /// Register the metadata of a table, materialized or not
    pub fn with_catalog_entry(mut self, table_key: &str, field_keys: &[&str]) -> Self {
        self.catalog.insert(
            table_key.to_string(),
            field_keys.iter().map(|key| FieldInfo::new(*key)).collect(),
        );
        self
    }

    /// Materialize a table with rows given in `field_keys` order
    pub fn with_table(mut self, table_key: &str, field_keys: &[&str], rows: &[&[&str]]) -> Self {
        let fields: Vec<FieldInfo> = field_keys.iter().map(|key| FieldInfo::new(*key)).collect();
        self.catalog.entry(table_key.to_string()).or_insert_with(|| fields.clone());
        self.tables.insert(
            table_key.to_string(),
            StoredTable {
                version: 1,
                fields,
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                    .collect(),
            },
        );
        self
    }

    pub fn with_area(mut self, area: AreaObject) -> Self {
        self.areas.push(area);
        self
    }

    /// Path the snapshot was loaded from or last saved to
    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    /// Simulate a model that is no longer reachable
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn table(&self, table_key: &str) -> Option<&StoredTable> {
        self.tables.get(table_key)
    }

    /// Whether edits are staged but not yet applied
    pub fn has_pending_edits(&self) -> bool {
        !self.pending.is_empty()
    }

    fn known_fields(&self, table_key: &str) -> Option<&[FieldInfo]> {
        self.tables
            .get(table_key)
            .map(|t| t.fields.as_slice())
            .or_else(|| self.catalog.get(table_key).map(Vec::as_slice))
    }

    fn commit(&mut self, edit: PendingEdit) -> usize {
        let fields = self.known_fields(&edit.table_key).map(<[FieldInfo]>::to_vec).unwrap_or_default();
        let table = self.tables.entry(edit.table_key.clone()).or_insert_with(|| StoredTable {
            version: 0,
            fields,
            rows: Vec::new(),
        });

        let columns: Vec<Option<usize>> = edit.field_keys.iter().map(|key| table.column(key)).collect();
        let width = table.fields.len();
        table.rows = edit
            .rows
            .into_iter()
            .map(|staged| {
                let mut row = vec![String::new(); width];
                for (cell, column) in staged.into_iter().zip(&columns) {
                    if let Some(column) = column {
                        row[*column] = cell;
                    }
                }
                row
            })
            .collect();
        table.version += 1;
        table.rows.len()
    }
}

impl TableService for ModelSnapshot {
    fn model_label(&self) -> String {
        self.meta.model_name.clone()
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn available_tables(&self) -> ServiceResult<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn all_fields_in_table(&self, table_key: &str) -> ServiceResult<TableFields> {
        if let Some(table) = self.tables.get(table_key) {
            return Ok(TableFields {
                version: table.version,
                fields: table.fields.clone(),
            });
        }
        self.catalog
            .get(table_key)
            .map(|fields| TableFields {
                version: 0,
                fields: fields.clone(),
            })
            .ok_or(ServiceStatus(STATUS_UNKNOWN_TABLE))
    }

    /// Snapshots carry no groups; every group filter returns all rows.
    fn table_for_display(&self, table_key: &str, _group: &str) -> ServiceResult<DisplayTable> {
        let table = self.tables.get(table_key).ok_or(ServiceStatus(STATUS_UNKNOWN_TABLE))?;
        Ok(DisplayTable {
            version: table.version,
            field_keys: table.field_keys(),
            record_count: table.rows.len(),
            data: table.rows.iter().flatten().cloned().collect(),
        })
    }

    fn set_table_for_editing(
        &mut self,
        table_key: &str,
        version: i32,
        field_keys: &[String],
        record_count: usize,
        data: &[String],
    ) -> ServiceResult<()> {
        let fields = self.known_fields(table_key).ok_or(ServiceStatus(STATUS_UNKNOWN_TABLE))?;
        let current_version = self.tables.get(table_key).map(|t| t.version).unwrap_or(0);
        if version != current_version {
            return Err(ServiceStatus(STATUS_STALE_VERSION));
        }
        if field_keys.iter().any(|key| !fields.iter().any(|f| &f.key == key)) {
            return Err(ServiceStatus(STATUS_UNKNOWN_FIELD));
        }
        if field_keys.is_empty() || data.len() != record_count * field_keys.len() {
            return Err(ServiceStatus(STATUS_BAD_BUFFER));
        }

        let rows = data.chunks(field_keys.len()).map(<[String]>::to_vec).collect();
        self.pending.retain(|edit| edit.table_key != table_key);
        self.pending.push(PendingEdit {
            table_key: table_key.to_string(),
            field_keys: field_keys.to_vec(),
            rows,
        });
        Ok(())
    }

    fn apply_edited_tables(&mut self, fill_import_log: bool) -> ApplyReport {
        let mut log = Vec::new();
        let edits = std::mem::take(&mut self.pending);
        let mut info_count = 0;
        for edit in edits {
            let key = edit.table_key.clone();
            let count = self.commit(edit);
            info_count += 1;
            log.push(format!("Table '{key}': {count} record(s) imported."));
        }
        if info_count > 0 {
            self.meta.modified = Utc::now();
        }

        ApplyReport {
            status: 0,
            fatal_count: 0,
            error_count: 0,
            warning_count: 0,
            info_count,
            import_log: if fill_import_log { log.join("\n") } else { String::new() },
        }
    }
}

impl GeometryService for ModelSnapshot {
    fn selected_areas(&self) -> ServiceResult<Vec<AreaIdentifier>> {
        Ok(self
            .areas
            .iter()
            .filter(|area| area.selected)
            .map(|area| AreaIdentifier {
                guid: area.guid.clone(),
                unique_name: area.unique_name.clone(),
                label: area.label.clone(),
            })
            .collect())
    }

    fn area_names(&self) -> ServiceResult<Vec<String>> {
        Ok(self.areas.iter().map(|area| area.unique_name.clone()).collect())
    }

    fn area_points(&self, unique_name: &str) -> ServiceResult<Vec<PlanPoint>> {
        self.areas
            .iter()
            .find(|area| area.unique_name == unique_name)
            .map(|area| area.points.clone())
            .ok_or(ServiceStatus(STATUS_NOT_FOUND))
    }
}

impl ModelInfoSource for ModelSnapshot {
    fn model_file_path(&self) -> ServiceResult<String> {
        Ok(self
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default())
    }

    fn present_units(&self) -> ServiceResult<UnitSystem> {
        self.units.clone().ok_or(ServiceStatus(STATUS_NOT_FOUND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Shell Uniform Load Sets";

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    fn model() -> ModelSnapshot {
        ModelSnapshot::new("Podium", UnitSystem::new("kN", "m", "C"))
            .with_table(TABLE, &["Name", "LoadPattern", "Value"], &[&["S1", "Dead", "1.5"]])
    }

    #[test]
    fn test_display_is_row_major() {
        let table = model().table_for_display(TABLE, "All").unwrap();
        assert_eq!(table.version, 1);
        assert_eq!(table.record_count, 1);
        assert_eq!(table.data, keys(&["S1", "Dead", "1.5"]));
    }

    #[test]
    fn test_stage_validation_statuses() {
        let mut m = model();
        let fields = keys(&["Name", "LoadPattern", "Value"]);
        let data = keys(&["S2", "Live", "2"]);

        assert_eq!(m.set_table_for_editing(TABLE, 9, &fields, 1, &data), Err(ServiceStatus(1)));
        assert_eq!(m.set_table_for_editing("Nope", 1, &fields, 1, &data), Err(ServiceStatus(2)));
        assert_eq!(
            m.set_table_for_editing(TABLE, 1, &keys(&["Name", "Bogus", "Value"]), 1, &data),
            Err(ServiceStatus(3))
        );
        assert_eq!(m.set_table_for_editing(TABLE, 1, &fields, 2, &data), Err(ServiceStatus(4)));
        assert!(!m.has_pending_edits());
    }

    #[test]
    fn test_apply_replaces_rows_and_bumps_version() {
        let mut m = model();
        // staged in a different column order than stored
        let fields = keys(&["Value", "Name", "LoadPattern"]);
        m.set_table_for_editing(TABLE, 1, &fields, 2, &keys(&["2", "S2", "Live", "3", "S3", "Dead"]))
            .unwrap();
        assert!(m.has_pending_edits());

        let report = m.apply_edited_tables(true);
        assert!(report.is_success());
        assert_eq!(report.import_log, "Table 'Shell Uniform Load Sets': 2 record(s) imported.");

        let table = m.table(TABLE).unwrap();
        assert_eq!(table.version, 2);
        assert_eq!(table.rows, vec![keys(&["S2", "Live", "2"]), keys(&["S3", "Dead", "3"])]);
        assert!(!m.has_pending_edits());
    }

    #[test]
    fn test_catalog_table_materializes_on_apply() {
        let key = "Area Load Assignments - Uniform Load Sets";
        let mut m = model().with_catalog_entry(key, &["UniqueName", "LoadSet"]);
        assert!(!m.available_tables().unwrap().contains(&key.to_string()));
        assert_eq!(m.all_fields_in_table(key).unwrap().version, 0);
        assert_eq!(m.table_for_display(key, "All"), Err(ServiceStatus(2)));

        m.set_table_for_editing(key, 0, &keys(&["UniqueName", "LoadSet"]), 0, &[]).unwrap();
        let report = m.apply_edited_tables(false);
        assert_eq!(report.import_log, "");
        assert_eq!(m.table(key).unwrap().version, 1);
        assert!(m.table(key).unwrap().rows.is_empty());
    }

    #[test]
    fn test_geometry_and_info() {
        let m = model().with_area(AreaObject {
            unique_name: "F1".to_string(),
            guid: "g-1".to_string(),
            label: "F1".to_string(),
            points: vec![PlanPoint::new(0.0, 0.0), PlanPoint::new(1.0, 0.0)],
            selected: true,
        });
        assert_eq!(m.selected_areas().unwrap().len(), 1);
        assert_eq!(m.area_points("F1").unwrap().len(), 2);
        assert_eq!(m.area_points("F9"), Err(ServiceStatus(STATUS_NOT_FOUND)));
        assert_eq!(m.model_file_path().unwrap(), "");
        assert_eq!(m.present_units().unwrap().force, "kN");
    }
}
