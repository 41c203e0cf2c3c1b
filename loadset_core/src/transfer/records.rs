//! Transfer records and the source-side reads that produce them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::TransferResult;
use crate::tables::{format_magnitude, parse_magnitude, read_table, EditRow, FieldResolution, TableService};

use super::layout::{ASSIGNMENT_READ, AREA_NAME, LOAD_PATTERN, LOAD_SET, LOAD_SET_READ, SET_NAME, VALUE};
use super::reconcile::KeyedMap;

/// One (set, pattern, magnitude) row of the source load-set table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSetRecord {
    pub set_name: String,
    pub load_pattern: String,
    /// In the source model's present units
    pub magnitude: f64,
    /// Area load label of the source units, e.g. `"kN/m²"`
    pub unit_label: String,
}

/// A load-set row ready for the target model, magnitude already converted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundLoadSetRow {
    pub set_name: String,
    pub load_pattern: String,
    pub magnitude: f64,
}

impl OutboundLoadSetRow {
    pub fn to_edit_row(&self) -> EditRow {
        EditRow::new()
            .with(SET_NAME, self.set_name.clone())
            .with(LOAD_PATTERN, self.load_pattern.clone())
            .with(VALUE, format_magnitude(self.magnitude))
    }
}

/// A target area and the load set to assign to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundAssignment {
    pub target_unique_name: String,
    pub load_set: String,
}

impl OutboundAssignment {
    pub fn to_edit_row(&self) -> EditRow {
        EditRow::new()
            .with(AREA_NAME, self.target_unique_name.clone())
            .with(LOAD_SET, self.load_set.clone())
    }
}

/// A selected source area with its assignment and correlated target area.
///
/// `assigned_set` and `target_unique_name` are blank when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlabAssignment {
    pub source_guid: String,
    pub source_unique_name: String,
    pub source_label: String,
    pub assigned_set: String,
    pub target_unique_name: String,
}

impl SlabAssignment {
    pub fn is_transferable(&self) -> bool {
        !self.target_unique_name.trim().is_empty() && !self.assigned_set.trim().is_empty()
    }
}

/// Read every load-set row of the source model.
///
/// Rows with a blank set name are skipped. Without a set-name column the
/// table reads as empty.
pub fn read_load_set_records<S: TableService + ?Sized>(
    service: &S,
    table_key: &str,
    group: &str,
    unit_label: &str,
) -> TransferResult<Vec<LoadSetRecord>> {
    let snapshot = read_table(service, table_key, group)?;
    if snapshot.is_empty() {
        return Ok(Vec::new());
    }

    let resolution = FieldResolution::resolve(&snapshot.schema, LOAD_SET_READ);
    if resolution.index(SET_NAME).is_none() {
        debug!(table_key, fields = ?snapshot.schema.field_keys, "no set name column");
        return Ok(Vec::new());
    }

    Ok(snapshot
        .records(LOAD_SET_READ)
        .into_iter()
        .filter(|record| !record.get(SET_NAME).is_empty())
        .map(|record| LoadSetRecord {
            set_name: record.get(SET_NAME).to_string(),
            load_pattern: record.get(LOAD_PATTERN).to_string(),
            magnitude: parse_magnitude(record.get(VALUE)),
            unit_label: unit_label.to_string(),
        })
        .collect())
}

/// Read the source assignment table as area name → load set.
///
/// Names compare case-insensitively and the first row per area wins.
pub fn read_area_assignments<S: TableService + ?Sized>(
    service: &S,
    table_key: &str,
    group: &str,
) -> TransferResult<KeyedMap<String>> {
    let snapshot = read_table(service, table_key, group)?;
    let mut assignments = KeyedMap::new();
    if snapshot.is_empty() {
        return Ok(assignments);
    }

    let resolution = FieldResolution::resolve(&snapshot.schema, ASSIGNMENT_READ);
    if let Err(err) = resolution.require_all() {
        debug!(table_key, %err, "assignment columns not found");
        return Ok(assignments);
    }

    for record in snapshot.records(ASSIGNMENT_READ) {
        let area = record.get(AREA_NAME);
        if area.is_empty() {
            continue;
        }
        assignments.insert_first(area, record.get(LOAD_SET).to_string());
    }
    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ModelSnapshot;
    use crate::units::UnitSystem;

    const SETS: &str = "Shell Uniform Load Sets";
    const ASSIGN: &str = "Area Load Assignments - Uniform Load Sets";

    fn model() -> ModelSnapshot {
        ModelSnapshot::new("Podium", UnitSystem::new("kN", "m", "C"))
    }

    #[test]
    fn test_load_set_rows_skip_blank_names_and_parse_leniently() {
        let model = model().with_table(
            SETS,
            &["LoadValue", "Name", "LoadPattern"],
            &[&["2.5", "S1", "Dead"], &["x", "S1", "Live"], &["4", " ", "Dead"]],
        );
        let records = read_load_set_records(&model, SETS, "All", "kN/m²").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].magnitude, 2.5);
        assert_eq!(records[1].load_pattern, "Live");
        assert_eq!(records[1].magnitude, 0.0);
        assert_eq!(records[1].unit_label, "kN/m²");
    }

    #[test]
    fn test_missing_table_or_set_column_reads_empty() {
        assert!(read_load_set_records(&model(), SETS, "All", "kN/m²").unwrap().is_empty());

        let model = model().with_table(SETS, &["LoadPattern", "Value"], &[&["Dead", "1"]]);
        assert!(read_load_set_records(&model, SETS, "All", "kN/m²").unwrap().is_empty());
    }

    #[test]
    fn test_area_assignments_first_row_wins() {
        let model = model().with_table(
            ASSIGN,
            &["Story", "UniqueName", "LoadSet"],
            &[&["L1", "12", "ULoadSet1"], &["L1", "", "ULoadSet9"], &["L2", "12", "ULoadSet2"]],
        );
        let assignments = read_area_assignments(&model, ASSIGN, "All").unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments.get("12").map(String::as_str), Some("ULoadSet1"));
    }

    #[test]
    fn test_outbound_rows_use_semantic_fields() {
        let row = OutboundLoadSetRow {
            set_name: "S1".to_string(),
            load_pattern: "Dead".to_string(),
            magnitude: 0.25,
        }
        .to_edit_row();
        assert_eq!(row.get(SET_NAME), Some("S1"));
        assert_eq!(row.get(VALUE), Some("0.25"));

        let assignment = OutboundAssignment {
            target_unique_name: "21".to_string(),
            load_set: "S1".to_string(),
        }
        .to_edit_row();
        assert_eq!(assignment.get(AREA_NAME), Some("21"));
        assert_eq!(assignment.get(LOAD_SET), Some("S1"));
    }
}
