//! # Transfers
//!
//! Moves load sets and their area assignments from a source model into a
//! target model.
//!
//! ```text
//! source ── read ──► LoadSetTree ── select ──► convert ──► stage/apply ──► target
//!   0%                  20%                      30%                        100%
//! ```
//!
//! Magnitudes are converted once, on the way out, from the source's present
//! units to the target's. Assignment transfer correlates areas by the plan
//! coordinates of their control points, since the two models share no ids.
//!
//! - [`layout`] - Column patterns for the two transferred tables
//! - [`records`] - Transfer records and source reads
//! - [`reconcile`] - Grouping and deduplication by business key
//! - [`tree`] - Load-set tree with the user's selection

pub mod layout;
pub mod records;
pub mod reconcile;
pub mod tree;

pub use records::{LoadSetRecord, OutboundAssignment, OutboundLoadSetRow, SlabAssignment};
pub use reconcile::{
    area_load_factor, build_assignment_rows, build_load_set_rows, dedup_last_wins, group_by_key, KeyedMap,
};
pub use tree::{LoadSetGroup, LoadSetTree};

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::errors::{TransferError, TransferResult};
use crate::geometry::{area_key, selected_area_identifiers, ControlPointIndex, GeometryService};
use crate::model::{ModelInfo, ModelInfoSource};
use crate::settings::TransferSettings;
use crate::tables::{ApplyReport, EditRow, StagingSession, TableService};
use crate::units::{UnitConverter, UnitSystem};
use crate::worker::ProgressReporter;

use self::layout::{ASSIGNMENT_WRITE, LOAD_SET_WRITE};
use self::records::{read_area_assignments, read_load_set_records};

const READ_DONE: u8 = 20;
const CONVERT_DONE: u8 = 30;

/// Outcome of a load-set transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSetTransferSummary {
    pub target_model: String,
    pub source_units: String,
    pub target_units: String,
    pub scale_factor: f64,
    /// Distinct set names written, in row order
    pub sets: Vec<String>,
    pub rows_written: usize,
    /// `None` when there was nothing to write
    pub report: Option<ApplyReport>,
}

/// Outcome of an assignment transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentTransferSummary {
    pub target_model: String,
    pub selected: usize,
    /// Selected areas with no assigned set or no matching target area
    pub skipped: Vec<String>,
    pub rows_written: usize,
    pub report: Option<ApplyReport>,
}

fn require_attached<S: TableService + ?Sized>(service: &S) -> TransferResult<()> {
    if service.is_attached() {
        Ok(())
    } else {
        Err(TransferError::connectivity(service.model_label()))
    }
}

/// Read the source model's load sets into a tree, nothing selected.
pub fn load_source_tree<S>(
    source: &S,
    settings: &TransferSettings,
    progress: &ProgressReporter,
) -> TransferResult<(ModelInfo, LoadSetTree)>
where
    S: TableService + ModelInfoSource + ?Sized,
{
    require_attached(source)?;
    progress.report(0, "reading");

    let info = ModelInfo::read(source);
    let records = read_load_set_records(
        source,
        &settings.load_set_table,
        &settings.group_filter,
        &info.area_load_label(),
    )?;
    let tree = LoadSetTree::from_records(records);
    info!(model = %info.file_name, sets = tree.len(), "source load sets read");

    progress.report(READ_DONE, "read");
    Ok((info, tree))
}

/// Convert `records` from `source_units` into the target's present units and
/// write them to the target's load-set table.
///
/// Nothing is written when there are no records.
pub fn transfer_load_sets<T>(
    records: &[LoadSetRecord],
    source_units: &UnitSystem,
    target: &mut T,
    converter: &UnitConverter,
    settings: &TransferSettings,
    progress: &ProgressReporter,
) -> TransferResult<LoadSetTransferSummary>
where
    T: TableService + ModelInfoSource + ?Sized,
{
    require_attached(target)?;
    let span = info_span!("transfer_load_sets", target = %target.model_label());
    let _enter = span.enter();

    let target_info = ModelInfo::read(target);
    let scale_factor = area_load_factor(converter, source_units, &target_info.units)?;
    let rows = build_load_set_rows(records, scale_factor);
    progress.report(CONVERT_DONE, "converted");

    let mut sets: KeyedMap<()> = KeyedMap::new();
    for row in &rows {
        sets.insert_first(&row.set_name, ());
    }
    let mut summary = LoadSetTransferSummary {
        target_model: target_info.file_name.clone(),
        source_units: source_units.summary(),
        target_units: target_info.units.summary(),
        scale_factor,
        sets: sets.iter().map(|(name, _)| name.to_string()).collect(),
        rows_written: rows.len(),
        report: None,
    };

    if rows.is_empty() {
        warn!("no load set rows to write");
        return Ok(summary);
    }

    let edit_rows: Vec<EditRow> = rows.iter().map(OutboundLoadSetRow::to_edit_row).collect();
    let report = StagingSession::new(target, &settings.load_set_table, LOAD_SET_WRITE, &edit_rows)
        .fill_import_log(settings.fill_import_log)
        .with_progress(progress, CONVERT_DONE, 100)
        .run()?;
    info!(rows = summary.rows_written, sets = summary.sets.len(), "load sets written");
    summary.report = Some(report);
    Ok(summary)
}

/// Pair each selected source area with its assigned set and the first target
/// area sharing its control point key.
///
/// Unknown sets and unmatched areas come back blank rather than as errors.
pub fn collect_slab_assignments<S, T>(
    source: &S,
    target: &T,
    settings: &TransferSettings,
) -> TransferResult<Vec<SlabAssignment>>
where
    S: TableService + GeometryService + ?Sized,
    T: GeometryService + ?Sized,
{
    require_attached(source)?;
    let selected = selected_area_identifiers(source);
    if selected.is_empty() {
        return Ok(Vec::new());
    }

    let assignments = read_area_assignments(source, &settings.assignment_table, &settings.group_filter)?;
    let target_index = ControlPointIndex::build(target);

    Ok(selected
        .into_iter()
        .map(|area| {
            let assigned_set = assignments.get(&area.unique_name).cloned().unwrap_or_default();
            let target_unique_name = area_key(source, &area.unique_name)
                .and_then(|key| target_index.first_match(&key).map(str::to_string))
                .unwrap_or_default();
            SlabAssignment {
                source_guid: area.guid,
                source_unique_name: area.unique_name,
                source_label: area.label,
                assigned_set,
                target_unique_name,
            }
        })
        .collect())
}

/// Write the transferable assignments to the target's assignment table.
pub fn transfer_assignments<T>(
    slabs: &[SlabAssignment],
    target: &mut T,
    settings: &TransferSettings,
    progress: &ProgressReporter,
) -> TransferResult<AssignmentTransferSummary>
where
    T: TableService + ?Sized,
{
    require_attached(target)?;
    let span = info_span!("transfer_assignments", target = %target.model_label());
    let _enter = span.enter();

    let rows = build_assignment_rows(slabs);
    progress.report(CONVERT_DONE, "matched");

    let mut summary = AssignmentTransferSummary {
        target_model: target.model_label(),
        selected: slabs.len(),
        skipped: slabs
            .iter()
            .filter(|slab| !slab.is_transferable())
            .map(|slab| slab.source_label.clone())
            .collect(),
        rows_written: rows.len(),
        report: None,
    };

    if rows.is_empty() {
        warn!(selected = slabs.len(), "no assignments to write");
        return Ok(summary);
    }

    let edit_rows: Vec<EditRow> = rows.iter().map(OutboundAssignment::to_edit_row).collect();
    let report = StagingSession::new(target, &settings.assignment_table, ASSIGNMENT_WRITE, &edit_rows)
        .fill_import_log(settings.fill_import_log)
        .with_progress(progress, CONVERT_DONE, 100)
        .run()?;
    info!(rows = summary.rows_written, skipped = summary.skipped.len(), "assignments written");
    summary.report = Some(report);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlanPoint;
    use crate::snapshot::{AreaObject, ModelSnapshot};
    use crate::tables::read_table;

    const SETS: &str = "Shell Uniform Load Sets";
    const ASSIGN: &str = "Area Load Assignments - Uniform Load Sets";
    const SET_FIELDS: &[&str] = &["Name", "LoadPattern", "LoadValue"];
    const ASSIGN_FIELDS: &[&str] = &["Story", "Label", "UniqueName", "LoadSet"];

    fn square(x: f64, y: f64) -> Vec<PlanPoint> {
        vec![
            PlanPoint::new(x, y),
            PlanPoint::new(x + 6.0, y),
            PlanPoint::new(x + 6.0, y + 6.0),
            PlanPoint::new(x, y + 6.0),
        ]
    }

    fn area(name: &str, label: &str, points: Vec<PlanPoint>, selected: bool) -> AreaObject {
        AreaObject {
            unique_name: name.to_string(),
            guid: format!("guid-{name}"),
            label: label.to_string(),
            points,
            selected,
        }
    }

    fn source() -> ModelSnapshot {
        ModelSnapshot::new("Source.EDB", UnitSystem::new("N", "mm", "C"))
            .with_table(
                SETS,
                SET_FIELDS,
                &[
                    &["ULoadSet1", "Dead", "0.003"],
                    &["ULoadSet2", "Live", "0.002"],
                    &["uloadset1", "SDL", "0.001"],
                    &["", "Dead", "9"],
                ],
            )
            .with_table(
                ASSIGN,
                ASSIGN_FIELDS,
                &[
                    &["L3", "F1", "1", "ULoadSet1"],
                    &["L3", "F2", "2", "ULoadSet2"],
                    &["L3", "F3", "3", ""],
                ],
            )
            .with_area(area("1", "F1", square(0.0, 0.0), true))
            .with_area(area("2", "F2", square(6.0, 0.0), true))
            .with_area(area("3", "F3", square(12.0, 0.0), true))
            .with_area(area("4", "F4", square(18.0, 0.0), false))
    }

    fn target() -> ModelSnapshot {
        ModelSnapshot::new("Target.EDB", UnitSystem::new("lb", "in", "F"))
            .with_catalog_entry(SETS, SET_FIELDS)
            .with_catalog_entry(ASSIGN, ASSIGN_FIELDS)
            .with_area(area("21", "T1", square(0.0, 0.0), false))
            .with_area(area("22", "T2", square(6.0, 0.0), false))
            .with_area(area("23", "T3", square(12.0, 0.0), false))
    }

    fn settings() -> TransferSettings {
        TransferSettings::default()
    }

    fn stored_rows(model: &ModelSnapshot, key: &str) -> Vec<Vec<String>> {
        model.table(key).map(|t| t.rows.clone()).unwrap_or_default()
    }

    #[test]
    fn test_source_tree_groups_sets() {
        let (info, tree) = load_source_tree(&source(), &settings(), &ProgressReporter::silent()).unwrap();
        assert_eq!(info.file_name, crate::model::UNSAVED_MODEL);
        assert_eq!(info.units.summary(), "mm-N-C");
        assert_eq!(tree.set_names(), vec!["ULoadSet1", "ULoadSet2"]);
        assert_eq!(tree.group("ULOADSET1").unwrap().records.len(), 2);
        assert_eq!(tree.group("ULoadSet1").unwrap().records[0].unit_label, "N/mm²");
    }

    #[test]
    fn test_load_sets_into_missing_table() {
        let source = source();
        let (info, mut tree) = load_source_tree(&source, &settings(), &ProgressReporter::silent()).unwrap();
        tree.select_only(&["ULoadSet1"]).unwrap();

        let mut target = target();
        let summary = transfer_load_sets(
            &tree.selected_records(),
            &info.units,
            &mut target,
            &UnitConverter::standard(),
            &settings(),
            &ProgressReporter::silent(),
        )
        .unwrap();

        assert!((summary.scale_factor - 145.0377).abs() < 1e-3);
        assert_eq!(summary.sets, vec!["ULoadSet1"]);
        assert_eq!(summary.rows_written, 2);
        assert!(summary.report.unwrap().is_success());

        let rows = stored_rows(&target, SETS);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "ULoadSet1");
        assert_eq!(rows[0][1], "Dead");
        assert!((rows[0][2].parse::<f64>().unwrap() - 0.4351).abs() < 1e-4);
        // reported factor is the one applied to the rows
        assert_eq!(rows[0][2].parse::<f64>().unwrap(), 0.003 * summary.scale_factor);
        assert_eq!(rows[1][1], "SDL");
    }

    #[test]
    fn test_load_set_transfer_is_idempotent() {
        let source = source();
        let (info, mut tree) = load_source_tree(&source, &settings(), &ProgressReporter::silent()).unwrap();
        tree.select_all();
        let records = tree.selected_records();
        let converter = UnitConverter::standard();

        let mut target = target();
        let silent = ProgressReporter::silent();
        transfer_load_sets(&records, &info.units, &mut target, &converter, &settings(), &silent).unwrap();
        let first = stored_rows(&target, SETS);
        transfer_load_sets(&records, &info.units, &mut target, &converter, &settings(), &silent).unwrap();
        let second = stored_rows(&target, SETS);

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_selection_writes_nothing() {
        let mut target = target();
        let summary = transfer_load_sets(
            &[],
            &UnitSystem::new("kN", "m", "C"),
            &mut target,
            &UnitConverter::standard(),
            &settings(),
            &ProgressReporter::silent(),
        )
        .unwrap();
        assert_eq!(summary.report, None);
        assert!(target.table(SETS).is_none());
    }

    #[test]
    fn test_unknown_target_units_fail_before_writing() {
        let mut target = target();
        target.units = None;
        let records = vec![LoadSetRecord {
            set_name: "S1".to_string(),
            load_pattern: "Dead".to_string(),
            magnitude: 1.0,
            unit_label: "kN/m²".to_string(),
        }];
        let err = transfer_load_sets(
            &records,
            &UnitSystem::new("kN", "m", "C"),
            &mut target,
            &UnitConverter::standard(),
            &settings(),
            &ProgressReporter::silent(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_UNIT");
        assert!(target.table(SETS).is_none());
    }

    #[test]
    fn test_detached_source_is_connectivity_error() {
        let mut source = source();
        source.detach();
        let err = load_source_tree(&source, &settings(), &ProgressReporter::silent()).unwrap_err();
        assert_eq!(err.error_code(), "CONNECTIVITY");
    }

    #[test]
    fn test_slab_assignments_correlate_by_geometry() {
        let slabs = collect_slab_assignments(&source(), &target(), &settings()).unwrap();
        assert_eq!(slabs.len(), 3);
        assert_eq!(slabs[0].source_label, "F1");
        assert_eq!(slabs[0].assigned_set, "ULoadSet1");
        assert_eq!(slabs[0].target_unique_name, "21");
        assert_eq!(slabs[1].target_unique_name, "22");
        assert_eq!(slabs[2].assigned_set, "");
        assert!(!slabs[2].is_transferable());
    }

    #[test]
    fn test_assignments_written_to_target() {
        let slabs = collect_slab_assignments(&source(), &target(), &settings()).unwrap();
        let mut target = target();
        let summary = transfer_assignments(&slabs, &mut target, &settings(), &ProgressReporter::silent()).unwrap();

        assert_eq!(summary.selected, 3);
        assert_eq!(summary.skipped, vec!["F3"]);
        assert_eq!(summary.rows_written, 2);

        let snapshot = read_table(&target, ASSIGN, "All").unwrap();
        assert_eq!(snapshot.record_count(), 2);
        assert_eq!(snapshot.cell(0, 2), "21");
        assert_eq!(snapshot.cell(0, 3), "ULoadSet1");
        assert_eq!(snapshot.cell(1, 2), "22");
        assert_eq!(snapshot.cell(1, 3), "ULoadSet2");
    }

    #[test]
    fn test_no_selection_gives_no_assignments() {
        let mut source = source();
        for area in &mut source.areas {
            area.selected = false;
        }
        assert!(collect_slab_assignments(&source, &target(), &settings()).unwrap().is_empty());
    }

    #[test]
    fn test_progress_runs_to_completion() {
        let (tx, rx) = std::sync::mpsc::channel();
        let progress = ProgressReporter::new(tx);
        let source = source();
        let (info, mut tree) = load_source_tree(&source, &settings(), &progress).unwrap();
        tree.select_all();
        let mut target = target();
        transfer_load_sets(
            &tree.selected_records(),
            &info.units,
            &mut target,
            &UnitConverter::standard(),
            &settings(),
            &progress,
        )
        .unwrap();
        drop(progress);

        let percents: Vec<u8> = rx.iter().map(|u| u.percent).collect();
        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }
}
