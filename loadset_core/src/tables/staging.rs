//! Table Gateway - write path
//!
//! A staging session writes one complete table body through the model's
//! two-phase transaction:
//!
//! ```text
//! Uninitialized ──► SchemaKnown ──► Staged ──► Applied
//!       │               ▲   │
//!       ▼               │   ▼ (first rejection only)
//!   InitializingSchema ─┘◄──┘
//! ```
//!
//! `InitializingSchema` materializes the table from its metadata by staging
//! and applying an empty body. It runs at most once per session: either
//! up front, when the table does not exist yet or its schema cannot be read,
//! or after the model rejects the first stage. Any further rejection is
//! fatal, so a session never makes more than two stage calls.
//!
//! Rows go to the model in the order given; nothing is reordered here.

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::errors::{TransferError, TransferResult};
use crate::worker::ProgressReporter;

use super::fields::{FieldPattern, FieldResolution};
use super::service::{ApplyReport, TableService};
use super::{TableData, TableSchema};

/// Why the table is being initialized from metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitCause {
    /// Table key is not among the model's available tables
    TableMissing,
    /// The model would not return the table's current schema
    SchemaFetchFailed { status: i32 },
    /// The first stage call was rejected with this status
    StageRejected { status: i32 },
}

/// State of one staging session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingState {
    Uninitialized,
    InitializingSchema { cause: InitCause },
    SchemaKnown { schema: TableSchema },
    Staged { schema: TableSchema, record_count: usize },
    Applied { report: ApplyReport },
}

impl StagingState {
    pub fn name(&self) -> &'static str {
        match self {
            StagingState::Uninitialized => "uninitialized",
            StagingState::InitializingSchema { .. } => "initializing-schema",
            StagingState::SchemaKnown { .. } => "schema-known",
            StagingState::Staged { .. } => "staged",
            StagingState::Applied { .. } => "applied",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StagingState::Applied { .. })
    }

    fn progress_fraction(&self) -> f64 {
        match self {
            StagingState::Uninitialized => 0.0,
            StagingState::InitializingSchema { .. } => 0.1,
            StagingState::SchemaKnown { .. } => 0.3,
            StagingState::Staged { .. } => 0.7,
            StagingState::Applied { .. } => 1.0,
        }
    }
}

/// One row to write, as semantic field → cell text.
///
/// Fields with no value in the row are written as blank cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditRow {
    cells: Vec<(&'static str, String)>,
}

impl EditRow {
    pub fn new() -> Self {
        EditRow::default()
    }

    pub fn with(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a cell, replacing an earlier value for the same field
    pub fn set(&mut self, field: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == field) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value.as_str())
    }
}

/// Build the flat body for `rows` against a resolved schema
pub fn build_table_data(schema: &TableSchema, resolution: &FieldResolution, rows: &[EditRow]) -> TransferResult<TableData> {
    let mut data = TableData::new(schema.field_count());
    for row in rows {
        let mut cells = vec![String::new(); schema.field_count()];
        for (field, value) in &row.cells {
            if let Some(column) = resolution.index(field) {
                cells[column] = value.clone();
            }
        }
        data.push_row(&schema.table_key, cells)?;
    }
    Ok(data)
}

/// Writes `rows` into one table through stage → apply.
pub struct StagingSession<'a, S: TableService + ?Sized> {
    service: &'a mut S,
    table_key: &'a str,
    patterns: &'a [FieldPattern],
    rows: &'a [EditRow],
    fill_import_log: bool,
    state: StagingState,
    retry_used: bool,
    stage_calls: usize,
    session_id: Uuid,
    progress: Option<(&'a ProgressReporter, u8, u8)>,
}

impl<'a, S: TableService + ?Sized> StagingSession<'a, S> {
    pub fn new(service: &'a mut S, table_key: &'a str, patterns: &'a [FieldPattern], rows: &'a [EditRow]) -> Self {
        StagingSession {
            service,
            table_key,
            patterns,
            rows,
            fill_import_log: true,
            state: StagingState::Uninitialized,
            retry_used: false,
            stage_calls: 0,
            session_id: Uuid::new_v4(),
            progress: None,
        }
    }

    pub fn fill_import_log(mut self, fill: bool) -> Self {
        self.fill_import_log = fill;
        self
    }

    /// Report progress between `start` and `end` percent as states advance
    pub fn with_progress(mut self, reporter: &'a ProgressReporter, start: u8, end: u8) -> Self {
        self.progress = Some((reporter, start, end.max(start)));
        self
    }

    pub fn state(&self) -> &StagingState {
        &self.state
    }

    /// Number of stage calls made so far, initialization included
    pub fn stage_calls(&self) -> usize {
        self.stage_calls
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Advance one state. Fatal conditions end the session with an error.
    pub fn step(&mut self) -> TransferResult<&StagingState> {
        let current = std::mem::replace(&mut self.state, StagingState::Uninitialized);
        let next = self.transition(current)?;
        debug!(table_key = self.table_key, state = next.name(), "staging state");
        self.report_progress(&next);
        self.state = next;
        Ok(&self.state)
    }

    /// Drive the session until the edit is applied
    pub fn run(mut self) -> TransferResult<ApplyReport> {
        let span = info_span!("staging", session = %self.session_id, table_key = self.table_key);
        let _enter = span.enter();
        info!(rows = self.rows.len(), "writing table");

        loop {
            if let StagingState::Applied { report } = self.step()? {
                return Ok(report.clone());
            }
        }
    }

    fn transition(&mut self, state: StagingState) -> TransferResult<StagingState> {
        match state {
            StagingState::Uninitialized => self.fetch_schema(),
            StagingState::InitializingSchema { cause } => self.initialize_from_metadata(cause),
            StagingState::SchemaKnown { schema } => self.stage(schema),
            StagingState::Staged { schema, record_count } => self.apply(schema, record_count),
            StagingState::Applied { report } => Ok(StagingState::Applied { report }),
        }
    }

    fn fetch_schema(&mut self) -> TransferResult<StagingState> {
        if !self.service.is_attached() {
            return Err(TransferError::connectivity(self.service.model_label()));
        }

        let exists = match self.service.available_tables() {
            Ok(tables) => tables.iter().any(|key| key == self.table_key),
            Err(status) => {
                debug!(%status, "available tables unreadable");
                false
            }
        };
        if !exists {
            info!("table not present, initializing from metadata");
            self.retry_used = true;
            return Ok(StagingState::InitializingSchema {
                cause: InitCause::TableMissing,
            });
        }

        match self.service.all_fields_in_table(self.table_key) {
            Ok(fields) => Ok(StagingState::SchemaKnown {
                schema: TableSchema::new(self.table_key, fields.version, fields.field_keys()),
            }),
            Err(status) => {
                warn!(%status, "schema fetch failed, initializing from metadata");
                self.retry_used = true;
                Ok(StagingState::InitializingSchema {
                    cause: InitCause::SchemaFetchFailed { status: status.code() },
                })
            }
        }
    }

    fn initialize_from_metadata(&mut self, cause: InitCause) -> TransferResult<StagingState> {
        let reason = |what: &str| match cause {
            InitCause::StageRejected { status } => {
                format!("{what} while recovering from stage status {status}")
            }
            _ => what.to_string(),
        };

        let metadata = self
            .service
            .all_fields_in_table(self.table_key)
            .map_err(|status| TransferError::schema_unavailable(self.table_key, reason(&format!("metadata returned {status}"))))?;
        let field_keys = metadata.field_keys();
        if field_keys.is_empty() {
            return Err(TransferError::schema_unavailable(self.table_key, reason("metadata lists no fields")));
        }

        self.stage_calls += 1;
        self.service
            .set_table_for_editing(self.table_key, metadata.version, &field_keys, 0, &[])
            .map_err(|status| TransferError::schema_unavailable(self.table_key, reason(&format!("empty stage returned {status}"))))?;

        let report = self.service.apply_edited_tables(false);
        if !report.is_success() {
            return Err(TransferError::schema_unavailable(
                self.table_key,
                reason(&format!(
                    "empty apply returned status {} with {} fatal",
                    report.status, report.fatal_count
                )),
            ));
        }

        let fields = self
            .service
            .all_fields_in_table(self.table_key)
            .map_err(|status| TransferError::schema_unavailable(self.table_key, reason(&format!("schema re-fetch returned {status}"))))?;
        info!(version = fields.version, fields = fields.fields.len(), "table initialized from metadata");

        Ok(StagingState::SchemaKnown {
            schema: TableSchema::new(self.table_key, fields.version, fields.field_keys()),
        })
    }

    fn stage(&mut self, schema: TableSchema) -> TransferResult<StagingState> {
        let resolution = FieldResolution::resolve(&schema, self.patterns);
        resolution.require_all()?;
        let data = build_table_data(&schema, &resolution, self.rows)?;
        let record_count = data.record_count();

        self.stage_calls += 1;
        debug!(stage_call = self.stage_calls, version = schema.version, records = record_count, "staging");

        match self.service.set_table_for_editing(
            &schema.table_key,
            schema.version,
            &schema.field_keys,
            record_count,
            data.cells(),
        ) {
            Ok(()) => Ok(StagingState::Staged { schema, record_count }),
            Err(status) if !self.retry_used => {
                warn!(%status, "stage rejected, re-initializing table");
                self.retry_used = true;
                Ok(StagingState::InitializingSchema {
                    cause: InitCause::StageRejected { status: status.code() },
                })
            }
            Err(status) => Err(TransferError::stage_rejected(&schema.table_key, status.code())),
        }
    }

    fn apply(&mut self, schema: TableSchema, record_count: usize) -> TransferResult<StagingState> {
        let report = self.service.apply_edited_tables(self.fill_import_log);
        info!(
            status = report.status,
            fatal = report.fatal_count,
            errors = report.error_count,
            warnings = report.warning_count,
            infos = report.info_count,
            records = record_count,
            "apply finished"
        );
        if !report.is_success() {
            return Err(TransferError::apply_rejected(
                &schema.table_key,
                report.status,
                report.fatal_count,
                &report.import_log,
            ));
        }
        Ok(StagingState::Applied { report })
    }

    fn report_progress(&self, state: &StagingState) {
        if let Some((reporter, start, end)) = self.progress {
            let span = f64::from(end - start);
            let percent = f64::from(start) + span * state.progress_fraction();
            reporter.report(percent.round() as u8, state.name());
        }
    }
}
