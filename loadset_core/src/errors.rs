//! # Error Types
//!
//! Structured error types for loadset_core. Every fatal condition in a
//! transfer surfaces as a single [`TransferError`] carrying a category, a
//! human-readable detail and, where the external model produced one, the
//! import log text.
//!
//! Read-path anomalies (missing table, zero rows, blank cells) are never
//! errors; they resolve to empty results or default values.
//!
//! ## Example
//!
//! ```rust
//! use loadset_core::errors::{TransferError, TransferResult};
//!
//! fn require_set_name(name: &str) -> TransferResult<()> {
//!     if name.trim().is_empty() {
//!         return Err(TransferError::invalid_input("set_name", name, "Set name must not be blank"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_set_name("ULoadSet1").is_ok());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for loadset_core operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Coarse failure category, one per row of the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Connectivity,
    SchemaUnavailable,
    FieldUnresolved,
    StageRejected,
    ApplyRejected,
    Conversion,
    Input,
    Storage,
    Internal,
}

/// Structured error type for transfer operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum TransferError {
    /// No active external model is reachable
    #[error("No model attached: {model}")]
    Connectivity { model: String },

    /// Table is absent and could not be initialized from its metadata
    #[error("Table '{table_key}' unavailable: {reason}")]
    SchemaUnavailable { table_key: String, reason: String },

    /// One or more required columns could not be matched in the current schema
    #[error("Table '{table_key}' has no column for: {}", .fields.join(", "))]
    FieldUnresolved { table_key: String, fields: Vec<String> },

    /// The external service refused the staged edit
    #[error("Model returned error code {status} when staging '{table_key}'")]
    StageRejected { table_key: String, status: i32 },

    /// The external service refused to apply staged edits
    #[error("Model returned error code {status} ({fatal_count} fatal) when applying '{table_key}'.{}", .import_log.as_deref().map(|log| format!(" Import log: {log}")).unwrap_or_default())]
    ApplyRejected {
        table_key: String,
        status: i32,
        fatal_count: u32,
        import_log: Option<String>,
    },

    /// A unit label has no basis multiplier and strict conversion was requested
    #[error("Unknown {dimension} unit: '{label}'")]
    UnknownUnit { dimension: String, label: String },

    /// A row was built with a different width than its schema
    #[error("Row {row} of '{table_key}' has {actual} cells, schema has {expected}")]
    RowWidthMismatch {
        table_key: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// An input value is invalid
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// File is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON/TOML serialization or deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Snapshot schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TransferError {
    /// Create a Connectivity error
    pub fn connectivity(model: impl Into<String>) -> Self {
        TransferError::Connectivity { model: model.into() }
    }

    /// Create a SchemaUnavailable error
    pub fn schema_unavailable(table_key: impl Into<String>, reason: impl Into<String>) -> Self {
        TransferError::SchemaUnavailable {
            table_key: table_key.into(),
            reason: reason.into(),
        }
    }

    /// Create a FieldUnresolved error
    pub fn field_unresolved<I, S>(table_key: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TransferError::FieldUnresolved {
            table_key: table_key.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a StageRejected error
    pub fn stage_rejected(table_key: impl Into<String>, status: i32) -> Self {
        TransferError::StageRejected {
            table_key: table_key.into(),
            status,
        }
    }

    /// Create an ApplyRejected error. Blank logs are dropped.
    pub fn apply_rejected(table_key: impl Into<String>, status: i32, fatal_count: u32, import_log: &str) -> Self {
        let import_log = if import_log.trim().is_empty() {
            None
        } else {
            Some(import_log.to_string())
        };
        TransferError::ApplyRejected {
            table_key: table_key.into(),
            status,
            fatal_count,
            import_log,
        }
    }

    /// Create an UnknownUnit error
    pub fn unknown_unit(dimension: impl Into<String>, label: impl Into<String>) -> Self {
        TransferError::UnknownUnit {
            dimension: dimension.into(),
            label: label.into(),
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        TransferError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        TransferError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        TransferError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization(reason: impl Into<String>) -> Self {
        TransferError::SerializationError { reason: reason.into() }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        TransferError::Internal { message: message.into() }
    }

    /// Check if this is a recoverable error.
    ///
    /// A rejected stage is recovered once by re-initializing the table; a
    /// locked file may be retried once the holder releases it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransferError::StageRejected { .. } | TransferError::FileLocked { .. })
    }

    /// Failure category for programmatic handling
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransferError::Connectivity { .. } => ErrorCategory::Connectivity,
            TransferError::SchemaUnavailable { .. } => ErrorCategory::SchemaUnavailable,
            TransferError::FieldUnresolved { .. } => ErrorCategory::FieldUnresolved,
            TransferError::StageRejected { .. } => ErrorCategory::StageRejected,
            TransferError::ApplyRejected { .. } => ErrorCategory::ApplyRejected,
            TransferError::UnknownUnit { .. } => ErrorCategory::Conversion,
            TransferError::InvalidInput { .. } => ErrorCategory::Input,
            TransferError::FileError { .. }
            | TransferError::FileLocked { .. }
            | TransferError::SerializationError { .. }
            | TransferError::VersionMismatch { .. } => ErrorCategory::Storage,
            TransferError::RowWidthMismatch { .. } | TransferError::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            TransferError::Connectivity { .. } => "CONNECTIVITY",
            TransferError::SchemaUnavailable { .. } => "SCHEMA_UNAVAILABLE",
            TransferError::FieldUnresolved { .. } => "FIELD_UNRESOLVED",
            TransferError::StageRejected { .. } => "STAGE_REJECTED",
            TransferError::ApplyRejected { .. } => "APPLY_REJECTED",
            TransferError::UnknownUnit { .. } => "UNKNOWN_UNIT",
            TransferError::RowWidthMismatch { .. } => "ROW_WIDTH_MISMATCH",
            TransferError::InvalidInput { .. } => "INVALID_INPUT",
            TransferError::FileError { .. } => "FILE_ERROR",
            TransferError::FileLocked { .. } => "FILE_LOCKED",
            TransferError::SerializationError { .. } => "SERIALIZATION_ERROR",
            TransferError::VersionMismatch { .. } => "VERSION_MISMATCH",
            TransferError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = TransferError::field_unresolved("Shell Uniform Load Sets", ["SetName", "Value"]);
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"FieldUnresolved\""));
        let roundtrip: TransferError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_field_unresolved_lists_every_field() {
        let error = TransferError::field_unresolved("T", ["SetName", "LoadPattern"]);
        assert_eq!(error.to_string(), "Table 'T' has no column for: SetName, LoadPattern");
    }

    #[test]
    fn test_apply_rejected_includes_log_verbatim() {
        let error = TransferError::apply_rejected("T", 0, 2, "Row 3: unknown load pattern 'LLx'");
        assert!(error.to_string().ends_with("Import log: Row 3: unknown load pattern 'LLx'"));

        let silent = TransferError::apply_rejected("T", 1, 0, "   ");
        assert_eq!(silent.to_string(), "Model returned error code 1 (0 fatal) when applying 'T'.");
    }

    #[test]
    fn test_error_codes_and_categories() {
        assert_eq!(TransferError::connectivity("SAFE").error_code(), "CONNECTIVITY");
        assert_eq!(TransferError::stage_rejected("T", 4).category(), ErrorCategory::StageRejected);
        assert_eq!(TransferError::unknown_unit("force", "slug").category(), ErrorCategory::Conversion);
        assert!(TransferError::stage_rejected("T", 1).is_recoverable());
        assert!(!TransferError::apply_rejected("T", 1, 0, "").is_recoverable());
    }
}
