//! Transfer settings
//!
//! Loaded from `<config dir>/loadset/settings.toml`; missing keys take their
//! defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{TransferError, TransferResult};
use crate::tables::ALL_GROUP;

pub const DEFAULT_LOAD_SET_TABLE: &str = "Shell Uniform Load Sets";
pub const DEFAULT_ASSIGNMENT_TABLE: &str = "Area Load Assignments - Uniform Load Sets";

/// Table keys and write options used by every transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Load-set definition table, same key in both models
    pub load_set_table: String,

    /// Area assignment table, same key in both models
    pub assignment_table: String,

    /// Group filter for source reads
    pub group_filter: String,

    /// Ask the target model for an import log on apply
    pub fill_import_log: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            load_set_table: DEFAULT_LOAD_SET_TABLE.to_string(),
            assignment_table: DEFAULT_ASSIGNMENT_TABLE.to_string(),
            group_filter: ALL_GROUP.to_string(),
            fill_import_log: true,
        }
    }
}

impl TransferSettings {
    /// Default settings file location, `None` when the platform has no
    /// config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("loadset").join("settings.toml"))
    }

    /// Load from the default location; defaults when there is no file
    pub fn load() -> TransferResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file gives defaults, a malformed one is
    /// an error.
    pub fn load_from(path: &Path) -> TransferResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| TransferError::file_error("read settings", path.display().to_string(), e.to_string()))?;
        Self::from_toml(&contents).map_err(|e| match e {
            TransferError::SerializationError { reason } => {
                TransferError::serialization(format!("Invalid settings in {}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    pub fn from_toml(contents: &str) -> TransferResult<Self> {
        let settings: Self = toml::from_str(contents).map_err(|e| TransferError::serialization(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> TransferResult<String> {
        toml::to_string_pretty(self).map_err(|e| TransferError::serialization(e.to_string()))
    }

    /// Write settings, creating the parent directory
    pub fn save_to(&self, path: &Path) -> TransferResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TransferError::file_error("create directory", parent.display().to_string(), e.to_string()))?;
        }
        fs::write(path, self.to_toml()?)
            .map_err(|e| TransferError::file_error("write settings", path.display().to_string(), e.to_string()))
    }

    fn validate(&self) -> TransferResult<()> {
        for (field, value) in [
            ("load_set_table", &self.load_set_table),
            ("assignment_table", &self.assignment_table),
            ("group_filter", &self.group_filter),
        ] {
            if value.trim().is_empty() {
                return Err(TransferError::invalid_input(field, value.as_str(), "must not be blank"));
            }
        }
        Ok(())
    }
}
