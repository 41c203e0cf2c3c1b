//! Model information shown alongside a transfer: file name and present units.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tables::ServiceResult;
use crate::units::{area_load_unit_label, UnitSystem};

/// Shown when a model has not been saved to a file
pub const UNSAVED_MODEL: &str = "(Unsaved Model)";

/// Identity and unit queries of one attached model
pub trait ModelInfoSource {
    /// Full path of the model file, blank when unsaved
    fn model_file_path(&self) -> ServiceResult<String>;

    /// Units the model currently presents values in
    fn present_units(&self) -> ServiceResult<UnitSystem>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub file_name: String,
    pub units: UnitSystem,
    /// Whether `units` came from the model rather than placeholders
    pub units_known: bool,
}

impl ModelInfo {
    /// Read model info, substituting placeholders for anything unavailable
    pub fn read<M: ModelInfoSource + ?Sized>(model: &M) -> Self {
        let file_name = model
            .model_file_path()
            .ok()
            .map(|path| display_file_name(&path))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNSAVED_MODEL.to_string());

        let (units, units_known) = match model.present_units() {
            Ok(units) => (units, true),
            Err(status) => {
                tracing::debug!(%status, "present units unavailable");
                (UnitSystem::placeholder(), false)
            }
        };

        ModelInfo {
            file_name,
            units,
            units_known,
        }
    }

    /// Area load label in present units, e.g. `"kN/m²"`
    pub fn area_load_label(&self) -> String {
        if !self.units_known {
            return area_load_unit_label("", "");
        }
        area_load_unit_label(&self.units.force, &self.units.length)
    }
}

/// File name without its directory; the input itself when it has none
fn display_file_name(path: &str) -> String {
    let trimmed = path.trim();
    Path::new(trimmed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::ServiceStatus;

    struct Fixed {
        path: ServiceResult<String>,
        units: ServiceResult<UnitSystem>,
    }

    impl ModelInfoSource for Fixed {
        fn model_file_path(&self) -> ServiceResult<String> {
            self.path.clone()
        }

        fn present_units(&self) -> ServiceResult<UnitSystem> {
            self.units.clone()
        }
    }

    #[test]
    fn test_file_name_without_directory() {
        let info = ModelInfo::read(&Fixed {
            path: Ok("/projects/tower/Tower.EDB".to_string()),
            units: Ok(UnitSystem::new("kN", "m", "C")),
        });
        assert_eq!(info.file_name, "Tower.EDB");
        assert_eq!(info.units.summary(), "m-kN-C");
        assert_eq!(info.area_load_label(), "kN/m²");
    }

    #[test]
    fn test_fallbacks() {
        let info = ModelInfo::read(&Fixed {
            path: Ok("  ".to_string()),
            units: Err(ServiceStatus(1)),
        });
        assert_eq!(info.file_name, UNSAVED_MODEL);
        assert_eq!(info.units, UnitSystem::placeholder());
        assert_eq!(info.area_load_label(), "Force/Length²");

        let info = ModelInfo::read(&Fixed {
            path: Err(ServiceStatus(1)),
            units: Ok(UnitSystem::new("lb", "in", "F")),
        });
        assert_eq!(info.file_name, UNSAVED_MODEL);
        assert_eq!(info.area_load_label(), "lb/in²");
    }
}
