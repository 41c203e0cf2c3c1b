//! # Units
//!
//! Unit labels as the structural models report them, and the machinery to
//! convert magnitudes between two models' unit systems.
//!
//! - [`basis`] - Registry of base-unit multipliers (force, length, temperature delta)
//! - [`convert`] - Composes basis lookups into simple and derived scale factors
//!
//! Conversion always runs from the unit system a value was authored in
//! (the source model) to the receiving model's system; the returned factor
//! multiplies a source magnitude into a target magnitude.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use loadset_core::units::{QuantityKind, UnitBasisRegistry, UnitConverter, UnitQuantity, UnitSystem};
//!
//! let converter = UnitConverter::new(Arc::new(UnitBasisRegistry::standard()));
//! let source = UnitSystem::new("N", "mm", "C");
//! let target = UnitSystem::new("lb", "in", "F");
//!
//! let load = UnitQuantity::new(0.003, QuantityKind::AreaLoad, &source);
//! assert_eq!(load.unit_label(), "N/mm²");
//!
//! let converted = converter.convert(&load, &target).unwrap();
//! assert!((converted.magnitude() - 0.4351).abs() < 1e-4);
//! ```

pub mod basis;
pub mod convert;

pub use basis::UnitBasisRegistry;
pub use convert::{ConversionPolicy, PowerTerm, UnitConverter};

use serde::{Deserialize, Serialize};

/// Fallback label when a model's present units cannot be determined
pub const AREA_LOAD_FALLBACK_LABEL: &str = "Force/Length\u{00B2}";

/// Base physical dimension with a canonical unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// Canonical unit: newton
    Force,
    /// Canonical unit: meter
    Length,
    /// Canonical unit: one Celsius degree of difference
    TemperatureDelta,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Force, Dimension::Length, Dimension::TemperatureDelta];

    /// Lowercase name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Force => "force",
            Dimension::Length => "length",
            Dimension::TemperatureDelta => "temperature",
        }
    }

    /// Placeholder shown when a model does not report this unit
    pub fn placeholder(&self) -> &'static str {
        match self {
            Dimension::Force => "Force",
            Dimension::Length => "Length",
            Dimension::TemperatureDelta => "Temperature",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Kind of quantity carried by a magnitude.
///
/// Each kind is a power law over base dimensions. Adding a new derived
/// quantity only needs a new variant and its [`terms`](QuantityKind::terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityKind {
    Force,
    Length,
    TemperatureDelta,
    /// Force per unit area (uniform shell load)
    AreaLoad,
}

impl QuantityKind {
    /// Base dimensions and their exponents
    pub fn terms(&self) -> &'static [(Dimension, i32)] {
        match self {
            QuantityKind::Force => &[(Dimension::Force, 1)],
            QuantityKind::Length => &[(Dimension::Length, 1)],
            QuantityKind::TemperatureDelta => &[(Dimension::TemperatureDelta, 1)],
            QuantityKind::AreaLoad => &[(Dimension::Force, 1), (Dimension::Length, -2)],
        }
    }

    /// Display label of this kind in the given unit system
    pub fn unit_label(&self, system: &UnitSystem) -> String {
        match self {
            QuantityKind::Force => system.force.clone(),
            QuantityKind::Length => system.length.clone(),
            QuantityKind::TemperatureDelta => system.temperature.clone(),
            QuantityKind::AreaLoad => area_load_unit_label(&system.force, &system.length),
        }
    }
}

/// Present units of one model (force, length, temperature labels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSystem {
    pub force: String,
    pub length: String,
    pub temperature: String,
}

impl UnitSystem {
    pub fn new(force: impl Into<String>, length: impl Into<String>, temperature: impl Into<String>) -> Self {
        UnitSystem {
            force: force.into(),
            length: length.into(),
            temperature: temperature.into(),
        }
    }

    /// Placeholder system used when present units cannot be read
    pub fn placeholder() -> Self {
        UnitSystem::new(
            Dimension::Force.placeholder(),
            Dimension::Length.placeholder(),
            Dimension::TemperatureDelta.placeholder(),
        )
    }

    /// Label for one base dimension
    pub fn label(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Force => &self.force,
            Dimension::Length => &self.length,
            Dimension::TemperatureDelta => &self.temperature,
        }
    }

    /// Summary in the models' own order, e.g. `"m-kN-C"`
    pub fn summary(&self) -> String {
        format!("{}-{}-{}", self.length, self.force, self.temperature)
    }
}

impl Default for UnitSystem {
    fn default() -> Self {
        UnitSystem::placeholder()
    }
}

/// Area load label such as `"kN/m²"`.
///
/// Falls back to `"Force/Length²"` when either label is blank.
pub fn area_load_unit_label(force: &str, length: &str) -> String {
    let force = force.trim();
    let length = length.trim();
    if force.is_empty() || length.is_empty() {
        return AREA_LOAD_FALLBACK_LABEL.to_string();
    }
    format!("{force}/{length}\u{00B2}")
}

/// A magnitude tagged with the units it was authored in.
///
/// Immutable once constructed; conversion produces a new quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitQuantity {
    magnitude: f64,
    unit_label: String,
    kind: QuantityKind,
    system: UnitSystem,
}

impl UnitQuantity {
    pub fn new(magnitude: f64, kind: QuantityKind, system: &UnitSystem) -> Self {
        UnitQuantity {
            magnitude,
            unit_label: kind.unit_label(system),
            kind,
            system: system.clone(),
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn unit_label(&self) -> &str {
        &self.unit_label
    }

    pub fn kind(&self) -> QuantityKind {
        self.kind
    }

    pub fn system(&self) -> &UnitSystem {
        &self.system
    }
}
