//! Unit Basis Registry
//!
//! Maps unit labels to multipliers into one canonical unit per dimension
//! (newton, meter, Celsius degree of difference). The registry is built once
//! and passed into the conversion engine; tests can build their own.

use std::collections::HashMap;

use super::Dimension;

const FORCE_TO_NEWTON: &[(&str, f64)] = &[
    ("N", 1.0),
    ("kN", 1_000.0),
    ("MN", 1_000_000.0),
    ("lb", 4.4482216152605),
    ("kip", 4_448.2216152605),
    ("kgf", 9.80665),
    ("Tonf", 9_806.65),
];

const LENGTH_TO_METER: &[(&str, f64)] = &[
    ("m", 1.0),
    ("cm", 0.01),
    ("mm", 0.001),
    ("ft", 0.3048),
    ("in", 0.0254),
];

// Differences only: K and C share a step, F is 5/9 of it.
const TEMPERATURE_TO_CELSIUS_DELTA: &[(&str, f64)] = &[
    ("C", 1.0),
    ("K", 1.0),
    ("F", 5.0 / 9.0),
];

#[derive(Debug, Clone)]
struct BasisEntry {
    label: String,
    multiplier: f64,
}

/// Immutable table of canonical-unit multipliers.
///
/// Lookups trim whitespace and ignore case.
///
/// # Example
/// ```
/// use loadset_core::units::{Dimension, UnitBasisRegistry};
///
/// let registry = UnitBasisRegistry::standard();
/// assert_eq!(registry.lookup(Dimension::Length, " MM "), Some(0.001));
/// assert_eq!(registry.lookup(Dimension::Force, "slug"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct UnitBasisRegistry {
    tables: HashMap<Dimension, HashMap<String, BasisEntry>>,
}

impl UnitBasisRegistry {
    /// Registry with no units at all
    pub fn empty() -> Self {
        UnitBasisRegistry::default()
    }

    /// Registry holding the units both structural models report
    pub fn standard() -> Self {
        let mut registry = UnitBasisRegistry::empty();
        for (dimension, table) in [
            (Dimension::Force, FORCE_TO_NEWTON),
            (Dimension::Length, LENGTH_TO_METER),
            (Dimension::TemperatureDelta, TEMPERATURE_TO_CELSIUS_DELTA),
        ] {
            for &(label, multiplier) in table {
                registry.insert(dimension, label, multiplier);
            }
        }
        registry
    }

    /// Builder-style registration; replaces an existing label
    pub fn with_unit(mut self, dimension: Dimension, label: &str, multiplier: f64) -> Self {
        self.insert(dimension, label, multiplier);
        self
    }

    fn insert(&mut self, dimension: Dimension, label: &str, multiplier: f64) {
        let label = label.trim();
        self.tables.entry(dimension).or_default().insert(
            label.to_lowercase(),
            BasisEntry {
                label: label.to_string(),
                multiplier,
            },
        );
    }

    /// Multiplier expressing `label` in the canonical unit of `dimension`.
    ///
    /// Blank or unknown labels return `None`; callers decide whether that is
    /// fatal.
    pub fn lookup(&self, dimension: Dimension, label: &str) -> Option<f64> {
        let key = label.trim();
        if key.is_empty() {
            return None;
        }
        self.tables
            .get(&dimension)?
            .get(&key.to_lowercase())
            .map(|entry| entry.multiplier)
    }

    /// Whether `label` is registered for `dimension`
    pub fn contains(&self, dimension: Dimension, label: &str) -> bool {
        self.lookup(dimension, label).is_some()
    }

    /// Registered labels for a dimension, sorted case-insensitively
    pub fn labels(&self, dimension: Dimension) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .tables
            .get(&dimension)
            .map(|table| table.values().map(|entry| entry.label.as_str()).collect())
            .unwrap_or_default();
        labels.sort_by_key(|label| label.to_lowercase());
        labels
    }
}
