//! Record Reconciliation
//!
//! Business keys (set names, area names) compare case-insensitively. The two
//! directions deduplicate differently and must stay that way:
//!
//! - read side: rows group under the first spelling of a key, in order of
//!   first appearance, every member kept
//! - write side: one row per key, the last row seen supplies the values

use std::collections::HashMap;

use serde::Serialize;

use crate::errors::TransferResult;
use crate::units::{ConversionPolicy, QuantityKind, UnitConverter, UnitSystem};

use super::records::{LoadSetRecord, OutboundAssignment, OutboundLoadSetRow, SlabAssignment};

fn fold(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Case-insensitive key → value, ordered by first appearance of each key.
///
/// The display key is the first spelling seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedMap<V> {
    entries: Vec<(String, V)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl<V> Default for KeyedMap<V> {
    fn default() -> Self {
        KeyedMap {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> KeyedMap<V> {
    pub fn new() -> Self {
        KeyedMap::default()
    }

    fn slot(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        let folded = fold(key);
        let position = match self.index.get(&folded) {
            Some(&position) => position,
            None => {
                self.entries.push((key.trim().to_string(), make()));
                let position = self.entries.len() - 1;
                self.index.insert(folded, position);
                position
            }
        };
        &mut self.entries[position].1
    }

    /// Insert unless the key is present. Returns whether it was inserted.
    pub fn insert_first(&mut self, key: &str, value: V) -> bool {
        if self.contains_key(key) {
            return false;
        }
        self.slot(key, || value);
        true
    }

    /// Insert or replace the value, keeping the key's original position
    pub fn insert_last(&mut self, key: &str, value: V) {
        let folded = fold(key);
        match self.index.get(&folded) {
            Some(&position) => self.entries[position].1 = value,
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push((key.trim().to_string(), value));
            }
        }
    }

    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        self.slot(key, make)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(&fold(key)).map(|&position| &self.entries[position].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let position = *self.index.get(&fold(key))?;
        Some(&mut self.entries[position].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(&fold(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.entries.iter_mut().map(|(key, value)| (key.as_str(), value))
    }

    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.entries.into_iter().map(|(_, value)| value)
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, V)> {
        self.entries.into_iter()
    }
}

/// Group rows by key, first appearance order, all members in original order
pub fn group_by_key<T>(rows: impl IntoIterator<Item = T>, key: impl Fn(&T) -> &str) -> KeyedMap<Vec<T>> {
    let mut groups = KeyedMap::new();
    for row in rows {
        let k = key(&row).to_string();
        groups.get_or_insert_with(&k, Vec::new).push(row);
    }
    groups
}

/// One row per key in first-appearance order.
///
/// The first row of a key is kept, so its spelling of the key is what gets
/// written; `take_values` copies the non-key values of each later row into it.
pub fn dedup_last_wins<T>(
    rows: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> String,
    take_values: impl Fn(&mut T, T),
) -> Vec<T> {
    let mut latest: KeyedMap<T> = KeyedMap::new();
    for row in rows {
        let k = key(&row);
        match latest.get_mut(&k) {
            Some(kept) => take_values(kept, row),
            None => latest.insert_last(&k, row),
        }
    }
    latest.into_values().collect()
}

/// Convert selected records into target rows with an already computed area
/// load factor.
///
/// The records themselves are left untouched. Rows repeating a (set, pattern)
/// pair collapse into one, keyed by the first spelling, valued by the last.
pub fn build_load_set_rows(records: &[LoadSetRecord], factor: f64) -> Vec<OutboundLoadSetRow> {
    let rows = records.iter().map(|record| OutboundLoadSetRow {
        set_name: record.set_name.clone(),
        load_pattern: record.load_pattern.clone(),
        magnitude: record.magnitude * factor,
    });
    dedup_last_wins(
        rows,
        |row| format!("{}\u{0}{}", row.set_name, row.load_pattern),
        |kept, later| kept.magnitude = later.magnitude,
    )
}

/// Strict area load factor between two unit systems
pub fn area_load_factor(converter: &UnitConverter, source: &UnitSystem, target: &UnitSystem) -> TransferResult<f64> {
    let factor = converter.quantity_scale_factor(QuantityKind::AreaLoad, source, target, ConversionPolicy::Strict)?;
    tracing::debug!(factor, source = %source.summary(), target = %target.summary(), "area load factor");
    Ok(factor)
}

/// Assignments to write: rows without a target area or set are dropped,
/// then one row per target area. The first spelling of the area name is
/// kept and the last set assigned to it wins.
pub fn build_assignment_rows(slabs: &[SlabAssignment]) -> Vec<OutboundAssignment> {
    let rows = slabs
        .iter()
        .filter(|slab| slab.is_transferable())
        .map(|slab| OutboundAssignment {
            target_unique_name: slab.target_unique_name.trim().to_string(),
            load_set: slab.assigned_set.trim().to_string(),
        });
    dedup_last_wins(
        rows,
        |row| row.target_unique_name.clone(),
        |kept, later| kept.load_set = later.load_set,
    )
}
