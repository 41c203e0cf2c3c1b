//! Load sets grouped by name, with the user's selection.

use serde::Serialize;

use crate::errors::{TransferError, TransferResult};

use super::reconcile::{group_by_key, KeyedMap};
use super::records::LoadSetRecord;

/// One load set and its (pattern, magnitude) rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSetGroup {
    pub name: String,
    pub records: Vec<LoadSetRecord>,
    pub pinned: bool,
}

impl LoadSetGroup {
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Load sets in order of first appearance in the source table
#[derive(Debug, Clone, Default)]
pub struct LoadSetTree {
    groups: KeyedMap<LoadSetGroup>,
}

impl LoadSetTree {
    pub fn from_records(records: Vec<LoadSetRecord>) -> Self {
        let mut groups = KeyedMap::new();
        for (name, records) in group_by_key(records, |r| r.set_name.as_str()).into_entries() {
            let group = LoadSetGroup {
                name: name.clone(),
                records,
                pinned: false,
            };
            groups.insert_first(&name, group);
        }
        LoadSetTree { groups }
    }

    pub fn groups(&self) -> impl Iterator<Item = &LoadSetGroup> {
        self.groups.iter().map(|(_, group)| group)
    }

    pub fn group(&self, name: &str) -> Option<&LoadSetGroup> {
        self.groups.get(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Pin or unpin one set by name (case-insensitive)
    pub fn set_pinned(&mut self, name: &str, pinned: bool) -> TransferResult<()> {
        match self.groups.get_mut(name) {
            Some(group) => {
                group.pinned = pinned;
                Ok(())
            }
            None => Err(TransferError::invalid_input("set_name", name, "No load set with this name")),
        }
    }

    pub fn select_all(&mut self) {
        for (_, group) in self.groups.iter_mut() {
            group.pinned = true;
        }
    }

    pub fn deselect_all(&mut self) {
        for (_, group) in self.groups.iter_mut() {
            group.pinned = false;
        }
    }

    /// Pin exactly the named sets. Fails on the first unknown name and leaves
    /// the selection unchanged.
    pub fn select_only<S: AsRef<str>>(&mut self, names: &[S]) -> TransferResult<()> {
        if let Some(unknown) = names.iter().find(|name| !self.groups.contains_key(name.as_ref())) {
            return Err(TransferError::invalid_input(
                "set_name",
                unknown.as_ref(),
                "No load set with this name",
            ));
        }
        self.deselect_all();
        for name in names {
            self.set_pinned(name.as_ref(), true)?;
        }
        Ok(())
    }

    /// Records of pinned sets, sets ordered by name (case-insensitive),
    /// each set's records in source order
    pub fn selected_records(&self) -> Vec<LoadSetRecord> {
        let mut pinned: Vec<&LoadSetGroup> = self.groups().filter(|g| g.pinned && g.has_records()).collect();
        pinned.sort_by_key(|g| g.name.to_lowercase());
        pinned.into_iter().flat_map(|g| g.records.iter().cloned()).collect()
    }

    /// Names of sets that have rows
    pub fn set_names(&self) -> Vec<String> {
        self.groups()
            .filter(|g| g.has_records())
            .map(|g| g.name.clone())
            .collect()
    }
}
