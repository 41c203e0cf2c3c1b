//! Field Index Resolver
//!
//! Column keys differ between model versions ("SetName", "Name",
//! "Load Set", ...), so semantic fields are located by token matching
//! against the lowercased, trimmed keys of the schema at hand.
//!
//! Matching is first-key-wins: keys are scanned in schema order and the
//! first key matched by any token is taken. There is no scoring or
//! backtracking, so callers order their [`FieldPattern`]s most specific first.

use crate::errors::{TransferError, TransferResult};

use super::TableSchema;

/// One way a lowercased column key can match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Key contains the text
    Contains(&'static str),
    /// Key contains every listed text
    AllOf(&'static [&'static str]),
    /// Key equals the text
    Exact(&'static str),
    /// Key ends with the text
    Suffix(&'static str),
    /// Key contains `needle` but not `except`
    Excluding {
        needle: &'static str,
        except: &'static str,
    },
}

impl Token {
    /// Test a key already lowercased and trimmed
    pub fn matches(&self, key: &str) -> bool {
        match *self {
            Token::Contains(text) => key.contains(text),
            Token::AllOf(texts) => texts.iter().all(|text| key.contains(text)),
            Token::Exact(text) => key == text,
            Token::Suffix(text) => key.ends_with(text),
            Token::Excluding { needle, except } => key.contains(needle) && !key.contains(except),
        }
    }
}

/// Tokens locating one semantic field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPattern {
    pub field: &'static str,
    pub tokens: &'static [Token],
}

impl FieldPattern {
    pub const fn new(field: &'static str, tokens: &'static [Token]) -> Self {
        FieldPattern { field, tokens }
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Index of the first key matched by any token.
///
/// # Example
/// ```
/// use loadset_core::tables::{fields::resolve, Token};
///
/// let keys: Vec<String> = ["GUID", "SetName", "LoadPat", "Value"].iter().map(|k| k.to_string()).collect();
/// assert_eq!(resolve(&keys, &[Token::Contains("set"), Token::Contains("name")]), Some(1));
/// assert_eq!(resolve(&keys, &[Token::Contains("area")]), None);
/// ```
pub fn resolve(field_keys: &[String], tokens: &[Token]) -> Option<usize> {
    field_keys.iter().position(|key| {
        let key = normalize(key);
        tokens.iter().any(|token| token.matches(&key))
    })
}

/// Semantic field → column index for one schema fetch.
///
/// Fields resolve in pattern order and a column claimed by an earlier field
/// is not offered to later ones. Entries are valid indices or `None`; a new
/// schema always needs a new resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResolution {
    table_key: String,
    version: i32,
    field_count: usize,
    entries: Vec<(&'static str, Option<usize>)>,
}

impl FieldResolution {
    pub fn resolve(schema: &TableSchema, patterns: &[FieldPattern]) -> Self {
        Self::resolve_keys(&schema.table_key, schema.version, &schema.field_keys, patterns)
    }

    pub fn resolve_keys(table_key: &str, version: i32, field_keys: &[String], patterns: &[FieldPattern]) -> Self {
        let normalized: Vec<String> = field_keys.iter().map(|key| normalize(key)).collect();
        let mut claimed = vec![false; normalized.len()];
        let mut entries = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let index = normalized.iter().enumerate().position(|(i, key)| {
                !claimed[i] && pattern.tokens.iter().any(|token| token.matches(key))
            });
            if let Some(i) = index {
                claimed[i] = true;
            }
            entries.push((pattern.field, index));
        }

        FieldResolution {
            table_key: table_key.to_string(),
            version,
            field_count: field_keys.len(),
            entries,
        }
    }

    pub fn table_key(&self) -> &str {
        &self.table_key
    }

    /// Schema version this resolution was built against
    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn index(&self, field: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(name, _)| *name == field)
            .and_then(|(_, index)| *index)
    }

    /// Fields with no matching column, in pattern order
    pub fn unresolved(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(_, index)| index.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Fail with every missing field when any is unresolved
    pub fn require_all(&self) -> TransferResult<()> {
        let missing = self.unresolved();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TransferError::field_unresolved(&self.table_key, missing))
        }
    }
}
