//! Column layouts of the two transferred tables.
//!
//! Read and write patterns differ because the source and target models name
//! their columns differently. Within each list the more specific patterns
//! come first.
//!
//! The generic `"set"` token on the assignment load-set column is the last
//! resort after the multi-word tokens. A future column whose key contains
//! "set" and precedes the real one would be picked up instead.

use crate::tables::{FieldPattern, Token};

pub const SET_NAME: &str = "SetName";
pub const LOAD_PATTERN: &str = "LoadPattern";
pub const VALUE: &str = "Value";
pub const AREA_NAME: &str = "AreaName";
pub const LOAD_SET: &str = "LoadSet";

const LOAD_PATTERN_TOKENS: &[Token] = &[Token::Contains("pattern"), Token::Contains("loadpat")];
const VALUE_TOKENS: &[Token] = &[Token::Contains("value"), Token::Contains("magnitude"), Token::Contains("val")];

/// Load-set rows as read from the source model
pub const LOAD_SET_READ: &[FieldPattern] = &[
    FieldPattern::new(
        SET_NAME,
        &[Token::AllOf(&["set", "name"]), Token::Exact("name"), Token::Suffix(".name")],
    ),
    FieldPattern::new(LOAD_PATTERN, LOAD_PATTERN_TOKENS),
    FieldPattern::new(VALUE, VALUE_TOKENS),
];

/// Load-set rows as written to the target model
pub const LOAD_SET_WRITE: &[FieldPattern] = &[
    FieldPattern::new(SET_NAME, &[Token::Contains("name"), Token::Contains("set")]),
    FieldPattern::new(LOAD_PATTERN, LOAD_PATTERN_TOKENS),
    FieldPattern::new(VALUE, VALUE_TOKENS),
];

/// Area assignment rows as read from the source model
pub const ASSIGNMENT_READ: &[FieldPattern] = &[
    FieldPattern::new(
        AREA_NAME,
        &[
            Token::AllOf(&["unique", "name"]),
            Token::AllOf(&["area", "name"]),
            Token::AllOf(&["object", "name"]),
            Token::Exact("name"),
            Token::Suffix(".name"),
        ],
    ),
    FieldPattern::new(
        LOAD_SET,
        &[
            Token::Contains("load set"),
            Token::Contains("uniform load set"),
            Token::Contains("uload set"),
            Token::Excluding {
                needle: "set",
                except: "unique",
            },
        ],
    ),
];

/// Area assignment rows as written to the target model
pub const ASSIGNMENT_WRITE: &[FieldPattern] = &[
    FieldPattern::new(
        AREA_NAME,
        &[
            Token::Contains("unique"),
            Token::Contains("area"),
            Token::Contains("object"),
            Token::Contains("name"),
        ],
    ),
    FieldPattern::new(
        LOAD_SET,
        &[
            Token::Contains("load set"),
            Token::Contains("uniform load set"),
            Token::Contains("uload set"),
            Token::Contains("set"),
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::FieldResolution;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_source_load_set_columns() {
        let fields = keys(&["Name", "LoadPattern", "Value"]);
        let resolution = FieldResolution::resolve_keys("T", 1, &fields, LOAD_SET_READ);
        assert_eq!(resolution.index(SET_NAME), Some(0));
        assert_eq!(resolution.index(LOAD_PATTERN), Some(1));
        assert_eq!(resolution.index(VALUE), Some(2));
    }

    #[test]
    fn test_target_load_set_columns() {
        let fields = keys(&["GUID", "SetName", "LoadPat", "Value"]);
        let resolution = FieldResolution::resolve_keys("T", 1, &fields, LOAD_SET_WRITE);
        assert_eq!(resolution.index(SET_NAME), Some(1));
        assert_eq!(resolution.index(LOAD_PATTERN), Some(2));
        assert_eq!(resolution.index(VALUE), Some(3));
    }

    #[test]
    fn test_assignment_columns_prefer_unique_name() {
        let fields = keys(&["Story", "Label", "UniqueName", "Load Set"]);
        let read = FieldResolution::resolve_keys("T", 1, &fields, ASSIGNMENT_READ);
        assert_eq!(read.index(AREA_NAME), Some(2));
        assert_eq!(read.index(LOAD_SET), Some(3));

        let fields = keys(&["UniqueName", "LoadSet"]);
        let write = FieldResolution::resolve_keys("T", 1, &fields, ASSIGNMENT_WRITE);
        assert_eq!(write.index(AREA_NAME), Some(0));
        assert_eq!(write.index(LOAD_SET), Some(1));
    }
}
