//! # Geometry Correlation
//!
//! Area objects in two models share no identifiers, so an area is matched by
//! the plan coordinates of its control points, formatted
//! `"[x1,y1]-[x2,y2]-...-[xn,yn]"` in the order the model returns them.
//!
//! Coordinates are written with up to 15 significant digits in invariant
//! format, so identical geometry in both models yields identical keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tables::ServiceResult;

/// A selected area object in the source model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaIdentifier {
    pub guid: String,
    pub unique_name: String,
    pub label: String,
}

/// A point in plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanPoint {
    pub fn new(x: f64, y: f64) -> Self {
        PlanPoint { x, y }
    }
}

/// Area geometry queries of one attached model
pub trait GeometryService {
    /// Area objects currently selected by the user
    fn selected_areas(&self) -> ServiceResult<Vec<AreaIdentifier>>;

    /// Unique names of every area object
    fn area_names(&self) -> ServiceResult<Vec<String>>;

    /// Control points of one area, in model order
    fn area_points(&self, unique_name: &str) -> ServiceResult<Vec<PlanPoint>>;
}

/// Selected areas, deduplicated by unique name (case-insensitive, first wins).
///
/// Blank unique names are skipped and a blank label falls back to the
/// unique name. A failed query yields no areas.
pub fn selected_area_identifiers<G: GeometryService + ?Sized>(geometry: &G) -> Vec<AreaIdentifier> {
    let areas = match geometry.selected_areas() {
        Ok(areas) => areas,
        Err(status) => {
            tracing::debug!(%status, "selection query failed");
            return Vec::new();
        }
    };

    let mut seen = std::collections::HashSet::new();
    areas
        .into_iter()
        .filter(|area| !area.unique_name.trim().is_empty())
        .filter(|area| seen.insert(area.unique_name.to_lowercase()))
        .map(|mut area| {
            if area.label.trim().is_empty() {
                area.label = area.unique_name.clone();
            }
            area
        })
        .collect()
}

/// Format a coordinate like .NET's `G15`: up to 15 significant digits,
/// trailing zeros dropped, scientific notation below `1e-4` or from `1e15`.
pub fn format_g15(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
        } else {
            "0".to_string()
        };
    }

    let scientific = format!("{value:.14e}");
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..15).contains(&exponent) {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}E{sign}{:02}", exponent.abs());
    }

    let decimals = (14 - exponent).max(0) as usize;
    trim_fraction(&format!("{value:.decimals$}")).to_string()
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Correlation key for an ordered list of control points, `None` when empty
pub fn control_point_key(points: &[PlanPoint]) -> Option<String> {
    if points.is_empty() {
        return None;
    }
    let parts: Vec<String> = points
        .iter()
        .map(|p| format!("[{},{}]", format_g15(p.x), format_g15(p.y)))
        .collect();
    Some(parts.join("-"))
}

/// Key of one area, `None` when the area or its points are unavailable
pub fn area_key<G: GeometryService + ?Sized>(geometry: &G, unique_name: &str) -> Option<String> {
    if unique_name.trim().is_empty() {
        return None;
    }
    geometry
        .area_points(unique_name)
        .ok()
        .and_then(|points| control_point_key(&points))
}

/// Control point key → unique names of one model's areas.
///
/// Keys compare case-insensitively; names keep model order without
/// case-insensitive duplicates.
#[derive(Debug, Clone, Default)]
pub struct ControlPointIndex {
    entries: HashMap<String, Vec<String>>,
}

impl ControlPointIndex {
    /// Index every area of a model. Lookup failures leave what was gathered.
    pub fn build<G: GeometryService + ?Sized>(geometry: &G) -> Self {
        let mut index = ControlPointIndex::default();
        let names = match geometry.area_names() {
            Ok(names) => names,
            Err(status) => {
                tracing::debug!(%status, "area list query failed");
                return index;
            }
        };

        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            if let Some(key) = area_key(geometry, name) {
                index.insert(&key, name);
            }
        }
        index
    }

    fn insert(&mut self, key: &str, unique_name: &str) {
        let names = self.entries.entry(key.to_lowercase()).or_default();
        if !names.iter().any(|n| n.eq_ignore_ascii_case(unique_name)) {
            names.push(unique_name.to_string());
        }
    }

    pub fn matches(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First area sharing `key`
    pub fn first_match(&self, key: &str) -> Option<&str> {
        self.matches(key).first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
