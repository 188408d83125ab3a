//! Row extraction: walk a mapping tree against one source row
//!
//! Missing columns, nulls and NaNs never produce placeholders, and a failed
//! cast only drops the field it belongs to.

use log::warn;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::mapping::MappingNode;

/// Nested JSON object mirroring the shape of the mapping table
pub type ExtractedRecord = Map<String, Value>;

/// A single scalar cell read from an input catalog
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SourceValue {
    /// Null and NaN both mean "no measurement"
    pub fn is_absent(&self) -> bool {
        match self {
            SourceValue::Null => true,
            SourceValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }
}

impl fmt::Display for SourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceValue::Null => write!(f, "null"),
            SourceValue::Bool(b) => write!(f, "{}", b),
            SourceValue::Int(i) => write!(f, "{}", i),
            SourceValue::Float(x) => write!(f, "{}", x),
            SourceValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for SourceValue {
    fn from(value: f64) -> Self {
        SourceValue::Float(value)
    }
}

impl From<i64> for SourceValue {
    fn from(value: i64) -> Self {
        SourceValue::Int(value)
    }
}

impl From<bool> for SourceValue {
    fn from(value: bool) -> Self {
        SourceValue::Bool(value)
    }
}

impl From<&str> for SourceValue {
    fn from(value: &str) -> Self {
        SourceValue::Text(value.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(value: String) -> Self {
        SourceValue::Text(value)
    }
}

impl<T: Into<SourceValue>> From<Option<T>> for SourceValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SourceValue::Null, Into::into)
    }
}

/// One input row keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    cells: HashMap<String, SourceValue>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy when assembling rows by hand
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SourceValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SourceValue>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&SourceValue> {
        self.cells.get(column)
    }

    /// Present and not null/NaN
    pub fn value(&self, column: &str) -> Option<&SourceValue> {
        self.cells.get(column).filter(|v| !v.is_absent())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }
}

impl FromIterator<(String, SourceValue)> for SourceRow {
    fn from_iter<I: IntoIterator<Item = (String, SourceValue)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Extract a nested record from `row` following `mapping`.
///
/// A leaf mapping yields an empty record; callers always pass the root group.
pub fn extract(row: &SourceRow, mapping: &MappingNode) -> ExtractedRecord {
    let mut obj = Map::new();
    if let MappingNode::Group(children) = mapping {
        for (key, node) in children {
            if let Some(value) = extract_node(row, node) {
                obj.insert((*key).to_string(), value);
            }
        }
    }
    obj
}

fn extract_node(row: &SourceRow, node: &MappingNode) -> Option<Value> {
    match node {
        MappingNode::Group(_) => {
            let nested = extract(row, node);
            if nested.is_empty() {
                None
            } else {
                Some(Value::Object(nested))
            }
        }
        MappingNode::Leaf { column: None, .. } => None,
        MappingNode::Leaf {
            column: Some(column),
            cast,
        } => {
            let raw = row.value(column)?;
            match cast.apply(raw) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Failed casting {} with value {}", column, raw);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{multiband_mapping, Cast, MappingNode as N};
    use serde_json::json;

    fn small_mapping() -> N {
        N::group(vec![
            ("id", N::col("object_id", Cast::IntThenText)),
            ("ra", N::col("ra", Cast::Float)),
            ("nucleus", N::col("is_nucleated", Cast::Bool)),
            ("isActive", N::unsourced(Cast::Bool)),
            (
                "phot",
                N::group(vec![
                    ("mag", N::col("mag_g", Cast::Float)),
                    ("err", N::col("mag_err_g", Cast::Float)),
                ]),
            ),
        ])
    }

    #[test]
    fn test_extract_full_row() {
        let row = SourceRow::new()
            .with("object_id", 1234.0)
            .with("ra", 150.25)
            .with("is_nucleated", true)
            .with("mag_g", 21.5)
            .with("mag_err_g", 0.05);

        let record = extract(&row, &small_mapping());
        assert_eq!(
            Value::Object(record),
            json!({
                "id": "1234",
                "ra": 150.25,
                "nucleus": true,
                "phot": {"mag": 21.5, "err": 0.05}
            })
        );
    }

    #[test]
    fn test_absent_values_are_dropped() {
        let row = SourceRow::new()
            .with("object_id", "abc")
            .with("ra", f64::NAN)
            .with("is_nucleated", SourceValue::Null);

        let record = extract(&row, &small_mapping());
        assert_eq!(Value::Object(record), json!({"id": "abc"}));
    }

    #[test]
    fn test_zero_and_false_are_kept() {
        let row = SourceRow::new()
            .with("ra", 0.0)
            .with("is_nucleated", false)
            .with("object_id", "");

        let record = extract(&row, &small_mapping());
        assert_eq!(record["ra"], json!(0.0));
        assert_eq!(record["nucleus"], json!(false));
        assert_eq!(record["id"], json!(""));
    }

    #[test]
    fn test_cast_failure_keeps_siblings() {
        let row = SourceRow::new()
            .with("object_id", 7_i64)
            .with("ra", "not-a-number")
            .with("mag_g", "bad")
            .with("mag_err_g", 0.1);

        let record = extract(&row, &small_mapping());
        assert!(!record.contains_key("ra"));
        assert_eq!(record["id"], json!("7"));
        assert_eq!(record["phot"], json!({"err": 0.1}));
    }

    #[test]
    fn test_empty_group_is_omitted() {
        let row = SourceRow::new().with("object_id", 1_i64).with("mag_g", "x");
        let record = extract(&row, &small_mapping());
        assert!(!record.contains_key("phot"));
    }

    #[test]
    fn test_unsourced_fields_never_appear() {
        let row = SourceRow::new().with("isActive", true);
        let record = extract(&row, &small_mapping());
        assert!(record.is_empty());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let table = multiband_mapping();
        let row = SourceRow::new()
            .with("coadd_object_id", 61407318_i64)
            .with("ra", 10.0)
            .with("dec", -3.0)
            .with("mag_auto_y", 22.1)
            .with("n_thur", 1.2);

        let first = extract(&row, &table);
        let second = extract(&row, &table);
        assert_eq!(first, second);
        assert_eq!(
            first["photometry"],
            json!({"y": {"source_extractor": {"mag_auto": 22.1}}})
        );
    }
}
