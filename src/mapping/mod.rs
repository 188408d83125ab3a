//! Column mapping from survey catalog columns to the ingestion schema
//!
//! A mapping is a tree: groups hold named children in declaration order, and
//! leaves name the source column (if any) together with the conversion that
//! turns the raw cell into a JSON value.

mod table;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::extract::SourceValue;

pub use table::{multiband_mapping, single_band_mapping};

/// Named scalar conversions applied to source cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cast {
    /// Any scalar to its textual form
    Text,
    /// Numeric or numeric-looking text to a finite float
    Float,
    /// Boolean, number, or boolean-looking text to a boolean
    Bool,
    /// Integer text when the value is integral, otherwise plain text
    IntThenText,
}

/// Failure to convert a source value with a [`Cast`]
#[derive(Debug, Clone, PartialEq)]
pub struct CastError {
    pub cast: Cast,
    pub value: String,
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot cast {:?} with {:?}", self.value, self.cast)
    }
}

impl std::error::Error for CastError {}

impl Cast {
    /// Convert a present (non-null) value. Absent values never reach this point.
    pub fn apply(self, value: &SourceValue) -> Result<Value, CastError> {
        let fail = || CastError {
            cast: self,
            value: value.to_string(),
        };

        match self {
            Cast::Float => {
                let f = match value {
                    SourceValue::Float(f) => *f,
                    SourceValue::Int(i) => *i as f64,
                    SourceValue::Bool(b) => {
                        if *b {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    SourceValue::Text(s) => s.trim().parse::<f64>().map_err(|_| fail())?,
                    SourceValue::Null => return Err(fail()),
                };
                // JSON has no representation for NaN or infinities
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(fail)
            }
            Cast::Bool => match value {
                SourceValue::Bool(b) => Ok(Value::Bool(*b)),
                SourceValue::Int(i) => Ok(Value::Bool(*i != 0)),
                SourceValue::Float(f) => Ok(Value::Bool(*f != 0.0)),
                SourceValue::Text(s) => parse_bool_text(s).map(Value::Bool).ok_or_else(fail),
                SourceValue::Null => Err(fail()),
            },
            Cast::Text => match value {
                SourceValue::Null => Err(fail()),
                other => Ok(Value::String(other.to_string())),
            },
            Cast::IntThenText => match value {
                SourceValue::Int(i) => Ok(Value::String(i.to_string())),
                SourceValue::Float(f) => {
                    let truncated = f.trunc();
                    if (-I64_BOUND..I64_BOUND).contains(&truncated) {
                        Ok(Value::String((truncated as i64).to_string()))
                    } else {
                        Ok(Value::String(f.to_string()))
                    }
                }
                SourceValue::Text(s) => match s.trim().parse::<i64>() {
                    Ok(i) => Ok(Value::String(i.to_string())),
                    Err(_) => Ok(Value::String(s.clone())),
                },
                SourceValue::Bool(b) => Ok(Value::String(u8::from(*b).to_string())),
                SourceValue::Null => Err(fail()),
            },
        }
    }
}

/// 2^63; `i64::MAX as f64` rounds up to this, so the range is half-open
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn parse_bool_text(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// One node of the mapping tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MappingNode {
    /// A single destination field; `column: None` marks a field that is never sourced
    Leaf { column: Option<String>, cast: Cast },
    /// Named children, kept in declaration order
    Group(#[serde(serialize_with = "serialize_group")] Vec<(&'static str, MappingNode)>),
}

fn serialize_group<S>(
    children: &[(&'static str, MappingNode)],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(children.len()))?;
    for (key, node) in children {
        map.serialize_entry(key, node)?;
    }
    map.end()
}

impl MappingNode {
    /// Leaf reading `column`
    pub fn col(column: impl Into<String>, cast: Cast) -> Self {
        MappingNode::Leaf {
            column: Some(column.into()),
            cast,
        }
    }

    /// Leaf that is declared for the schema but has no source column
    pub fn unsourced(cast: Cast) -> Self {
        MappingNode::Leaf { column: None, cast }
    }

    pub fn group(children: Vec<(&'static str, MappingNode)>) -> Self {
        MappingNode::Group(children)
    }

    /// Look up a direct child of a group
    pub fn child(&self, key: &str) -> Option<&MappingNode> {
        match self {
            MappingNode::Group(children) => children
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, node)| node),
            MappingNode::Leaf { .. } => None,
        }
    }

    /// Every sourced column in the tree, in declaration order
    pub fn source_columns(&self) -> Vec<(&str, Cast)> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<(&'a str, Cast)>) {
        match self {
            MappingNode::Leaf {
                column: Some(column),
                cast,
            } => out.push((column.as_str(), *cast)),
            MappingNode::Leaf { column: None, .. } => {}
            MappingNode::Group(children) => {
                for (_, node) in children {
                    node.collect_columns(out);
                }
            }
        }
    }
}

/// Selectable mapping tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MappingProfile {
    /// Best-available-fit sersic columns for g, r and i
    #[default]
    Multiband,
    /// Plain per-band sersic columns, no pixel radius or x relative errors
    SingleBand,
}

impl MappingProfile {
    pub fn table(self) -> MappingNode {
        match self {
            MappingProfile::Multiband => multiband_mapping(),
            MappingProfile::SingleBand => single_band_mapping(),
        }
    }
}

impl FromStr for MappingProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiband" => Ok(MappingProfile::Multiband),
            "single-band" | "single_band" => Ok(MappingProfile::SingleBand),
            other => Err(format!("Unknown mapping profile: {}", other)),
        }
    }
}
