//! Record shaping: regroup an extracted record into the ingestion wire shape
//!
//! The endpoint stores core galaxy attributes, per-band sersic fits, source
//! extractor measurements and Thuruthipilly fits in separate tables, so each
//! record is split along those lines before upload.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::extract::{extract, ExtractedRecord, SourceRow};
use crate::mapping::MappingNode;
use crate::{IngestError, Result};

/// Keys copied verbatim into the `galaxy` object
pub const GALAXY_CORE_KEYS: [&str; 14] = [
    "id",
    "ra",
    "dec",
    "reff",
    "reff_pixels",
    "q",
    "pa",
    "nucleus",
    "isActive",
    "redshift_x",
    "redshift_y",
    "x",
    "y",
    "misc",
];

/// Bands that must be present in `sourceExtractor` whenever it is sent
const REQUIRED_EXTRACTOR_BANDS: [&str; 3] = ["g", "r", "i"];
const OPTIONAL_EXTRACTOR_BANDS: [&str; 2] = ["y", "z"];

/// One galaxy in the form expected by `POST /ingest/galaxies`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapedRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub galaxy: Option<Map<String, Value>>,
    /// g band sersic fit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photometry_band: Option<Map<String, Value>>,
    #[serde(rename = "photometryBandR", skip_serializing_if = "Option::is_none")]
    pub photometry_band_r: Option<Map<String, Value>>,
    #[serde(rename = "photometryBandI", skip_serializing_if = "Option::is_none")]
    pub photometry_band_i: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_extractor: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thuruthipilly: Option<Map<String, Value>>,
}

impl ShapedRecord {
    /// Number of top-level keys that will be sent
    pub fn key_count(&self) -> usize {
        [
            &self.galaxy,
            &self.photometry_band,
            &self.photometry_band_r,
            &self.photometry_band_i,
            &self.source_extractor,
            &self.thuruthipilly,
        ]
        .iter()
        .filter(|part| part.is_some())
        .count()
    }

    /// No displayable data at all
    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }

    /// External galaxy identifier, if the row carried one
    pub fn galaxy_id(&self) -> Option<&str> {
        self.galaxy
            .as_ref()
            .and_then(|g| g.get("id"))
            .and_then(Value::as_str)
    }
}

fn non_empty(map: Map<String, Value>) -> Option<Map<String, Value>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

fn object<'a>(parent: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Map<String, Value>> {
    parent.and_then(|p| p.get(key)).and_then(Value::as_object)
}

/// Wrap a band's sersic group as `{ "sersic": {...} }`
fn sersic_band(photometry: Option<&Map<String, Value>>, band: &str) -> Option<Map<String, Value>> {
    let sersic = object(object(photometry, band), "sersic")?;
    if sersic.is_empty() {
        return None;
    }
    let mut wrapped = Map::new();
    wrapped.insert("sersic".to_string(), Value::Object(sersic.clone()));
    Some(wrapped)
}

fn source_extractor(photometry: Option<&Map<String, Value>>) -> Option<Map<String, Value>> {
    let band = |name: &str| {
        object(object(photometry, name), "source_extractor")
            .filter(|m| !m.is_empty())
            .cloned()
    };

    let has_any = REQUIRED_EXTRACTOR_BANDS
        .iter()
        .chain(OPTIONAL_EXTRACTOR_BANDS.iter())
        .any(|name| band(name).is_some());
    if !has_any {
        return None;
    }

    let mut out = Map::new();
    for name in REQUIRED_EXTRACTOR_BANDS {
        out.insert(
            name.to_string(),
            Value::Object(band(name).unwrap_or_default()),
        );
    }
    for name in OPTIONAL_EXTRACTOR_BANDS {
        if let Some(values) = band(name) {
            out.insert(name.to_string(), Value::Object(values));
        }
    }
    Some(out)
}

/// Regroup an extracted record into the wire shape, dropping empty parts
pub fn shape(extracted: &ExtractedRecord) -> ShapedRecord {
    let galaxy: Map<String, Value> = GALAXY_CORE_KEYS
        .iter()
        .filter_map(|key| extracted.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect();

    let photometry = object(Some(extracted), "photometry");

    ShapedRecord {
        galaxy: non_empty(galaxy),
        photometry_band: sersic_band(photometry, "g"),
        photometry_band_r: sersic_band(photometry, "r"),
        photometry_band_i: sersic_band(photometry, "i"),
        source_extractor: source_extractor(photometry),
        thuruthipilly: object(Some(extracted), "thuruthipilly")
            .filter(|m| !m.is_empty())
            .cloned(),
    }
}

/// Extract and shape one row, rejecting records the endpoint cannot accept
///
/// `row_index` is only used for the error message.
pub fn prepare_row(
    row: &SourceRow,
    mapping: &MappingNode,
    row_index: usize,
) -> Result<ShapedRecord> {
    let record = shape(&extract(row, mapping));
    if record.galaxy_id().is_none() {
        let message = if record.is_empty() {
            "row has no displayable data".to_string()
        } else {
            "row has no galaxy id".to_string()
        };
        return Err(IngestError::Row {
            row: row_index,
            message,
        });
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::multiband_mapping;
    use serde_json::json;

    fn full_row() -> SourceRow {
        SourceRow::new()
            .with("coadd_object_id", 61407318_i64)
            .with("ra", 35.2)
            .with("dec", -4.7)
            .with("sersic_reff_arcsec__best_available_fit", 3.1)
            .with("sersic_reff_pixels__best_available_fit", 11.8)
            .with("sersic_q__best_available_fit", 0.6)
            .with("sersic_PA__best_available_fit", 45.0)
            .with("is_nucleated", false)
            .with("sersic_mag__best_available_fit", 21.4)
            .with("sersic_mag_r__best_available_fit", 20.9)
            .with("sersic_mag_i__best_available_fit", 20.5)
            .with("mag_auto_g", 21.6)
            .with("mag_auto_z", 20.1)
            .with("paper", "Y3")
            .with("n_thur", 1.1)
    }

    #[test]
    fn test_shape_full_row() {
        let record = shape(&extract(&full_row(), &multiband_mapping()));

        assert_eq!(record.key_count(), 6);
        let galaxy = record.galaxy.as_ref().unwrap();
        assert_eq!(galaxy["id"], json!("61407318"));
        assert_eq!(galaxy["misc"], json!({"paper": "Y3"}));
        assert!(!galaxy.contains_key("photometry"));

        assert_eq!(
            Value::Object(record.photometry_band.clone().unwrap()),
            json!({"sersic": {"mag": 21.4}})
        );
        assert_eq!(
            Value::Object(record.source_extractor.clone().unwrap()),
            json!({"g": {"mag_auto": 21.6}, "r": {}, "i": {}, "z": {"mag_auto": 20.1}})
        );
        assert_eq!(
            Value::Object(record.thuruthipilly.clone().unwrap()),
            json!({"n": 1.1})
        );
    }

    #[test]
    fn test_wire_keys() {
        let record = shape(&extract(&full_row(), &multiband_mapping()));
        let json = serde_json::to_value(&record).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "galaxy",
                "photometryBand",
                "photometryBandI",
                "photometryBandR",
                "sourceExtractor",
                "thuruthipilly"
            ]
        );
    }

    #[test]
    fn test_missing_groups_are_dropped() {
        let row = SourceRow::new()
            .with("coadd_object_id", "G-1")
            .with("ra", 1.0);
        let record = shape(&extract(&row, &multiband_mapping()));

        assert_eq!(record.key_count(), 1);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"galaxy": {"id": "G-1", "ra": 1.0}}));
    }

    #[test]
    fn test_only_r_band_sersic() {
        let row = SourceRow::new()
            .with("coadd_object_id", 5_i64)
            .with("sersic_psf_mag_r__best_available_fit", 19.0);
        let record = shape(&extract(&row, &multiband_mapping()));

        assert!(record.photometry_band.is_none());
        assert!(record.photometry_band_i.is_none());
        assert_eq!(
            Value::Object(record.photometry_band_r.unwrap()),
            json!({"sersic": {"psf": {"mag": 19.0}}})
        );
        assert!(record.source_extractor.is_none());
    }

    #[test]
    fn test_prepare_row_requires_id() {
        let table = multiband_mapping();
        let row = SourceRow::new().with("ra", 10.0);
        match prepare_row(&row, &table, 17) {
            Err(IngestError::Row { row, message }) => {
                assert_eq!(row, 17);
                assert!(message.contains("galaxy id"));
            }
            other => panic!("expected row error, got {:?}", other),
        }

        let empty = SourceRow::new().with("ra", "garbage");
        let err = prepare_row(&empty, &table, 3).unwrap_err();
        assert!(err.to_string().contains("no displayable data"));

        assert!(prepare_row(&full_row(), &table, 0).is_ok());
    }
}
