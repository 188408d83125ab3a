//! HTTP client for the galaxy ingestion endpoint
//!
//! Each call sends one batch as `{"galaxies": [...]}` with a bearer token and
//! hands back the raw status and body; interpreting them is up to the caller.

use log::info;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::IngestConfig;
use crate::shape::ShapedRecord;
use crate::{IngestError, Result, INGEST_PATH};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest slice of a non-JSON body kept for diagnostics
const DETAIL_LIMIT: usize = 500;

/// Anything that can accept a batch of shaped records
pub trait BatchSink {
    /// Send one batch. `Err` means the request never produced a response.
    fn send(&mut self, galaxies: &[ShapedRecord]) -> Result<RawResponse>;
}

/// Status and body of an ingestion response
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Fields the endpoint may include in its JSON body. All are optional; older
/// deployments only report `inserted`. Each field is read on its own, so one
/// oddly typed field never hides the others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestResponse {
    pub success: Option<bool>,
    pub inserted: Option<u64>,
    pub skipped: Option<u64>,
    pub error: Option<Value>,
    pub detail: Option<Value>,
    pub rollback: Option<bool>,
}

impl IngestResponse {
    pub fn from_value(value: &Value) -> Self {
        Self {
            success: value.get("success").and_then(flag),
            inserted: value.get("inserted").and_then(count),
            skipped: value.get("skipped").and_then(count),
            error: value.get("error").filter(|v| !v.is_null()).cloned(),
            detail: value.get("detail").filter(|v| !v.is_null()).cloned(),
            rollback: value.get("rollback").and_then(flag),
        }
    }
}

/// Booleans, also accepted as `"true"` / `"false"` strings
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Non-negative whole numbers, including floats such as `3.0`
fn count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f < u64::MAX as f64)
            .map(|f| f as u64)
    })
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Parse the body, treating anything that is not a JSON object as empty
    pub fn parsed(&self) -> IngestResponse {
        match serde_json::from_str::<Value>(&self.body) {
            Ok(value) if value.is_object() => IngestResponse::from_value(&value),
            _ => IngestResponse::default(),
        }
    }

    /// HTTP 200 and no explicit `success: false`
    pub fn is_success(&self) -> bool {
        self.status == 200 && self.parsed().success.unwrap_or(true)
    }

    /// Short error message for operator output
    pub fn error_message(&self) -> String {
        self.parsed()
            .error
            .map(value_text)
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }

    /// Long error detail; falls back to the start of the body
    pub fn error_detail(&self) -> String {
        if let Some(detail) = self.parsed().detail {
            return value_text(detail);
        }
        if self.body.is_empty() {
            "No details".to_string()
        } else {
            self.body.chars().take(DETAIL_LIMIT).collect()
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[derive(Serialize)]
struct IngestPayload<'a> {
    galaxies: &'a [ShapedRecord],
}

/// Serialize a batch exactly as it goes over the wire
pub fn batch_payload(galaxies: &[ShapedRecord]) -> Result<String> {
    Ok(serde_json::to_string(&IngestPayload { galaxies })?)
}

/// Blocking HTTP implementation of [`BatchSink`]
pub struct HttpIngestClient {
    client: reqwest::blocking::Client,
    url: String,
    token: String,
}

impl HttpIngestClient {
    pub fn new(config: &IngestConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}{}", config.base_url, INGEST_PATH),
            token: config.token.clone(),
        })
    }

    /// Full endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl BatchSink for HttpIngestClient {
    fn send(&mut self, galaxies: &[ShapedRecord]) -> Result<RawResponse> {
        let body = batch_payload(galaxies)?;
        info!("POST {} with {} galaxies", self.url, galaxies.len());

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| IngestError::Http(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| IngestError::Http(format!("Failed to read response: {}", e)))?;

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_defaults() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(RawResponse::new(200, "not json").is_success());
        assert!(RawResponse::new(200, r#"{"inserted": 3}"#).is_success());
        assert!(!RawResponse::new(200, r#"{"success": false}"#).is_success());
        assert!(!RawResponse::new(500, r#"{"success": true}"#).is_success());
    }

    #[test]
    fn test_rich_response_fields() {
        let raw = RawResponse::new(
            200,
            r#"{"success": true, "inserted": 98, "skipped": 2, "totalInBatch": 100}"#,
        );
        let parsed = raw.parsed();
        assert_eq!(parsed.inserted, Some(98));
        assert_eq!(parsed.skipped, Some(2));
        assert_eq!(parsed.rollback, None);
    }

    #[test]
    fn test_error_message_and_detail() {
        let raw = RawResponse::new(
            500,
            r#"{"success": false, "error": "Batch ingestion failed", "detail": "duplicate id", "rollback": true}"#,
        );
        assert_eq!(raw.error_message(), "Batch ingestion failed");
        assert_eq!(raw.error_detail(), "duplicate id");
        assert_eq!(raw.parsed().rollback, Some(true));
    }

    #[test]
    fn test_mistyped_field_keeps_the_rest() {
        let raw = RawResponse::new(
            200,
            r#"{"success": false, "error": "duplicate", "inserted": 0.0}"#,
        );
        assert!(!raw.is_success());
        assert_eq!(raw.error_message(), "duplicate");
        assert_eq!(raw.parsed().inserted, Some(0));

        let raw = RawResponse::new(200, r#"{"success": false, "rollback": "true", "skipped": -1}"#);
        let parsed = raw.parsed();
        assert!(!raw.is_success());
        assert_eq!(parsed.rollback, Some(true));
        assert_eq!(parsed.skipped, None);

        let raw = RawResponse::new(200, r#"{"success": "yes please", "inserted": 5}"#);
        assert!(raw.is_success());
        assert_eq!(raw.parsed().inserted, Some(5));
    }

    #[test]
    fn test_non_object_body_is_empty() {
        assert_eq!(RawResponse::new(200, "[1, 2]").parsed(), IngestResponse::default());
        assert_eq!(RawResponse::new(200, "null").parsed(), IngestResponse::default());
    }

    #[test]
    fn test_error_fallbacks() {
        let raw = RawResponse::new(502, "x".repeat(800));
        assert_eq!(raw.error_message(), "HTTP 502");
        assert_eq!(raw.error_detail().len(), 500);

        assert_eq!(RawResponse::new(401, "").error_detail(), "No details");

        let structured = RawResponse::new(400, r#"{"error": {"code": 7}}"#);
        assert_eq!(structured.error_message(), r#"{"code":7}"#);
    }

    #[test]
    fn test_batch_payload_shape() {
        let mut galaxy = serde_json::Map::new();
        galaxy.insert("id".to_string(), json!("g1"));
        let record = ShapedRecord {
            galaxy: Some(galaxy),
            ..Default::default()
        };

        let payload: Value = serde_json::from_str(&batch_payload(&[record]).unwrap()).unwrap();
        assert_eq!(payload, json!({"galaxies": [{"galaxy": {"id": "g1"}}]}));
    }
}
