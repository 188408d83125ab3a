//! galaxy_ingest: load galaxy survey catalogs into a remote ingestion endpoint
//!
//! Rows are read from parquet or CSV catalogs (or generated as mock galaxies),
//! mapped onto the ingestion schema, grouped into batches and POSTed to
//! `{base_url}/ingest/galaxies`. Each batch is committed or rolled back as a
//! unit by the endpoint, so a failed run can be resumed from a row offset.

use thiserror::Error;

pub mod client;
pub mod config;
pub mod extract;
pub mod logging;
pub mod mapping;
pub mod mock;
pub mod prompt;
pub mod reader;
pub mod shape;
pub mod uploader;

// Re-export commonly used types
pub use client::{BatchSink, HttpIngestClient, IngestResponse, RawResponse};
pub use config::{ConfigSource, ConfigSources, IngestConfig};
pub use extract::{extract, ExtractedRecord, SourceRow, SourceValue};
pub use mapping::{Cast, MappingNode, MappingProfile};
pub use reader::{open_catalog, InputTable};
pub use shape::{prepare_row, shape, ShapedRecord};
pub use uploader::{FailurePoint, IngestStats, RunOutcome, UploadOptions, Uploader};

/// Main error type for galaxy ingestion
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Row {row}: {message}")]
    Row { row: usize, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fixed path of the ingestion route, appended to the configured base URL
pub const INGEST_PATH: &str = "/ingest/galaxies";
