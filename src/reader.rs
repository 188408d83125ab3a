//! Catalog readers for parquet, CSV and gzipped CSV inputs
//!
//! Every reader yields rows lazily as `Result<SourceRow>`, so a malformed row
//! surfaces as a per-row error instead of failing the whole file. The row
//! window (`offset`, `limit`) is applied before any row reaches the caller.

use log::{info, warn};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Field, Row};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::extract::{SourceRow, SourceValue};
use crate::{IngestError, Result};

/// Supported input encodings, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Parquet,
    Csv,
    CsvGz,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".parquet") || name.ends_with(".pq") {
            Ok(InputFormat::Parquet)
        } else if name.ends_with(".csv.gz") {
            Ok(InputFormat::CsvGz)
        } else if name.ends_with(".csv") {
            Ok(InputFormat::Csv)
        } else {
            Err(IngestError::Input(format!(
                "Unsupported input format: {} (expected .parquet, .csv or .csv.gz)",
                path.display()
            )))
        }
    }
}

type RowIter = Box<dyn Iterator<Item = Result<SourceRow>>>;

/// An opened catalog with its row window already applied
pub struct InputTable {
    pub path: PathBuf,
    pub format: InputFormat,
    /// Rows in the file before windowing
    pub source_rows: usize,
    /// Rows that will be yielded
    pub total_rows: usize,
    pub columns: Vec<String>,
    rows: RowIter,
}

impl std::fmt::Debug for InputTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputTable")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("source_rows", &self.source_rows)
            .field("total_rows", &self.total_rows)
            .field("columns", &self.columns.len())
            .finish()
    }
}

impl IntoIterator for InputTable {
    type Item = Result<SourceRow>;
    type IntoIter = RowIter;

    fn into_iter(self) -> Self::IntoIter {
        self.rows
    }
}

/// Number of rows left after skipping `offset` and capping at `limit`
pub fn window_len(source_rows: usize, offset: usize, limit: Option<usize>) -> usize {
    let remaining = source_rows.saturating_sub(offset);
    match limit {
        Some(limit) => remaining.min(limit),
        None => remaining,
    }
}

/// Open a catalog file and select the rows `[offset, offset + limit)`.
///
/// A `limit` of `Some(0)` means no limit.
pub fn open_catalog<P: AsRef<Path>>(
    path: P,
    offset: usize,
    limit: Option<usize>,
) -> Result<InputTable> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IngestError::Input(format!(
            "Input file not found: {}",
            path.display()
        )));
    }

    let limit = limit.filter(|&l| l > 0);
    let format = InputFormat::from_path(path)?;
    let table = match format {
        InputFormat::Parquet => open_parquet(path, offset, limit)?,
        InputFormat::Csv | InputFormat::CsvGz => open_csv(path, format, offset, limit)?,
    };

    info!(
        "Loaded {} rows from {} ({} columns)",
        table.source_rows,
        path.display(),
        table.columns.len()
    );
    if offset >= table.source_rows && table.source_rows > 0 {
        warn!(
            "Offset {} is past the end of the input ({} rows); nothing to ingest",
            offset, table.source_rows
        );
    } else if offset > 0 || limit.is_some() {
        info!(
            "Processing rows {} to {} ({} rows)",
            offset,
            offset + table.total_rows,
            table.total_rows
        );
    }

    Ok(table)
}

fn open_parquet(path: &Path, offset: usize, limit: Option<usize>) -> Result<InputTable> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;

    let metadata = reader.metadata().file_metadata();
    let source_rows = usize::try_from(metadata.num_rows()).unwrap_or(0);
    let columns = metadata
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let total_rows = window_len(source_rows, offset, limit);
    let rows = reader
        .into_iter()
        .skip(offset)
        .take(total_rows)
        .map(|row| row.map(|r| parquet_row(&r)).map_err(IngestError::from));

    Ok(InputTable {
        path: path.to_path_buf(),
        format: InputFormat::Parquet,
        source_rows,
        total_rows,
        columns,
        rows: Box::new(rows),
    })
}

fn parquet_row(row: &Row) -> SourceRow {
    row.get_column_iter()
        .map(|(name, field)| (name.clone(), field_value(field)))
        .collect()
}

/// Convert a parquet record field into a scalar cell
pub fn field_value(field: &Field) -> SourceValue {
    match field {
        Field::Null => SourceValue::Null,
        Field::Bool(b) => SourceValue::Bool(*b),
        Field::Byte(v) => SourceValue::Int(i64::from(*v)),
        Field::Short(v) => SourceValue::Int(i64::from(*v)),
        Field::Int(v) => SourceValue::Int(i64::from(*v)),
        Field::Long(v) => SourceValue::Int(*v),
        Field::UByte(v) => SourceValue::Int(i64::from(*v)),
        Field::UShort(v) => SourceValue::Int(i64::from(*v)),
        Field::UInt(v) => SourceValue::Int(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v)
            .map(SourceValue::Int)
            .unwrap_or(SourceValue::Float(*v as f64)),
        Field::Float(v) => SourceValue::Float(f64::from(*v)),
        Field::Double(v) => SourceValue::Float(*v),
        Field::Str(s) => SourceValue::Text(s.clone()),
        other => SourceValue::Text(other.to_string()),
    }
}

fn open_csv(
    path: &Path,
    format: InputFormat,
    offset: usize,
    limit: Option<usize>,
) -> Result<InputTable> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    if metadata.len() == 0 {
        return Err(IngestError::Input(format!(
            "Input file is empty: {}",
            path.display()
        )));
    }

    let reader: Box<dyn Read> = if format == InputFormat::CsvGz {
        Box::new(flate2::read::GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()
        .map_err(|e| {
            IngestError::Input(format!(
                "Failed to read header from {}: {}",
                path.display(),
                e
            ))
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    // Records are buffered so the total is known up front
    let records: Vec<csv::Result<csv::StringRecord>> = csv_reader.into_records().collect();
    let source_rows = records.len();
    let total_rows = window_len(source_rows, offset, limit);

    let header_cols = columns.clone();
    let rows = records
        .into_iter()
        .enumerate()
        .skip(offset)
        .take(total_rows)
        .map(move |(index, record)| {
            let record = record.map_err(|e| IngestError::Row {
                row: index,
                message: e.to_string(),
            })?;
            Ok(csv_row(&header_cols, &record))
        });

    Ok(InputTable {
        path: path.to_path_buf(),
        format,
        source_rows,
        total_rows,
        columns,
        rows: Box::new(rows),
    })
}

fn csv_row(columns: &[String], record: &csv::StringRecord) -> SourceRow {
    columns
        .iter()
        .zip(record.iter())
        .map(|(name, cell)| (name.clone(), parse_cell(cell)))
        .collect()
}

/// Infer a scalar from CSV text. Empty cells are nulls.
fn parse_cell(cell: &str) -> SourceValue {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return SourceValue::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return SourceValue::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return SourceValue::Float(f);
    }
    match trimmed {
        "true" | "True" | "TRUE" => SourceValue::Bool(true),
        "false" | "False" | "FALSE" => SourceValue::Bool(false),
        _ => SourceValue::Text(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use rstest::rstest;
    use std::io::Write;

    const CSV: &str = "coadd_object_id,ra,dec,is_nucleated,tilename\n\
                       1001,10.5,-3.25,true,DES0001\n\
                       1002,11.0,,false,\"DES,0002\"\n\
                       1003,nan,4.0,1,DES0003\n";

    fn write_csv(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, CSV).unwrap();
        path
    }

    #[rstest]
    #[case("", SourceValue::Null)]
    #[case("42", SourceValue::Int(42))]
    #[case("-1.5", SourceValue::Float(-1.5))]
    #[case("True", SourceValue::Bool(true))]
    #[case("DES0001", SourceValue::Text("DES0001".to_string()))]
    fn test_parse_cell(#[case] cell: &str, #[case] expected: SourceValue) {
        assert_eq!(parse_cell(cell), expected);
    }

    #[test]
    fn test_window_len() {
        assert_eq!(window_len(250, 0, None), 250);
        assert_eq!(window_len(250, 100, None), 150);
        assert_eq!(window_len(250, 100, Some(20)), 20);
        assert_eq!(window_len(250, 300, Some(20)), 0);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            InputFormat::from_path(Path::new("a.parquet")).unwrap(),
            InputFormat::Parquet
        );
        assert_eq!(
            InputFormat::from_path(Path::new("a.CSV.GZ")).unwrap(),
            InputFormat::CsvGz
        );
        assert!(InputFormat::from_path(Path::new("a.fits")).is_err());
    }

    #[test]
    fn test_read_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "galaxies.csv");

        let table = open_catalog(&path, 0, None).unwrap();
        assert_eq!(table.source_rows, 3);
        assert_eq!(table.total_rows, 3);
        assert_eq!(table.columns[0], "coadd_object_id");

        let rows: Vec<SourceRow> = table.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(rows[0].get("coadd_object_id"), Some(&SourceValue::Int(1001)));
        assert_eq!(rows[0].get("is_nucleated"), Some(&SourceValue::Bool(true)));
        assert_eq!(rows[1].get("dec"), Some(&SourceValue::Null));
        assert_eq!(
            rows[1].get("tilename"),
            Some(&SourceValue::Text("DES,0002".to_string()))
        );
        assert!(rows[2].value("ra").is_none());
    }

    #[test]
    fn test_quoted_field_spans_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multiline.csv");
        std::fs::write(
            &path,
            "coadd_object_id,paper\n1,\"line one\nline two\"\n2,\"say \"\"hi\"\"\"\n",
        )
        .unwrap();

        let table = open_catalog(&path, 0, None).unwrap();
        assert_eq!(table.source_rows, 2);

        let rows: Vec<SourceRow> = table.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            rows[0].get("paper"),
            Some(&SourceValue::Text("line one\nline two".to_string()))
        );
        assert_eq!(rows[1].get("coadd_object_id"), Some(&SourceValue::Int(2)));
        assert_eq!(
            rows[1].get("paper"),
            Some(&SourceValue::Text("say \"hi\"".to_string()))
        );
    }

    #[test]
    fn test_read_gzipped_csv_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("galaxies.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(CSV.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let table = open_catalog(&path, 1, Some(1)).unwrap();
        assert_eq!(table.format, InputFormat::CsvGz);
        assert_eq!(table.total_rows, 1);

        let rows: Vec<_> = table.into_iter().collect();
        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.get("coadd_object_id"), Some(&SourceValue::Int(1002)));
    }

    #[test]
    fn test_ragged_csv_row_is_a_row_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b\n1,2\n3\n").unwrap();

        let rows: Vec<_> = open_catalog(&path, 0, None).unwrap().into_iter().collect();
        assert!(rows[0].is_ok());
        match &rows[1] {
            Err(IngestError::Row { row, .. }) => assert_eq!(*row, 1),
            other => panic!("expected row error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = open_catalog("/nonexistent/galaxies.parquet", 0, None).unwrap_err();
        assert!(matches!(err, IngestError::Input(_)));
    }

    #[test]
    fn test_parquet_field_values() {
        assert_eq!(field_value(&Field::Null), SourceValue::Null);
        assert_eq!(field_value(&Field::Long(7)), SourceValue::Int(7));
        assert_eq!(field_value(&Field::Double(2.5)), SourceValue::Float(2.5));
        assert_eq!(
            field_value(&Field::Str("DES".to_string())),
            SourceValue::Text("DES".to_string())
        );
        assert_eq!(
            field_value(&Field::ULong(u64::MAX)),
            SourceValue::Float(u64::MAX as f64)
        );
    }
}
