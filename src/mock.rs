//! Mock galaxy generator
//!
//! Produces catalog-shaped rows (the same column names a real survey export
//! uses) so mock data travels through the regular mapping, shaping and upload
//! path. Also writes those rows as a sample parquet file for trying the
//! loader without real data.

use chrono::Utc;
use log::info;
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::extract::{SourceRow, SourceValue};
use crate::Result;

/// How mock galaxy identifiers are formed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockIdScheme {
    /// `mock-{unix time}-{index}-{8 hex digits}`, unique across runs
    Timestamped,
    /// `GALAXY_000001`, stable across runs
    Sequential,
}

/// Physical type of a sample column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Double,
    Boolean,
}

/// Columns written to sample parquet files, in file order
const SAMPLE_COLUMNS: [(&str, ColumnKind); 16] = [
    ("coadd_object_id", ColumnKind::Text),
    ("ra", ColumnKind::Double),
    ("dec", ColumnKind::Double),
    ("sersic_reff_arcsec__best_available_fit", ColumnKind::Double),
    ("sersic_q__best_available_fit", ColumnKind::Double),
    ("sersic_PA__best_available_fit", ColumnKind::Double),
    ("is_nucleated", ColumnKind::Boolean),
    ("sersic_x__best_available_fit", ColumnKind::Double),
    ("sersic_y__best_available_fit", ColumnKind::Double),
    ("sersic_mag__best_available_fit", ColumnKind::Double),
    ("mag_auto_g", ColumnKind::Double),
    ("mag_auto_r", ColumnKind::Double),
    ("mag_auto_i", ColumnKind::Double),
    ("paper", ColumnKind::Text),
    ("tilename", ColumnKind::Text),
    ("n_thur", ColumnKind::Double),
];

/// Configuration for mock galaxy generation
#[derive(Debug, Clone)]
pub struct MockGalaxyConfig {
    /// Number of galaxies to generate
    pub count: usize,
    /// Random seed; `None` draws one from entropy
    pub seed: Option<u64>,
    pub id_scheme: MockIdScheme,
    /// Probability that each optional column is filled
    pub fill_probability: f64,
}

impl Default for MockGalaxyConfig {
    fn default() -> Self {
        Self {
            count: 5,
            seed: None,
            id_scheme: MockIdScheme::Timestamped,
            fill_probability: 0.5,
        }
    }
}

impl MockGalaxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_id_scheme(mut self, scheme: MockIdScheme) -> Self {
        self.id_scheme = scheme;
        self
    }

    /// Clamped to `[0, 1]`
    pub fn with_fill_probability(mut self, probability: f64) -> Self {
        self.fill_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Generate `count` catalog rows
    pub fn generate(&self) -> Vec<SourceRow> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let now = Utc::now().timestamp();

        let ra_dist = Uniform::new(0.0, 360.0);
        let dec_dist = Uniform::new_inclusive(-90.0, 90.0);
        let reff_dist = Uniform::new_inclusive(0.1, 10.0);
        let q_dist = Uniform::new_inclusive(0.1, 1.0);
        let pa_dist = Uniform::new_inclusive(0.0, 180.0);
        let pixel_dist = Uniform::new(0.0, 4096.0);
        let mag_dist = Uniform::new(17.0, 25.0);
        let sersic_n_dist = Uniform::new(0.5, 4.0);

        (0..self.count)
            .map(|i| {
                let id = match self.id_scheme {
                    MockIdScheme::Timestamped => {
                        format!("mock-{}-{}-{:08x}", now, i, rng.gen::<u32>())
                    }
                    MockIdScheme::Sequential => format!("GALAXY_{:06}", i + 1),
                };

                let mut row = SourceRow::new()
                    .with("coadd_object_id", id)
                    .with("ra", ra_dist.sample(&mut rng))
                    .with("dec", dec_dist.sample(&mut rng))
                    .with(
                        "sersic_reff_arcsec__best_available_fit",
                        round_to(reff_dist.sample(&mut rng), 3),
                    )
                    .with(
                        "sersic_q__best_available_fit",
                        round_to(q_dist.sample(&mut rng), 3),
                    )
                    .with(
                        "sersic_PA__best_available_fit",
                        round_to(pa_dist.sample(&mut rng), 2),
                    )
                    .with("is_nucleated", rng.gen_bool(0.5));

                let x = pixel_dist.sample(&mut rng);
                let y = pixel_dist.sample(&mut rng);
                let mag = mag_dist.sample(&mut rng);
                let n = sersic_n_dist.sample(&mut rng);

                let mut optional = |row: &mut SourceRow, column: &str, value: SourceValue| {
                    if rng.gen_bool(self.fill_probability) {
                        row.insert(column, value);
                    } else {
                        row.insert(column, SourceValue::Null);
                    }
                };

                optional(&mut row, "sersic_x__best_available_fit", x.into());
                optional(&mut row, "sersic_y__best_available_fit", y.into());
                optional(&mut row, "sersic_mag__best_available_fit", mag.into());
                optional(&mut row, "mag_auto_g", (mag + 0.2).into());
                optional(&mut row, "mag_auto_r", (mag - 0.4).into());
                optional(&mut row, "mag_auto_i", (mag - 0.7).into());
                optional(&mut row, "paper", "mock".into());
                optional(&mut row, "tilename", format!("MOCK{:04}", i % 10_000).into());
                optional(&mut row, "n_thur", n.into());

                row
            })
            .collect()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn sample_schema() -> String {
    let fields: Vec<String> = SAMPLE_COLUMNS
        .iter()
        .map(|(name, kind)| match kind {
            ColumnKind::Text => format!("  OPTIONAL BYTE_ARRAY {} (UTF8);", name),
            ColumnKind::Double => format!("  OPTIONAL DOUBLE {};", name),
            ColumnKind::Boolean => format!("  OPTIONAL BOOLEAN {};", name),
        })
        .collect();
    format!("message galaxy {{\n{}\n}}", fields.join("\n"))
}

/// Definition levels plus the non-null values of one column
fn column_values<T>(
    rows: &[SourceRow],
    column: &str,
    convert: impl Fn(&SourceValue) -> Option<T>,
) -> (Vec<T>, Vec<i16>) {
    let mut values = Vec::with_capacity(rows.len());
    let mut def_levels = Vec::with_capacity(rows.len());
    for row in rows {
        match row.value(column).and_then(&convert) {
            Some(v) => {
                values.push(v);
                def_levels.push(1);
            }
            None => def_levels.push(0),
        }
    }
    (values, def_levels)
}

/// Write rows to a single-row-group parquet file using the sample layout.
///
/// Columns outside the sample layout are ignored; missing ones are written as
/// nulls.
pub fn write_sample_parquet<P: AsRef<Path>>(path: P, rows: &[SourceRow]) -> Result<()> {
    let schema = Arc::new(parse_message_type(&sample_schema())?);
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path.as_ref())?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;

    let mut row_group = writer.next_row_group()?;
    let mut columns = SAMPLE_COLUMNS.iter();
    while let Some(mut column_writer) = row_group.next_column()? {
        let Some((name, kind)) = columns.next() else {
            break;
        };
        match kind {
            ColumnKind::Double => {
                let (values, defs) = column_values(rows, name, |v| match v {
                    SourceValue::Float(f) => Some(*f),
                    SourceValue::Int(i) => Some(*i as f64),
                    _ => None,
                });
                column_writer
                    .typed::<DoubleType>()
                    .write_batch(&values, Some(&defs[..]), None)?;
            }
            ColumnKind::Boolean => {
                let (values, defs) = column_values(rows, name, |v| match v {
                    SourceValue::Bool(b) => Some(*b),
                    _ => None,
                });
                column_writer
                    .typed::<BoolType>()
                    .write_batch(&values, Some(&defs[..]), None)?;
            }
            ColumnKind::Text => {
                let (values, defs) = column_values(rows, name, |v| match v {
                    SourceValue::Null => None,
                    other => Some(ByteArray::from(other.to_string().as_str())),
                });
                column_writer
                    .typed::<ByteArrayType>()
                    .write_batch(&values, Some(&defs[..]), None)?;
            }
        }
        column_writer.close()?;
    }
    row_group.close()?;
    writer.close()?;

    info!("Wrote {} rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}
