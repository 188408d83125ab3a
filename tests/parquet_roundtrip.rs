//! Sample parquet files read back through the catalog reader

use approx::assert_relative_eq;
use galaxy_ingest::mapping::multiband_mapping;
use galaxy_ingest::mock::{write_sample_parquet, MockGalaxyConfig, MockIdScheme};
use galaxy_ingest::reader::InputFormat;
use galaxy_ingest::{open_catalog, prepare_row, SourceRow, SourceValue};

fn sample_rows(count: usize) -> Vec<SourceRow> {
    MockGalaxyConfig::new()
        .with_count(count)
        .with_seed(42)
        .with_id_scheme(MockIdScheme::Sequential)
        .generate()
}

#[test]
fn test_sample_file_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.parquet");
    let written = sample_rows(25);
    write_sample_parquet(&path, &written).unwrap();

    let table = open_catalog(&path, 0, None).unwrap();
    assert_eq!(table.format, InputFormat::Parquet);
    assert_eq!(table.source_rows, 25);
    assert_eq!(table.total_rows, 25);
    assert!(table.columns.iter().any(|c| c == "is_nucleated"));

    let read: Vec<SourceRow> = table.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(read.len(), 25);

    for (original, row) in written.iter().zip(&read) {
        assert_eq!(row.get("coadd_object_id"), original.get("coadd_object_id"));
        assert_eq!(row.get("is_nucleated"), original.get("is_nucleated"));
        match (row.get("ra"), original.get("ra")) {
            (Some(SourceValue::Float(a)), Some(SourceValue::Float(b))) => {
                assert_relative_eq!(*a, *b)
            }
            other => panic!("unexpected ra values {:?}", other),
        }
        // Optional columns come back as nulls when unset
        assert_eq!(
            row.value("mag_auto_g").is_some(),
            original.value("mag_auto_g").is_some()
        );
    }
}

#[test]
fn test_offset_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("window.parquet");
    write_sample_parquet(&path, &sample_rows(30)).unwrap();

    let table = open_catalog(&path, 10, Some(5)).unwrap();
    assert_eq!(table.total_rows, 5);
    let ids: Vec<String> = table
        .into_iter()
        .map(|r| r.unwrap().get("coadd_object_id").unwrap().to_string())
        .collect();
    assert_eq!(
        ids,
        vec!["GALAXY_000011", "GALAXY_000012", "GALAXY_000013", "GALAXY_000014", "GALAXY_000015"]
    );

    let past_end = open_catalog(&path, 40, None).unwrap();
    assert_eq!(past_end.total_rows, 0);
    assert_eq!(past_end.into_iter().count(), 0);
}

#[test]
fn test_parquet_rows_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shape.parquet");
    write_sample_parquet(&path, &sample_rows(10)).unwrap();

    let mapping = multiband_mapping();
    for (i, row) in open_catalog(&path, 0, None).unwrap().into_iter().enumerate() {
        let record = prepare_row(&row.unwrap(), &mapping, i).unwrap();
        assert_eq!(record.galaxy_id(), Some(format!("GALAXY_{:06}", i + 1).as_str()));

        let galaxy = record.galaxy.as_ref().unwrap();
        let q = galaxy["q"].as_f64().unwrap();
        assert!((0.1..=1.0).contains(&q));
        assert!(galaxy["nucleus"].is_boolean());

        if let Some(extractor) = &record.source_extractor {
            for band in ["g", "r", "i"] {
                assert!(extractor.contains_key(band));
            }
        }
    }
}
