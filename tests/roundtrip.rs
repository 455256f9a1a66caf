use arrow::array::{Array, AsArray};
use arrow::datatypes::{Int64Type, TimestampMicrosecondType};
use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use storage_report::record::stat_record;
use storage_report::report::walk_paths;
use storage_report::{
    ArchiveExtractor, Cancellation, Error, MetadataField, ReportConfig, ReportRunner, Value,
    ZipExtractor, run_storage_report,
};

fn config(out: &Path, scratch: &Path, max_csv_lines: usize) -> ReportConfig {
    ReportConfig::new(Vec::<PathBuf>::new())
        .unwrap()
        .with_output_path(out)
        .with_max_csv_lines(max_csv_lines)
        .with_temp_root(scratch)
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn synthetic_records_survive_the_round_trip() {
    let out = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let base = NaiveDate::from_ymd_opt(2012, 4, 1)
        .unwrap()
        .and_hms_micro_opt(6, 0, 0, 123_456)
        .unwrap();
    let records: Vec<(chrono::NaiveDateTime, u64)> = (0..25)
        .map(|i| (base + Duration::minutes(i * 7), (i as u64) * 1000 + 1))
        .collect();

    let archive = ReportRunner::new(config(out.path(), scratch.path(), 4))
        .run(records.clone(), |(mtime, bytes)| {
            Ok(vec![Value::Timestamp(*mtime), Value::UInt(*bytes)])
        })
        .unwrap();
    assert!(is_empty_dir(scratch.path()));

    let table = ArchiveExtractor::new()
        .with_temp_root(scratch.path())
        .extract_and_concat(&archive)
        .unwrap();
    assert_eq!(table.num_rows(), records.len());
    assert_eq!(table.members().len(), 7);

    let mtime = table
        .column("mtime")
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>();
    let bytes = table.column("bytes").unwrap().as_primitive::<Int64Type>();
    for (row, (ts, size)) in records.iter().enumerate() {
        assert_eq!(mtime.value(row), ts.and_utc().timestamp_micros(), "row {row}");
        assert_eq!(bytes.value(row), *size as i64, "row {row}");
    }
    assert!(is_empty_dir(scratch.path()));
}

#[test]
fn filesystem_report_matches_stat() {
    let tree = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    for i in 0..8 {
        let dir = tree.path().join(format!("d{}", i % 3));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("f{i}.dat")), vec![b'x'; i * 10]).unwrap();
    }

    let fields = vec![MetadataField::Path, MetadataField::Mtime, MetadataField::Bytes];
    let mut cfg = config(out.path(), scratch.path(), 3).with_fieldnames(fields.clone());
    cfg.paths = vec![tree.path().to_path_buf()];

    let archive = run_storage_report(&cfg, &Cancellation::new()).unwrap();
    assert_eq!(archive, out.path().join("storage_analytics_data.zip"));
    assert!(is_empty_dir(scratch.path()));

    let expected: Vec<_> = walk_paths(&cfg.paths)
        .map(|p| (p.clone(), stat_record(&p, &fields).unwrap()))
        .collect();

    let table = ArchiveExtractor::new()
        .with_temp_root(scratch.path())
        .extract_and_concat(&archive)
        .unwrap();
    assert_eq!(table.num_rows(), 8);
    assert_eq!(table.members().len(), 3);

    let paths = table.column("path").unwrap().as_string::<i32>();
    let mtimes = table
        .column("mtime")
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>();
    let bytes = table.column("bytes").unwrap().as_primitive::<Int64Type>();
    assert_eq!(paths.len(), expected.len());
    for (row, (path, record)) in expected.iter().enumerate() {
        assert_eq!(paths.value(row), path.to_string_lossy());
        match (&record[1], &record[2]) {
            (Value::Timestamp(ts), Value::UInt(size)) => {
                assert_eq!(mtimes.value(row), ts.and_utc().timestamp_micros());
                assert_eq!(bytes.value(row), *size as i64);
            }
            other => panic!("unexpected record {other:?}"),
        }
    }
}

#[test]
fn empty_tree_gives_single_header_only_member() {
    let tree = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let mut cfg = config(out.path(), scratch.path(), 10);
    cfg.paths = vec![tree.path().to_path_buf()];

    let archive = run_storage_report(&cfg, &Cancellation::new()).unwrap();

    let zip = ZipExtractor::new(storage_report::LocalFileReader::new(&archive).unwrap());
    let entries = zip.list_files().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_name, "storage_analytics_data__0000.csv");
    assert_eq!(zip.extract_to_memory(&entries[0]).unwrap(), b"mtime,bytes\n");

    let table = ArchiveExtractor::new()
        .with_temp_root(scratch.path())
        .extract_and_concat(&archive)
        .unwrap();
    assert_eq!(table.num_rows(), 0);
}

#[test]
fn interrupted_walk_leaves_no_output() {
    let tree = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    for i in 0..9 {
        fs::write(tree.path().join(format!("{i}.txt")), "data").unwrap();
    }

    let cancel = Cancellation::new();
    let trigger = cancel.clone();
    let fields = MetadataField::DEFAULT;
    let mut seen = 0;
    let err = ReportRunner::new(config(out.path(), scratch.path(), 3))
        .with_cancellation(cancel)
        .run(walk_paths(&[tree.path().to_path_buf()]), |path| {
            seen += 1;
            // One chunk of three is already in the archive by now
            if seen == 5 {
                trigger.cancel();
            }
            stat_record(path, &fields)
        })
        .unwrap_err();

    assert!(matches!(err, Error::Interrupted));
    assert!(is_empty_dir(scratch.path()));
    assert!(!out.path().join("storage_analytics_data.zip").exists());
}
