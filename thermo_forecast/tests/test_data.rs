use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};
use thermo_forecast::data::{parse_timestamp, DataLoader, RawColumn, RawTable, RawValues};
use thermo_forecast::error::ForecastError;

const HEADER: &str = "registered_at,system_battery_max_temperature,system_grid_available";

fn write_csv(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn csv_columns_are_typed_on_ingest() {
    let file = write_csv(&[
        "2024-05-01 12:00:00,25.5,true",
        "2024-05-01 12:01:00,,false",
        "2024-05-01 12:02:00,26.0,true",
    ]);
    let raw = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(raw.height(), 3);

    match &raw.column("registered_at").unwrap().values {
        RawValues::Text(v) => assert_eq!(v[0].as_deref(), Some("2024-05-01 12:00:00")),
        RawValues::Timestamps(v) => {
            assert_eq!(v[0], Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
        }
        other => panic!("unexpected datetime column {:?}", other),
    }

    match &raw.column("system_battery_max_temperature").unwrap().values {
        RawValues::Numeric(v) => {
            assert_eq!(v[0], 25.5);
            assert!(v[1].is_nan());
        }
        other => panic!("unexpected target column {:?}", other),
    }

    match &raw.column("system_grid_available").unwrap().values {
        RawValues::Numeric(v) => assert_eq!(v, &vec![1.0, 0.0, 1.0]),
        other => panic!("unexpected grid column {:?}", other),
    }
}

#[test]
fn directory_loading_stacks_files_in_path_order() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("b.csv"),
        "registered_at,system_battery_max_temperature\n2024-05-01 12:02:00,27.0\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("a.csv"),
        "registered_at,system_battery_max_temperature,system_battery_soc\n2024-05-01 12:00:00,25.0,80.0\n2024-05-01 12:01:00,26.0,81.0\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not telemetry").unwrap();

    let raw = DataLoader::from_dir(dir.path()).unwrap();
    assert_eq!(raw.height(), 3);
    match &raw.column("system_battery_max_temperature").unwrap().values {
        RawValues::Numeric(v) => assert_eq!(v, &vec![25.0, 26.0, 27.0]),
        other => panic!("unexpected target column {:?}", other),
    }
    match &raw.column("system_battery_soc").unwrap().values {
        RawValues::Numeric(v) => {
            assert_eq!(&v[..2], &[80.0, 81.0]);
            assert!(v[2].is_nan());
        }
        other => panic!("unexpected soc column {:?}", other),
    }
}

#[test]
fn empty_directory_is_data_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        DataLoader::from_dir(dir.path()),
        Err(ForecastError::DataError(_))
    ));
}

#[test]
fn raw_tables_must_be_rectangular() {
    let result = RawTable::new(vec![
        RawColumn {
            name: "a".to_string(),
            values: RawValues::Numeric(vec![1.0, 2.0]),
        },
        RawColumn {
            name: "b".to_string(),
            values: RawValues::Numeric(vec![1.0]),
        },
    ]);
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[test]
fn concat_rejects_mixed_column_kinds() {
    let numeric = RawTable::new(vec![RawColumn {
        name: "a".to_string(),
        values: RawValues::Numeric(vec![1.0]),
    }])
    .unwrap();
    let text = RawTable::new(vec![RawColumn {
        name: "a".to_string(),
        values: RawValues::Text(vec![Some("x".to_string())]),
    }])
    .unwrap();
    assert!(matches!(
        numeric.concat(text),
        Err(ForecastError::DataError(_))
    ));
}

#[rstest]
#[case("2024-05-01 12:30:00")]
#[case("2024-05-01T12:30:00")]
#[case("2024-05-01T12:30:00Z")]
#[case("2024-05-01 14:30:00+02:00")]
#[case("2024-05-01 12:30")]
fn timestamps_parse_to_utc(#[case] raw: &str) {
    assert_eq!(
        parse_timestamp(raw),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap())
    );
}

#[test]
fn unparseable_timestamp_is_none() {
    assert_eq!(parse_timestamp("yesterday"), None);
    assert_eq!(
        parse_timestamp("2024-05-01"),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
    );
}
