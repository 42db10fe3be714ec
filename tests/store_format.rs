//! Record store format tests
//!
//! Column alignment is the contract the dashboard depends on: no free-text
//! value may ever shift it, and a store with a damaged header must come
//! back readable.

use chrono::{Local, TimeZone};
use proptest::prelude::*;

use network_health_logger::models::record::{
    escape_field, MeasurementRecord, ProbeReport, CSV_FIELD_COUNT, CSV_HEADER,
};
use network_health_logger::store::RecordStore;

fn timestamp() -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap()
}

#[test]
fn appended_rows_align_with_header() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::at(dir.path().join("speedtest.csv"), dir.path().join("raw"));

    let record = MeasurementRecord::failure(
        timestamp(),
        ProbeReport::unknown(),
        "connect to 203.0.113.7, port 8080: refused",
    );
    store.append(&record).unwrap();

    let content = std::fs::read_to_string(store.csv_path()).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next().unwrap().split(',').count(), CSV_FIELD_COUNT);
    assert_eq!(lines.next().unwrap().split(',').count(), CSV_FIELD_COUNT);
}

#[test]
fn header_repair_then_append_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::at(dir.path().join("speedtest.csv"), dir.path().join("raw"));

    // Simulate a store written before the header existed.
    std::fs::write(store.csv_path(), "2025-01-01 00:00:00,55.2,rest-of-row\n").unwrap();

    let record = MeasurementRecord::failure(timestamp(), ProbeReport::unknown(), "late failure");
    store.append(&record).unwrap();

    let content = std::fs::read_to_string(store.csv_path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines[1], "2025-01-01 00:00:00,55.2,rest-of-row");
    assert_eq!(lines[2].split(',').count(), CSV_FIELD_COUNT);
}

proptest! {
    /// No free-text content can change the number of columns in a row.
    #[test]
    fn free_text_never_shifts_columns(
        server_name in ".{0,64}",
        isp in ".{0,64}",
        error in ".{0,300}",
    ) {
        let mut record = MeasurementRecord::failure(timestamp(), ProbeReport::unknown(), &error);
        record.server_name = Some(server_name);
        record.isp = Some(isp);

        let row = record.to_csv_row();
        prop_assert_eq!(row.split(',').count(), CSV_FIELD_COUNT);
        prop_assert_eq!(row.lines().count(), 1);
    }

    /// Escaping is idempotent and never reintroduces separators.
    #[test]
    fn escape_field_is_idempotent(value in ".{0,200}") {
        let once = escape_field(&value);
        prop_assert!(!once.contains(','));
        prop_assert!(!once.contains('\n'));
        prop_assert_eq!(escape_field(&once), once.clone());
    }
}
