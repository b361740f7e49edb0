//! Record Loader: delimited text in, typed order records out.
//!
//! The load is all-or-nothing. A missing column or a single unparseable
//! timestamp rejects the whole file; rows are never silently dropped.

use crate::error::LoadError;
use crate::models::{
    AccountActivity, CsvRecord, OrderRecord, ACCOUNT_FIRST_ORDER_COLUMN,
    ACCOUNT_LAST_ORDER_COLUMN, ACCOUNT_TOTAL_ORDERS_COLUMN, REQUIRED_COLUMNS,
};
use crate::timestamp::parse_utc;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl LoadOptions {
    /// Tab-delimited for `.tsv` paths, comma otherwise.
    pub fn for_path(path: &Path) -> Self {
        let is_tsv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("tsv"))
            .unwrap_or(false);
        Self {
            delimiter: if is_tsv { b'\t' } else { b',' },
        }
    }
}

/// Records in input order, plus whether account-activity columns were present.
#[derive(Debug, Clone)]
pub struct LoadedRecords {
    pub records: Vec<OrderRecord>,
    pub has_account_activity: bool,
}

pub fn load_records<R: Read>(reader: R, options: &LoadOptions) -> Result<LoadedRecords, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(LoadError::MalformedHeader)?.clone();
    check_required_columns(&headers)?;
    let has_account_activity = has_column(&headers, ACCOUNT_FIRST_ORDER_COLUMN)
        && has_column(&headers, ACCOUNT_LAST_ORDER_COLUMN);
    debug!(
        columns = headers.len(),
        has_account_activity, "Validated header row"
    );

    let mut records = Vec::new();
    for (idx, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let row = idx + 1;
        let raw = result.map_err(|source| LoadError::MalformedRow { row, source })?;
        records.push(to_order_record(raw, row)?);
    }

    info!("Parsed {} records from CSV", records.len());
    Ok(LoadedRecords {
        records,
        has_account_activity,
    })
}

pub fn load_records_from_path(
    path: &Path,
    options: &LoadOptions,
) -> Result<LoadedRecords, LoadError> {
    info!("Reading CSV from {:?}", path);
    let file = File::open(path)?;
    load_records(file, options)
}

fn has_column(headers: &StringRecord, name: &str) -> bool {
    headers.iter().any(|h| h == name)
}

fn check_required_columns(headers: &StringRecord) -> Result<(), LoadError> {
    match REQUIRED_COLUMNS.iter().find(|col| !has_column(headers, col)) {
        Some(missing) => Err(LoadError::MissingColumn {
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

fn required_ts(value: &str, column: &str, row: usize) -> Result<DateTime<Utc>, LoadError> {
    parse_utc(value).ok_or_else(|| LoadError::InvalidTimestamp {
        row,
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Empty cells are absent; anything else must parse.
fn optional_ts(
    value: Option<&str>,
    column: &str,
    row: usize,
) -> Result<Option<DateTime<Utc>>, LoadError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => required_ts(v, column, row).map(Some),
        None => Ok(None),
    }
}

fn optional_count(value: Option<&str>, column: &str, row: usize) -> Result<Option<i64>, LoadError> {
    let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    // Integer columns with gaps are often written as floats ("12.0")
    v.parse::<i64>()
        .ok()
        .or_else(|| {
            v.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        })
        .map(Some)
        .ok_or_else(|| LoadError::InvalidNumber {
            row,
            column: column.to_string(),
            value: v.to_string(),
        })
}

fn to_order_record(raw: CsvRecord, row: usize) -> Result<OrderRecord, LoadError> {
    let order_created_timestamp =
        required_ts(&raw.order_created_timestamp, "order_created_timestamp", row)?;
    let travel_start_ts = required_ts(&raw.travel_start_ts, "travel_start_ts", row)?;
    let travel_end_ts = required_ts(&raw.travel_end_ts, "travel_end_ts", row)?;

    let account = AccountActivity {
        first_order_created_timestamp: optional_ts(
            raw.account_first_order_created_timestamp.as_deref(),
            ACCOUNT_FIRST_ORDER_COLUMN,
            row,
        )?,
        last_order_created_timestamp: optional_ts(
            raw.account_last_order_created_timestamp.as_deref(),
            ACCOUNT_LAST_ORDER_COLUMN,
            row,
        )?,
        total_orders: optional_count(
            raw.account_total_orders_during_analysis_period.as_deref(),
            ACCOUNT_TOTAL_ORDERS_COLUMN,
            row,
        )?,
    };

    Ok(OrderRecord {
        order_created_timestamp,
        order_id: raw.order_id,
        account_id: raw.account_id,
        order_type_name: raw.order_type_name,
        order_status_name: raw.order_status_name,
        travel_start_ts,
        travel_end_ts,
        account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
order_created_timestamp,order_id,account_id,order_type_name,order_status_name,travel_start_ts,travel_end_ts
2024-01-02 08:00:00.250000+00:00,1001,77,event,eticket_issued,2024-01-10T18:00:00Z,2024-01-10 23:00:00 UTC
2024-01-05T09:30:00Z,1002,78,hotel,eticket_issued,2024-02-01 14:00:00,2024-02-03 11:00:00
2024-01-06T10:00:00Z,1003,77,event,issued,2024-02-10T18:00:00Z,2024-02-10T22:00:00Z
";

    #[test]
    fn test_load_sample_csv() {
        let loaded = load_records(SAMPLE_CSV.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(loaded.records.len(), 3);
        assert!(!loaded.has_account_activity);

        let first = &loaded.records[0];
        assert_eq!(first.order_id, "1001");
        assert_eq!(first.account_id, "77");
        assert_eq!(first.vertical(), "event");
        assert_eq!(first.order_created_timestamp.timestamp_subsec_millis(), 250);
        assert!(first.account.is_empty());

        // input order is preserved
        let ids: Vec<&str> = loaded.records.iter().map(|r| r.order_id.as_str()).collect();
        assert_eq!(ids, vec!["1001", "1002", "1003"]);
    }

    #[test]
    fn test_missing_column_is_named() {
        let csv = "order_created_timestamp,order_id,account_id,order_type_name,\
                   order_status_name,travel_start_ts\n";
        let err = load_records(csv.as_bytes(), &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::MissingColumn { column } => assert_eq!(column, "travel_end_ts"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input_reports_first_missing_column() {
        let err = load_records("".as_bytes(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumn { ref column } if column == "order_created_timestamp"
        ));
    }

    #[test]
    fn test_bad_timestamp_fails_whole_load() {
        let csv = SAMPLE_CSV.replace("2024-02-03 11:00:00", "soon");
        let err = load_records(csv.as_bytes(), &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::InvalidTimestamp { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "travel_end_ts");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let csv = format!("{SAMPLE_CSV}2024-01-06T10:00:00Z,1004,79\n");
        let err = load_records(csv.as_bytes(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.row(), Some(4));
        assert!(matches!(err, LoadError::MalformedRow { .. }));
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let csv = "\
order_id,days_stuck,order_created_timestamp,account_id,order_type_name,order_status_name,travel_start_ts,travel_end_ts
9,12,2024-01-01T00:00:00Z,5,flight,eticket_issued,2024-01-03T00:00:00Z,2024-01-04T00:00:00Z
";
        let loaded = load_records(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(loaded.records[0].order_id, "9");
        assert_eq!(loaded.records[0].vertical(), "flight");
    }

    #[test]
    fn test_account_activity_columns() {
        let csv = "\
order_created_timestamp,order_id,account_id,order_type_name,order_status_name,travel_start_ts,travel_end_ts,account_first_order_created_timestamp,account_last_order_created_timestamp,account_total_orders_during_analysis_period
2024-01-01T00:00:00Z,1,5,flight,eticket_issued,2024-01-03T00:00:00Z,2024-01-04T00:00:00Z,2023-06-01T00:00:00Z,2024-02-01T00:00:00Z,14.0
2024-01-01T00:00:00Z,2,6,flight,eticket_issued,2024-01-03T00:00:00Z,2024-01-04T00:00:00Z,,,
";
        let loaded = load_records(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert!(loaded.has_account_activity);
        assert_eq!(loaded.records[0].account.total_orders, Some(14));
        assert!(loaded.records[0].account.last_order_created_timestamp.is_some());
        assert!(loaded.records[1].account.is_empty());
    }

    #[test]
    fn test_bad_total_orders_is_rejected() {
        let csv = "\
order_created_timestamp,order_id,account_id,order_type_name,order_status_name,travel_start_ts,travel_end_ts,account_total_orders_during_analysis_period
2024-01-01T00:00:00Z,1,5,flight,eticket_issued,2024-01-03T00:00:00Z,2024-01-04T00:00:00Z,many
";
        let err = load_records(csv.as_bytes(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidNumber { row: 1, .. }));
    }

    #[test]
    fn test_tab_delimited() {
        let tsv = SAMPLE_CSV.replace(',', "\t");
        let options = LoadOptions::for_path(Path::new("orders.TSV"));
        assert_eq!(options.delimiter, b'\t');
        let loaded = load_records(tsv.as_bytes(), &options).unwrap();
        assert_eq!(loaded.records.len(), 3);
    }
}
