//! End-to-end pipeline: source → normalize → canonical file → re-read → pivot.

use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;

use rdn_core::config::{RdnConfig, SpreadsheetConfig};
use rdn_core::data::spreadsheet::{parse_grid, Cell};
use rdn_core::data::{
    check_completeness, csv_store, fetch_month, normalize, parse_day_table, pivot_complete_month,
    pivot_month, read_csv, read_meta, write_csv_atomic, DataError, DataSource, DayFetcher,
    DuplicatePolicy, FetchOptions, NoProgress, PriceSummary, SkipReason, ValidationError,
};
use rdn_core::domain::{HourlyPriceRecord, Period, RecordKey};

fn fixture_html() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/rdn_2025-11-02.html");
    std::fs::read_to_string(path).unwrap()
}

/// Serves the frozen page for every delivery day.
struct FixtureFetcher {
    html: String,
    table_id: String,
}

impl DayFetcher for FixtureFetcher {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<HourlyPriceRecord>, DataError> {
        parse_day_table(&self.html, date, &self.table_id)
    }
}

fn results_row(instrument: &str, granularity: f64, price: Cell) -> Vec<Cell> {
    vec![
        Cell::Number(1.0),
        Cell::Text(instrument.to_string()),
        Cell::Number(granularity),
        price,
    ]
}

/// A results sheet for one delivery day: 24 hourly rows plus quarter-hour noise.
fn results_sheet(day: u32, month: u32, year_short: u32) -> Vec<Vec<Cell>> {
    let mut grid = vec![vec![Cell::Text("Wyniki".into())]];
    for label in 1..=24u32 {
        let name = format!("{day:02}-{month:02}-{year_short:02}_H{label:02}");
        grid.push(results_row(&name, 60.0, Cell::Number(300.0 + f64::from(label))));
        let quarter = format!("{day:02}-{month:02}-{year_short:02}_Q{label:02}");
        grid.push(results_row(&quarter, 15.0, Cell::Number(1.0)));
    }
    grid
}

#[test]
fn fetched_month_round_trips_through_canonical_file() {
    let config = RdnConfig::default();
    let fetcher = FixtureFetcher {
        html: fixture_html(),
        table_id: config.web.table_id.clone(),
    };
    let period = Period::new(2025, 11).unwrap();

    let summary = fetch_month(&fetcher, period, FetchOptions::default(), &NoProgress).unwrap();
    assert_eq!(summary.days_requested, 30);
    assert_eq!(summary.records.len(), 720);

    let normalized = normalize(summary.records, config.validation.duplicate_policy).unwrap();
    check_completeness(&normalized.records, period).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(period.canonical_file_name());
    let meta = write_csv_atomic(&path, &normalized.records, DataSource::WebTable, Some(period)).unwrap();
    assert_eq!(meta.record_count, 720);
    assert_eq!(meta.null_prices, 30);
    assert_eq!(meta.end_date, NaiveDate::from_ymd_opt(2025, 11, 30));

    let back = read_csv(&path).unwrap();
    assert_eq!(back, normalized.records);
    assert_eq!(read_meta(&path).unwrap(), meta);
    assert!(csv_store::verify_hash(&path, &meta).unwrap());

    let matrix = pivot_complete_month(&back, period).unwrap();
    assert_eq!(matrix.days().len(), 30);
    assert_eq!(matrix.get(2, 0), Some(150.0));
    assert_eq!(matrix.get(2, 23), None);
    assert_eq!(matrix.min_max(), Some((-12.5, 975.0)));
}

#[test]
fn spreadsheet_month_skips_noise_and_pivots() {
    let layout = SpreadsheetConfig::default();
    let period = Period::new(2025, 10).unwrap();

    let mut records = Vec::new();
    let mut quarter_rows = 0;
    for day in period.days() {
        let parsed = parse_grid(&results_sheet(day.day(), 10, 25), &layout);
        quarter_rows += parsed.skipped[&SkipReason::NotHourly];
        records.extend(parsed.records);
    }
    assert_eq!(quarter_rows, 31 * 25);

    let normalized = normalize(records, DuplicatePolicy::Reject).unwrap();
    assert_eq!(normalized.records.len(), 744);
    assert!(normalized.records.iter().all(|r| r.volume.is_none()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(period.spreadsheet_file_name());
    write_csv_atomic(&path, &normalized.records, DataSource::Spreadsheet, Some(period)).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("2025-10-01,0,1,301,"));
    assert!(text.lines().nth(1).unwrap().ends_with(','));

    let matrix = pivot_complete_month(&read_csv(&path).unwrap(), period).unwrap();
    assert_eq!(matrix.get(5, 2), Some(303.0));
}

#[test]
fn overlapping_workbooks_are_rejected_by_default() {
    let layout = SpreadsheetConfig::default();
    let mut records = parse_grid(&results_sheet(5, 10, 25), &layout).records;
    records.extend(parse_grid(&results_sheet(5, 10, 25), &layout).records);

    match normalize(records.clone(), DuplicatePolicy::Reject) {
        Err(ValidationError::DuplicateKeys(keys)) => assert_eq!(keys.len(), 24),
        other => panic!("expected DuplicateKeys, got {other:?}"),
    }

    let kept = normalize(records, DuplicatePolicy::KeepFirst).unwrap();
    assert_eq!(kept.records.len(), 24);
    assert_eq!(kept.dropped_duplicates.len(), 24);
}

#[test]
fn incomplete_month_is_reported_and_not_pivoted() {
    let period = Period::new(2025, 3).unwrap();
    let gap = RecordKey::new(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), 14);
    let records: Vec<HourlyPriceRecord> = period
        .keys()
        .filter(|k| *k != gap)
        .map(|k| HourlyPriceRecord::new(k.trade_date, u32::from(k.hour_from), Some(200.0), None).unwrap())
        .collect();

    match check_completeness(&records, period) {
        Err(ValidationError::IncompleteMonth { missing, expected, .. }) => {
            assert_eq!(expected, 744);
            assert_eq!(missing, vec![gap]);
        }
        other => panic!("expected IncompleteMonth, got {other:?}"),
    }
    assert!(pivot_complete_month(&records, period).is_err());

    // The unchecked pivot still shows the hole explicitly.
    let matrix = pivot_month(&records).unwrap();
    assert_eq!(matrix.get(15, 14), None);
    assert_eq!(matrix.get(15, 13), Some(200.0));
}

#[test]
fn summary_reports_run_statistics() {
    let records = parse_day_table(
        &fixture_html(),
        NaiveDate::from_ymd_opt(2025, 11, 2).unwrap(),
        "footable_kontrakty_godzinowe",
    )
    .unwrap();
    let summary = PriceSummary::from_records(&records);
    assert_eq!(summary.records, 24);
    assert_eq!(summary.null_prices, 1);
    assert_eq!(summary.min, Some(-12.5));
    assert_eq!(summary.max, Some(975.0));
}

#[test]
fn config_file_drives_spreadsheet_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rdn.toml");
    std::fs::write(
        &path,
        "[spreadsheet]\ninstrument_column = 0\ngranularity_column = 1\nprice_column = 2\n",
    )
    .unwrap();
    let config = RdnConfig::from_file(&path).unwrap();

    let grid = vec![vec![
        Cell::Text("01-10-25_H01".into()),
        Cell::Number(60.0),
        Cell::Number(42.0),
    ]];
    let parsed = parse_grid(&grid, &config.spreadsheet);
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.records[0].price, Some(42.0));
}
