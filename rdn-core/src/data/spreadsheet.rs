//! Archive workbook provider.
//!
//! The exchange publishes a results workbook per delivery day. Its results
//! sheet lists every instrument of the session (hourly contracts, 15-minute
//! contracts, blocks). Only 60-minute rows named `DD-MM-YY_Hhh` become
//! records; every other row is skipped and counted under a [`SkipReason`].
//!
//! Hour labels in instrument names run 1..24 (`H01` is the 0-1 interval) and
//! are shifted to the 0-based `hour_from` used by every other source.

use super::provider::DataError;
use crate::config::SpreadsheetConfig;
use crate::domain::{HourlyPriceRecord, Period, HOURS_PER_DAY};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

static INSTRUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})-(\d{2})-(\d{2})_H(\d{2})").unwrap());

/// Granularity of hourly contracts, in minutes.
const HOURLY_GRANULARITY: f64 = 60.0;

/// Two-digit years in instrument names are read as 20YY.
const INSTRUMENT_CENTURY: i32 = 2000;

/// A workbook cell, reduced to what the adapter distinguishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Why a sheet row did not become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    /// Granularity cell is not 60 minutes (quarter-hour contracts, headers, blanks).
    NotHourly,
    /// Hourly row whose instrument name is not `DD-MM-YY_Hhh`.
    InstrumentMismatch,
    /// Instrument name encodes a day that does not exist.
    InvalidDate,
    /// Hour label outside 1..24.
    HourOutOfRange,
}

/// Records read from one sheet, with the per-reason skip counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetParse {
    pub records: Vec<HourlyPriceRecord>,
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl SheetParse {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Turn one sheet row into a record, or say why it is not one.
///
/// A price cell that is not numeric yields a record with no price.
pub fn classify_row(row: &[Cell], layout: &SpreadsheetConfig) -> Result<HourlyPriceRecord, SkipReason> {
    let granularity = row.get(layout.granularity_column).and_then(Cell::as_number);
    if granularity != Some(HOURLY_GRANULARITY) {
        return Err(SkipReason::NotHourly);
    }

    let instrument = row
        .get(layout.instrument_column)
        .and_then(Cell::as_text)
        .ok_or(SkipReason::InstrumentMismatch)?;
    let caps = INSTRUMENT
        .captures(instrument.trim())
        .ok_or(SkipReason::InstrumentMismatch)?;

    // The pattern guarantees two ASCII digits per group.
    let field = |i: usize| caps[i].parse::<u32>().unwrap_or(0);
    let (day, month, year_short, hour_label) = (field(1), field(2), field(3), field(4));

    let date = NaiveDate::from_ymd_opt(INSTRUMENT_CENTURY + year_short as i32, month, day)
        .ok_or(SkipReason::InvalidDate)?;

    if !(1..=u32::from(HOURS_PER_DAY)).contains(&hour_label) {
        return Err(SkipReason::HourOutOfRange);
    }

    let price = row
        .get(layout.price_column)
        .and_then(Cell::as_number)
        .filter(|p| p.is_finite());

    HourlyPriceRecord::new(date, hour_label - 1, price, None).map_err(|_| SkipReason::HourOutOfRange)
}

/// Parse a whole results grid (rows of absolute-position cells).
pub fn parse_grid(grid: &[Vec<Cell>], layout: &SpreadsheetConfig) -> SheetParse {
    let mut out = SheetParse::default();
    for (i, row) in grid.iter().enumerate() {
        match classify_row(row, layout) {
            Ok(record) => out.records.push(record),
            Err(reason) => {
                if reason != SkipReason::NotHourly {
                    debug!(row = i + 1, ?reason, "skipping sheet row");
                }
                *out.skipped.entry(reason).or_default() += 1;
            }
        }
    }
    out
}

/// Read the results sheet of one workbook (xlsx, xls, xlsb or ods).
pub fn read_workbook(path: &Path, layout: &SpreadsheetConfig) -> Result<SheetParse, DataError> {
    let spreadsheet_error = |reason: String| DataError::Spreadsheet {
        path: path.to_path_buf(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_error(e.to_string()))?;

    if !workbook.sheet_names().iter().any(|n| n == &layout.sheet_name) {
        return Err(DataError::FormatMismatch {
            context: path.display().to_string(),
            reason: format!("sheet '{}' not found", layout.sheet_name),
        });
    }

    let range = workbook
        .worksheet_range(&layout.sheet_name)
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    // Ranges start at the first used cell; pad so column indexes are absolute.
    let col_offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    let grid: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| {
            std::iter::repeat(Cell::Empty)
                .take(col_offset)
                .chain(row.iter().map(Cell::from))
                .collect()
        })
        .collect();

    Ok(parse_grid(&grid, layout))
}

/// Workbooks in `dir` holding delivery days of `period`, sorted by file name.
///
/// Matches `{prefix}{YYYY}_{MM}_<digits>...xlsx`.
pub fn discover_archive_files(
    dir: &Path,
    period: Period,
    prefix: &str,
) -> Result<Vec<PathBuf>, DataError> {
    let pattern = format!(
        r"^{}{:04}_{:02}_\d+.*\.xlsx$",
        regex::escape(prefix),
        period.year(),
        period.month()
    );
    let re = Regex::new(&pattern)
        .map_err(|e| DataError::Config(format!("invalid archive file pattern: {e}")))?;

    let entries = std::fs::read_dir(dir).map_err(|e| DataError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DataError::io(dir, e))?;
        let name = entry.file_name();
        if re.is_match(&name.to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// What one archive workbook contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    pub records: usize,
    pub skipped: usize,
}

/// All records from a set of workbooks, in file order, plus per-file reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveLoad {
    pub records: Vec<HourlyPriceRecord>,
    pub files: Vec<FileReport>,
}

/// Read every workbook. The first unreadable file fails the whole load.
pub fn read_archive(files: &[PathBuf], layout: &SpreadsheetConfig) -> Result<ArchiveLoad, DataError> {
    let mut load = ArchiveLoad::default();
    for path in files {
        let parsed = read_workbook(path, layout)?;
        info!(
            file = %path.display(),
            records = parsed.records.len(),
            skipped = parsed.skipped_total(),
            "read workbook"
        );
        load.files.push(FileReport {
            path: path.clone(),
            records: parsed.records.len(),
            skipped: parsed.skipped_total(),
        });
        load.records.extend(parsed.records);
    }
    Ok(load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn row(instrument: &str, granularity: f64, price: Cell) -> Vec<Cell> {
        vec![
            Cell::Number(1.0),
            Cell::Text(instrument.into()),
            Cell::Number(granularity),
            price,
        ]
    }

    fn layout() -> SpreadsheetConfig {
        SpreadsheetConfig::default()
    }

    #[test]
    fn hourly_label_maps_to_zero_based_hour() {
        let r = classify_row(&row("05-10-25_H03", 60.0, Cell::Number(512.3)), &layout()).unwrap();
        assert_eq!(r.trade_date, NaiveDate::from_ymd_opt(2025, 10, 5).unwrap());
        assert_eq!(r.hour_from, 2);
        assert_eq!(r.hour_to, 3);
        assert_eq!(r.price, Some(512.3));
        assert_eq!(r.volume, None);
    }

    #[test]
    fn h24_is_last_slot() {
        let r = classify_row(&row("05-10-25_H24", 60.0, Cell::Number(1.0)), &layout()).unwrap();
        assert_eq!((r.hour_from, r.hour_to), (23, 24));
    }

    #[test]
    fn quarter_hour_rows_are_not_hourly() {
        assert_eq!(
            classify_row(&row("05-10-25_Q03", 15.0, Cell::Number(1.0)), &layout()),
            Err(SkipReason::NotHourly)
        );
    }

    #[test]
    fn text_granularity_is_not_hourly() {
        let mut r = row("05-10-25_H03", 60.0, Cell::Number(1.0));
        r[2] = Cell::Text("60".into());
        assert_eq!(classify_row(&r, &layout()), Err(SkipReason::NotHourly));
    }

    #[test]
    fn block_products_are_instrument_mismatch() {
        assert_eq!(
            classify_row(&row("BASE_05-10-25", 60.0, Cell::Number(1.0)), &layout()),
            Err(SkipReason::InstrumentMismatch)
        );
    }

    #[test]
    fn impossible_date_is_skipped() {
        assert_eq!(
            classify_row(&row("31-02-25_H01", 60.0, Cell::Number(1.0)), &layout()),
            Err(SkipReason::InvalidDate)
        );
    }

    #[test]
    fn hour_labels_outside_range_are_skipped() {
        for label in ["05-10-25_H00", "05-10-25_H25"] {
            assert_eq!(
                classify_row(&row(label, 60.0, Cell::Number(1.0)), &layout()),
                Err(SkipReason::HourOutOfRange)
            );
        }
    }

    #[test]
    fn non_numeric_price_is_none_not_zero() {
        let r = classify_row(&row("05-10-25_H03", 60.0, Cell::Text("brak".into())), &layout())
            .unwrap();
        assert_eq!(r.price, None);
        let r = classify_row(&row("05-10-25_H04", 60.0, Cell::Empty), &layout()).unwrap();
        assert_eq!(r.price, None);
    }

    #[test]
    fn short_rows_do_not_panic() {
        assert_eq!(
            classify_row(&[Cell::Text("x".into())], &layout()),
            Err(SkipReason::NotHourly)
        );
    }

    #[test]
    fn grid_counts_skips_per_reason() {
        let grid = vec![
            vec![Cell::Text("Raport".into())],
            row("05-10-25_H01", 60.0, Cell::Number(300.0)),
            row("05-10-25_H02", 60.0, Cell::Number(-5.0)),
            row("05-10-25_Q01", 15.0, Cell::Number(1.0)),
            row("05-10-25_Q02", 15.0, Cell::Number(1.0)),
            row("nonsense", 60.0, Cell::Number(1.0)),
        ];
        let parsed = parse_grid(&grid, &layout());
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].price, Some(-5.0));
        assert_eq!(parsed.skipped[&SkipReason::NotHourly], 3);
        assert_eq!(parsed.skipped[&SkipReason::InstrumentMismatch], 1);
        assert_eq!(parsed.skipped_total(), 4);
    }

    #[test]
    fn custom_column_layout() {
        let layout = SpreadsheetConfig {
            instrument_column: 0,
            granularity_column: 1,
            price_column: 2,
            ..SpreadsheetConfig::default()
        };
        let r = vec![
            Cell::Text("01-01-26_H01".into()),
            Cell::Number(60.0),
            Cell::Number(88.0),
        ];
        let rec = classify_row(&r, &layout).unwrap();
        assert_eq!(rec.trade_date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(rec.hour_from, 0);
    }

    #[test]
    fn calamine_cells_convert() {
        assert_eq!(Cell::from(&Data::Int(60)), Cell::Number(60.0));
        assert_eq!(Cell::from(&Data::Float(1.5)), Cell::Number(1.5));
        assert_eq!(Cell::from(&Data::String("a".into())), Cell::Text("a".into()));
        assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
    }

    #[test]
    fn discovers_month_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = layout().file_prefix;
        for name in [
            format!("{prefix}2025_10_02.xlsx"),
            format!("{prefix}2025_10_01.xlsx"),
            format!("{prefix}2025_11_01.xlsx"),
            format!("{prefix}2025_10_03.xlsx.part"),
            "notes.txt".to_string(),
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let files =
            discover_archive_files(dir.path(), Period::new(2025, 10).unwrap(), &prefix).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![format!("{prefix}2025_10_01.xlsx"), format!("{prefix}2025_10_02.xlsx")]
        );
    }

    #[test]
    fn unreadable_workbook_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"not a zip archive").unwrap();
        let err = read_workbook(&path, &layout()).unwrap_err();
        assert!(err.to_string().contains("broken.xlsx"));
    }
}
