//! Canonical month file: CSV writer, exact-inverse reader, metadata sidecar.
//!
//! Layout: `{dir}/tge_rdn_hourly_YYYY-MM.csv` plus `{file}.meta.json`.
//!
//! - Fixed header and column order, rows sorted by `(date, hour_from)`
//! - Decimals in shortest round-trip form, null as an empty field
//! - Atomic writes (write to `.tmp`, rename into place)
//! - Sidecar with date range, counts, source and a BLAKE3 hash of the CSV bytes

use super::provider::{DataError, DataSource};
use crate::domain::{HourlyPriceRecord, Period};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CANONICAL_HEADER: [&str; 5] = [
    "date",
    "hour_from",
    "hour_to",
    "price_pln_per_mwh",
    "volume_mwh",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Metadata sidecar for a canonical file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvMeta {
    pub file_name: String,
    /// `YYYY-MM` when the file holds one month.
    pub period: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub record_count: usize,
    pub null_prices: usize,
    pub source: DataSource,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

/// Serialize records (sorted by key) with the canonical header.
pub fn write_records<W: Write>(writer: W, records: &[HourlyPriceRecord]) -> Result<(), csv::Error> {
    let mut sorted: Vec<&HourlyPriceRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.key());

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CANONICAL_HEADER)?;
    for r in sorted {
        wtr.write_record([
            r.trade_date.format(DATE_FORMAT).to_string(),
            r.hour_from.to_string(),
            r.hour_to.to_string(),
            render_decimal(r.price),
            render_decimal(r.volume),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Canonical CSV text for a batch of records.
pub fn to_csv_bytes(records: &[HourlyPriceRecord]) -> Result<Vec<u8>, DataError> {
    let mut buf = Vec::new();
    write_records(&mut buf, records).map_err(|e| DataError::FormatMismatch {
        context: "csv serialization".into(),
        reason: e.to_string(),
    })?;
    Ok(buf)
}

/// `f64` Display is the shortest text that parses back to the same value.
pub(crate) fn render_decimal(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Parse canonical CSV. `context` (usually the file name) prefixes every error.
///
/// Rows come back in file order.
pub fn read_records<R: Read>(reader: R, context: &str) -> Result<Vec<HourlyPriceRecord>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = rdr.headers().map_err(|e| DataError::FormatMismatch {
        context: context.to_string(),
        reason: format!("unreadable header: {e}"),
    })?;
    if header.iter().ne(CANONICAL_HEADER) {
        return Err(DataError::FormatMismatch {
            context: context.to_string(),
            reason: format!(
                "header is '{}', expected '{}'",
                header.iter().collect::<Vec<_>>().join(","),
                CANONICAL_HEADER.join(",")
            ),
        });
    }

    let mut records = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row_no = i + 1;
        let parse_error = |reason: String| DataError::Parse {
            context: context.to_string(),
            row: row_no,
            reason,
        };

        let row = row.map_err(|e| parse_error(e.to_string()))?;
        if row.len() != CANONICAL_HEADER.len() {
            return Err(parse_error(format!(
                "expected {} fields, got {}",
                CANONICAL_HEADER.len(),
                row.len()
            )));
        }

        let date = NaiveDate::parse_from_str(&row[0], DATE_FORMAT)
            .map_err(|e| parse_error(format!("date '{}': {e}", &row[0])))?;
        let hour_from: u32 = row[1]
            .parse()
            .map_err(|_| parse_error(format!("hour_from '{}' is not an integer", &row[1])))?;
        let hour_to: u32 = row[2]
            .parse()
            .map_err(|_| parse_error(format!("hour_to '{}' is not an integer", &row[2])))?;
        let price = parse_decimal(&row[3]).map_err(|e| parse_error(format!("price: {e}")))?;
        let volume = parse_decimal(&row[4]).map_err(|e| parse_error(format!("volume: {e}")))?;

        let record = HourlyPriceRecord::with_span(date, hour_from, hour_to, price, volume)
            .map_err(|e| parse_error(e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

fn parse_decimal(text: &str) -> Result<Option<f64>, String> {
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| format!("'{text}' is not a decimal number"))
}

/// Read a canonical file from disk.
pub fn read_csv(path: &Path) -> Result<Vec<HourlyPriceRecord>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::io(path, e))?;
    read_records(file, &display_name(path))
}

/// Write a canonical file atomically and its metadata sidecar.
///
/// An existing file at `path` is replaced wholesale.
pub fn write_csv_atomic(
    path: &Path,
    records: &[HourlyPriceRecord],
    source: DataSource,
    period: Option<Period>,
) -> Result<CsvMeta, DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
    }

    let bytes = to_csv_bytes(records)?;
    let meta = CsvMeta {
        file_name: display_name(path),
        period: period.map(|p| p.label()),
        start_date: records.iter().map(|r| r.trade_date).min(),
        end_date: records.iter().map(|r| r.trade_date).max(),
        record_count: records.len(),
        null_prices: records.iter().filter(|r| r.price.is_none()).count(),
        source,
        data_hash: blake3::hash(&bytes).to_hex().to_string(),
        written_at: chrono::Local::now().naive_local(),
    };
    let sidecar = meta_path(path);
    let meta_json = serde_json::to_string_pretty(&meta)
        .map_err(|e| DataError::io(&sidecar, format!("meta serialization: {e}")))?;

    // Both temp files are complete before either rename touches the old pair.
    let tmp_path = with_suffix(path, ".tmp");
    let sidecar_tmp = with_suffix(&sidecar, ".tmp");
    fs::write(&tmp_path, &bytes).map_err(|e| DataError::io(&tmp_path, e))?;
    if let Err(e) = fs::write(&sidecar_tmp, meta_json) {
        let _ = fs::remove_file(&tmp_path);
        let _ = fs::remove_file(&sidecar_tmp);
        return Err(DataError::io(&sidecar_tmp, e));
    }

    // A stale sidecar must never describe the new file.
    if let Err(e) = fs::remove_file(&sidecar) {
        if e.kind() != std::io::ErrorKind::NotFound {
            let _ = fs::remove_file(&tmp_path);
            let _ = fs::remove_file(&sidecar_tmp);
            return Err(DataError::io(&sidecar, e));
        }
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        let _ = fs::remove_file(&sidecar_tmp);
        DataError::io(path, format!("atomic rename failed: {e}"))
    })?;
    fs::rename(&sidecar_tmp, &sidecar).map_err(|e| {
        let _ = fs::remove_file(&sidecar_tmp);
        DataError::io(&sidecar, format!("atomic rename failed: {e}"))
    })?;

    info!(
        file = %path.display(),
        records = meta.record_count,
        null_prices = meta.null_prices,
        "wrote canonical file"
    );
    Ok(meta)
}

/// Sidecar path for a canonical file: `{file}.meta.json`.
pub fn meta_path(path: &Path) -> PathBuf {
    with_suffix(path, ".meta.json")
}

/// Metadata sidecar, if one exists and parses.
pub fn read_meta(path: &Path) -> Option<CsvMeta> {
    let content = fs::read_to_string(meta_path(path)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Whether the file bytes still hash to what the sidecar recorded.
pub fn verify_hash(path: &Path, meta: &CsvMeta) -> Result<bool, DataError> {
    let bytes = fs::read(path).map_err(|e| DataError::io(path, e))?;
    Ok(blake3::hash(&bytes).to_hex().as_str() == meta.data_hash)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
