//! Source provider trait and structured error types.
//!
//! The DayFetcher trait abstracts over per-day sources (the exchange's web
//! table, fixtures in tests) so the fetch loop can be driven without a network.

use crate::domain::{HourlyPriceRecord, Period, RecordKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Structured error types for ingestion.
///
/// These are designed to be displayable in CLI output with enough context
/// (date, file, row) to locate the offending input.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("fetch failed for {date} ({url}): {reason}")]
    Fetch {
        date: NaiveDate,
        url: String,
        reason: String,
    },

    #[error("{date}: expected 24 hourly rows, got {count} (page layout may have changed or the day is irregular)")]
    RowCount { date: NaiveDate, count: usize },

    #[error("{date}: hourly rows do not cover 0..23 (missing {missing:?}, duplicated {duplicated:?})")]
    HourSet {
        date: NaiveDate,
        missing: Vec<u8>,
        duplicated: Vec<u8>,
    },

    #[error("{context}: format mismatch: {reason}")]
    FormatMismatch { context: String, reason: String },

    #[error("{context}, row {row}: {reason}")]
    Parse {
        context: String,
        row: usize,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("spreadsheet {}: {reason}", .path.display())]
    Spreadsheet { path: PathBuf, reason: String },

    #[error("I/O error on {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(String),
}

/// Coarse classification of a [`DataError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    FormatMismatch,
    Parse,
    Validation,
    Io,
    Config,
}

impl DataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::Fetch { .. } => ErrorKind::Fetch,
            DataError::RowCount { .. }
            | DataError::HourSet { .. }
            | DataError::FormatMismatch { .. } => ErrorKind::FormatMismatch,
            DataError::Parse { .. } => ErrorKind::Parse,
            DataError::Validation(_) => ErrorKind::Validation,
            DataError::Spreadsheet { .. } | DataError::Io { .. } => ErrorKind::Io,
            DataError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        DataError::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

/// Post-aggregation invariant violations. Never repaired silently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("duplicate records for {}", format_keys(.0))]
    DuplicateKeys(Vec<RecordKey>),

    #[error("{period} is incomplete: {} of {expected} hourly records missing: {}", .missing.len(), format_keys(.missing))]
    IncompleteMonth {
        period: Period,
        expected: usize,
        missing: Vec<RecordKey>,
    },

    #[error("records outside {period}: {}", format_keys(.keys))]
    OutsidePeriod { period: Period, keys: Vec<RecordKey> },

    #[error("no records to process")]
    Empty,
}

fn format_keys(keys: &[RecordKey]) -> String {
    const SHOWN: usize = 20;
    let mut out: Vec<String> = keys.iter().take(SHOWN).map(|k| k.to_string()).collect();
    if keys.len() > SHOWN {
        out.push(format!("... and {} more", keys.len() - SHOWN));
    }
    out.join(", ")
}

/// Where a batch of records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    WebTable,
    Spreadsheet,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataSource::WebTable => "web_table",
            DataSource::Spreadsheet => "spreadsheet",
        })
    }
}

/// Trait for sources that deliver one delivery day per call.
///
/// Implementations return exactly the 24 hourly records of `date` or fail;
/// they never pad, guess, or retry.
pub trait DayFetcher {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch the hourly records of one delivery day.
    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<HourlyPriceRecord>, DataError>;
}

/// Progress callback for multi-day fetches.
pub trait FetchProgress {
    /// Called when starting to fetch a day.
    fn on_start(&self, date: NaiveDate, index: usize, total: usize);

    /// Called when a day completes; `Ok` carries the record count.
    fn on_complete(
        &self,
        date: NaiveDate,
        index: usize,
        total: usize,
        result: Result<usize, &DataError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that logs through `tracing`.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, date: NaiveDate, index: usize, total: usize) {
        info!("[{}/{}] fetching {date}", index + 1, total);
    }

    fn on_complete(
        &self,
        date: NaiveDate,
        _index: usize,
        _total: usize,
        result: Result<usize, &DataError>,
    ) {
        match result {
            Ok(n) => info!(%date, records = n, "day ok"),
            Err(e) => warn!(%date, error = %e, "day failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!("fetch complete: {succeeded}/{total} days succeeded, {failed} failed");
    }
}

/// Progress reporter that discards all events.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_start(&self, _date: NaiveDate, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        _date: NaiveDate,
        _index: usize,
        _total: usize,
        _result: Result<usize, &DataError>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
