//! Fetch orchestrator: walks a date range one day at a time with progress reporting.
//!
//! Requests are strictly sequential and spaced by a politeness delay. The
//! delay is applied between requests, never after the last one.

use super::normalize::check_day_hours;
use super::provider::{DataError, DayFetcher, FetchProgress};
use crate::config::WebConfig;
use crate::domain::{HourlyPriceRecord, Period};
use chrono::NaiveDate;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    /// Pause between consecutive requests.
    pub delay: Duration,
    /// Fetch every day and collect failures instead of stopping at the first.
    pub keep_going: bool,
}

impl FetchOptions {
    pub fn from_config(web: &WebConfig, keep_going: bool) -> Self {
        Self {
            delay: web.request_delay(),
            keep_going,
        }
    }
}

/// Outcome of a multi-day fetch.
#[derive(Debug)]
pub struct FetchSummary {
    pub days_requested: usize,
    /// Records of every successful day, in date order.
    pub records: Vec<HourlyPriceRecord>,
    pub failures: Vec<(NaiveDate, DataError)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn days_succeeded(&self) -> usize {
        self.days_requested - self.failures.len()
    }
}

/// Fetch every day in `start..=end`.
///
/// Without `keep_going` the first failing day is returned as the error.
/// With it, all days are attempted and failures land in the summary.
pub fn fetch_range(
    fetcher: &dyn DayFetcher,
    start: NaiveDate,
    end: NaiveDate,
    options: FetchOptions,
    progress: &dyn FetchProgress,
) -> Result<FetchSummary, DataError> {
    let days: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
    let total = days.len();
    let mut summary = FetchSummary {
        days_requested: total,
        records: Vec::with_capacity(total * 24),
        failures: Vec::new(),
    };

    for (i, date) in days.into_iter().enumerate() {
        if i > 0 && !options.delay.is_zero() {
            std::thread::sleep(options.delay);
        }

        progress.on_start(date, i, total);
        let result = fetch_checked_day(fetcher, date);
        progress.on_complete(date, i, total, result.as_ref().map(Vec::len));

        match result {
            Ok(records) => summary.records.extend(records),
            Err(e) if options.keep_going => summary.failures.push((date, e)),
            Err(e) => {
                progress.on_batch_complete(i, 1, total);
                return Err(e);
            }
        }
    }

    progress.on_batch_complete(summary.days_succeeded(), summary.failures.len(), total);
    Ok(summary)
}

/// Fetch every delivery day of a month.
pub fn fetch_month(
    fetcher: &dyn DayFetcher,
    period: Period,
    options: FetchOptions,
    progress: &dyn FetchProgress,
) -> Result<FetchSummary, DataError> {
    fetch_range(fetcher, period.first_day(), period.last_day(), options, progress)
}

/// One day from the fetcher, re-checked: exactly hours 0..23, all on `date`.
fn fetch_checked_day(fetcher: &dyn DayFetcher, date: NaiveDate) -> Result<Vec<HourlyPriceRecord>, DataError> {
    let records = fetcher.fetch_day(date)?;
    if let Some(stray) = records.iter().find(|r| r.trade_date != date) {
        return Err(DataError::FormatMismatch {
            context: date.to_string(),
            reason: format!("{} returned a record for {}", fetcher.name(), stray.trade_date),
        });
    }
    check_day_hours(date, &records)?;
    Ok(records)
}
