//! Record normalization: merge, de-duplicate, sort and validate.
//!
//! Every check here fails closed. Nothing is padded, interpolated, or
//! silently overwritten; the caller gets the exact offending keys.

use super::provider::{DataError, ValidationError};
use crate::domain::{HourlyPriceRecord, Period, RecordKey, HOURS_PER_DAY};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// What to do when two records share a `(trade_date, hour_from)` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with every duplicated key.
    #[default]
    Reject,
    /// Keep the first occurrence in input order, report the rest.
    KeepFirst,
}

/// Sorted, duplicate-free records plus what was dropped to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub records: Vec<HourlyPriceRecord>,
    /// One entry per dropped record (only under [`DuplicatePolicy::KeepFirst`]).
    pub dropped_duplicates: Vec<RecordKey>,
}

/// Sort records by key and apply the duplicate policy.
pub fn normalize(
    mut records: Vec<HourlyPriceRecord>,
    policy: DuplicatePolicy,
) -> Result<Normalized, ValidationError> {
    // Stable: among equal keys, input order survives, so "first" is well defined.
    records.sort_by_key(HourlyPriceRecord::key);

    let mut duplicated: Vec<RecordKey> = records
        .windows(2)
        .filter(|w| w[0].key() == w[1].key())
        .map(|w| w[1].key())
        .collect();

    if duplicated.is_empty() {
        return Ok(Normalized {
            records,
            dropped_duplicates: Vec::new(),
        });
    }

    match policy {
        DuplicatePolicy::Reject => {
            duplicated.dedup();
            Err(ValidationError::DuplicateKeys(duplicated))
        }
        DuplicatePolicy::KeepFirst => {
            records.dedup_by_key(|r| r.key());
            Ok(Normalized {
                records,
                dropped_duplicates: duplicated,
            })
        }
    }
}

/// Per-day gate: a single day's parse must yield exactly the hours 0..23.
pub fn check_day_hours(date: NaiveDate, records: &[HourlyPriceRecord]) -> Result<(), DataError> {
    if records.len() != usize::from(HOURS_PER_DAY) {
        return Err(DataError::RowCount {
            date,
            count: records.len(),
        });
    }

    let mut seen = [0usize; HOURS_PER_DAY as usize];
    for r in records {
        if let Some(n) = seen.get_mut(usize::from(r.hour_from)) {
            *n += 1;
        }
    }
    let missing: Vec<u8> = (0..HOURS_PER_DAY)
        .filter(|h| seen[usize::from(*h)] == 0)
        .collect();
    let duplicated: Vec<u8> = (0..HOURS_PER_DAY)
        .filter(|h| seen[usize::from(*h)] > 1)
        .collect();

    if missing.is_empty() && duplicated.is_empty() {
        Ok(())
    } else {
        Err(DataError::HourSet {
            date,
            missing,
            duplicated,
        })
    }
}

/// Every record must fall inside `period`.
pub fn check_within_period(
    records: &[HourlyPriceRecord],
    period: Period,
) -> Result<(), ValidationError> {
    let mut outside: Vec<RecordKey> = records
        .iter()
        .filter(|r| !period.contains(r.trade_date))
        .map(HourlyPriceRecord::key)
        .collect();
    if outside.is_empty() {
        return Ok(());
    }
    outside.sort();
    outside.dedup();
    Err(ValidationError::OutsidePeriod {
        period,
        keys: outside,
    })
}

/// Full-month gate: every `(day, hour)` slot of `period` must be present.
///
/// Reports exactly the missing keys, in on-disk order.
pub fn check_completeness(
    records: &[HourlyPriceRecord],
    period: Period,
) -> Result<(), ValidationError> {
    check_within_period(records, period)?;

    let present: HashSet<RecordKey> = records.iter().map(HourlyPriceRecord::key).collect();
    let missing: Vec<RecordKey> = period.keys().filter(|k| !present.contains(k)).collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::IncompleteMonth {
            period,
            expected: period.expected_records(),
            missing,
        })
    }
}

/// Price statistics over a batch of records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceSummary {
    pub records: usize,
    pub null_prices: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl PriceSummary {
    pub fn from_records(records: &[HourlyPriceRecord]) -> Self {
        let prices: Vec<f64> = records.iter().filter_map(|r| r.price).collect();
        let mean = if prices.is_empty() {
            None
        } else {
            Some(prices.iter().sum::<f64>() / prices.len() as f64)
        };
        Self {
            records: records.len(),
            null_prices: records.len() - prices.len(),
            min: prices.iter().copied().reduce(f64::min),
            max: prices.iter().copied().reduce(f64::max),
            mean,
        }
    }
}

impl fmt::Display for PriceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max, self.mean) {
            (Some(min), Some(max), Some(mean)) => write!(
                f,
                "{} records ({} without price), min={min:.2}, max={max:.2}, mean={mean:.2}",
                self.records, self.null_prices
            ),
            _ => write!(f, "{} records, no prices", self.records),
        }
    }
}
