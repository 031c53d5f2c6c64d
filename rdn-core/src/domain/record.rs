//! The canonical unit of ingested market data.

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Number of hourly delivery slots in a regular delivery day.
pub const HOURS_PER_DAY: u8 = 24;

/// One hourly delivery slot of the day-ahead market.
///
/// Both source adapters emit this type with the same `hour_from` meaning
/// (0-based start of the interval), so downstream code never has to know
/// where a record came from.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyPriceRecord {
    pub trade_date: NaiveDate,
    pub hour_from: u8,
    pub hour_to: u8,
    /// PLN/MWh. Negative prices are real and pass through untouched.
    /// `None` means no price was published for the hour.
    pub price: Option<f64>,
    /// Traded volume in MWh.
    pub volume: Option<f64>,
}

/// Invariant violations on a single record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("hour_from {0} outside 0..24")]
    HourOutOfRange(u32),

    #[error("hour_to {hour_to} must equal hour_from + 1 (hour_from = {hour_from})")]
    HourSpan { hour_from: u32, hour_to: u32 },

    #[error("volume must be non-negative, got {0}")]
    NegativeVolume(f64),

    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },
}

impl HourlyPriceRecord {
    /// Build a record for the slot starting at `hour_from`.
    pub fn new(
        trade_date: NaiveDate,
        hour_from: u32,
        price: Option<f64>,
        volume: Option<f64>,
    ) -> Result<Self, RecordError> {
        Self::with_span(trade_date, hour_from, hour_from.saturating_add(1), price, volume)
    }

    /// Build a record from an explicit `[hour_from, hour_to)` span, as read
    /// from a time-range label or a CSV row.
    pub fn with_span(
        trade_date: NaiveDate,
        hour_from: u32,
        hour_to: u32,
        price: Option<f64>,
        volume: Option<f64>,
    ) -> Result<Self, RecordError> {
        if hour_from >= u32::from(HOURS_PER_DAY) {
            return Err(RecordError::HourOutOfRange(hour_from));
        }
        if hour_to != hour_from + 1 {
            return Err(RecordError::HourSpan { hour_from, hour_to });
        }
        if price.is_some_and(|p| !p.is_finite()) {
            return Err(RecordError::NonFinite { field: "price" });
        }
        if let Some(v) = volume {
            if !v.is_finite() {
                return Err(RecordError::NonFinite { field: "volume" });
            }
            if v < 0.0 {
                return Err(RecordError::NegativeVolume(v));
            }
        }

        // Both bounds checked above, the narrowing cannot truncate.
        Ok(Self {
            trade_date,
            hour_from: hour_from as u8,
            hour_to: hour_to as u8,
            price,
            volume,
        })
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            trade_date: self.trade_date,
            hour_from: self.hour_from,
        }
    }
}

/// Identity of an hourly slot: `(trade_date, hour_from)`.
///
/// The derived ordering (date first, then hour) is the on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub trade_date: NaiveDate,
    pub hour_from: u8,
}

impl RecordKey {
    pub fn new(trade_date: NaiveDate, hour_from: u8) -> Self {
        Self {
            trade_date,
            hour_from,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.trade_date, self.hour_from)
    }
}
