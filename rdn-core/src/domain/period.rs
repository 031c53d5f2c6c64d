//! One calendar month of delivery days.

use super::record::{RecordKey, HOURS_PER_DAY};
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A calendar month. Construction validates the month, so the first and
/// last day are always representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    first_day: NaiveDate,
    last_day: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeriodError {
    #[error("invalid month {month} for year {year}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("invalid period '{0}', expected YYYY-MM")]
    Unparseable(String),
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        let invalid = || PeriodError::InvalidMonth { year, month };
        let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let last_day = next_first
            .and_then(|d| d.pred_opt())
            .ok_or_else(invalid)?;
        Ok(Self {
            first_day,
            last_day,
        })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        let first_day = date.with_day(1).unwrap_or(date);
        let last_day = first_day
            .checked_add_months(chrono::Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(date);
        Self {
            first_day,
            last_day,
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day.day()
    }

    /// Number of hourly records a complete month holds.
    pub fn expected_records(&self) -> usize {
        self.days_in_month() as usize * usize::from(HOURS_PER_DAY)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day && date <= self.last_day
    }

    /// Every delivery day in the month, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.first_day.iter_days().take(self.days_in_month() as usize)
    }

    /// Every `(date, hour_from)` slot in the month, in on-disk order.
    pub fn keys(&self) -> impl Iterator<Item = RecordKey> {
        self.days()
            .flat_map(|d| (0..HOURS_PER_DAY).map(move |h| RecordKey::new(d, h)))
    }

    /// `YYYY-MM`
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year(), self.month())
    }

    /// Output name for a month scraped from the web table.
    pub fn canonical_file_name(&self) -> String {
        format!("tge_rdn_hourly_{}.csv", self.label())
    }

    /// Output name for a month converted from the spreadsheet archive.
    pub fn spreadsheet_file_name(&self) -> String {
        format!("tge_rdn_hourly_{}.xlsx.csv", self.label())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparseable = || PeriodError::Unparseable(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(unparseable)?;
        let year: i32 = y.parse().map_err(|_| unparseable())?;
        let month: u32 = m.parse().map_err(|_| unparseable())?;
        Self::new(year, month)
    }
}
