//! Month pivot: hourly records to a day × hour price matrix.
//!
//! Cells hold the mean of the non-null prices sharing a `(day, hour)` slot.
//! A slot with no price is an explicit `None`; nothing is filled forward.

use super::csv_store::render_decimal;
use super::normalize::{check_completeness, check_within_period};
use super::provider::{DataError, ValidationError};
use crate::domain::{HourlyPriceRecord, Period, HOURS_PER_DAY};
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

type Row = [Option<f64>; HOURS_PER_DAY as usize];

/// Day × hour price matrix for one month.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    period: Period,
    /// Days of month present in the input, ascending.
    days: Vec<u32>,
    /// One row per entry of `days`, columns are hours 0..23.
    rows: Vec<Row>,
}

#[derive(Serialize)]
struct MatrixJson<'a> {
    period: String,
    hours: Vec<u8>,
    days: &'a [u32],
    prices: &'a [Row],
}

impl PriceMatrix {
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn days(&self) -> &[u32] {
        &self.days
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Price for a day of month and hour, `None` for no data.
    pub fn get(&self, day: u32, hour: u8) -> Option<f64> {
        let i = self.days.binary_search(&day).ok()?;
        self.rows[i].get(usize::from(hour)).copied().flatten()
    }

    /// Smallest and largest cell, for colour scaling.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let mut values = self.rows.iter().flatten().filter_map(|c| *c);
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Wide CSV: `day,0,1,...,23`, empty cell for no data.
    pub fn to_csv_string(&self) -> Result<String, DataError> {
        let csv_error = |e: csv::Error| DataError::FormatMismatch {
            context: format!("pivot {}", self.period),
            reason: e.to_string(),
        };

        let mut wtr = csv::Writer::from_writer(vec![]);
        let header = std::iter::once("day".to_string()).chain((0..HOURS_PER_DAY).map(|h| h.to_string()));
        wtr.write_record(header).map_err(csv_error)?;
        for (day, row) in self.days.iter().zip(&self.rows) {
            let fields = std::iter::once(day.to_string()).chain(row.iter().map(|c| render_decimal(*c)));
            wtr.write_record(fields).map_err(csv_error)?;
        }
        let data = wtr.into_inner().map_err(|e| DataError::FormatMismatch {
            context: format!("pivot {}", self.period),
            reason: format!("failed to flush CSV writer: {e}"),
        })?;
        String::from_utf8(data).map_err(|e| DataError::FormatMismatch {
            context: format!("pivot {}", self.period),
            reason: e.to_string(),
        })
    }

    /// JSON object with `period`, `hours`, `days` and a `prices` grid (null for no data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&MatrixJson {
            period: self.period.label(),
            hours: (0..HOURS_PER_DAY).collect(),
            days: &self.days,
            prices: &self.rows,
        })
    }
}

/// Pivot one month of records. Records spanning more than one month fail.
pub fn pivot_month(records: &[HourlyPriceRecord]) -> Result<PriceMatrix, DataError> {
    let first = records.first().ok_or(ValidationError::Empty)?;
    let period = Period::of(first.trade_date);
    check_within_period(records, period)?;

    let mut slots: BTreeMap<u32, [(f64, usize); HOURS_PER_DAY as usize]> = BTreeMap::new();
    for r in records {
        let row = slots
            .entry(r.trade_date.day())
            .or_insert([(0.0, 0); HOURS_PER_DAY as usize]);
        if let (Some(price), Some(slot)) = (r.price, row.get_mut(usize::from(r.hour_from))) {
            slot.0 += price;
            slot.1 += 1;
        }
    }

    let days: Vec<u32> = slots.keys().copied().collect();
    let rows: Vec<Row> = slots
        .values()
        .map(|row| (*row).map(|(sum, n)| (n > 0).then(|| sum / n as f64)))
        .collect();

    Ok(PriceMatrix { period, days, rows })
}

/// Pivot only a complete month: any missing `(day, hour)` key fails closed.
pub fn pivot_complete_month(
    records: &[HourlyPriceRecord],
    period: Period,
) -> Result<PriceMatrix, DataError> {
    check_completeness(records, period)?;
    pivot_month(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecordKey;
    use chrono::NaiveDate;

    fn rec(month: u32, day: u32, hour: u32, price: Option<f64>) -> HourlyPriceRecord {
        let date = NaiveDate::from_ymd_opt(2025, month, day).unwrap();
        HourlyPriceRecord::new(date, hour, price, None).unwrap()
    }

    #[test]
    fn same_slot_prices_are_averaged() {
        let m = pivot_month(&[rec(3, 1, 0, Some(100.0)), rec(3, 1, 0, Some(300.0))]).unwrap();
        assert_eq!(m.get(1, 0), Some(200.0));
    }

    #[test]
    fn null_prices_do_not_count_toward_mean() {
        let m = pivot_month(&[rec(3, 1, 5, Some(80.0)), rec(3, 1, 5, None), rec(3, 1, 6, None)]).unwrap();
        assert_eq!(m.get(1, 5), Some(80.0));
        assert_eq!(m.get(1, 6), None);
    }

    #[test]
    fn rows_are_days_present_ascending() {
        let m = pivot_month(&[rec(3, 9, 0, Some(1.0)), rec(3, 2, 23, Some(2.0))]).unwrap();
        assert_eq!(m.days(), &[2, 9]);
        assert_eq!(m.get(2, 23), Some(2.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.get(5, 0), None);
        assert_eq!(m.period(), Period::new(2025, 3).unwrap());
    }

    #[test]
    fn mixed_months_are_rejected() {
        let err = pivot_month(&[rec(3, 31, 0, Some(1.0)), rec(4, 1, 0, Some(1.0))]).unwrap_err();
        assert!(matches!(err, DataError::Validation(ValidationError::OutsidePeriod { .. })));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            pivot_month(&[]),
            Err(DataError::Validation(ValidationError::Empty))
        ));
    }

    #[test]
    fn incomplete_month_yields_no_matrix() {
        let period = Period::new(2025, 3).unwrap();
        let records: Vec<_> = period
            .keys()
            .filter(|k| *k != RecordKey::new(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), 14))
            .map(|k| HourlyPriceRecord::new(k.trade_date, u32::from(k.hour_from), Some(1.0), None).unwrap())
            .collect();
        match pivot_complete_month(&records, period) {
            Err(DataError::Validation(ValidationError::IncompleteMonth { missing, .. })) => {
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].to_string(), "(2025-03-15, 14)");
            }
            other => panic!("expected IncompleteMonth, got {other:?}"),
        }
    }

    #[test]
    fn min_max_over_present_cells() {
        let m = pivot_month(&[rec(3, 1, 0, Some(-20.0)), rec(3, 1, 1, Some(450.5)), rec(3, 2, 0, None)]).unwrap();
        assert_eq!(m.min_max(), Some((-20.0, 450.5)));
        let empty = pivot_month(&[rec(3, 1, 0, None)]).unwrap();
        assert_eq!(empty.min_max(), None);
    }

    #[test]
    fn wide_csv_layout() {
        let m = pivot_month(&[rec(3, 1, 0, Some(10.0)), rec(3, 1, 23, Some(12.5))]).unwrap();
        let csv = m.to_csv_string().unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("day,0,1,2,"));
        assert!(header.ends_with(",22,23"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,10,,"));
        assert!(row.ends_with(",12.5"));
        assert_eq!(row.split(',').count(), 25);
    }

    #[test]
    fn json_uses_null_for_no_data() {
        let m = pivot_month(&[rec(3, 1, 0, Some(10.0))]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&m.to_json().unwrap()).unwrap();
        assert_eq!(value["period"], "2025-03");
        assert_eq!(value["days"][0], 1);
        assert_eq!(value["prices"][0][0], 10.0);
        assert!(value["prices"][0][1].is_null());
        assert_eq!(value["hours"].as_array().unwrap().len(), 24);
    }
}
