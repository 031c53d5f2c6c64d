//! Exchange web-table provider.
//!
//! Fetches the day-ahead results page for one delivery day and reads the
//! hourly contracts table. One blocking request per day with a fixed timeout
//! and no retries: every failure goes back to the caller.
//!
//! Any deviation from the expected table shape is a hard error.

use super::normalize::check_day_hours;
use super::number::{parse_pl_number, parse_time_range};
use super::provider::{DataError, DayFetcher};
use crate::config::{SiteLayout, WebConfig, DATE_PLACEHOLDER};
use crate::domain::{HourlyPriceRecord, RecordError};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Web-table provider for one site layout.
pub struct WebTableProvider {
    client: reqwest::blocking::Client,
    layout: SiteLayout,
    url_template: String,
    table_id: String,
}

impl WebTableProvider {
    pub fn new(web: &WebConfig, layout: SiteLayout) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(web.timeout())
            .user_agent(web.user_agent.as_str())
            .build()
            .map_err(|e| DataError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            layout,
            url_template: web.url_template(layout).to_string(),
            table_id: web.table_id.clone(),
        })
    }

    /// Provider for the layout selected in the configuration.
    pub fn from_config(web: &WebConfig) -> Result<Self, DataError> {
        Self::new(web, web.layout)
    }

    pub fn layout(&self) -> SiteLayout {
        self.layout
    }

    /// Page URL for a delivery day.
    pub fn day_url(&self, date: NaiveDate) -> String {
        self.url_template
            .replace(DATE_PLACEHOLDER, &date.format("%Y-%m-%d").to_string())
    }

    fn fetch_page(&self, date: NaiveDate) -> Result<String, DataError> {
        let url = self.day_url(date);
        debug!(%url, "requesting day page");

        let fetch_error = |reason: String| DataError::Fetch {
            date,
            url: url.clone(),
            reason,
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")));
        }

        resp.text()
            .map_err(|e| fetch_error(format!("failed to read body: {e}")))
    }
}

impl DayFetcher for WebTableProvider {
    fn name(&self) -> &str {
        match self.layout {
            SiteLayout::New => "tge_web_table",
            SiteLayout::Old => "tge_web_table_old",
        }
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<HourlyPriceRecord>, DataError> {
        let html = self.fetch_page(date)?;
        parse_day_table(&html, date, &self.table_id)
    }
}

/// Parse the hourly contracts table of one delivery day.
///
/// Rows with fewer than three cells or without a time-range label are not
/// hourly rows and are skipped. Labels spanning anything other than one
/// in-day hour are skipped with a warning. A price or volume cell that is
/// neither a number nor the missing-value sentinel fails the whole day, as
/// does ending up with anything other than exactly the hours 0..23.
pub fn parse_day_table(
    html: &str,
    date: NaiveDate,
    table_id: &str,
) -> Result<Vec<HourlyPriceRecord>, DataError> {
    let document = Html::parse_document(html);
    let table_sel = selector(&format!("table[id=\"{table_id}\"]"), date)?;
    let row_sel = selector("tbody tr", date)?;
    let cell_sel = selector("td", date)?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| DataError::FormatMismatch {
            context: date.to_string(),
            reason: format!("table #{table_id} not found"),
        })?;

    let mut records = Vec::with_capacity(24);

    for (i, tr) in table.select(&row_sel).enumerate() {
        let row = i + 1;
        let cells: Vec<String> = tr.select(&cell_sel).map(cell_text).collect();
        if cells.len() < 3 {
            continue;
        }

        let Some((hour_from, hour_to)) = parse_time_range(&cells[0]) else {
            debug!(%date, row, label = %cells[0], "skipping non-hourly row");
            continue;
        };

        let price = parse_pl_number(&cells[1]).map_err(|e| parse_error(date, row, "price", e))?;
        let volume = parse_pl_number(&cells[2]).map_err(|e| parse_error(date, row, "volume", e))?;

        match HourlyPriceRecord::with_span(date, hour_from, hour_to, price, volume) {
            Ok(record) => records.push(record),
            Err(e @ (RecordError::HourOutOfRange(_) | RecordError::HourSpan { .. })) => {
                warn!(%date, row, label = %cells[0], "skipping row with malformed time range: {e}");
            }
            Err(e) => return Err(parse_error(date, row, "record", e)),
        }
    }

    check_day_hours(date, &records)?;
    records.sort_by_key(|r| r.hour_from);
    Ok(records)
}

fn selector(css: &str, date: NaiveDate) -> Result<Selector, DataError> {
    Selector::parse(css).map_err(|e| DataError::FormatMismatch {
        context: date.to_string(),
        reason: format!("invalid selector '{css}': {e:?}"),
    })
}

fn cell_text(td: ElementRef<'_>) -> String {
    td.text().collect::<String>().trim().to_string()
}

fn parse_error(date: NaiveDate, row: usize, field: &str, err: impl std::fmt::Display) -> DataError {
    DataError::Parse {
        context: date.to_string(),
        row,
        reason: format!("{field}: {err}"),
    }
}
