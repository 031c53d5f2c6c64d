//! Cell text parsing for exchange-rendered values.
//!
//! The exchange renders numbers Polish-style: space or NBSP thousands
//! separators and a comma decimal separator ("3 759,20"). A lone "-" or an
//! empty cell means "no value", which is distinct from zero.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static TIME_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("'{0}' is not a decimal number")]
    Invalid(String),
}

/// Parse a locale-formatted decimal. `Ok(None)` for the missing-value sentinel.
pub fn parse_pl_number(text: &str) -> Result<Option<f64>, NumberError> {
    let s = text.trim();
    if s.is_empty() || s == "-" {
        return Ok(None);
    }

    let cleaned: String = s
        .chars()
        .filter(|c| !is_group_separator(*c))
        .map(|c| match c {
            ',' => '.',
            '\u{2212}' => '-',
            other => other,
        })
        .collect();

    let well_formed = !cleaned.is_empty()
        && cleaned
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')));
    if !well_formed {
        return Err(NumberError::Invalid(text.to_string()));
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| NumberError::Invalid(text.to_string()))
}

fn is_group_separator(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{202f}')
}

/// Parse a time-range label such as `"0-1"` or `"23-24"` into `(from, to)`.
///
/// Returns `None` for anything that is not a range label (header rows,
/// block products, footnotes), which callers treat as "not an hourly row".
pub fn parse_time_range(label: &str) -> Option<(u32, u32)> {
    let caps = TIME_RANGE.captures(label.trim())?;
    let from = caps[1].parse().ok()?;
    let to = caps[2].parse().ok()?;
    Some((from, to))
}
