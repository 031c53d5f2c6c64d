//! Ingestion configuration.
//!
//! URL templates, the table id, the workbook layout, politeness settings and
//! the output location are explicit values handed to each adapter. There is no
//! process-wide state. Loaded from TOML; every field has a default, so an
//! empty file is a valid configuration.

use crate::data::normalize::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Placeholder replaced by the ISO delivery date in URL templates.
pub const DATE_PLACEHOLDER: &str = "{date}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdnConfig {
    pub web: WebConfig,
    pub spreadsheet: SpreadsheetConfig,
    pub output: OutputConfig,
    pub validation: ValidationConfig,
}

impl RdnConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, template) in [
            ("url_template_new", &self.web.url_template_new),
            ("url_template_old", &self.web.url_template_old),
        ] {
            if !template.contains(DATE_PLACEHOLDER) {
                return Err(ConfigError::Invalid(format!(
                    "web.{name} must contain {DATE_PLACEHOLDER}"
                )));
            }
        }
        if self.web.table_id.trim().is_empty() {
            return Err(ConfigError::Invalid("web.table_id must not be empty".into()));
        }
        if self.web.timeout_secs == 0 {
            return Err(ConfigError::Invalid("web.timeout_secs must be positive".into()));
        }

        let s = &self.spreadsheet;
        if s.instrument_column == s.granularity_column
            || s.instrument_column == s.price_column
            || s.granularity_column == s.price_column
        {
            return Err(ConfigError::Invalid(
                "spreadsheet columns must be distinct".into(),
            ));
        }
        Ok(())
    }
}

/// Which exchange page layout to scrape.
///
/// The site migrated layouts in November 2025; older delivery days are only
/// served by the old page. The caller chooses, nothing is auto-detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteLayout {
    #[default]
    New,
    Old,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub layout: SiteLayout,
    pub url_template_new: String,
    pub url_template_old: String,
    /// `id` attribute of the hourly contracts table.
    pub table_id: String,
    pub timeout_secs: u64,
    /// Pause between consecutive day requests.
    pub request_delay_ms: u64,
    pub user_agent: String,
}

impl WebConfig {
    pub fn url_template(&self, layout: SiteLayout) -> &str {
        match layout {
            SiteLayout::New => &self.url_template_new,
            SiteLayout::Old => &self.url_template_old,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            layout: SiteLayout::New,
            url_template_new: "https://tge.pl/energia-elektryczna-rdn-tge-base?date_start={date}&iframe=1"
                .into(),
            url_template_old: "https://tge.pl/energia-elektryczna-rdn?date_start={date}".into(),
            table_id: "footable_kontrakty_godzinowe".into(),
            timeout_secs: 30,
            request_delay_ms: 250,
            user_agent: concat!("rdn/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Layout of the archive workbooks (0-based column indexes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetConfig {
    pub sheet_name: String,
    pub instrument_column: usize,
    pub granularity_column: usize,
    pub price_column: usize,
    /// File-name prefix of the daily archive reports.
    pub file_prefix: String,
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            sheet_name: "WYNIKI".into(),
            instrument_column: 1,
            granularity_column: 2,
            price_column: 3,
            file_prefix: "Raport_RDN_dzie_dostawy_delivery_day_".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Refuse to write a month file that lacks any hourly slot.
    pub require_complete_month: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            require_complete_month: true,
        }
    }
}
