//! Data ingestion: source adapters, normalization, canonical files, pivot

pub mod csv_store;
pub mod download;
pub mod normalize;
pub mod number;
pub mod pivot;
pub mod provider;
pub mod spreadsheet;
pub mod web_table;

pub use csv_store::{read_csv, read_meta, write_csv_atomic, CsvMeta, CANONICAL_HEADER};
pub use download::{fetch_month, fetch_range, FetchOptions, FetchSummary};
pub use normalize::{check_completeness, normalize, DuplicatePolicy, Normalized, PriceSummary};
pub use pivot::{pivot_complete_month, pivot_month, PriceMatrix};
pub use provider::{
    DataError, DataSource, DayFetcher, ErrorKind, FetchProgress, LogProgress, NoProgress,
    ValidationError,
};
pub use spreadsheet::{discover_archive_files, read_archive, read_workbook, SheetParse, SkipReason};
pub use web_table::{parse_day_table, WebTableProvider};
