//! Domain types for RDN hourly price ingestion

pub mod period;
pub mod record;

pub use period::{Period, PeriodError};
pub use record::{HourlyPriceRecord, RecordError, RecordKey, HOURS_PER_DAY};
