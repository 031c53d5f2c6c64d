//! RDN Core: ingestion of day-ahead hourly electricity prices.
//!
//! This crate turns exchange publications into one canonical month file:
//! - Domain types (hourly records, record keys, monthly periods)
//! - Web-table and archive-workbook source adapters
//! - Normalization with explicit duplicate and completeness gates
//! - Canonical CSV writer/reader with a metadata sidecar
//! - Day × hour pivot for presentation

pub mod config;
pub mod data;
pub mod domain;
