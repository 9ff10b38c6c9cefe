//! Data ingestion and storage
//!
//! Timing exports, per-season extraction and the CSV files handed between stages.

pub mod dataset;
pub mod extract;
pub mod timing;

pub use extract::{extract_season, SeasonExtractor};
pub use timing::{SeasonTiming, Session};
