#![warn(missing_docs)]
//! SweepBench Report - Series and Output
//!
//! Turns sample stores into what readers consume:
//! - Per-result-type series of (x, y, error) points, one series per build
//! - Space-delimited tabular files, one per (test, build, result type)
//! - JSON (machine-readable)

mod json;
mod natural;
mod series;
mod sort;
mod tabular;

pub use json::{SeriesReport, generate_json_report};
pub use natural::natural_cmp;
pub use series::{
    Dataset, ErrorBar, SeriesEntry, SeriesError, SeriesMap, SeriesOptions, XValue, build_series,
    parse_divider, var_divider,
};
pub use sort::{SeriesSort, SortKey};
pub use tabular::{OutputError, write_output};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON series dump
    Json,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
