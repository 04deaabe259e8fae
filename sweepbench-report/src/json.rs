//! JSON Output

use crate::series::SeriesMap;
use serde::Serialize;

/// Serialized form of a series build
#[derive(Debug, Serialize)]
pub struct SeriesReport<'a> {
    /// Schema identifier
    pub schema: &'static str,
    /// Test the series belong to
    pub test: &'a str,
    /// Variable used for x
    pub x_key: &'a str,
    /// Series per result type
    pub series: &'a SeriesMap,
}

/// Generate prettified JSON for a series map.
///
/// NaN values (missing data) are written as `null`.
pub fn generate_json_report(
    test: &str,
    x_key: &str,
    series: &SeriesMap,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&SeriesReport {
        schema: "sweepbench-series-v1",
        test,
        x_key,
        series,
    })
}
