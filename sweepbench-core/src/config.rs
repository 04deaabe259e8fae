//! Per-Test Settings
//!
//! The `[config]` table of a test definition. It is handed explicitly to the
//! executor, the series builder and the tabular writer; nothing reads it
//! through global state.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Requested series ordering, as written in the test definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortSpec {
    /// Mode name, optionally prefixed with `-` to reverse (`"avg"`, `"-max"`)
    Named(String),
    /// Explicit permutation of series indices
    Explicit(Vec<usize>),
}

/// Settings of one test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// Samples wanted per coordinate
    #[serde(default = "default_n_runs")]
    pub n_runs: usize,
    /// Extra attempts after a timeout
    #[serde(default)]
    pub n_retry: usize,
    /// Per-attempt timeout (e.g., "30s", "500ms")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Variables left out of progress lines
    #[serde(default)]
    pub var_hide: Vec<String>,
    /// Divisor applied to numeric x values: `g`, `m`, `k` or a number.
    /// Keys are a variable name, or `<variable>-<result type>`.
    #[serde(default)]
    pub var_divider: IndexMap<String, String>,
    /// Reduction mode per result type; `result` is the fallback entry
    #[serde(default)]
    pub result_mode: IndexMap<String, String>,
    /// Columns written by the tabular writer
    #[serde(default = "default_output_columns")]
    pub output_columns: Vec<String>,
    /// Series ordering
    #[serde(default)]
    pub series_sort: Option<SortSpec>,
    /// Keep at most this many series per result type
    #[serde(default)]
    pub max_series: Option<usize>,
    /// Drop samples beyond this many standard deviations before reducing
    #[serde(default)]
    pub accept_outliers_mult: Option<f64>,
    /// Variable used as the x axis
    #[serde(default)]
    pub x_key: Option<String>,
    /// Tags that must all be given for the test to be picked up from a directory
    #[serde(default)]
    pub require_tags: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            n_runs: default_n_runs(),
            n_retry: 0,
            timeout: default_timeout(),
            var_hide: Vec::new(),
            var_divider: IndexMap::new(),
            result_mode: IndexMap::new(),
            output_columns: default_output_columns(),
            series_sort: None,
            max_series: None,
            accept_outliers_mult: None,
            x_key: None,
            require_tags: Vec::new(),
        }
    }
}

fn default_n_runs() -> usize {
    1
}
fn default_timeout() -> String {
    "30s".to_string()
}
fn default_output_columns() -> Vec<String> {
    vec!["x".to_string(), "mean".to_string()]
}

impl TestConfig {
    /// Raw divisor setting for `key`, preferring the `<key>-<result type>` entry
    pub fn divider_spec(&self, key: &str, result_type: Option<&str>) -> Option<&str> {
        result_type
            .and_then(|rt| self.var_divider.get(&format!("{}-{}", key, rt)))
            .or_else(|| self.var_divider.get(key))
            .map(String::as_str)
    }

    /// Reduction mode name for `result_type`
    pub fn result_mode(&self, result_type: &str) -> Option<&str> {
        self.result_mode
            .get(result_type)
            .or_else(|| self.result_mode.get(crate::DEFAULT_RESULT_TYPE))
            .map(String::as_str)
    }
}
