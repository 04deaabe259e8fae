//! Series Building
//!
//! Turns the sample stores of one test (one store per build) into per-result-type
//! series of `(x, y, error)` points, one series per build.
//!
//! ## Pipeline
//!
//! ```text
//! [(TestConfig, Build, SampleStore)] + run list
//!        │
//!        ▼
//! ┌──────────────┐
//! │  per build   │  x from the x variable (divided), y reduced per result type
//! └──────┬───────┘  (parallel across builds)
//!        │
//!        ▼
//! ┌──────────────┐
//! │  x-sort      │  optional stable sort by ascending x
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │ series sort  │  avg / max / min / natsort / color / explicit, `-` reverses
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │  truncate    │  max_series
//! └──────────────┘
//! ```

use crate::sort::SeriesSort;
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use sweepbench_core::{Build, Coordinate, SampleStore, SortSpec, TestConfig, parse_number};
use sweepbench_stats::{
    DEFAULT_REDUCTION, compute_summary, reduce, reduce_named, reject_outliers,
};
use thiserror::Error;

/// Errors that abort series building
#[derive(Debug, Error)]
pub enum SeriesError {
    /// `series_sort` names no known ordering
    #[error("Unknown series sort mode: {0}")]
    UnknownSortMode(String),
}

/// Samples of one build for one test
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    /// Test name, used for output file names
    pub test_name: &'a str,
    /// Settings of the test
    pub config: &'a TestConfig,
    /// Build the samples were gathered with
    pub build: &'a Build,
    /// Gathered samples
    pub store: &'a SampleStore,
}

/// Caller-level series settings
#[derive(Debug, Clone, Default)]
pub struct SeriesOptions {
    /// Keep at most this many series per result type (0 keeps all)
    pub max_series: Option<usize>,
    /// Series ordering
    pub series_sort: Option<SortSpec>,
    /// Reduction mode per result type; `result` is the fallback entry
    pub y_group: IndexMap<String, String>,
    /// Color index of each build, used by the `color` ordering
    pub colors: Vec<usize>,
}

/// Position on the x axis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum XValue {
    /// Numeric variable value, after division
    Number(f64),
    /// Non-numeric value or build name
    Label(String),
}

impl XValue {
    fn from_display(value: &str, divider: f64) -> Self {
        match parse_number(value) {
            Some(n) => XValue::Number(n / divider),
            None => XValue::Label(value.to_string()),
        }
    }

    /// Ascending order: numbers first, then labels
    pub fn sort_cmp(&self, other: &XValue) -> Ordering {
        match (self, other) {
            (XValue::Number(a), XValue::Number(b)) => a.total_cmp(b),
            (XValue::Number(_), XValue::Label(_)) => Ordering::Less,
            (XValue::Label(_), XValue::Number(_)) => Ordering::Greater,
            (XValue::Label(a), XValue::Label(b)) => a.cmp(b),
        }
    }
}

impl std::fmt::Display for XValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XValue::Number(n) => write!(f, "{}", n),
            XValue::Label(s) => f.write_str(s),
        }
    }
}

/// Distribution kept next to each reduced value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBar {
    /// Mean of the samples
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Samples after outlier rejection
    pub samples: Vec<f64>,
}

impl ErrorBar {
    fn missing() -> Self {
        Self {
            mean: f64::NAN,
            std_dev: f64::NAN,
            samples: vec![f64::NAN],
        }
    }
}

/// One build's series for one result type
#[derive(Debug, Clone, Serialize)]
pub struct SeriesEntry {
    /// Build the points were measured with
    pub build: Build,
    /// x of each point
    pub x: Vec<XValue>,
    /// Reduced y of each point, NaN when missing
    pub y: Vec<f64>,
    /// Distribution behind each y
    pub errors: Vec<ErrorBar>,
}

/// Series per result type, in first-seen result type order
pub type SeriesMap = IndexMap<String, Vec<SeriesEntry>>;

/// Convert a divisor setting: `g`/`m`/`k` (any case) are binary multiples,
/// a number is used as-is, anything else means no division.
pub fn parse_divider(spec: &str) -> f64 {
    if let Some(n) = parse_number(spec) {
        return n;
    }
    match spec.trim().to_lowercase().as_str() {
        "g" => (1u64 << 30) as f64,
        "m" => (1u64 << 20) as f64,
        "k" => (1u64 << 10) as f64,
        _ => 1.0,
    }
}

/// Divisor for `key` in a test, default 1
pub fn var_divider(config: &TestConfig, key: &str, result_type: Option<&str>) -> f64 {
    config
        .divider_spec(key, result_type)
        .map(parse_divider)
        .filter(|d| *d != 0.0)
        .unwrap_or(1.0)
}

/// Build series for every result type seen in any dataset.
///
/// `run_list` fixes the order points are generated in. An unknown sort mode
/// aborts the call before any reduction happens.
pub fn build_series(
    datasets: &[Dataset<'_>],
    run_list: &[Coordinate],
    x_key: &str,
    do_x_sort: bool,
    options: &SeriesOptions,
) -> Result<SeriesMap, SeriesError> {
    let sort = match &options.series_sort {
        Some(SortSpec::Named(name)) if name.trim().is_empty() => None,
        Some(spec) => Some(SeriesSort::parse(spec)?),
        None => None,
    };

    let result_types: IndexSet<String> = datasets
        .iter()
        .flat_map(|d| d.store.result_types())
        .collect();

    let per_build: Vec<Vec<(String, SeriesEntry)>> = datasets
        .par_iter()
        .map(|dataset| {
            dataset_series(dataset, run_list, x_key, do_x_sort, &result_types, &options.y_group)
        })
        .collect();

    let mut series = SeriesMap::new();
    for entries in per_build {
        for (result_type, entry) in entries {
            series.entry(result_type).or_default().push(entry);
        }
    }

    if let Some(sort) = sort {
        for entries in series.values_mut() {
            let order = sort.order(entries, &options.colors);
            *entries = order.iter().map(|&i| entries[i].clone()).collect();
        }
    }

    if let Some(max_series) = options.max_series.filter(|m| *m > 0) {
        for entries in series.values_mut() {
            entries.truncate(max_series);
        }
    }

    Ok(series)
}

fn dataset_series(
    dataset: &Dataset<'_>,
    run_list: &[Coordinate],
    x_key: &str,
    do_x_sort: bool,
    result_types: &IndexSet<String>,
    y_group: &IndexMap<String, String>,
) -> Vec<(String, SeriesEntry)> {
    let build_name = dataset.build.pretty_name();

    result_types
        .iter()
        .map(|result_type| {
            let divider = var_divider(dataset.config, x_key, Some(result_type));
            let mode = y_group
                .get(result_type)
                .or_else(|| y_group.get(sweepbench_core::DEFAULT_RESULT_TYPE))
                .map(String::as_str)
                .or_else(|| dataset.config.result_mode(result_type));

            let mut points: Vec<(XValue, f64, ErrorBar)> = run_list
                .iter()
                .map(|run| {
                    let x = match run.display_value(x_key) {
                        Some(v) if !run.is_empty() => XValue::from_display(v, divider),
                        _ => XValue::Label(build_name.to_string()),
                    };

                    let samples = dataset
                        .store
                        .get(run)
                        .and_then(|results| results.get(result_type));
                    match samples {
                        Some(samples) => {
                            let samples = match dataset.config.accept_outliers_mult {
                                Some(mult) => reject_outliers(samples, mult),
                                None => samples.clone(),
                            };
                            let y = match mode {
                                Some(mode) => reduce_named(&samples, mode),
                                None => reduce(&samples, DEFAULT_REDUCTION),
                            }
                            .as_scalar();
                            let summary = compute_summary(&samples);
                            let error = ErrorBar {
                                mean: summary.mean,
                                std_dev: summary.std_dev,
                                samples,
                            };
                            (x, y, error)
                        }
                        None => (x, f64::NAN, ErrorBar::missing()),
                    }
                })
                .collect();

            if do_x_sort {
                // stable: equal x keep generation order
                points.sort_by(|a, b| a.0.sort_cmp(&b.0));
            }

            let mut entry = SeriesEntry {
                build: dataset.build.clone(),
                x: Vec::with_capacity(points.len()),
                y: Vec::with_capacity(points.len()),
                errors: Vec::with_capacity(points.len()),
            };
            for (x, y, error) in points {
                entry.x.push(x);
                entry.y.push(y);
                entry.errors.push(error);
            }
            (result_type.clone(), entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweepbench_core::RunResults;

    fn store_with(points: &[(&str, &str, &[f64])]) -> SampleStore {
        let mut store = SampleStore::new();
        for (n, result_type, samples) in points {
            let mut results = RunResults::new();
            results.insert(result_type.to_string(), samples.to_vec());
            store.merge(&Coordinate::new().with("n", *n), results);
        }
        store
    }

    fn runs(values: &[&str]) -> Vec<Coordinate> {
        values.iter().map(|n| Coordinate::new().with("n", *n)).collect()
    }

    #[test]
    fn test_divider_mapping() {
        assert_eq!(parse_divider("G"), 1073741824.0);
        assert_eq!(parse_divider("m"), 1048576.0);
        assert_eq!(parse_divider("k"), 1024.0);
        assert_eq!(parse_divider("3"), 3.0);
        assert_eq!(parse_divider("bogus"), 1.0);
        assert_eq!(var_divider(&TestConfig::default(), "n", None), 1.0);
    }

    #[test]
    fn test_single_build_mean_with_x_sort() {
        let config = TestConfig::default();
        let build = Build::new("local");
        let store = store_with(&[("2", "latency", &[20.0, 22.0]), ("1", "latency", &[10.0, 12.0])]);
        let datasets = [Dataset {
            test_name: "t",
            config: &config,
            build: &build,
            store: &store,
        }];

        let series = build_series(&datasets, &runs(&["2", "1"]), "n", true, &SeriesOptions::default())
            .unwrap();
        let entry = &series["latency"][0];
        assert_eq!(entry.x, vec![XValue::Number(1.0), XValue::Number(2.0)]);
        assert_eq!(entry.y, vec![11.0, 21.0]);
        assert_eq!(entry.errors[0].samples, vec![10.0, 12.0]);
        assert_eq!(entry.errors[0].std_dev, 1.0);
    }

    #[test]
    fn test_generation_order_without_x_sort() {
        let config = TestConfig::default();
        let build = Build::new("local");
        let store = store_with(&[("1", "result", &[1.0]), ("2", "result", &[2.0])]);
        let datasets = [Dataset {
            test_name: "t",
            config: &config,
            build: &build,
            store: &store,
        }];

        let series = build_series(&datasets, &runs(&["2", "1"]), "n", false, &SeriesOptions::default())
            .unwrap();
        assert_eq!(series["result"][0].y, vec![2.0, 1.0]);
    }

    #[test]
    fn test_missing_types_become_nan() {
        let config = TestConfig::default();
        let (a, b) = (Build::new("a"), Build::new("b"));
        let store_a = store_with(&[("1", "latency", &[1.0])]);
        let store_b = store_with(&[("1", "throughput", &[5.0])]);
        let datasets = [
            Dataset { test_name: "t", config: &config, build: &a, store: &store_a },
            Dataset { test_name: "t", config: &config, build: &b, store: &store_b },
        ];

        let series = build_series(&datasets, &runs(&["1"]), "n", false, &SeriesOptions::default())
            .unwrap();
        assert_eq!(series.keys().collect::<Vec<_>>(), vec!["latency", "throughput"]);
        assert_eq!(series["latency"].len(), 2);
        assert!(series["latency"][1].y[0].is_nan());
        assert!(series["latency"][1].errors[0].mean.is_nan());
        assert!(series["latency"][1].errors[0].samples[0].is_nan());
        assert_eq!(series["throughput"][1].y, vec![5.0]);
    }

    #[test]
    fn test_divider_and_mode_selection() {
        let mut config = TestConfig::default();
        config.var_divider.insert("n".to_string(), "k".to_string());
        let build = Build::new("local");
        let store = store_with(&[("2048", "latency", &[1.0, 9.0, 5.0])]);
        let datasets = [Dataset { test_name: "t", config: &config, build: &build, store: &store }];

        let mut options = SeriesOptions::default();
        options.y_group.insert("result".to_string(), "max".to_string());
        let series = build_series(&datasets, &runs(&["2048"]), "n", false, &options).unwrap();
        assert_eq!(series["latency"][0].x, vec![XValue::Number(2.0)]);
        assert_eq!(series["latency"][0].y, vec![9.0]);

        options.y_group.insert("latency".to_string(), "first".to_string());
        let series = build_series(&datasets, &runs(&["2048"]), "n", false, &options).unwrap();
        assert_eq!(series["latency"][0].y, vec![1.0]);
    }

    #[test]
    fn test_empty_coordinate_uses_build_name() {
        let config = TestConfig::default();
        let build = Build::new("upstream");
        let mut store = SampleStore::new();
        let mut results = RunResults::new();
        results.insert("result".to_string(), vec![3.0]);
        store.insert(Coordinate::new(), Some(results));
        let datasets = [Dataset { test_name: "t", config: &config, build: &build, store: &store }];

        let series =
            build_series(&datasets, &[Coordinate::new()], "n", true, &SeriesOptions::default())
                .unwrap();
        assert_eq!(series["result"][0].x, vec![XValue::Label("upstream".to_string())]);
    }

    #[test]
    fn test_unknown_sort_is_fatal() {
        let config = TestConfig::default();
        let build = Build::new("local");
        let store = store_with(&[("1", "result", &[1.0])]);
        let datasets = [Dataset { test_name: "t", config: &config, build: &build, store: &store }];
        let options = SeriesOptions {
            series_sort: Some(SortSpec::Named("sideways".to_string())),
            ..Default::default()
        };

        let err = build_series(&datasets, &runs(&["1"]), "n", false, &options).unwrap_err();
        assert!(matches!(err, SeriesError::UnknownSortMode(ref m) if m == "sideways"));
    }

    #[test]
    fn test_sort_then_truncate() {
        let config = TestConfig::default();
        let builds = [Build::new("a"), Build::new("b"), Build::new("c")];
        let stores = [
            store_with(&[("1", "result", &[10.0])]),
            store_with(&[("1", "result", &[2.0])]),
            store_with(&[("1", "result", &[7.0])]),
        ];
        let datasets: Vec<Dataset<'_>> = builds
            .iter()
            .zip(stores.iter())
            .map(|(build, store)| Dataset { test_name: "t", config: &config, build, store })
            .collect();
        let options = SeriesOptions {
            series_sort: Some(SortSpec::Named("avg".to_string())),
            max_series: Some(2),
            ..Default::default()
        };

        let series = build_series(&datasets, &runs(&["1"]), "n", false, &options).unwrap();
        let names: Vec<_> = series["result"].iter().map(|e| e.build.pretty_name()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_truncate_per_result_type() {
        let config = TestConfig::default();
        let builds = [Build::new("a"), Build::new("b"), Build::new("c")];
        let stores = [
            store_with(&[("1", "latency", &[10.0]), ("1", "throughput", &[1.0])]),
            store_with(&[("1", "latency", &[2.0]), ("1", "throughput", &[30.0])]),
            store_with(&[("1", "latency", &[7.0]), ("1", "throughput", &[5.0])]),
        ];
        let datasets: Vec<Dataset<'_>> = builds
            .iter()
            .zip(stores.iter())
            .map(|(build, store)| Dataset { test_name: "t", config: &config, build, store })
            .collect();
        let options = SeriesOptions {
            series_sort: Some(SortSpec::Named("avg".to_string())),
            max_series: Some(2),
            ..Default::default()
        };

        let series = build_series(&datasets, &runs(&["1"]), "n", false, &options).unwrap();
        let names = |rt: &str| -> Vec<&str> {
            series[rt].iter().map(|e| e.build.pretty_name()).collect()
        };
        assert_eq!(names("latency"), vec!["b", "c"]);
        assert_eq!(names("throughput"), vec!["a", "c"]);
    }
}
