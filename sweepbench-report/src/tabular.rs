//! Tabular Output
//!
//! Writes one space-delimited file per (test, build, result type) straight from
//! the sample stores, one row per coordinate that has data.

use crate::series::Dataset;
use indexmap::{IndexMap, IndexSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use sweepbench_core::Coordinate;
use sweepbench_stats::reduce_named;
use thiserror::Error;

/// Errors while writing tabular output
#[derive(Debug, Error)]
pub enum OutputError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record encoding failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Write the rows of every dataset under `output_dir`.
///
/// `statics` lists the variables left out of the `x` column. Returns the
/// written paths; nothing is written when `output_dir` is `None`.
pub fn write_output<S: AsRef<str>, C: AsRef<str>>(
    datasets: &[Dataset<'_>],
    statics: &[S],
    run_list: &[Coordinate],
    output_dir: Option<&Path>,
    columns: &[C],
) -> Result<Vec<PathBuf>, OutputError> {
    let Some(output_dir) = output_dir else {
        return Ok(Vec::new());
    };
    std::fs::create_dir_all(output_dir)?;

    let result_types: IndexSet<String> = datasets
        .iter()
        .flat_map(|d| d.store.result_types())
        .collect();
    let show_build = datasets.len() > 1;
    let mut written = Vec::new();

    for dataset in datasets {
        let mut writers: IndexMap<&str, (PathBuf, csv::Writer<File>)> = IndexMap::new();
        for result_type in &result_types {
            let path = output_dir.join(file_name(dataset, result_type, show_build));
            let writer = csv::WriterBuilder::new()
                .delimiter(b' ')
                .quote_style(csv::QuoteStyle::Necessary)
                .flexible(true)
                .from_path(&path)?;
            writers.insert(result_type.as_str(), (path, writer));
        }

        for run in run_list {
            let Some(results) = dataset.store.get(run) else {
                continue;
            };
            for (result_type, (_, writer)) in writers.iter_mut() {
                let Some(samples) = results.get(*result_type) else {
                    continue;
                };
                let row = build_row(run, samples, statics, columns);
                if !row.is_empty() {
                    writer.write_record(&row)?;
                }
            }
        }

        for (_, (path, mut writer)) in writers {
            writer.flush()?;
            tracing::info!("Output written to {}", path.display());
            written.push(path);
        }
    }

    Ok(written)
}

fn build_row<S: AsRef<str>, C: AsRef<str>>(
    run: &Coordinate,
    samples: &[f64],
    statics: &[S],
    columns: &[C],
) -> Vec<String> {
    let mut row = Vec::new();
    for column in columns {
        match column.as_ref() {
            "x" => row.extend(
                run.iter()
                    .filter(|(name, _)| !statics.iter().any(|s| s.as_ref() == *name))
                    .map(|(_, value)| value.display_value().to_string()),
            ),
            "all_x" => row.extend(run.iter().map(|(_, value)| value.display_value().to_string())),
            "raw" => row.extend(samples.iter().map(f64::to_string)),
            mode => row.extend(reduce_named(samples, mode).values().iter().map(f64::to_string)),
        }
    }
    row
}

fn file_name(dataset: &Dataset<'_>, result_type: &str, show_build: bool) -> String {
    let mut name = sanitize(dataset.test_name);
    if show_build {
        name.push('-');
        name.push_str(&sanitize(dataset.build.pretty_name()));
    }
    name.push('-');
    name.push_str(&sanitize(result_type));
    name.push_str(".csv");
    name
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c == '/' || c.is_whitespace() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweepbench_core::{Build, RunResults, SampleStore, TestConfig, Value};

    fn store() -> SampleStore {
        let mut store = SampleStore::new();
        for (n, samples) in [("1", vec![10.0, 12.0]), ("2", vec![20.0, 22.0])] {
            let mut results = RunResults::new();
            results.insert("latency".to_string(), samples);
            store.merge(
                &Coordinate::new().with("n", n).with("size", Value::labeled("1024", "1K")),
                results,
            );
        }
        store
    }

    fn runs() -> Vec<Coordinate> {
        ["1", "2", "3"]
            .iter()
            .map(|n| Coordinate::new().with("n", *n).with("size", Value::labeled("1024", "1K")))
            .collect()
    }

    #[test]
    fn test_rows_and_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = TestConfig::default();
        let build = Build::new("local");
        let store = store();
        let datasets = [Dataset { test_name: "pipe test", config: &config, build: &build, store: &store }];

        let written = write_output(
            &datasets,
            &["size"],
            &runs(),
            Some(dir.path()),
            &["x", "mean", "raw"],
        )
        .unwrap();

        assert_eq!(written, vec![dir.path().join("pipe_test-latency.csv")]);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(content, "1 11 10 12\n2 21 20 22\n");
    }

    #[test]
    fn test_all_x_and_build_in_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = TestConfig::default();
        let (a, b) = (Build::new("a"), Build::new("b"));
        let store = store();
        let empty = SampleStore::new();
        let datasets = [
            Dataset { test_name: "t", config: &config, build: &a, store: &store },
            Dataset { test_name: "t", config: &config, build: &b, store: &empty },
        ];
        let statics: [&str; 0] = [];

        let written =
            write_output(&datasets, &statics, &runs(), Some(dir.path()), &["all_x", "max"]).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("t-a-latency.csv"), dir.path().join("t-b-latency.csv")]
        );
        let content = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(content, "1 1K 12\n2 1K 22\n");
        assert_eq!(std::fs::read_to_string(&written[1]).unwrap(), "");
    }

    #[test]
    fn test_no_output_dir() {
        let config = TestConfig::default();
        let build = Build::new("local");
        let store = store();
        let datasets = [Dataset { test_name: "t", config: &config, build: &build, store: &store }];
        let written = write_output(&datasets, &["n"], &runs(), None, &["x"]).unwrap();
        assert!(written.is_empty());
    }
}
