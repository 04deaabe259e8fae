#![warn(missing_docs)]
//! # SweepBench
//!
//! Parameter sweep benchmarking for external programs.
//!
//! A test definition names the scripts to run, a variable space to sweep and
//! how to reduce the numbers the scripts print:
//! - **Sweeps**: the cartesian product of all variables, one coordinate per combination
//! - **Resume**: samples are cached per build; only missing trials run again
//! - **Isolation**: each trial runs in its own process group and is killed as a whole on timeout
//! - **Builds**: the same test runs against several checkouts, each with its own `PATH`
//! - **Series**: per result type, one x/y series per build, sorted and truncated on request
//!
//! ```text
//! TestDefinition ──► Executor ──► SampleStore ──┬──► write_output (CSV)
//!                                               └──► build_series ──► human / JSON
//! ```
//!
//! ## Library use
//!
//! ```ignore
//! use sweepbench::prelude::*;
//!
//! let definition = TestDefinition::load("pipe.toml")?;
//! let runs = definition.variable_space().expand();
//! let executor = Executor::new(&definition)?;
//! let store = executor.execute_all(&Build::new("local"), &runs, &SampleStore::new(), true);
//! ```

// Re-export core types
pub use sweepbench_core::{
    Build, Coordinate, DEFAULT_RESULT_TYPE, RunResults, SampleStore, SortSpec, StoreError,
    TestConfig, Value, parse_number, static_keys,
};

// Re-export stats
pub use sweepbench_stats::{
    ReduceError, Reduced, ReductionMode, SummaryStatistics, compute_summary, reduce, reduce_named,
    reject_outliers,
};

// Re-export series building and output
pub use sweepbench_report::{
    Dataset, ErrorBar, OutputFormat, SeriesEntry, SeriesMap, SeriesOptions, XValue,
    build_series, generate_json_report, write_output,
};

// Re-export the execution engine
pub use sweepbench_cli::{ExecutionError, Executor, RunOutcome, TestDefinition, VariableSpace};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Build, Coordinate, Dataset, Executor, SampleStore, SeriesOptions, TestDefinition,
        build_series, write_output,
    };
}

/// Run the SweepBench CLI.
///
/// ```ignore
/// fn main() {
///     sweepbench::run().unwrap();
/// }
/// ```
pub use sweepbench_cli::run;
