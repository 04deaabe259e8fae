#![warn(missing_docs)]
//! SweepBench Statistical Engine
//!
//! Turns raw per-coordinate sample lists into the values reports show:
//! - Named reduction modes (`mean`, `median`, `perc<N>`, `std`, `all`, ...)
//! - Percentiles by linear interpolation between closest ranks
//! - Summary statistics (population standard deviation)
//! - Z-score outlier rejection

mod outliers;
mod percentiles;
mod reduce;
mod summary;

pub use outliers::{OutlierAnalysis, detect_outliers, reject_outliers};
pub use percentiles::{compute_median, compute_percentile};
pub use reduce::{ReduceError, Reduced, ReductionMode, reduce, reduce_named};
pub use summary::{SummaryStatistics, compute_summary, max, mean, min, std_dev};

/// Reduction applied when nothing is configured
pub const DEFAULT_REDUCTION: ReductionMode = ReductionMode::Mean;
