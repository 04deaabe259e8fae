//! Sample Reduction
//!
//! Collapses the samples of one coordinate into the value a report shows,
//! according to a named mode (`mean`, `perc95`, `all`, ...).
//!
//! Parsing a mode is fallible and typed; [`reduce_named`] is the lenient
//! entry point used by reporting code, which logs unknown modes and yields NaN
//! instead of failing the whole report.

use crate::percentiles::{compute_median, compute_percentile};
use crate::summary::{max, mean, min, std_dev};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a reduction mode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// Name matches no mode
    #[error("Unknown reduction mode: {0}")]
    UnknownMode(String),

    /// `perc` suffix is not an integer in 0..=100
    #[error("Invalid percentile '{0}': expected perc<N> with integer N in 0..=100")]
    InvalidPercentile(String),
}

/// How a sample list is reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionMode {
    /// `mean` / `avg`
    Mean,
    /// `min`
    Min,
    /// `max`
    Max,
    /// `perc<N>`
    Percentile(u8),
    /// `median` / `med`
    Median,
    /// `std`: population standard deviation
    StdDev,
    /// `nres` / `n`: number of samples
    Count,
    /// `first`: earliest recorded sample
    First,
    /// `last`: latest recorded sample
    Last,
    /// `all`: samples passed through unchanged
    All,
}

impl FromStr for ReductionMode {
    type Err = ReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = s.trim().to_lowercase();
        match mode.as_str() {
            "mean" | "avg" => Ok(ReductionMode::Mean),
            "min" => Ok(ReductionMode::Min),
            "max" => Ok(ReductionMode::Max),
            "median" | "med" => Ok(ReductionMode::Median),
            "std" => Ok(ReductionMode::StdDev),
            "nres" | "n" => Ok(ReductionMode::Count),
            "first" => Ok(ReductionMode::First),
            "last" => Ok(ReductionMode::Last),
            "all" => Ok(ReductionMode::All),
            _ => match mode.strip_prefix("perc") {
                Some(n) => n
                    .parse::<u8>()
                    .ok()
                    .filter(|p| *p <= 100)
                    .map(ReductionMode::Percentile)
                    .ok_or_else(|| ReduceError::InvalidPercentile(s.to_string())),
                None => Err(ReduceError::UnknownMode(s.to_string())),
            },
        }
    }
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionMode::Mean => f.write_str("mean"),
            ReductionMode::Min => f.write_str("min"),
            ReductionMode::Max => f.write_str("max"),
            ReductionMode::Percentile(p) => write!(f, "perc{}", p),
            ReductionMode::Median => f.write_str("median"),
            ReductionMode::StdDev => f.write_str("std"),
            ReductionMode::Count => f.write_str("n"),
            ReductionMode::First => f.write_str("first"),
            ReductionMode::Last => f.write_str("last"),
            ReductionMode::All => f.write_str("all"),
        }
    }
}

/// Outcome of a reduction
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced {
    /// Single value
    Scalar(f64),
    /// Raw samples (`all` mode)
    All(Vec<f64>),
}

impl Reduced {
    /// Single value view: pass-through results are summarized by their mean
    pub fn as_scalar(&self) -> f64 {
        match self {
            Reduced::Scalar(v) => *v,
            Reduced::All(samples) => mean(samples),
        }
    }

    /// Every value carried by the reduction
    pub fn values(&self) -> Vec<f64> {
        match self {
            Reduced::Scalar(v) => vec![*v],
            Reduced::All(samples) => samples.clone(),
        }
    }
}

/// Reduce `samples` with `mode`.
///
/// Scalar modes yield NaN on an empty list, except [`ReductionMode::Count`].
pub fn reduce(samples: &[f64], mode: ReductionMode) -> Reduced {
    let value = match mode {
        ReductionMode::Mean => mean(samples),
        ReductionMode::Min => min(samples),
        ReductionMode::Max => max(samples),
        ReductionMode::Percentile(p) => compute_percentile(samples, p as f64),
        ReductionMode::Median => compute_median(samples),
        ReductionMode::StdDev => std_dev(samples),
        ReductionMode::Count => samples.len() as f64,
        ReductionMode::First => samples.first().copied().unwrap_or(f64::NAN),
        ReductionMode::Last => samples.last().copied().unwrap_or(f64::NAN),
        ReductionMode::All => return Reduced::All(samples.to_vec()),
    };
    Reduced::Scalar(value)
}

/// Reduce with a mode given by name; an invalid name logs a warning and yields NaN.
pub fn reduce_named(samples: &[f64], mode: &str) -> Reduced {
    match mode.parse::<ReductionMode>() {
        Ok(mode) => reduce(samples, mode),
        Err(e) => {
            tracing::warn!("{}", e);
            Reduced::Scalar(f64::NAN)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(samples: &[f64], mode: &str) -> f64 {
        reduce_named(samples, mode).as_scalar()
    }

    #[test]
    fn test_reference_values() {
        let samples = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(scalar(&samples, "mean"), 2.5);
        assert_eq!(scalar(&samples, "avg"), 2.5);
        assert_eq!(scalar(&samples, "median"), 2.5);
        assert_eq!(scalar(&samples, "med"), 2.5);
        assert_eq!(scalar(&samples, "min"), 1.0);
        assert_eq!(scalar(&samples, "max"), 4.0);
        assert_eq!(scalar(&samples, "first"), 1.0);
        assert_eq!(scalar(&samples, "last"), 4.0);
        assert_eq!(scalar(&samples, "nres"), 4.0);
        assert_eq!(scalar(&[5.0], "n"), 1.0);
        assert!((scalar(&samples, "std") - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(scalar(&samples, "perc0"), 1.0);
        assert_eq!(scalar(&samples, "perc100"), 4.0);
        assert_eq!(scalar(&samples, "perc50"), 2.5);
    }

    #[test]
    fn test_first_and_last_follow_recording_order() {
        let samples = [9.0, 1.0, 5.0];
        assert_eq!(scalar(&samples, "first"), 9.0);
        assert_eq!(scalar(&samples, "last"), 5.0);
    }

    #[test]
    fn test_all_passes_through() {
        assert_eq!(reduce_named(&[3.0, 1.0], "all"), Reduced::All(vec![3.0, 1.0]));
        assert_eq!(reduce_named(&[], "all"), Reduced::All(Vec::new()));
    }

    #[test]
    fn test_empty_samples() {
        assert!(scalar(&[], "max").is_nan());
        assert!(scalar(&[], "mean").is_nan());
        assert!(scalar(&[], "first").is_nan());
        assert_eq!(scalar(&[], "n"), 0.0);
    }

    #[test]
    fn test_unknown_mode_is_nan() {
        assert!(scalar(&[1.0], "geomean").is_nan());
        assert_eq!(
            "geomean".parse::<ReductionMode>(),
            Err(ReduceError::UnknownMode("geomean".to_string()))
        );
    }

    #[test]
    fn test_percentile_parsing() {
        assert_eq!("perc95".parse::<ReductionMode>(), Ok(ReductionMode::Percentile(95)));
        assert_eq!("PERC5".parse::<ReductionMode>(), Ok(ReductionMode::Percentile(5)));
        assert!(matches!(
            "perc101".parse::<ReductionMode>(),
            Err(ReduceError::InvalidPercentile(_))
        ));
        assert!(matches!(
            "perc".parse::<ReductionMode>(),
            Err(ReduceError::InvalidPercentile(_))
        ));
        assert!(matches!(
            "perc9.5".parse::<ReductionMode>(),
            Err(ReduceError::InvalidPercentile(_))
        ));
        assert!(scalar(&[1.0, 2.0], "perc200").is_nan());
    }

    #[test]
    fn test_display_round_trips() {
        for mode in ["mean", "min", "max", "perc90", "median", "std", "n", "first", "last", "all"] {
            let parsed: ReductionMode = mode.parse().unwrap();
            assert_eq!(parsed.to_string(), mode);
        }
    }
}
