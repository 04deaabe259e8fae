//! Summary Statistics
//!
//! Moments and extremes of a sample list. The standard deviation is the
//! population one (divide by `n`), matching the error bars the series builder
//! reports next to each reduced value.

use crate::percentiles::compute_median;

/// Summary of one sample list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStatistics {
    /// Arithmetic mean
    pub mean: f64,
    /// 50th percentile
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Number of samples
    pub sample_count: usize,
}

/// Arithmetic mean, NaN when empty
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation, NaN when empty
pub fn std_dev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mean = mean(samples);
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    variance.sqrt()
}

/// Smallest sample, NaN when empty
pub fn min(samples: &[f64]) -> f64 {
    samples.iter().copied().min_by(f64::total_cmp).unwrap_or(f64::NAN)
}

/// Largest sample, NaN when empty
pub fn max(samples: &[f64]) -> f64 {
    samples.iter().copied().max_by(f64::total_cmp).unwrap_or(f64::NAN)
}

/// Compute all summary statistics at once
pub fn compute_summary(samples: &[f64]) -> SummaryStatistics {
    SummaryStatistics {
        mean: mean(samples),
        median: compute_median(samples),
        std_dev: std_dev(samples),
        min: min(samples),
        max: max(samples),
        sample_count: samples.len(),
    }
}
