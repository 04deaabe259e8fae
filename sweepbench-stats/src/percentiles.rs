//! Percentile Computation
//!
//! Linear interpolation between closest ranks, the same definition spreadsheet
//! tools and NumPy use by default. Percentiles are always computed from the
//! raw samples.

/// Compute a single percentile from samples
///
/// Uses linear interpolation between nearest ranks. Returns NaN for an empty
/// sample set. `percentile` is clamped to `[0, 100]`.
///
/// # Examples
///
/// ```
/// # use sweepbench_stats::compute_percentile;
/// let samples = vec![1.0, 2.0, 3.0, 4.0];
/// assert_eq!(compute_percentile(&samples, 50.0), 2.5);
/// ```
pub fn compute_percentile(samples: &[f64], percentile: f64) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }

    if samples.len() == 1 {
        return samples[0];
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let p = percentile.clamp(0.0, 100.0) / 100.0;

    // Linear interpolation between nearest ranks
    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = (lower_idx + 1).min(n - 1);
    let fraction = rank - lower_idx as f64;

    sorted[lower_idx] + fraction * (sorted[upper_idx] - sorted[lower_idx])
}

/// Median (50th percentile)
pub fn compute_median(samples: &[f64]) -> f64 {
    compute_percentile(samples, 50.0)
}
