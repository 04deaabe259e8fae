//! Outlier Rejection
//!
//! Z-score filtering: samples farther than `mult` population standard
//! deviations from the mean are dropped before reduction. Enabled per test
//! through `accept_outliers_mult`.

use crate::summary::{mean, std_dev};

/// Result of outlier analysis
#[derive(Debug, Clone)]
pub struct OutlierAnalysis {
    /// Samples kept, in recording order
    pub cleaned_samples: Vec<f64>,
    /// Indices of rejected samples
    pub outlier_indices: Vec<usize>,
    /// Lower acceptance bound
    pub lower_bound: f64,
    /// Upper acceptance bound
    pub upper_bound: f64,
}

/// Split samples into accepted values and outliers
pub fn detect_outliers(samples: &[f64], mult: f64) -> OutlierAnalysis {
    if samples.is_empty() {
        return OutlierAnalysis {
            cleaned_samples: Vec::new(),
            outlier_indices: Vec::new(),
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
        };
    }

    let mean = mean(samples);
    let spread = mult * std_dev(samples);
    let lower_bound = mean - spread;
    let upper_bound = mean + spread;

    let mut cleaned = Vec::with_capacity(samples.len());
    let mut outlier_indices = Vec::new();
    for (i, &sample) in samples.iter().enumerate() {
        if (sample - mean).abs() <= spread {
            cleaned.push(sample);
        } else {
            outlier_indices.push(i);
        }
    }

    OutlierAnalysis {
        cleaned_samples: cleaned,
        outlier_indices,
        lower_bound,
        upper_bound,
    }
}

/// Samples within `mult` standard deviations of the mean
pub fn reject_outliers(samples: &[f64], mult: f64) -> Vec<f64> {
    let analysis = detect_outliers(samples, mult);
    if !analysis.outlier_indices.is_empty() {
        tracing::debug!(
            "Rejected {} of {} samples outside [{}, {}]",
            analysis.outlier_indices.len(),
            samples.len(),
            analysis.lower_bound,
            analysis.upper_bound
        );
    }
    analysis.cleaned_samples
}
