//! Series ordering
//!
//! Computes the permutation applied to the series of one result type.

use crate::natural::natural_cmp;
use crate::series::{SeriesEntry, SeriesError};
use std::cmp::Ordering;
use sweepbench_core::SortSpec;

/// Ordering criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending sum of y (a series containing NaN counts as 0)
    Avg,
    /// Descending maximum of y; a series containing NaN sorts last
    Max,
    /// Ascending minimum of y; a series containing NaN sorts last
    Min,
    /// Natural order of build names
    Natsort,
    /// Ascending build color index
    Color,
    /// Caller-provided permutation
    Explicit(Vec<usize>),
}

/// Parsed series ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSort {
    /// Criterion
    pub key: SortKey,
    /// Flip the computed order (`-` prefix)
    pub reversed: bool,
}

impl SeriesSort {
    /// Parse a sort setting.
    ///
    /// Named modes accept a leading `-`. A string of comma separated indices
    /// is read as an explicit permutation.
    pub fn parse(spec: &SortSpec) -> Result<Self, SeriesError> {
        let name = match spec {
            SortSpec::Explicit(order) => {
                return Ok(Self {
                    key: SortKey::Explicit(order.clone()),
                    reversed: false,
                });
            }
            SortSpec::Named(name) => name.trim(),
        };

        let (reversed, mode) = match name.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, name),
        };

        let key = match mode {
            "avg" => SortKey::Avg,
            "max" => SortKey::Max,
            "min" => SortKey::Min,
            "natsort" => SortKey::Natsort,
            "color" => SortKey::Color,
            other => match parse_index_list(other) {
                Some(order) => SortKey::Explicit(order),
                None => return Err(SeriesError::UnknownSortMode(other.to_string())),
            },
        };

        Ok(Self { key, reversed })
    }

    /// Indices of `entries` in display order.
    ///
    /// `colors` is indexed like `entries`; missing colors sort last.
    pub fn order(&self, entries: &[SeriesEntry], colors: &[usize]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..entries.len()).collect();

        match &self.key {
            SortKey::Avg => sort_by_key(&mut order, |i| avg_key(&entries[i].y)),
            SortKey::Max => sort_by_key(&mut order, |i| -max_key(&entries[i].y)),
            SortKey::Min => sort_by_key(&mut order, |i| min_key(&entries[i].y)),
            SortKey::Natsort => order.sort_by(|&a, &b| {
                natural_cmp(entries[a].build.pretty_name(), entries[b].build.pretty_name())
            }),
            SortKey::Color => {
                order.sort_by_key(|&i| colors.get(i).copied().unwrap_or(usize::MAX))
            }
            SortKey::Explicit(explicit) => match explicit.iter().find(|&&i| i >= entries.len()) {
                Some(bad) => {
                    tracing::error!("Series sort is invalid, {} is out of range", bad);
                    sort_by_key(&mut order, |i| avg_key(&entries[i].y));
                }
                None => order = explicit.clone(),
            },
        }

        if self.reversed {
            order.reverse();
        }
        order
    }
}

fn parse_index_list(s: &str) -> Option<Vec<usize>> {
    if s.is_empty() {
        return None;
    }
    s.split(',').map(|i| i.trim().parse::<usize>().ok()).collect()
}

// NaN keys go last, whatever their sign
fn sort_by_key(order: &mut [usize], key: impl Fn(usize) -> f64) {
    order.sort_by(|&a, &b| {
        let (ka, kb) = (key(a), key(b));
        match (ka.is_nan(), kb.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => ka.total_cmp(&kb),
        }
    });
}

fn avg_key(y: &[f64]) -> f64 {
    let sum: f64 = y.iter().sum();
    if sum.is_nan() { 0.0 } else { sum }
}

// Any NaN point makes the whole key NaN
fn max_key(y: &[f64]) -> f64 {
    if y.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    y.iter().copied().reduce(f64::max).unwrap_or(f64::NAN)
}

fn min_key(y: &[f64]) -> f64 {
    if y.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    y.iter().copied().reduce(f64::min).unwrap_or(f64::NAN)
}
