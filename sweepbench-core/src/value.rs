//! Variable Values
//!
//! A variable either carries a bare scalar, or a compute value paired with a
//! display label (e.g. `1048576` shown as `1M`). Both forms are stored as text;
//! numeric behavior is derived by parsing the compute value.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Value bound to a variable in a [`Coordinate`](crate::Coordinate)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Bare value, used both for computation and display
    Scalar(String),
    /// Compute value with a separate display label
    Labeled(String, String),
}

impl Value {
    /// Create a labeled value
    pub fn labeled(compute: impl Into<String>, label: impl Into<String>) -> Self {
        Value::Labeled(compute.into(), label.into())
    }

    /// Value substituted into scripts and templated files
    pub fn compute_value(&self) -> &str {
        match self {
            Value::Scalar(v) => v,
            Value::Labeled(compute, _) => compute,
        }
    }

    /// Value shown to humans (label when present)
    pub fn display_value(&self) -> &str {
        match self {
            Value::Scalar(v) => v,
            Value::Labeled(_, label) => label,
        }
    }

    /// Numeric interpretation of the compute value, if any
    pub fn as_number(&self) -> Option<f64> {
        parse_number(self.compute_value())
    }

    /// Numeric-aware match: numbers compare by value, everything else by text.
    pub fn matches(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self.compute_value() == other.compute_value(),
        }
    }

    /// Total order used for display sorting
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => self.compute_value().cmp(other.compute_value()),
        }
    }

    /// Hash contribution that agrees with [`Value::matches`]
    pub(crate) fn hash_contribution(&self) -> u64 {
        match self.as_number() {
            // -0.0 == 0.0 must hash identically
            Some(n) if n == 0.0 => fxhash::hash64(&0u64),
            Some(n) => fxhash::hash64(&n.to_bits()),
            None => fxhash::hash64(self.compute_value()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_value())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(v.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v.to_string())
    }
}

/// Parse text as a finite number.
///
/// `"nan"` and `"inf"` are treated as plain text so that equality stays reflexive.
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
