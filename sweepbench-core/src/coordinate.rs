//! Run Coordinates
//!
//! A [`Coordinate`] is one point of the parameter space: an insertion-ordered
//! assignment of values to variable names. It is the key of every
//! [`SampleStore`](crate::SampleStore).
//!
//! Equality is bidirectional containment: `a == b` iff every variable of `a`
//! is present in `b` with a matching value and vice versa. Values match
//! numerically when both parse as numbers (`"1"` equals `"1.0"`), textually
//! otherwise. Hashing sums per-variable contributions so that it is
//! independent of insertion order and consistent with equality.

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One named-variable assignment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coordinate {
    variables: IndexMap<String, Value>,
}

impl Coordinate {
    /// Create an empty coordinate
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind a variable, replacing any previous value in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Value bound to `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Display value bound to `name`
    pub fn display_value(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(Value::display_value)
    }

    /// Whether `name` is bound
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Variables in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Variable names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Number of bound variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether no variable is bound
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Whether every variable of `self` exists in `other` with a matching value
    pub fn inside(&self, other: &Coordinate) -> bool {
        self.variables.iter().all(|(name, value)| {
            other
                .variables
                .get(name)
                .is_some_and(|other_value| value.matches(other_value))
        })
    }

    /// Render `name = label` pairs, skipping hidden variables
    pub fn format_display<S: AsRef<str>>(&self, hide: &[S]) -> String {
        self.variables
            .iter()
            .filter(|(name, _)| !hide.iter().any(|h| h.as_ref() == name.as_str()))
            .map(|(name, value)| format!("{} = {}", name, value.display_value()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Copy retaining only the `keep` variables
    pub fn project<S: AsRef<str>>(&self, keep: &[S]) -> Coordinate {
        let mut projected = self.clone();
        projected.intersect(keep);
        projected
    }

    /// Drop every variable not in `common`, in place.
    ///
    /// Only meant for scratch copies: a coordinate already used as a store key
    /// must not be narrowed.
    pub fn intersect<S: AsRef<str>>(&mut self, common: &[S]) -> &mut Self {
        self.variables
            .retain(|name, _| common.iter().any(|c| c.as_ref() == name.as_str()));
        self
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.inside(other) && other.inside(self)
    }
}

impl Eq for Coordinate {}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let sum = self.variables.iter().fold(0u64, |acc, (name, value)| {
            acc.wrapping_add(fxhash::hash64(name.as_str()))
                .wrapping_add(value.hash_contribution())
        });
        state.write_u64(sum);
    }
}

impl PartialOrd for Coordinate {
    /// Lexicographic over `self`'s insertion order.
    ///
    /// Returns `None` when the two coordinates do not bind the same variables.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        for (name, value) in &self.variables {
            let other_value = other.variables.get(name)?;
            match value.compare(other_value) {
                Ordering::Equal => continue,
                ord => return Some(ord),
            }
        }
        if other.variables.len() != self.variables.len() {
            return None;
        }
        Some(Ordering::Equal)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_display::<&str>(&[]))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Coordinate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut coordinate = Coordinate::new();
        for (name, value) in iter {
            coordinate.insert(name, value);
        }
        coordinate
    }
}

/// Variables whose display value never changes across `runs`.
///
/// Returned in first-seen order. A variable missing from some run is not static.
pub fn static_keys(runs: &[Coordinate]) -> Vec<String> {
    let Some(first) = runs.first() else {
        return Vec::new();
    };
    first
        .iter()
        .filter(|(name, value)| {
            runs.iter().all(|run| {
                run.get(name)
                    .is_some_and(|v| v.display_value() == value.display_value())
            })
        })
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(c: &Coordinate) -> u64 {
        let mut hasher = DefaultHasher::new();
        c.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equality_is_numeric_aware() {
        let a = Coordinate::new().with("n", "1").with("mode", "fast");
        let b = Coordinate::new().with("mode", "fast").with("n", "1.0");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_equality_uses_compute_value() {
        let a = Coordinate::new().with("size", Value::labeled("1024", "1K"));
        let b = Coordinate::new().with("size", "1024");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_extra_key_is_not_equal() {
        let a = Coordinate::new().with("n", "1");
        let b = Coordinate::new().with("n", "1").with("m", "2");
        assert!(a.inside(&b));
        assert!(!b.inside(&a));
        assert_ne!(a, b);
        assert_ne!(b, a);
        assert_eq!(a.partial_cmp(&b), None);
        assert_eq!(b.partial_cmp(&a), None);
    }

    #[test]
    fn test_ordering() {
        let a = Coordinate::new().with("n", "2").with("m", "z");
        let b = Coordinate::new().with("n", "10").with("m", "a");
        assert!(a < b);

        let c = Coordinate::new().with("n", "2").with("m", "a");
        assert!(c < a);
        assert_eq!(a.partial_cmp(&a.clone()), Some(Ordering::Equal));
    }

    #[test]
    fn test_format_display() {
        let c = Coordinate::new()
            .with("n", "4")
            .with("size", Value::labeled("1048576", "1M"))
            .with("mode", "fast");
        assert_eq!(c.format_display(&["mode"]), "n = 4, size = 1M");
        assert_eq!(c.to_string(), "n = 4, size = 1M, mode = fast");
    }

    #[test]
    fn test_project_and_intersect() {
        let c = Coordinate::new().with("a", "1").with("b", "2").with("c", "3");
        let projected = c.project(&["a", "c"]);
        assert_eq!(projected.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(c.len(), 3);

        let mut scratch = c.clone();
        scratch.intersect(&["b"]);
        assert_eq!(scratch, Coordinate::new().with("b", "2"));
    }

    #[test]
    fn test_static_keys() {
        let runs = vec![
            Coordinate::new().with("n", "1").with("mode", "fast"),
            Coordinate::new().with("n", "2").with("mode", "fast"),
        ];
        assert_eq!(static_keys(&runs), vec!["mode".to_string()]);
        assert!(static_keys(&[]).is_empty());
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            (0i64..5).prop_map(Value::from),
            (0i64..5).prop_map(|n| Value::from(format!("{}.0", n))),
            "[ab]".prop_map(Value::from),
            (0i64..5).prop_map(|n| Value::labeled(n.to_string(), format!("L{}", n))),
        ]
    }

    fn coordinate_strategy() -> impl Strategy<Value = Vec<(String, Value)>> {
        prop::collection::vec(("[xyz]", value_strategy()), 0..4)
    }

    proptest! {
        #[test]
        fn prop_equality_symmetric(a in coordinate_strategy(), b in coordinate_strategy()) {
            let a: Coordinate = a.into_iter().collect();
            let b: Coordinate = b.into_iter().collect();
            prop_assert_eq!(a == b, b == a);
            if a == b {
                prop_assert_eq!(hash_of(&a), hash_of(&b));
            }
        }

        #[test]
        fn prop_insertion_order_independent(pairs in coordinate_strategy()) {
            let forward: Coordinate = pairs.clone().into_iter().collect();
            // Later duplicates win on insertion, so rebuild the reversed copy from the dedup'd form
            let deduped: Vec<(String, Value)> = forward
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            let reversed: Coordinate = deduped.into_iter().rev().collect();
            prop_assert!(forward == reversed);
            prop_assert_eq!(hash_of(&forward), hash_of(&reversed));
        }
    }
}
