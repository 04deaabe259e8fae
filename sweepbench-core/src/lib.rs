#![warn(missing_docs)]
//! SweepBench Core - Parameter Space Model
//!
//! This crate provides the data model shared by every SweepBench stage:
//! - `Value`: a scalar or a (compute, label) pair bound to a variable
//! - `Coordinate`: one point of the parameter space, with numeric-aware
//!   equality, hashing and ordering
//! - `Build`: the identity of the program variant under test
//! - `TestConfig`: per-test settings passed explicitly to every stage
//! - `SampleStore`: raw samples per coordinate and result type, persisted as
//!   JSON for resumable runs

mod build;
mod config;
mod coordinate;
mod store;
mod value;

pub use build::Build;
pub use config::{SortSpec, TestConfig};
pub use coordinate::{Coordinate, static_keys};
pub use store::{DEFAULT_RESULT_TYPE, RunResults, SampleStore, StoreError};
pub use value::{Value, parse_number};
