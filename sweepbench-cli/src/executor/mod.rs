//! Test Executor
//!
//! Runs a test's scripts over its variable space and collects samples.
//!
//! ## Pipeline Overview
//!
//! ```text
//! TestDefinition (TOML)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  template   │  $VAR substitution, input files per coordinate
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  execution  │  Trials per coordinate, timeout/retry, RESULT parsing
//! └──────┬──────┘
//!        │
//!        ▼
//!   SampleStore ──► series (sweepbench-report)
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Trial loop and result extraction
//! - [`template`] - Variable substitution and templated input files
//! - [`formatting`] - Human-readable output formatting

mod execution;
mod formatting;
mod template;

// Re-export public API
pub use execution::{ExecutionError, Executor, RunOutcome};
pub use formatting::format_human_output;
pub use template::{TemplateGuard, substitute};
