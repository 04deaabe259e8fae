//! Test definitions
//!
//! A test is described by a TOML file: the scripts to run, an optional stdin
//! payload, templated input files, the variable space to sweep and the
//! `[config]` settings.
//!
//! ```toml
//! [test]
//! name = "pipe"
//!
//! [[script]]
//! content = "echo RESULT $N"
//!
//! [variables]
//! N = [1, 2, 4]
//! SIZE = { value = "1048576", label = "1M" }
//!
//! [config]
//! n_runs = 3
//! timeout = "10s"
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use sweepbench_core::{Coordinate, TestConfig, Value};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors from loading a test definition
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The definition file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("Invalid test definition: {0}")]
    Parse(#[from] toml::de::Error),

    /// No `[[script]]` table
    #[error("Test defines no script")]
    NoScript,

    /// Empty timeout string
    #[error("Empty duration string")]
    EmptyDuration,

    /// Timeout is not a number
    #[error("Invalid duration number: {0}")]
    InvalidDuration(String),

    /// Timeout suffix is not a known unit
    #[error("Unknown duration unit: {0}")]
    UnknownUnit(String),

    /// Result regex failed to compile
    #[error("Invalid result pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A parsed test definition file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestDefinition {
    /// Name and title
    #[serde(default)]
    pub test: TestInfo,
    /// Scripts run in order for every trial
    #[serde(default, rename = "script")]
    pub scripts: Vec<Script>,
    /// Payload written to each script's stdin
    #[serde(default)]
    pub stdin: String,
    /// Files written before a coordinate's trials and removed after
    #[serde(default, rename = "file")]
    pub files: Vec<TemplateFile>,
    /// Variable space, in declaration order
    #[serde(default)]
    pub variables: IndexMap<String, VariableDef>,
    /// Per-test settings
    #[serde(default)]
    pub config: TestConfig,
}

/// `[test]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestInfo {
    /// Test name; defaults to the file stem
    #[serde(default)]
    pub name: String,
    /// Human title; defaults to the name
    #[serde(default)]
    pub title: Option<String>,
}

/// One `[[script]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Label used in the header separating outputs of several scripts
    #[serde(default)]
    pub name: Option<String>,
    /// Shell source, run through `sh -c` after `$VAR` substitution
    pub content: String,
}

/// One `[[file]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFile {
    /// Path relative to the working directory
    pub name: String,
    /// Content, templated like scripts
    pub content: String,
}

/// Scalar as written in TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarDef {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ScalarDef {
    fn render(&self) -> String {
        match self {
            ScalarDef::Int(v) => v.to_string(),
            ScalarDef::Float(v) => v.to_string(),
            ScalarDef::Bool(v) => v.to_string(),
            ScalarDef::Text(v) => v.clone(),
        }
    }
}

/// One value of a variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableItem {
    /// `{ value = ..., label = "..." }`
    Labeled { value: ScalarDef, label: String },
    /// Bare scalar
    Scalar(ScalarDef),
}

impl From<&VariableItem> for Value {
    fn from(item: &VariableItem) -> Self {
        match item {
            VariableItem::Labeled { value, label } => Value::labeled(value.render(), label.clone()),
            VariableItem::Scalar(value) => Value::Scalar(value.render()),
        }
    }
}

/// A variable entry: one value or a list of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableDef {
    List(Vec<VariableItem>),
    One(VariableItem),
}

impl VariableDef {
    fn values(&self) -> Vec<Value> {
        match self {
            VariableDef::List(items) => items.iter().map(Value::from).collect(),
            VariableDef::One(item) => vec![Value::from(item)],
        }
    }
}

/// Resolved variable space
#[derive(Debug, Clone, Default)]
pub struct VariableSpace {
    variables: IndexMap<String, Vec<Value>>,
}

impl VariableSpace {
    /// Resolve the `[variables]` table
    pub fn new(defs: &IndexMap<String, VariableDef>) -> Self {
        Self {
            variables: defs
                .iter()
                .map(|(name, def)| (name.clone(), def.values()))
                .collect(),
        }
    }

    /// Variable names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Cartesian product of all variables; the last declared varies fastest.
    ///
    /// An empty space yields one empty coordinate. A variable with no values
    /// yields no coordinates.
    pub fn expand(&self) -> Vec<Coordinate> {
        let mut runs = vec![Coordinate::new()];
        for (name, values) in &self.variables {
            runs = runs
                .iter()
                .flat_map(|run| {
                    values
                        .iter()
                        .map(move |value| run.clone().with(name.clone(), value.clone()))
                })
                .collect();
        }
        runs
    }
}

impl TestDefinition {
    /// Load a test definition from a TOML file.
    ///
    /// An empty `[test] name` takes the file stem.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut definition = Self::parse(&content)?;
        if definition.test.name.is_empty() {
            definition.test.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "test".to_string());
        }
        Ok(definition)
    }

    /// Parse a test definition from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let definition: Self = toml::from_str(content)?;
        if definition.scripts.is_empty() {
            return Err(ConfigError::NoScript);
        }
        Ok(definition)
    }

    /// Title shown in reports
    pub fn title(&self) -> &str {
        self.test.title.as_deref().unwrap_or(&self.test.name)
    }

    /// Variable space of the test
    pub fn variable_space(&self) -> VariableSpace {
        VariableSpace::new(&self.variables)
    }

    /// Entries of `require_tags` not present in `tags`
    pub fn missing_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<&str> {
        self.config
            .require_tags
            .iter()
            .filter(|tag| !tags.iter().any(|t| t.as_ref() == tag.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Load the tests found at `path`.
    ///
    /// A file is loaded as is. A directory is walked for `*.toml` files in
    /// file name order, and tests whose `require_tags` are not all in `tags`
    /// are skipped.
    pub fn discover<S: AsRef<str>>(
        path: impl AsRef<Path>,
        tags: &[S],
    ) -> Result<Vec<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Ok(vec![Self::load(path)?]);
        }

        let mut definitions = Vec::new();
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let is_test = entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "toml");
            if !is_test {
                continue;
            }
            let definition = Self::load(entry.path())?;
            let missing = definition.missing_tags(tags);
            if !missing.is_empty() {
                tracing::info!(
                    "Passing test {} as it lacks tags {}",
                    definition.test.name,
                    missing.join(",")
                );
                continue;
            }
            definitions.push(definition);
        }
        Ok(definitions)
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m"); a bare number is seconds
    pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::EmptyDuration);
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic() || *c == 'µ')
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| ConfigError::InvalidDuration(num_part.to_string()))?;

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(ConfigError::UnknownUnit(unit_part.to_string())),
        };

        Ok(Duration::from_nanos((value * multiplier as f64) as u64))
    }
}
