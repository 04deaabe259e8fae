//! Build Identity
//!
//! A build names one variant of the program under test. The core only needs a
//! display name and the repository directory whose `build/bin` is put in front
//! of `PATH` when the test script runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Program variant under test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Build {
    name: String,
    repo: String,
}

impl Build {
    /// Build whose repository directory matches its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            repo: name.clone(),
            name,
        }
    }

    /// Build with an explicit repository directory
    pub fn with_repo(name: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
        }
    }

    /// Parse `NAME` or `NAME=REPO`
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('=') {
            Some((name, repo)) => Self::with_repo(name.trim(), repo.trim()),
            None => Self::new(spec.trim()),
        }
    }

    /// Name shown in series legends and output file names
    pub fn pretty_name(&self) -> &str {
        &self.name
    }

    /// Repository directory name
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `<app_dir>/<repo>/build/bin`
    pub fn bin_dir(&self, app_dir: &Path) -> PathBuf {
        app_dir.join(&self.repo).join("build").join("bin")
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
