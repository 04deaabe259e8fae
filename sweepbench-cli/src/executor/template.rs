//! Variable Templating
//!
//! Replaces `$NAME` with the compute value of `NAME` in scripts and input
//! files, and owns the files written for one coordinate.

use crate::config::TemplateFile;
use std::path::{Path, PathBuf};
use sweepbench_core::Coordinate;

/// Substitute every `$name` of `run` in `text`.
///
/// Longer names go first so that `$N` never clobbers `$NAME`.
pub fn substitute(text: &str, run: &Coordinate) -> String {
    let mut variables: Vec<(&str, &str)> = run
        .iter()
        .map(|(name, value)| (name, value.compute_value()))
        .collect();
    variables.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut output = text.to_string();
    for (name, value) in variables {
        output = output.replace(&format!("${}", name), value);
    }
    output
}

/// Files written for one coordinate, removed on drop
#[derive(Debug)]
pub struct TemplateGuard {
    paths: Vec<PathBuf>,
}

impl TemplateGuard {
    /// Write every file with `run`'s values substituted
    pub fn create(
        files: &[TemplateFile],
        run: &Coordinate,
        work_dir: &Path,
    ) -> Result<Self, std::io::Error> {
        let mut guard = Self { paths: Vec::with_capacity(files.len()) };
        for file in files {
            let path = work_dir.join(&file.name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, substitute(&file.content, run))?;
            tracing::debug!("Wrote {}", path.display());
            // Pushed after the write: a failed write leaves nothing to remove
            guard.paths.push(path);
        }
        Ok(guard)
    }
}

impl Drop for TemplateGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}
