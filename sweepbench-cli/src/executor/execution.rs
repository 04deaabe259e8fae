//! Script Execution
//!
//! Runs a test's scripts once per trial for every coordinate of the sweep and
//! turns their `RESULT` lines into samples.
//!
//! ## Data Flow
//!
//! ```text
//! Coordinate + prior samples
//!        │
//!        ▼
//!  trials = target - prior
//!        │
//!        ▼
//! ┌──────────────────┐
//! │  TemplateGuard   │  input files written, removed when the coordinate ends
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  ProcessHandle   │  sh -c per script, timeout → SIGTERM → grace → SIGKILL
//! └────────┬─────────┘
//!          │
//!          ▼
//!  RESULT[-TYPE] <n> lines → RunResults
//! ```

use super::template::{TemplateGuard, substitute};
use crate::config::{ConfigError, Script, TemplateFile, TestDefinition};
use crate::supervisor::{DEFAULT_GRACE, ProcessHandle, SupervisorError};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use sweepbench_core::{
    Build, Coordinate, DEFAULT_RESULT_TYPE, RunResults, SampleStore, TestConfig, parse_number,
};
use thiserror::Error;

const RESULT_PATTERN: &str = r"\bRESULT(?:-([A-Za-z0-9_]+))?[ \t]+([-+]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][-+]?[0-9]+)?)";

/// Why a coordinate stopped before reaching its sample target.
///
/// Every variant carries the output captured up to the failure.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The last attempt of a trial ran out of time
    #[error("Timeout expired.")]
    Timeout {
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// A trial printed no `RESULT` line
    #[error("Could not find result")]
    ResultParse {
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// The script could not be started or waited on
    #[error("Could not run script: {message}")]
    Spawn {
        /// Underlying error
        message: String,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },
}

impl ExecutionError {
    /// Captured standard output
    pub fn stdout(&self) -> &str {
        match self {
            ExecutionError::Timeout { stdout, .. }
            | ExecutionError::ResultParse { stdout, .. }
            | ExecutionError::Spawn { stdout, .. } => stdout,
        }
    }

    /// Captured standard error
    pub fn stderr(&self) -> &str {
        match self {
            ExecutionError::Timeout { stderr, .. }
            | ExecutionError::ResultParse { stderr, .. }
            | ExecutionError::Spawn { stderr, .. } => stderr,
        }
    }
}

/// Result of running the missing trials of one coordinate
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Samples gathered by this call only
    pub samples: RunResults,
    /// Trials that produced a result
    pub trials: usize,
    /// Set when the coordinate stopped early
    pub failure: Option<ExecutionError>,
    /// Output of the last successful trial
    pub stdout: String,
    /// Error output of the last successful trial
    pub stderr: String,
}

impl RunOutcome {
    /// Whether every requested trial produced a result
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

enum ScriptRun {
    Finished { stdout: String, stderr: String },
    TimedOut { stdout: String, stderr: String },
}

/// Runs the scripts of one test
pub struct Executor {
    scripts: Vec<Script>,
    files: Vec<TemplateFile>,
    stdin: String,
    config: TestConfig,
    timeout: Duration,
    app_dir: PathBuf,
    work_dir: PathBuf,
    result_pattern: Regex,
    show_progress: bool,
    show_full: bool,
}

impl Executor {
    /// Create an executor for `definition`, with its `[config]` settings
    pub fn new(definition: &TestDefinition) -> Result<Self, ConfigError> {
        Ok(Self {
            scripts: definition.scripts.clone(),
            files: definition.files.clone(),
            stdin: definition.stdin.clone(),
            timeout: TestDefinition::parse_duration(&definition.config.timeout)?,
            config: definition.config.clone(),
            app_dir: PathBuf::from("."),
            work_dir: PathBuf::from("."),
            result_pattern: Regex::new(RESULT_PATTERN)?,
            show_progress: true,
            show_full: false,
        })
    }

    /// Directory holding build checkouts (`<app_dir>/<repo>/build/bin`)
    pub fn with_app_dir(mut self, app_dir: impl Into<PathBuf>) -> Self {
        self.app_dir = app_dir.into();
        self
    }

    /// Directory scripts run in and input files are written to
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Print the output of the last successful trial of every coordinate
    pub fn with_full_output(mut self, show: bool) -> Self {
        self.show_full = show;
        self
    }

    /// Settings in effect
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Whether `prior` already holds `n_runs` samples for every coordinate
    pub fn has_all(&self, runs: &[Coordinate], prior: &SampleStore) -> bool {
        runs.iter()
            .all(|run| prior.is_satisfied(run, self.config.n_runs))
    }

    /// Evaluate every coordinate of `runs` for `build`, resuming from `prior`.
    ///
    /// With `do_test` unset nothing is spawned and the result only reflects
    /// `prior`. Coordinates left without any sample are recorded as `None`.
    pub fn execute_all(
        &self,
        build: &Build,
        runs: &[Coordinate],
        prior: &SampleStore,
        do_test: bool,
    ) -> SampleStore {
        let mut store = prior.clone();

        let pb = if self.show_progress {
            let pb = ProgressBar::new(runs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        for run in runs {
            let label = run.format_display(&self.config.var_hide);
            tracing::info!("{}", label);
            pb.set_message(label.clone());

            if do_test && !store.is_satisfied(run, self.config.n_runs) {
                let outcome = self.run(
                    build,
                    run,
                    self.config.n_runs,
                    self.config.n_retry,
                    self.timeout,
                    store.get(run),
                );
                if let Some(failure) = &outcome.failure {
                    tracing::warn!("[{}] {}: {}", build, label, failure);
                    tracing::debug!("stdout:\n{}", failure.stdout());
                    tracing::debug!("stderr:\n{}", failure.stderr());
                }
                if self.show_full && outcome.trials > 0 {
                    pb.suspend(|| {
                        println!("stdout:\n{}", outcome.stdout);
                        println!("stderr:\n{}", outcome.stderr);
                    });
                }
                store.merge(run, outcome.samples);
            }

            match store.get(run) {
                Some(results) => tracing::debug!("{:?}", results),
                None => store.insert(run.clone(), None),
            }
            pb.inc(1);
        }

        pb.finish_with_message(format!("{} complete", build));
        store
    }

    /// Run the trials `run` still needs to reach `target` samples.
    ///
    /// A timeout is retried up to `max_retries` times; a trial without any
    /// `RESULT` line stops the coordinate at once. Samples gathered before a
    /// failure are kept in the outcome.
    pub fn run(
        &self,
        build: &Build,
        run: &Coordinate,
        target: usize,
        max_retries: usize,
        timeout: Duration,
        prior: Option<&RunResults>,
    ) -> RunOutcome {
        let have = prior
            .map(|results| results.values().map(Vec::len).max().unwrap_or(0))
            .unwrap_or(0);
        let trials = target.saturating_sub(have);
        let mut outcome = RunOutcome::default();
        if trials == 0 {
            return outcome;
        }

        let _files = match TemplateGuard::create(&self.files, run, &self.work_dir) {
            Ok(guard) => guard,
            Err(e) => {
                outcome.failure = Some(ExecutionError::Spawn {
                    message: e.to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                });
                return outcome;
            }
        };

        let bin_dir = build.bin_dir(&self.app_dir);
        let bodies: Vec<String> = self
            .scripts
            .iter()
            .map(|script| substitute(&script.content, run))
            .collect();

        for trial in 0..trials {
            tracing::debug!("Trial {}/{} of {}", trial + 1, trials, run);
            let mut stdout = String::new();
            let mut stderr = String::new();

            for (index, body) in bodies.iter().enumerate() {
                if bodies.len() > 1 {
                    let header = format!("Output of script {}\n", self.script_label(index));
                    stdout.push_str(&header);
                    stderr.push_str(&header);
                }

                let mut attempt = 0;
                loop {
                    match self.run_script(body, &bin_dir, timeout) {
                        Ok(ScriptRun::Finished { stdout: out, stderr: err }) => {
                            stdout.push_str(&out);
                            stderr.push_str(&err);
                            break;
                        }
                        Ok(ScriptRun::TimedOut { stdout: out, stderr: err }) => {
                            tracing::warn!("Test expired");
                            if attempt >= max_retries {
                                stdout.push_str(&out);
                                stderr.push_str(&err);
                                outcome.failure = Some(ExecutionError::Timeout { stdout, stderr });
                                return outcome;
                            }
                            attempt += 1;
                        }
                        Err(e) => {
                            outcome.failure = Some(ExecutionError::Spawn {
                                message: e.to_string(),
                                stdout,
                                stderr,
                            });
                            return outcome;
                        }
                    }
                }
            }

            let results = self.parse_results(&stdout);
            if results.is_empty() {
                tracing::error!("Could not find result !");
                outcome.failure = Some(ExecutionError::ResultParse { stdout, stderr });
                return outcome;
            }
            for (result_type, values) in results {
                outcome.samples.entry(result_type).or_default().extend(values);
            }
            outcome.trials += 1;
            outcome.stdout = stdout;
            outcome.stderr = stderr;
        }

        outcome
    }

    fn script_label(&self, index: usize) -> String {
        self.scripts[index]
            .name
            .clone()
            .unwrap_or_else(|| format!("#{}", index + 1))
    }

    fn run_script(
        &self,
        body: &str,
        bin_dir: &Path,
        timeout: Duration,
    ) -> Result<ScriptRun, SupervisorError> {
        let deadline = Instant::now() + timeout;
        let mut handle =
            ProcessHandle::spawn(body, self.stdin.as_bytes(), Some(bin_dir), &self.work_dir)?;

        let status = handle.wait_timeout(timeout)?;
        // The deadline also covers background members still writing to the pipes
        let drained = status.is_some()
            && handle.wait_output(deadline.saturating_duration_since(Instant::now()));

        match status {
            Some(_) => {
                if !drained {
                    tracing::debug!(
                        "Output of process group {} still open at deadline",
                        handle.pgid()
                    );
                }
                // ESRCH when the leader was alone in its group
                let _ = handle.force_kill();
            }
            None => {
                tracing::debug!("Stopping process group {}", handle.pgid());
                handle.shutdown(DEFAULT_GRACE);
            }
        }
        let (stdout, stderr) = handle.take_output();

        Ok(match status {
            Some(status) if drained => {
                if !status.success() {
                    tracing::debug!("Script exited with {}", status);
                }
                ScriptRun::Finished { stdout, stderr }
            }
            _ => ScriptRun::TimedOut { stdout, stderr },
        })
    }

    /// First value per result type found in `output`
    fn parse_results(&self, output: &str) -> RunResults {
        let mut found = RunResults::new();
        for caps in self.result_pattern.captures_iter(output) {
            let result_type = caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_else(|| DEFAULT_RESULT_TYPE.to_string());
            if found.contains_key(&result_type) {
                continue;
            }
            if let Some(value) = caps.get(2).and_then(|m| parse_number(m.as_str())) {
                found.insert(result_type, vec![value]);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(script: &str, config: &str) -> TestDefinition {
        let toml = format!(
            "[[script]]\ncontent = '''\n{}\n'''\n\n[config]\n{}\n",
            script, config
        );
        TestDefinition::parse(&toml).unwrap()
    }

    fn executor(definition: &TestDefinition, dir: &Path) -> Executor {
        Executor::new(definition)
            .unwrap()
            .with_work_dir(dir)
            .with_app_dir(dir)
            .with_progress(false)
    }

    #[test]
    fn test_parse_results() {
        let definition = definition("true", "");
        let executor = Executor::new(&definition).unwrap();

        let found = executor.parse_results("warmup\nRESULT 12.5\nRESULT 99\n");
        assert_eq!(found[DEFAULT_RESULT_TYPE], vec![12.5]);
        assert_eq!(found.len(), 1);

        let found = executor.parse_results("RESULT-LATENCY 3e2\nRESULT-THROUGHPUT .5\nRESULT -1");
        assert_eq!(found["latency"], vec![300.0]);
        assert_eq!(found["throughput"], vec![0.5]);
        assert_eq!(found[DEFAULT_RESULT_TYPE], vec![-1.0]);

        assert!(executor.parse_results("no numbers here\nRESULT abc").is_empty());
    }

    #[test]
    fn test_run_collects_samples() {
        let dir = tempfile::tempdir().unwrap();
        let definition = definition("echo RESULT $N", "n_runs = 2");
        let executor = executor(&definition, dir.path());
        let run = Coordinate::new().with("N", "7");

        let outcome = executor.run(&Build::new("local"), &run, 2, 0, Duration::from_secs(10), None);
        assert!(outcome.is_success());
        assert_eq!(outcome.trials, 2);
        assert_eq!(outcome.samples[DEFAULT_RESULT_TYPE], vec![7.0, 7.0]);
        assert_eq!(outcome.stdout, "RESULT 7\n");
    }

    #[test]
    fn test_stdin_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let toml = r#"
            stdin = "RESULT 5"

            [[script]]
            content = "cat; echo; cat input.txt"

            [[file]]
            name = "input.txt"
            content = "RESULT-SIZE $SIZE"
        "#;
        let definition = TestDefinition::parse(toml).unwrap();
        let executor = executor(&definition, dir.path());
        let run = Coordinate::new().with("SIZE", sweepbench_core::Value::labeled("1024", "1K"));

        let outcome = executor.run(&Build::new("local"), &run, 1, 0, Duration::from_secs(10), None);
        assert!(outcome.is_success(), "{:?}", outcome.failure);
        assert_eq!(outcome.samples[DEFAULT_RESULT_TYPE], vec![5.0]);
        assert_eq!(outcome.samples["size"], vec![1024.0]);
        assert!(!dir.path().join("input.txt").exists());
    }

    #[test]
    fn test_multiple_scripts_are_concatenated() {
        let dir = tempfile::tempdir().unwrap();
        let toml = r#"
            [[script]]
            name = "server"
            content = "echo RESULT-RX 1"

            [[script]]
            content = "echo RESULT-TX 2"
        "#;
        let definition = TestDefinition::parse(toml).unwrap();
        let executor = executor(&definition, dir.path());

        let outcome =
            executor.run(&Build::new("local"), &Coordinate::new(), 1, 0, Duration::from_secs(10), None);
        assert_eq!(outcome.samples["rx"], vec![1.0]);
        assert_eq!(outcome.samples["tx"], vec![2.0]);
        assert!(outcome.stdout.starts_with("Output of script server\n"));
        assert!(outcome.stdout.contains("Output of script #2\n"));
    }

    #[test]
    fn test_missing_result_stops_coordinate() {
        let dir = tempfile::tempdir().unwrap();
        let definition = definition("echo hello; echo oops >&2", "n_runs = 3");
        let executor = executor(&definition, dir.path());

        let outcome =
            executor.run(&Build::new("local"), &Coordinate::new(), 3, 2, Duration::from_secs(10), None);
        assert_eq!(outcome.trials, 0);
        match outcome.failure {
            Some(ExecutionError::ResultParse { stdout, stderr }) => {
                assert_eq!(stdout, "hello\n");
                assert_eq!(stderr, "oops\n");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_timeout_reaps_group() {
        let dir = tempfile::tempdir().unwrap();
        let definition = definition("trap '' TERM; sleep 30; echo RESULT 1", "");
        let executor = executor(&definition, dir.path());

        let start = Instant::now();
        let outcome = executor.run(
            &Build::new("local"),
            &Coordinate::new(),
            1,
            1,
            Duration::from_millis(200),
            None,
        );
        // two attempts, each bounded by timeout + grace
        assert!(start.elapsed() < Duration::from_secs(5));
        let failure = outcome.failure.unwrap();
        assert!(matches!(failure, ExecutionError::Timeout { .. }));
        assert_eq!(failure.to_string(), "Timeout expired.");
        assert!(outcome.samples.is_empty());
    }

    #[test]
    fn test_background_child_is_bounded_by_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let definition = definition("sleep 6 & echo RESULT 1", "");
        let executor = executor(&definition, dir.path());

        let start = Instant::now();
        let outcome = executor.run(
            &Build::new("local"),
            &Coordinate::new(),
            1,
            0,
            Duration::from_millis(300),
            None,
        );
        assert!(start.elapsed() < Duration::from_secs(3));
        let failure = outcome.failure.unwrap();
        assert!(matches!(failure, ExecutionError::Timeout { .. }));
        assert!(failure.stdout().contains("RESULT 1"));
    }

    #[test]
    fn test_timeout_then_successful_retry() {
        let dir = tempfile::tempdir().unwrap();
        // Only the first attempt hangs
        let definition = definition(
            "if [ -f started ]; then echo RESULT 3; else touch started; sleep 30; fi",
            "",
        );
        let executor = executor(&definition, dir.path());

        let outcome = executor.run(
            &Build::new("local"),
            &Coordinate::new(),
            1,
            1,
            Duration::from_millis(300),
            None,
        );
        assert!(outcome.is_success());
        assert_eq!(outcome.trials, 1);
        assert_eq!(outcome.samples[DEFAULT_RESULT_TYPE], vec![3.0]);
        assert_eq!(outcome.stdout, "RESULT 3\n");
    }

    #[test]
    fn test_resume_runs_missing_trials_only() {
        let dir = tempfile::tempdir().unwrap();
        let definition = definition("echo x >> trials.log; echo RESULT $N", "n_runs = 3");
        let executor = executor(&definition, dir.path());
        let run = Coordinate::new().with("N", "4");

        let mut prior = SampleStore::new();
        let mut results = RunResults::new();
        results.insert(DEFAULT_RESULT_TYPE.to_string(), vec![4.0]);
        prior.insert(run.clone(), Some(results));

        let store = executor.execute_all(&Build::new("local"), &[run.clone()], &prior, true);
        assert_eq!(store.get(&run).unwrap()[DEFAULT_RESULT_TYPE], vec![4.0, 4.0, 4.0]);
        let log = std::fs::read_to_string(dir.path().join("trials.log")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(executor.has_all(&[run.clone()], &store));

        // satisfied coordinates spawn nothing
        let again = executor.execute_all(&Build::new("local"), &[run.clone()], &store, true);
        assert_eq!(again.sample_count(&run), 3);
        let log = std::fs::read_to_string(dir.path().join("trials.log")).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[test]
    fn test_execute_all_records_failures_and_cache_only() {
        let dir = tempfile::tempdir().unwrap();
        let definition = definition("[ \"$N\" = 2 ] && exit 0; echo RESULT $N", "");
        let executor = executor(&definition, dir.path());
        let runs = vec![Coordinate::new().with("N", "1"), Coordinate::new().with("N", "2")];

        let store = executor.execute_all(&Build::new("local"), &runs, &SampleStore::new(), true);
        assert_eq!(store.sample_count(&runs[0]), 1);
        assert!(store.contains(&runs[1]));
        assert!(store.get(&runs[1]).is_none());
        assert!(!executor.has_all(&runs, &store));

        let cached = executor.execute_all(&Build::new("local"), &runs, &SampleStore::new(), false);
        assert_eq!(cached.len(), 2);
        assert!(cached.iter().all(|(_, results)| results.is_none()));
    }
}
