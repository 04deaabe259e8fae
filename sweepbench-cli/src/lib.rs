#![warn(missing_docs)]
//! SweepBench CLI Library
//!
//! Command-line front end: loads a test definition, runs it for every build
//! (resuming from cached samples), then writes tabular files and prints the
//! per-result-type series.
//!
//! # Example
//!
//! ```text
//! sweepbench pipe.toml --build local --build patched=repo-patched --output out/
//! sweepbench list pipe.toml
//! ```

mod config;
mod executor;
mod supervisor;

pub use config::*;
pub use executor::{
    ExecutionError, Executor, RunOutcome, TemplateGuard, format_human_output, substitute,
};
pub use supervisor::*;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rayon::ThreadPoolBuilder;
use std::io::Write;
use std::path::{Path, PathBuf};
use sweepbench_core::{Build, Coordinate, SampleStore, SortSpec, TestConfig, static_keys};
use sweepbench_report::{
    Dataset, OutputFormat, SeriesOptions, build_series, generate_json_report, write_output,
};

/// SweepBench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "sweepbench")]
#[command(author, version, about = "SweepBench - parameter sweep benchmarking")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Optional subcommand (Run, List); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments of the default run
    #[command(flatten)]
    pub run: RunArgs,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a test (default)
    Run(RunArgs),
    /// List the coordinates of tests without running them
    List {
        /// Test definition file, or a directory of them
        test: PathBuf,

        /// Tags available to tests with `require_tags`
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
}

/// Options of a test run
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Test definition file (TOML), or a directory searched for them
    pub test: Option<PathBuf>,

    /// Tags available to tests with `require_tags` (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Build to test, as NAME or NAME=REPO (repeatable); defaults to "local"
    #[arg(long = "build", value_name = "NAME[=REPO]")]
    pub builds: Vec<String>,

    /// Directory of cached sample stores
    #[arg(long, default_value = "target/sweepbench")]
    pub cache_dir: PathBuf,

    /// Directory for tabular output files (none written if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report file (stdout if not specified)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Output format: human, json
    #[arg(long, default_value = "human")]
    pub format: String,

    /// Only use cached samples, never run scripts
    #[arg(long)]
    pub no_test: bool,

    /// Ignore cached samples and run everything again
    #[arg(long)]
    pub force_retest: bool,

    /// Directory containing build checkouts (`<app-dir>/<repo>/build/bin` is put on PATH).
    /// Defaults to the directory of the sweepbench executable.
    #[arg(long)]
    pub app_dir: Option<PathBuf>,

    /// Number of threads for series reduction
    /// 0 = use all available cores (default), 1 = single-threaded
    #[arg(long, short = 'j', default_value = "0")]
    pub threads: usize,

    /// Samples wanted per coordinate (overrides n_runs)
    #[arg(long)]
    pub runs: Option<usize>,

    /// Retries after a timeout (overrides n_retry)
    #[arg(long)]
    pub retry: Option<usize>,

    /// Per-attempt timeout, e.g. "30s" (overrides timeout)
    #[arg(long)]
    pub timeout: Option<String>,

    /// Variable used as the x axis
    #[arg(long)]
    pub x_key: Option<String>,

    /// Series ordering: avg, max, min, natsort, color or an index list; prefix `-` reverses
    #[arg(long)]
    pub series_sort: Option<String>,

    /// Keep at most this many series per result type
    #[arg(long)]
    pub max_series: Option<usize>,

    /// Print the output of successful trials
    #[arg(long)]
    pub show_full: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the SweepBench CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the SweepBench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let verbose = match &cli.command {
        Some(Commands::Run(args)) => args.verbose,
        _ => cli.run.verbose,
    };

    // Initialize logging
    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sweepbench=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("sweepbench=info")
            .init();
    }

    match cli.command {
        Some(Commands::List { test, tags }) => list_coordinates(&test, &tags),
        Some(Commands::Run(args)) => run_test(&args),
        None => run_test(&cli.run),
    }
}

fn list_coordinates(path: &Path, tags: &[String]) -> anyhow::Result<()> {
    let definitions = TestDefinition::discover(path, tags)
        .with_context(|| format!("Failed to load tests from {}", path.display()))?;

    for definition in &definitions {
        let runs = definition.variable_space().expand();
        println!("{}:", definition.title());
        for run in &runs {
            println!("├── {}", run.format_display(&definition.config.var_hide));
        }
        println!("{} coordinates.\n", runs.len());
    }
    Ok(())
}

/// Load the test definitions and layer CLI overrides on their `[config]`
fn load_definitions(args: &RunArgs) -> anyhow::Result<Vec<TestDefinition>> {
    let path = args
        .test
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("A test definition file is required"))?;
    let mut definitions = TestDefinition::discover(path, &args.tags)
        .with_context(|| format!("Failed to load tests from {}", path.display()))?;
    if definitions.is_empty() {
        anyhow::bail!("No test found in {}", path.display());
    }
    for definition in &mut definitions {
        apply_overrides(&mut definition.config, args);
    }
    Ok(definitions)
}

fn apply_overrides(config: &mut TestConfig, args: &RunArgs) {
    if let Some(runs) = args.runs {
        config.n_runs = runs;
    }
    if let Some(retry) = args.retry {
        config.n_retry = retry;
    }
    if let Some(timeout) = &args.timeout {
        config.timeout = timeout.clone();
    }
    if let Some(x_key) = &args.x_key {
        config.x_key = Some(x_key.clone());
    }
    if let Some(sort) = &args.series_sort {
        config.series_sort = Some(SortSpec::Named(sort.clone()));
    }
    if args.max_series.is_some() {
        config.max_series = args.max_series;
    }
}

/// Directory of build checkouts: `--app-dir`, else the executable's directory
fn resolve_app_dir(configured: Option<&Path>) -> PathBuf {
    configured
        .map(Path::to_path_buf)
        .or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Variable plotted on x: configured key, else the first varying variable,
/// else the first variable.
fn resolve_x_key(configured: Option<&str>, runs: &[Coordinate], statics: &[String]) -> String {
    if let Some(key) = configured {
        return key.to_string();
    }
    let Some(first) = runs.first() else {
        return String::new();
    };
    first
        .keys()
        .find(|key| !statics.iter().any(|s| s == key))
        .or_else(|| first.keys().next())
        .unwrap_or_default()
        .to_string()
}

fn cache_path(cache_dir: &Path, build: &Build, test: &str) -> PathBuf {
    cache_dir
        .join(build.pretty_name())
        .join(format!("{}.json", test))
}

fn run_test(args: &RunArgs) -> anyhow::Result<()> {
    let definitions = load_definitions(args)?;
    let format: OutputFormat = args.format.parse().unwrap_or(OutputFormat::Human);

    // Configure Rayon thread pool for series reduction
    if args.threads > 0 {
        ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .ok();
    }

    let builds: Vec<Build> = if args.builds.is_empty() {
        vec![Build::new("local")]
    } else {
        args.builds.iter().map(|spec| Build::parse(spec)).collect()
    };
    let app_dir = resolve_app_dir(args.app_dir.as_deref());

    let mut output = String::new();
    for definition in &definitions {
        output.push_str(&run_definition(definition, &builds, &app_dir, format, args)?);
    }

    if let Some(ref path) = args.report {
        let mut file = std::fs::File::create(path)?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    Ok(())
}

/// Run one test for every build and render its series
fn run_definition(
    definition: &TestDefinition,
    builds: &[Build],
    app_dir: &Path,
    format: OutputFormat,
    args: &RunArgs,
) -> anyhow::Result<String> {
    let test_name = definition.test.name.clone();
    let runs = definition.variable_space().expand();
    let executor = Executor::new(definition)
        .with_context(|| format!("Invalid configuration of test {}", test_name))?
        .with_app_dir(app_dir)
        .with_full_output(args.show_full);

    println!(
        "Running {} ({} coordinates, {} build(s), {} run(s) each)...\n",
        definition.title(),
        runs.len(),
        builds.len(),
        executor.config().n_runs
    );

    let mut stores = Vec::with_capacity(builds.len());
    for build in builds {
        let path = cache_path(&args.cache_dir, build, &test_name);
        let prior = if args.force_retest {
            SampleStore::new()
        } else {
            SampleStore::load_or_default(&path)
        };

        if executor.has_all(&runs, &prior) {
            tracing::info!("All results for {} found in {}", build, path.display());
        }

        let store = executor.execute_all(build, &runs, &prior, !args.no_test);
        if !args.no_test {
            store
                .save(&path, &test_name, build.pretty_name())
                .with_context(|| format!("Failed to save results to {}", path.display()))?;
        }
        stores.push(store);
    }

    let config = executor.config();
    let datasets: Vec<Dataset<'_>> = builds
        .iter()
        .zip(&stores)
        .map(|(build, store)| Dataset {
            test_name: &test_name,
            config,
            build,
            store,
        })
        .collect();

    let statics = static_keys(&runs);
    write_output(
        &datasets,
        &statics,
        &runs,
        args.output.as_deref(),
        &config.output_columns,
    )
    .context("Failed to write tabular output")?;

    let x_key = resolve_x_key(config.x_key.as_deref(), &runs, &statics);
    let options = SeriesOptions {
        max_series: config.max_series,
        series_sort: config.series_sort.clone(),
        y_group: config.result_mode.clone(),
        colors: (0..builds.len()).collect(),
    };
    let series = build_series(&datasets, &runs, &x_key, true, &options)?;

    Ok(match format {
        OutputFormat::Json => generate_json_report(&test_name, &x_key, &series)?,
        OutputFormat::Human => format_human_output(definition.title(), &x_key, &series),
    })
}
