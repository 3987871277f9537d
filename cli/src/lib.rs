//! relpack CLI

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use relpack_core::pipeline::{CacheChoice, RunOptions, RunReport, Session};
use relpack_core::platform::Platform;
use relpack_core::tool::{SystemRunner, ToolRunner};

/// Source directory used when none is given on the command line.
pub const DEFAULT_SOURCE_DIR: &str = "../app";

/// Environment variable holding a tracing filter that overrides `-v`.
pub const LOG_ENV: &str = "RELPACK_LOG";

/// Stage, filter and package a desktop application release.
#[derive(Debug, Parser)]
#[command(
    name = "relpack",
    version,
    about = "Stage, minify and package a desktop application for win32, linux and darwin"
)]
pub struct Cli {
    /// Application source directory
    #[arg(value_hint = ValueHint::DirPath)]
    source: Option<PathBuf>,

    /// Platforms to package (win32, linux, darwin); defaults to the config's list
    #[arg(value_hint = ValueHint::Other)]
    platforms: Vec<String>,

    /// Build config file (defaults to <SOURCE>/relpack.json when present)
    #[arg(short = 'c', long = "config", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Directory receiving the packaged bundles
    #[arg(short = 'o', long = "out", value_hint = ValueHint::DirPath)]
    out: Option<PathBuf>,

    /// Temporary staging directory (wiped before and after the run)
    #[arg(long = "staging", value_hint = ValueHint::DirPath)]
    staging: Option<PathBuf>,

    /// Dependency cache directory
    #[arg(long = "cache", value_hint = ValueHint::DirPath, conflicts_with = "no_cache")]
    cache: Option<PathBuf>,

    /// Install dependencies without the cache
    #[arg(long = "no-cache", action = ArgAction::SetTrue)]
    no_cache: bool,

    /// Skip the minification stage
    #[arg(long = "no-minify", action = ArgAction::SetTrue)]
    no_minify: bool,

    /// Keep the current version instead of bumping the patch number
    #[arg(long = "no-bump", action = ArgAction::SetTrue)]
    no_bump: bool,

    /// Leave the staging directory in place after the run
    #[arg(long = "keep-staging", action = ArgAction::SetTrue)]
    keep_staging: bool,

    /// Follow symlinks while copying the source tree
    #[arg(long = "follow-symlinks", action = ArgAction::SetTrue)]
    follow_symlinks: bool,

    /// Maximum number of platforms packaged at once
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Log line format (text|json)
    #[arg(long = "log-format", default_value_t = LogFormat::Text, value_enum)]
    log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Parse CLI args and execute a release run.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);
    execute(&cli, &SystemRunner)
}

fn execute(cli: &Cli, runner: &dyn ToolRunner) -> Result<()> {
    let options = build_options(cli);
    let source = options.source.clone();

    let session = Session::prepare(options)
        .with_context(|| format!("cannot start a release run for {}", source.display()))?;
    let report = session.run(runner).context("release run aborted")?;

    let stdout = io::stdout();
    write_summary(&report, &mut stdout.lock())?;

    if !report.succeeded() {
        let failed: Vec<&str> = report
            .packaging
            .failed()
            .into_iter()
            .map(Platform::as_str)
            .collect();
        bail!("packaging failed for {}", failed.join(", "));
    }
    Ok(())
}

fn build_options(cli: &Cli) -> RunOptions {
    let source = cli
        .source
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR));

    let mut options = RunOptions::new(source);
    options.config = cli.config.clone();
    options.platforms = select_platforms(&cli.platforms);
    options.out = cli.out.clone();
    options.staging = cli.staging.clone();
    options.cache = match (&cli.cache, cli.no_cache) {
        (_, true) => CacheChoice::Disabled,
        (Some(path), false) => CacheChoice::Path(path.clone()),
        (None, false) => CacheChoice::FromConfig,
    };
    options.minify = !cli.no_minify;
    options.bump_version = !cli.no_bump;
    options.keep_staging = cli.keep_staging;
    options.follow_symlinks = cli.follow_symlinks;
    options.jobs = cli.jobs;
    options
}

/// Platforms named on the command line. Unknown tokens are skipped with a
/// warning; `None` when no token was given at all.
fn select_platforms(tokens: &[String]) -> Option<Vec<Platform>> {
    if tokens.is_empty() {
        return None;
    }

    let mut selected = Vec::new();
    for token in tokens {
        match token.parse::<Platform>() {
            Ok(platform) if !selected.contains(&platform) => selected.push(platform),
            Ok(_) => {}
            Err(_) => warn!(token = token.as_str(), "ignoring unrecognized platform"),
        }
    }
    Some(selected)
}

fn write_summary(report: &RunReport, mut w: impl Write) -> Result<()> {
    for item in &report.packaging.reports {
        match &item.outcome {
            Ok(paths) => {
                for path in paths {
                    writeln!(w, "packaged {:<7} {}", item.platform, path.display())?;
                }
            }
            Err(err) => writeln!(w, "failed   {:<7} {err}", item.platform)?,
        }
    }

    if report.packaging.is_empty() {
        writeln!(w, "no platforms packaged")?;
    }

    let persisted = if report.version_persisted {
        " (saved to package.json)"
    } else {
        ""
    };
    writeln!(w, "version  {}{persisted}", report.version)?;
    Ok(())
}

/// Filter directives: `RELPACK_LOG`, then `RUST_LOG`, then the `-v` level.
fn log_directives(verbose: u8, relpack_log: Option<String>, rust_log: Option<String>) -> String {
    relpack_log
        .into_iter()
        .chain(rust_log)
        .find(|d| !d.trim().is_empty())
        .unwrap_or_else(|| default_level(verbose).to_string())
}

fn default_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8, format: LogFormat) {
    let directives = log_directives(
        verbose,
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    let filter = EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    // A subscriber may already be installed when embedded in tests.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[cfg(test)]
mod tests;
