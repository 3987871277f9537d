//! The release pipeline: validate, stage, minify, install, bump, package.
//!
//! A [`Session`] is built from [`RunOptions`] without touching the
//! filesystem beyond reading the config and package descriptor, so a bad
//! configuration aborts before a staging directory exists. [`Session::run`]
//! then executes the stages in order and stops at the first failure.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::{BuildConfig, CONFIG_FILE_NAME};
use crate::copy::{CopyStats, TreeCopier};
use crate::deps::{self, InstallReport};
use crate::error::{IoContext, PackError, Result};
use crate::ignore::IgnoreList;
use crate::minify::{minify_all, MinifyReport, MinifyTools};
use crate::packager::{package_all, PackagerSettings, PackagingSummary};
use crate::platform::Platform;
use crate::tool::ToolRunner;
use crate::version::{bump_patch, PackageDescriptor, DESCRIPTOR_FILE_NAME};

/// Where the dependency cache comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheChoice {
    /// Use the `cache` entry of the build config, if any.
    #[default]
    FromConfig,
    Disabled,
    Path(PathBuf),
}

/// Caller-supplied knobs; everything optional falls back to the build config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub source: PathBuf,
    /// Explicit config file. When set it must exist.
    pub config: Option<PathBuf>,
    /// Overrides the config's `platforms` when present.
    pub platforms: Option<Vec<Platform>>,
    pub out: Option<PathBuf>,
    pub staging: Option<PathBuf>,
    pub cache: CacheChoice,
    pub minify: bool,
    pub bump_version: bool,
    pub keep_staging: bool,
    pub follow_symlinks: bool,
    pub jobs: Option<usize>,
}

impl RunOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            config: None,
            platforms: None,
            out: None,
            staging: None,
            cache: CacheChoice::FromConfig,
            minify: true,
            bump_version: true,
            keep_staging: false,
            follow_symlinks: false,
            jobs: None,
        }
    }
}

/// Per-stage results of a completed run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub copy: CopyStats,
    pub minify: MinifyReport,
    pub install: InstallReport,
    /// Version the bundles were built with.
    pub version: String,
    /// Whether `version` was written back to the source descriptor.
    pub version_persisted: bool,
    pub packaging: PackagingSummary,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.packaging.all_succeeded()
    }
}

/// State for one pipeline run.
#[derive(Debug)]
pub struct Session {
    source: PathBuf,
    staging: PathBuf,
    out: PathBuf,
    cache: Option<PathBuf>,
    config: BuildConfig,
    ignore: IgnoreList,
    platforms: Vec<Platform>,
    descriptor: PackageDescriptor,
    options: RunOptions,
}

impl Session {
    /// Load and validate everything the run needs. Performs no writes.
    pub fn prepare(options: RunOptions) -> Result<Self> {
        if options.jobs == Some(0) {
            return Err(PackError::config("--jobs must be at least 1"));
        }

        let source_meta = fs::metadata(&options.source).map_err(|e| {
            PackError::config(format!(
                "source directory {} is not accessible: {e}",
                options.source.display()
            ))
        })?;
        if !source_meta.is_dir() {
            return Err(PackError::config(format!(
                "source {} is not a directory",
                options.source.display()
            )));
        }

        let config = match &options.config {
            Some(path) => BuildConfig::load_or_default(path, true)?,
            None => BuildConfig::load_or_default(&options.source.join(CONFIG_FILE_NAME), false)?,
        };
        config.validate()?;

        let ignore = config.ignore_rules()?;
        let mut platforms = match &options.platforms {
            Some(platforms) => platforms.clone(),
            None => config.target_platforms()?,
        };
        let mut seen = Vec::with_capacity(platforms.len());
        platforms.retain(|p| {
            let first = !seen.contains(p);
            seen.push(*p);
            first
        });
        let descriptor = PackageDescriptor::load(&options.source.join(DESCRIPTOR_FILE_NAME))
            .map_err(|err| match err {
                PackError::Io { path, source } => PackError::config(format!(
                    "cannot read package descriptor {}: {source}",
                    path.display()
                )),
                other => other,
            })?;

        let staging = options
            .staging
            .clone()
            .unwrap_or_else(|| config.staging.clone());
        let out = options.out.clone().unwrap_or_else(|| config.out.clone());
        let cache = match &options.cache {
            CacheChoice::FromConfig => config.cache.clone(),
            CacheChoice::Disabled => None,
            CacheChoice::Path(path) => Some(path.clone()),
        };

        if contains(&staging, &options.source) {
            return Err(PackError::config(format!(
                "staging directory {} must not contain the source",
                staging.display()
            )));
        }

        Ok(Self {
            source: options.source.clone(),
            staging,
            out,
            cache,
            config,
            ignore,
            platforms,
            descriptor,
            options,
        })
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn ignore(&self) -> &IgnoreList {
        &self.ignore
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    /// Run every stage. Stage failures abort the run; individual platform
    /// failures are reported in [`RunReport::packaging`].
    ///
    /// The staging directory is removed on every exit path unless
    /// `keep_staging` was requested.
    pub fn run(&self, runner: &dyn ToolRunner) -> Result<RunReport> {
        info!(
            app = self.descriptor.display_name(),
            version = self.descriptor.version().unwrap_or_default(),
            source = %self.source.display(),
            "starting release run"
        );

        stage("clean", || clean_dir(&self.staging))?;
        let _guard = StagingGuard::new(&self.staging, self.options.keep_staging);

        let mut report = RunReport {
            copy: stage("copy", || {
                TreeCopier::new(&self.ignore)
                    .follow_symlinks(self.options.follow_symlinks)
                    .exclude(&self.out)
                    .copy(&self.source, &self.staging)
            })?,
            ..RunReport::default()
        };

        if self.options.minify && !self.config.uglify_list.is_empty() {
            let tools = MinifyTools::from(&self.config.tools);
            report.minify = stage("minify", || {
                minify_all(&self.staging, &self.config.uglify_list, &tools, runner)
            })?;
        }

        report.install = stage("install", || {
            deps::install(
                &self.staging,
                self.cache.as_deref(),
                &self.config.tools.installer,
                runner,
            )
        })?;

        let current = self.descriptor.version().unwrap_or_default();
        report.version = if self.options.bump_version {
            stage("bump", || bump_patch(current))?
        } else {
            current.to_string()
        };
        stage("stamp", || self.write_staged_version(&report.version))?;

        let settings = self.packager_settings(&report.version);
        report.packaging = stage("package", || {
            package_all(
                &self.platforms,
                &self.staging,
                &settings,
                runner,
                self.options.jobs,
            )
        })?;

        if self.options.bump_version && !report.packaging.is_empty() && report.succeeded() {
            let mut descriptor = self.descriptor.clone();
            descriptor.set_version(&report.version);
            stage("persist", || descriptor.save())?;
            report.version_persisted = true;
            info!(version = %report.version, "version persisted to {}", descriptor.path().display());
        }

        Ok(report)
    }

    fn write_staged_version(&self, version: &str) -> Result<()> {
        let staged = self.staging.join(DESCRIPTOR_FILE_NAME);
        if !staged.is_file() {
            return Ok(());
        }
        let mut descriptor = PackageDescriptor::load(&staged)?;
        descriptor.set_version(version);
        descriptor.save()
    }

    fn packager_settings(&self, version: &str) -> PackagerSettings {
        PackagerSettings {
            program: self.config.tools.packager.clone(),
            app_name: self.descriptor.display_name().to_string(),
            app_version: version.to_string(),
            arch: self.config.arch.clone(),
            copyright: self.config.copyright.clone(),
            icon_base: Some(self.source.join(&self.config.icon)),
            out_dir: self.out.clone(),
            win32_metadata: self.config.version_string.clone(),
        }
    }
}

fn stage<T>(name: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    info!(stage = name, "running");
    f().inspect_err(|err| error!(stage = name, %err, "stage failed"))
}

fn clean_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(PackError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    }
    fs::create_dir_all(dir).at(dir)
}

/// True when `inner` is `outer` or lies below it. A missing `outer` contains nothing.
fn contains(outer: &Path, inner: &Path) -> bool {
    match (outer.canonicalize(), inner.canonicalize()) {
        (Ok(outer), Ok(inner)) => inner.starts_with(outer),
        _ => false,
    }
}

/// Removes the staging directory when dropped.
struct StagingGuard<'a> {
    dir: &'a Path,
    keep: bool,
}

impl<'a> StagingGuard<'a> {
    fn new(dir: &'a Path, keep: bool) -> Self {
        Self { dir, keep }
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if self.keep {
            info!(dir = %self.dir.display(), "keeping staging directory");
            return;
        }
        match fs::remove_dir_all(self.dir) {
            Ok(()) => info!(dir = %self.dir.display(), "removed staging directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), err = %e, "could not remove staging directory"),
        }
    }
}
