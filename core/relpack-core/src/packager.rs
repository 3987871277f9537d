//! Per-platform packaging through an external packager
//!
//! One job per platform is spawned on a rayon pool. Jobs finish in any
//! order and report through a [`CompletionTracker`]; a failing platform
//! never stops its siblings.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use rayon::ThreadPoolBuilder;
use tracing::{debug, error, info, warn};

use crate::error::{PackError, Result};
use crate::platform::{Completion, CompletionTracker, Platform};
use crate::tool::{node_shim, ToolInvocation, ToolKind, ToolRunner};

/// Everything the packager needs besides the platform and staging dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerSettings {
    pub program: String,
    pub app_name: String,
    pub app_version: String,
    pub arch: String,
    pub copyright: Option<String>,
    /// Icon path without extension; the platform picks `.ico` or `.icns`.
    pub icon_base: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub win32_metadata: BTreeMap<String, String>,
}

impl PackagerSettings {
    pub fn icon_for(&self, platform: Platform) -> Option<PathBuf> {
        let base = self.icon_base.as_ref()?;
        let mut raw: OsString = base.as_os_str().to_os_string();
        raw.push(".");
        raw.push(platform.icon_extension());
        Some(PathBuf::from(raw))
    }

    /// Directory the packager writes the bundle for `platform` to.
    pub fn bundle_dir(&self, platform: Platform) -> PathBuf {
        self.out_dir
            .join(format!("{}-{}-{}", self.app_name, platform, self.arch))
    }

    pub fn invocation(&self, platform: Platform, staging: &Path) -> ToolInvocation {
        let mut inv = ToolInvocation::new(ToolKind::Packager, node_shim(&self.program))
            .arg(staging.display().to_string())
            .arg(self.app_name.as_str())
            .arg(format!("--platform={platform}"))
            .arg(format!("--arch={}", self.arch))
            .arg(format!("--app-version={}", self.app_version))
            .arg(format!("--build-version={}", self.app_version))
            .arg(format!("--out={}", self.out_dir.display()))
            .arg("--overwrite")
            .arg("--prune=true");

        if let Some(copyright) = &self.copyright {
            inv = inv.arg(format!("--app-copyright={copyright}"));
        }

        match self.icon_for(platform) {
            Some(icon) if icon.is_file() => {
                inv = inv.arg(format!("--icon={}", icon.display()));
            }
            Some(icon) => warn!(%platform, icon = %icon.display(), "icon not found, packaging without it"),
            None => {}
        }

        if platform == Platform::Win32 {
            for (key, value) in &self.win32_metadata {
                inv = inv.arg(format!("--win32metadata.{key}={value}"));
            }
        }

        inv
    }
}

/// Package the staged tree for one platform and return the produced bundle paths.
///
/// A bundle left over from an earlier run is removed first, so a packager
/// run that exits cleanly but writes nothing still counts as a failure.
pub fn package(
    platform: Platform,
    staging: &Path,
    settings: &PackagerSettings,
    runner: &dyn ToolRunner,
) -> Result<Vec<PathBuf>> {
    let bundle = settings.bundle_dir(platform);
    remove_stale_bundle(&bundle)?;

    runner.run(&settings.invocation(platform, staging))?;

    let outputs: Vec<PathBuf> = [bundle].into_iter().filter(|p| p.exists()).collect();
    if outputs.is_empty() {
        return Err(PackError::tool(
            ToolKind::Packager.label(),
            format!("no output produced for {platform}"),
        ));
    }
    Ok(outputs)
}

fn remove_stale_bundle(bundle: &Path) -> Result<()> {
    match fs::remove_dir_all(bundle) {
        Ok(()) => {
            debug!(bundle = %bundle.display(), "removed previous bundle");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PackError::Io {
            path: bundle.to_path_buf(),
            source,
        }),
    }
}

#[derive(Debug)]
pub struct PlatformReport {
    pub platform: Platform,
    pub outcome: Result<Vec<PathBuf>>,
}

impl PlatformReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct PackagingSummary {
    /// In the order the platforms were requested.
    pub reports: Vec<PlatformReport>,
}

impl PackagingSummary {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.reports.iter().all(PlatformReport::succeeded)
    }

    pub fn failed(&self) -> Vec<Platform> {
        self.reports
            .iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.platform)
            .collect()
    }

    pub fn outputs(&self) -> Vec<&Path> {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .flatten()
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Package every platform concurrently and wait for all of them.
///
/// `jobs` caps the number of packager processes running at once.
pub fn package_all(
    platforms: &[Platform],
    staging: &Path,
    settings: &PackagerSettings,
    runner: &dyn ToolRunner,
    jobs: Option<usize>,
) -> Result<PackagingSummary> {
    if platforms.is_empty() {
        info!("no platforms requested, skipping packaging");
        return Ok(PackagingSummary::default());
    }

    let mut unique: Vec<Platform> = Vec::with_capacity(platforms.len());
    for &platform in platforms {
        if !unique.contains(&platform) {
            unique.push(platform);
        }
    }
    let platforms = unique.as_slice();

    let tracker = CompletionTracker::new(platforms);
    let reports: Mutex<Vec<PlatformReport>> = Mutex::new(Vec::with_capacity(platforms.len()));

    let fan_out = || {
        rayon::scope(|s| {
            for &platform in platforms {
                let tracker = &tracker;
                let reports = &reports;
                s.spawn(move |_| {
                    info!(%platform, "packaging");
                    let outcome = package(platform, staging, settings, runner);
                    match &outcome {
                        Ok(paths) => info!(%platform, "packaged successfully to {}", paths[0].display()),
                        Err(err) => error!(%platform, %err, "packaging failed"),
                    }

                    reports
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(PlatformReport { platform, outcome });

                    if tracker.complete(platform) == Completion::Last {
                        info!(count = tracker.targets().len(), "all platforms finished");
                    }
                });
            }
        });
    };

    if let Some(jobs) = jobs {
        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| PackError::config(format!("cannot start packaging pool: {e}")))?;
        pool.install(fan_out);
    } else {
        fan_out();
    }

    let mut reports = reports.into_inner().unwrap_or_else(PoisonError::into_inner);
    reports.sort_by_key(|r| platforms.iter().position(|p| *p == r.platform));
    Ok(PackagingSummary { reports })
}
