//! Dependency installation with an optional on-disk cache

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::copy::merge_tree;
use crate::error::{PackError, Result};
use crate::tool::{node_shim, ToolInvocation, ToolKind, ToolRunner};

/// Folder the installer populates inside the staging tree.
pub const DEPENDENCY_DIR: &str = "node_modules";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Files restored from the cache before installing.
    pub restored: usize,
    /// Files written to seed an empty cache.
    pub seeded: usize,
    /// Non-fatal cache failures, already logged.
    pub cache_errors: Vec<String>,
}

/// Restore the cache into `staging/node_modules`, run the install command in
/// `staging`, then seed the cache when it did not exist beforehand.
///
/// Only a failing install command is fatal.
pub fn install(
    staging: &Path,
    cache: Option<&Path>,
    command: &[String],
    runner: &dyn ToolRunner,
) -> Result<InstallReport> {
    let mut report = InstallReport::default();
    let modules = staging.join(DEPENDENCY_DIR);
    let cache_existed = cache.is_some_and(Path::is_dir);

    if let (Some(cache), true) = (cache, cache_existed) {
        match merge_tree(cache, &modules) {
            Ok(restored) => {
                info!(restored, "restored dependency cache from {}", cache.display());
                report.restored = restored;
            }
            Err(err) => {
                warn!(%err, "could not restore dependency cache");
                report.cache_errors.push(err.to_string());
            }
        }
    }

    runner.run(&install_invocation(staging, command)?)?;

    if let (Some(cache), false) = (cache, cache_existed) {
        if modules.is_dir() {
            match merge_tree(&modules, cache) {
                Ok(seeded) => {
                    info!(seeded, "seeded dependency cache at {}", cache.display());
                    report.seeded = seeded;
                }
                Err(err) => {
                    warn!(%err, "could not seed dependency cache");
                    report.cache_errors.push(err.to_string());
                }
            }
        }
    }

    Ok(report)
}

fn install_invocation(staging: &Path, command: &[String]) -> Result<ToolInvocation> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| PackError::config("installer command is empty"))?;
    Ok(ToolInvocation::new(ToolKind::Installer, node_shim(program))
        .args(args.iter().cloned())
        .current_dir(PathBuf::from(staging)))
}
