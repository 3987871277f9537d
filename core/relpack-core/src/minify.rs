//! Minification of staged sources through external tools

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ToolsConfig;
use crate::error::{IoContext, Result};
use crate::tool::{expand_template, node_shim, ToolInvocation, ToolKind, ToolRunner};

/// Command templates for the two minifier kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifyTools {
    pub script: Vec<String>,
    pub style: Vec<String>,
}

impl From<&ToolsConfig> for MinifyTools {
    fn from(tools: &ToolsConfig) -> Self {
        Self {
            script: tools.script_minifier.clone(),
            style: tools.style_minifier.clone(),
        }
    }
}

impl Default for MinifyTools {
    fn default() -> Self {
        Self::from(&ToolsConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinifyReport {
    pub minified: Vec<PathBuf>,
    pub unsupported: Vec<PathBuf>,
}

impl MinifyReport {
    fn merge(&mut self, other: MinifyReport) {
        self.minified.extend(other.minified);
        self.unsupported.extend(other.unsupported);
    }
}

/// Which minifier handles `path`, judged by extension.
pub fn classify(path: &Path) -> Option<ToolKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "js" | "mjs" | "cjs" => Some(ToolKind::ScriptMinifier),
        "css" => Some(ToolKind::StyleMinifier),
        _ => None,
    }
}

/// Minify a file in place, or every file below a directory (depth-first).
///
/// Files with an unrecognised extension are reported, not rejected.
pub fn minify(path: &Path, tools: &MinifyTools, runner: &dyn ToolRunner) -> Result<MinifyReport> {
    let meta = fs::metadata(path).at(path)?;
    if !meta.is_dir() {
        return minify_file(path, tools, runner);
    }

    let mut report = MinifyReport::default();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            report.merge(minify_file(entry.path(), tools, runner)?);
        }
    }
    info!(
        minified = report.minified.len(),
        unsupported = report.unsupported.len(),
        "minified {}",
        path.display()
    );
    Ok(report)
}

/// Minify every entry of `list`, each resolved relative to `root`.
pub fn minify_all(
    root: &Path,
    list: &[String],
    tools: &MinifyTools,
    runner: &dyn ToolRunner,
) -> Result<MinifyReport> {
    let mut report = MinifyReport::default();
    for item in list {
        let relative = item.trim_start_matches(['/', '\\']);
        report.merge(minify(&root.join(relative), tools, runner)?);
    }
    Ok(report)
}

fn minify_file(path: &Path, tools: &MinifyTools, runner: &dyn ToolRunner) -> Result<MinifyReport> {
    let mut report = MinifyReport::default();
    let Some(kind) = classify(path) else {
        warn!(path = %path.display(), "cannot be minified");
        report.unsupported.push(path.to_path_buf());
        return Ok(report);
    };

    let template = match kind {
        ToolKind::StyleMinifier => &tools.style,
        _ => &tools.script,
    };
    let mut line = expand_template(template, path, path).into_iter();
    let program = line.next().unwrap_or_default();
    let invocation = ToolInvocation::new(kind, node_shim(&program)).args(line);

    debug!(path = %path.display(), "{}", kind.label());
    runner.run(&invocation)?;
    report.minified.push(path.to_path_buf());
    Ok(report)
}
