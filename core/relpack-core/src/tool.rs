//! External process invocation

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{PackError, Result};

/// Which pipeline collaborator an invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ScriptMinifier,
    StyleMinifier,
    Installer,
    Packager,
}

impl ToolKind {
    pub fn label(self) -> &'static str {
        match self {
            ToolKind::ScriptMinifier => "script minifier",
            ToolKind::StyleMinifier => "style minifier",
            ToolKind::Installer => "dependency installer",
            ToolKind::Packager => "packager",
        }
    }
}

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub kind: ToolKind,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(kind: ToolKind, program: impl Into<String>) -> Self {
        Self {
            kind,
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Value of a `--name=value` style flag, if present.
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.args
            .iter()
            .find_map(|a| a.strip_prefix(prefix.as_str()))
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Runs external commands on behalf of the pipeline.
///
/// Implementations block until the command exits and return an error for
/// spawn failures and non-zero exit codes. Packaging calls the runner from
/// several worker threads at once.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> Result<()>;
}

/// Spawns real processes, inheriting the current standard streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<()> {
        debug!(command = %invocation, "spawning {}", invocation.kind.label());

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|e| {
            PackError::tool(
                invocation.kind.label(),
                format!("could not start `{}`: {e}", invocation.program),
            )
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(PackError::tool(
                invocation.kind.label(),
                format!("`{invocation}` exited with {status}"),
            ))
        }
    }
}

/// Substitute `{input}` and `{output}` placeholders in a configured command line.
pub fn expand_template(template: &[String], input: &Path, output: &Path) -> Vec<String> {
    let input = input.display().to_string();
    let output = output.display().to_string();
    template
        .iter()
        .map(|part| part.replace("{input}", &input).replace("{output}", &output))
        .collect()
}

/// Platform-specific executable name for Node.js command shims
/// (`npm` is `npm.cmd` on Windows).
pub fn node_shim(name: &str) -> String {
    if cfg!(windows) && Path::new(name).extension().is_none() {
        format!("{name}.cmd")
    } else {
        name.to_string()
    }
}
