//! Fake external tools shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use relpack_core::error::{PackError, Result};
use relpack_core::platform::Platform;
use relpack_core::tool::{ToolInvocation, ToolKind, ToolRunner};

/// Records every invocation and imitates what the real tools leave on disk.
#[derive(Default)]
pub struct FakeRunner {
    pub calls: Mutex<Vec<ToolInvocation>>,
    pub fail_kinds: Vec<ToolKind>,
    pub fail_platforms: Vec<Platform>,
    pub no_output_platforms: Vec<Platform>,
    /// Per-platform delay, to shuffle completion order.
    pub delays: Vec<(Platform, u64)>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: ToolKind) -> Vec<ToolInvocation> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, inv: &ToolInvocation) -> Result<()> {
        self.calls.lock().unwrap().push(inv.clone());
        if self.fail_kinds.contains(&inv.kind) {
            return Err(PackError::tool(inv.kind.label(), "exit status: 1"));
        }

        match inv.kind {
            ToolKind::Installer => {
                let cwd = inv.cwd.clone().expect("installer runs in staging");
                write(&cwd.join("node_modules/left-pad/index.js"), b"module.exports = 1;");
            }
            ToolKind::Packager => {
                let platform: Platform = inv
                    .flag_value("--platform")
                    .expect("platform flag")
                    .parse()
                    .expect("known platform");
                if let Some((_, ms)) = self.delays.iter().find(|(p, _)| *p == platform) {
                    thread::sleep(Duration::from_millis(*ms));
                }
                if self.fail_platforms.contains(&platform) {
                    return Err(PackError::tool(inv.kind.label(), "exit status: 1"));
                }
                if !self.no_output_platforms.contains(&platform) {
                    let out = PathBuf::from(inv.flag_value("--out").expect("out flag"));
                    let arch = inv.flag_value("--arch").expect("arch flag");
                    let bundle = out.join(format!("{}-{}-{}", inv.args[1], platform, arch));
                    write(&bundle.join("resources/app.asar"), b"bundle");
                }
            }
            ToolKind::ScriptMinifier | ToolKind::StyleMinifier => {}
        }
        Ok(())
    }
}

pub fn write(path: &Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
    fs::write(path, contents).expect("write");
}
