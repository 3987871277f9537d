//! Target platforms and per-run completion tracking

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::PackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Win32,
    Linux,
    Darwin,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Win32, Platform::Linux, Platform::Darwin];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Win32 => "win32",
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
        }
    }

    /// Icon file extension the packager expects on this platform.
    pub fn icon_extension(self) -> &'static str {
        match self {
            Platform::Darwin => "icns",
            Platform::Win32 | Platform::Linux => "ico",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win32" => Ok(Platform::Win32),
            "linux" => Ok(Platform::Linux),
            "darwin" => Ok(Platform::Darwin),
            other => Err(PackError::config(format!(
                "unknown platform {other:?} (expected win32, linux or darwin)"
            ))),
        }
    }
}

/// Parse platform names, failing on the first unknown one.
pub fn parse_platforms<I, S>(raw: I) -> Result<Vec<Platform>, PackError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut platforms: Vec<Platform> = Vec::new();
    for name in raw {
        let platform: Platform = name.as_ref().parse()?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(platforms)
}

/// One requested platform and whether its packaging job has finished.
#[derive(Debug)]
pub struct PlatformTarget {
    pub platform: Platform,
    done: AtomicBool,
}

impl PlatformTarget {
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Result of reporting a single completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Other targets are still in flight.
    Pending,
    /// This completion finished the set. Returned exactly once per tracker.
    Last,
    /// The target had already been reported.
    Duplicate,
}

/// Fan-in over per-platform packaging jobs.
///
/// Each target is flipped to done once, by the job packaging it. The job
/// whose completion brings the counter to the number of targets observes
/// [`Completion::Last`].
#[derive(Debug)]
pub struct CompletionTracker {
    targets: Vec<PlatformTarget>,
    completed: AtomicUsize,
}

impl CompletionTracker {
    /// Repeated platforms are tracked once.
    pub fn new(platforms: &[Platform]) -> Self {
        let mut targets: Vec<PlatformTarget> = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            if targets.iter().any(|t| t.platform == platform) {
                continue;
            }
            targets.push(PlatformTarget {
                platform,
                done: AtomicBool::new(false),
            });
        }
        Self {
            targets,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn targets(&self) -> &[PlatformTarget] {
        &self.targets
    }

    /// Mark `platform` as finished, whether or not it succeeded.
    pub fn complete(&self, platform: Platform) -> Completion {
        let Some(target) = self.targets.iter().find(|t| t.platform == platform) else {
            return Completion::Duplicate;
        };
        if target.done.swap(true, Ordering::AcqRel) {
            return Completion::Duplicate;
        }

        let finished = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if finished == self.targets.len() {
            Completion::Last
        } else {
            Completion::Pending
        }
    }

    /// True once every target is done. Read-only, safe to call repeatedly.
    pub fn all_done(&self) -> bool {
        self.targets.iter().all(PlatformTarget::is_done)
    }

    pub fn remaining(&self) -> usize {
        self.targets.iter().filter(|t| !t.is_done()).count()
    }
}
