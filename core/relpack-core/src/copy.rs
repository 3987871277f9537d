//! Filtered tree copy into the staging directory

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::{IoContext, PackError, Result};
use crate::ignore::IgnoreList;

/// Counters reported after a staging copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
    /// Entries cut by the ignore list (an excluded directory counts once).
    pub skipped: usize,
    /// Directories removed by the empty-directory pass.
    pub pruned: usize,
}

/// Copies a source tree into a destination, leaving out ignored entries.
#[derive(Debug, Clone)]
pub struct TreeCopier<'a> {
    ignore: &'a IgnoreList,
    follow_symlinks: bool,
    excluded: Vec<PathBuf>,
}

impl<'a> TreeCopier<'a> {
    pub fn new(ignore: &'a IgnoreList) -> Self {
        Self {
            ignore,
            follow_symlinks: false,
            excluded: Vec::new(),
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Never copy `path`, e.g. a release directory that lives inside the
    /// source. Paths that do not exist are ignored.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Copy every allowed entry of `source` below `dest`, then prune
    /// directories that ended up without any file.
    ///
    /// Partial output is left in place when an I/O error aborts the copy.
    pub fn copy(&self, source: &Path, dest: &Path) -> Result<CopyStats> {
        let meta = fs::metadata(source).at(source)?;
        if !meta.is_dir() {
            return Err(PackError::config(format!(
                "source is not a directory: {}",
                source.display()
            )));
        }

        fs::create_dir_all(dest).at(dest)?;
        let source = source.canonicalize().at(source)?;
        let mut excluded = vec![dest.canonicalize().at(dest)?];
        excluded.extend(self.excluded.iter().filter_map(|p| p.canonicalize().ok()));

        let mut stats = CopyStats::default();
        let mut skipped = 0usize;
        let walker = WalkDir::new(&source)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                // Staging and release dirs nested in the source are never copied.
                if excluded.iter().any(|p| entry.path() == p.as_path()) {
                    debug!(path = %entry.path().display(), "excluded output directory");
                    return false;
                }
                let keep = !self.is_ignored(&source, entry);
                if !keep {
                    debug!(path = %entry.path().display(), "ignored");
                    skipped += 1;
                }
                keep
            });

        for entry in walker {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }
            let relative = relative_to(&source, entry.path());
            let target = dest.join(&relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target).at(&target)?;
                stats.dirs += 1;
            } else if file_type.is_symlink() {
                copy_symlink(entry.path(), &target)?;
                stats.files += 1;
            } else {
                stats.bytes += fs::copy(entry.path(), &target).at(entry.path())?;
                stats.files += 1;
            }
        }

        stats.skipped = skipped;
        stats.pruned = prune_empty_dirs(dest)?;
        info!(
            files = stats.files,
            dirs = stats.dirs,
            bytes = stats.bytes,
            skipped = stats.skipped,
            pruned = stats.pruned,
            "copied source tree into {}",
            dest.display()
        );
        Ok(stats)
    }

    fn is_ignored(&self, root: &Path, entry: &DirEntry) -> bool {
        let relative = relative_to(root, entry.path());
        let relative = relative.to_string_lossy();
        if entry.file_type().is_dir() {
            self.ignore.matches_dir(&relative)
        } else {
            self.ignore.matches(&relative)
        }
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let pointee = fs::read_link(link).at(link)?;
    std::os::unix::fs::symlink(&pointee, target).at(target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    fs::copy(link, target).at(link).map(|_| ())
}

/// Remove every directory below `root` that holds no file, deepest first.
/// `root` itself is kept. Returns the number of directories removed.
pub fn prune_empty_dirs(root: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let is_empty = fs::read_dir(path).at(path)?.next().is_none();
        if is_empty {
            fs::remove_dir(path).at(path)?;
            debug!(path = %path.display(), "pruned empty directory");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Recursively copy `source` into `dest` without overwriting files that
/// already exist there. Returns the number of files written.
pub fn merge_tree(source: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).at(dest)?;
    let mut written = 0;

    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry?;
        let target = dest.join(relative_to(source, entry.path()));

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).at(&target)?;
        } else if target.symlink_metadata().is_err() {
            if entry.file_type().is_symlink() {
                copy_symlink(entry.path(), &target)?;
            } else {
                fs::copy(entry.path(), &target).at(entry.path())?;
            }
            written += 1;
        }
    }

    Ok(written)
}
