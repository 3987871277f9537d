//! Ignore-list matching for the staging copy

use std::fmt;

use crate::error::{PackError, Result};

/// A single exclusion pattern.
///
/// The kind is inferred from the trailing character: a pattern ending in a
/// path separator is a prefix rule, anything else matches a final path
/// segment exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreRule {
    /// Matches any path whose normalized form starts with the pattern.
    Prefix(String),
    /// Matches any path whose last segment equals the pattern.
    Basename(String),
}

impl IgnoreRule {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(PackError::config(format!("empty ignore rule: {raw:?}")));
        }

        if normalized.ends_with('/') {
            Ok(IgnoreRule::Prefix(normalized))
        } else {
            Ok(IgnoreRule::Basename(normalized))
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            IgnoreRule::Prefix(p) | IgnoreRule::Basename(p) => p,
        }
    }

    fn matches_normalized(&self, path: &str) -> bool {
        match self {
            IgnoreRule::Prefix(prefix) => path.starts_with(prefix.as_str()),
            IgnoreRule::Basename(name) => basename(path) == name,
        }
    }
}

impl fmt::Display for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

/// Ordered list of ignore rules, evaluated first-match-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    rules: Vec<IgnoreRule>,
}

impl IgnoreList {
    pub fn new(rules: Vec<IgnoreRule>) -> Self {
        Self { rules }
    }

    /// Parse raw patterns from configuration, rejecting empty ones.
    pub fn parse<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = raw
            .into_iter()
            .map(|s| IgnoreRule::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index of the first rule matching `relative`, if any.
    pub fn find(&self, relative: &str) -> Option<usize> {
        let path = normalize(relative);
        if path.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .position(|rule| rule.matches_normalized(&path))
    }

    pub fn matches(&self, relative: &str) -> bool {
        self.find(relative).is_some()
    }

    /// Like [`IgnoreList::matches`], but treats `relative` as a directory so
    /// that the prefix rule `dir/` also excludes `dir` itself.
    pub fn matches_dir(&self, relative: &str) -> bool {
        let path = normalize(relative);
        if path.is_empty() {
            return false;
        }
        if path.ends_with('/') {
            self.matches(&path)
        } else {
            self.matches(&format!("{path}/"))
        }
    }
}

/// Canonical form: forward slashes, no leading `./` or `/`.
pub fn normalize(raw: &str) -> String {
    let mut path = raw.replace('\\', "/");
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_string();
        } else {
            break;
        }
    }
    if path == "." {
        path.clear();
    }
    path
}

fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
