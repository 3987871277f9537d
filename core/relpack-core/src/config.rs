//! Build configuration file (`relpack.json`)

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoContext, PackError, Result};
use crate::ignore::IgnoreList;
use crate::platform::{parse_platforms, Platform};

/// File name looked up in the source tree when no explicit config is given.
pub const CONFIG_FILE_NAME: &str = "relpack.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    pub platforms: Vec<String>,
    pub ignore_list: Vec<String>,
    /// Staged files or directories (relative to the staging root) to minify.
    pub uglify_list: Vec<String>,
    pub arch: String,
    pub copyright: Option<String>,
    /// Icon path relative to the source tree, without extension.
    pub icon: String,
    pub out: PathBuf,
    pub staging: PathBuf,
    pub cache: Option<PathBuf>,
    pub tools: ToolsConfig,
    /// Windows resource strings (CompanyName, FileDescription, ...).
    pub version_string: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            platforms: Vec::new(),
            ignore_list: Vec::new(),
            uglify_list: Vec::new(),
            arch: "x64".to_string(),
            copyright: None,
            icon: "icons/icon".to_string(),
            out: PathBuf::from("releases"),
            staging: PathBuf::from(".relpack-staging"),
            cache: None,
            tools: ToolsConfig::default(),
            version_string: BTreeMap::new(),
        }
    }
}

/// External command lines. `{input}` and `{output}` are substituted for
/// minifier commands; the first element is the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    pub script_minifier: Vec<String>,
    pub style_minifier: Vec<String>,
    pub installer: Vec<String>,
    pub packager: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let strings = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect();
        Self {
            script_minifier: strings(&[
                "uglifyjs",
                "{input}",
                "--compress",
                "--mangle",
                "--output",
                "{output}",
            ]),
            style_minifier: strings(&["cleancss", "-o", "{output}", "{input}"]),
            installer: strings(&["npm", "install"]),
            packager: "electron-packager".to_string(),
        }
    }
}

impl ToolsConfig {
    fn validate(&self) -> Result<()> {
        let lines = [
            ("scriptMinifier", &self.script_minifier),
            ("styleMinifier", &self.style_minifier),
            ("installer", &self.installer),
        ];
        for (key, line) in lines {
            if line.first().map_or(true, |p| p.trim().is_empty()) {
                return Err(PackError::config(format!("tools.{key} must name a program")));
            }
        }
        if self.packager.trim().is_empty() {
            return Err(PackError::config("tools.packager must name a program"));
        }
        Ok(())
    }
}

impl BuildConfig {
    pub fn from_json(text: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| PackError::Json {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        Self::from_json(&text, path)
    }

    /// Load `path`, falling back to defaults when it does not exist and
    /// `required` is false.
    pub fn load_or_default(path: &Path, required: bool) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text, path),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PackError::config(format!(
                "config file not found: {}",
                path.display()
            ))),
            Err(source) => Err(PackError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Validated ignore rules.
    pub fn ignore_rules(&self) -> Result<IgnoreList> {
        IgnoreList::parse(&self.ignore_list)
    }

    /// Validated platform list.
    pub fn target_platforms(&self) -> Result<Vec<Platform>> {
        parse_platforms(&self.platforms)
    }

    /// Check everything that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        self.target_platforms()?;
        self.ignore_rules()?;
        self.tools.validate()?;
        if self.arch.trim().is_empty() {
            return Err(PackError::config("arch must not be empty"));
        }
        if self.uglify_list.iter().any(|p| p.trim().is_empty()) {
            return Err(PackError::config("uglifyList entries must not be empty"));
        }
        Ok(())
    }
}
