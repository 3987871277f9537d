//! Patch-version bumping and package descriptor I/O

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{IoContext, PackError, Result};

/// Name of the package descriptor at the root of the source tree.
pub const DESCRIPTOR_FILE_NAME: &str = "package.json";

/// Increment the patch component of a `major.minor.patch` version.
///
/// Anything after the third component is kept as is.
pub fn bump_patch(version: &str) -> Result<String> {
    let mut parts: Vec<String> = version.split('.').map(str::to_string).collect();
    if parts.len() < 3 {
        return Err(PackError::Format(version.to_string()));
    }

    let patch: u64 = parts[2]
        .parse()
        .map_err(|_| PackError::Format(version.to_string()))?;
    let next = patch
        .checked_add(1)
        .ok_or_else(|| PackError::Format(version.to_string()))?;
    parts[2] = next.to_string();

    Ok(parts.join("."))
}

/// `package.json`, with every field we do not touch preserved in order.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    path: PathBuf,
    fields: Map<String, Value>,
}

impl PackageDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|source| PackError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Object(fields) = value else {
            return Err(PackError::config(format!(
                "{} must contain a JSON object",
                path.display()
            )));
        };

        let descriptor = Self {
            path: path.to_path_buf(),
            fields,
        };
        if descriptor.name().is_none() {
            return Err(PackError::config(format!(
                "{} has no \"name\" field",
                path.display()
            )));
        }
        if descriptor.version().is_none() {
            return Err(PackError::config(format!(
                "{} has no \"version\" field",
                path.display()
            )));
        }
        Ok(descriptor)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.fields.get("version").and_then(Value::as_str)
    }

    pub fn product_name(&self) -> Option<&str> {
        self.fields.get("productName").and_then(Value::as_str)
    }

    /// `productName` when present, otherwise `name`.
    pub fn display_name(&self) -> &str {
        self.product_name().or_else(|| self.name()).unwrap_or_default()
    }

    pub fn set_version(&mut self, version: &str) {
        self.fields
            .insert("version".to_string(), Value::String(version.to_string()));
    }

    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(&self.fields).map_err(|source| {
            PackError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        text.push('\n');
        Ok(text)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&self.path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?).at(path)
    }
}
