//! Bundle manifest parsing (dogfood.toml)
//!
//! ```toml
//! [bundle]
//! host = "target/release/dogfood-host"   # optional
//! output = "dist/app"
//! entry = { path = "src/main.rhai" }     # name defaults to the file stem
//! include = ["src/lib/*.rhai"]           # optional, sorted per pattern
//!
//! [[module]]
//! name = "util"
//! path = "src/util.rhai"
//! ```
//!
//! Libraries are bundled in the order `[[module]]` entries appear, followed
//! by `include` matches.

use dogfood_runtime::bundle::format::validate_module_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "dogfood.toml";

/// Errors that can occur during manifest parsing
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read manifest file
    #[error("Failed to read manifest file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid glob pattern
    #[error("Invalid include pattern: {0}")]
    PatternError(#[from] glob::PatternError),

    /// Validation error
    #[error("Invalid manifest: {0}")]
    ValidationError(String),
}

/// Bundle manifest (dogfood.toml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleManifest {
    pub bundle: BundleSection,

    /// Explicit library modules
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleEntry>,
}

/// The `[bundle]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleSection {
    /// Host executable to append to (defaults to the installed dogfood-host)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<PathBuf>,

    /// Where the bundled executable is written
    pub output: PathBuf,

    /// The module run at startup
    pub entry: ModuleEntry,

    /// Glob patterns for additional library modules
    #[serde(default)]
    pub include: Vec<String>,
}

/// One module source file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleEntry {
    /// Module name (defaults to the file stem)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub path: PathBuf,
}

/// A module name bound to the file holding its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    pub name: String,
    pub path: PathBuf,
}

/// Everything the bundle command needs, with paths resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BundlePlan {
    pub host: Option<PathBuf>,
    pub output: PathBuf,
    pub entry: ModuleSpec,
    pub libraries: Vec<ModuleSpec>,
}

impl BundleManifest {
    /// Parse a manifest from a file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a manifest from a string
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest: BundleManifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.bundle.output.as_os_str().is_empty() {
            return Err(ManifestError::ValidationError(
                "bundle.output cannot be empty".to_string(),
            ));
        }

        for entry in std::iter::once(&self.bundle.entry).chain(&self.modules) {
            if let Some(name) = &entry.name {
                validate_module_name(name).map_err(|reason| {
                    ManifestError::ValidationError(format!("module '{}': {}", name, reason))
                })?;
            }
        }

        Ok(())
    }

    /// Resolve every path against `base` (the manifest's directory) and
    /// expand the include patterns.
    pub fn resolve(&self, base: &Path) -> Result<BundlePlan, ManifestError> {
        let entry = self.bundle.entry.to_spec(base)?;

        let mut libraries = self
            .modules
            .iter()
            .map(|module| module.to_spec(base))
            .collect::<Result<Vec<_>, _>>()?;

        for pattern in &self.bundle.include {
            let pattern = base.join(pattern);
            let mut matches = glob::glob(&pattern.to_string_lossy())?
                .filter_map(Result::ok)
                .filter(|path| path.is_file() && *path != entry.path)
                .collect::<Vec<_>>();
            matches.sort();
            for path in matches {
                libraries.push(ModuleSpec::from_path(path)?);
            }
        }

        Ok(BundlePlan {
            host: self.bundle.host.as_ref().map(|host| base.join(host)),
            output: base.join(&self.bundle.output),
            entry,
            libraries,
        })
    }
}

impl ModuleEntry {
    fn to_spec(&self, base: &Path) -> Result<ModuleSpec, ManifestError> {
        let path = base.join(&self.path);
        match &self.name {
            Some(name) => Ok(ModuleSpec {
                name: name.clone(),
                path,
            }),
            None => ModuleSpec::from_path(path),
        }
    }
}

impl ModuleSpec {
    /// Name a module after its file stem.
    pub fn from_path(path: PathBuf) -> Result<Self, ManifestError> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                ManifestError::ValidationError(format!(
                    "cannot derive a module name from {}",
                    path.display()
                ))
            })?
            .to_string();
        validate_module_name(&name).map_err(|reason| {
            ManifestError::ValidationError(format!("{}: {}", path.display(), reason))
        })?;
        Ok(Self { name, path })
    }

    /// Parse a command-line module argument: `path` or `name=path`.
    pub fn parse_arg(arg: &str) -> Result<Self, ManifestError> {
        match arg.split_once('=') {
            Some((name, path)) if !name.is_empty() && !name.contains(['/', '\\']) => {
                validate_module_name(name).map_err(|reason| {
                    ManifestError::ValidationError(format!("module '{}': {}", name, reason))
                })?;
                Ok(Self {
                    name: name.to_string(),
                    path: PathBuf::from(path),
                })
            }
            _ => Self::from_path(PathBuf::from(arg)),
        }
    }
}
