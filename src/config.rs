//! Project settings and the per-settings-id scope directories.
//!
//! ```text
//! <root>/.covmap/settings.json          providers, one per settings id
//! <root>/.covmap/temp/<id>/coverage.json probe map from the instrumenter
//! <root>/.covmap/temp/<id>/hits/         hit logs written while tests run
//! <root>/.covmap/temp/<id>/state.json    collected coverage state
//! ```
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::LinePolicy;
use crate::error::{CovmapError, Result};

/// Directory under the project root holding settings and scopes.
pub const SETTINGS_DIR: &str = ".covmap";

/// Top-level settings file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub providers: Vec<Provider>,
}

/// Include/exclude glob patterns, relative to the provider working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSet {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl FileSet {
    fn new(include: &[&str], exclude: &[&str]) -> Self {
        Self {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One test provider, addressed by its settings id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,
    /// Program and arguments of the external instrumenter.
    #[serde(default)]
    pub instrument_command: Vec<String>,
    #[serde(default)]
    pub line_policy: LinePolicy,
    #[serde(default = "default_assemblies")]
    pub assemblies: FileSet,
    #[serde(default = "default_sources")]
    pub sources: FileSet,
    #[serde(default = "default_tests")]
    pub tests: FileSet,
}

fn default_working_directory() -> PathBuf {
    PathBuf::from(".")
}

/// Build output directory the test build is expected to write to. Scanning
/// every `*.dll` would also pick up `bin/` and test-runner copies.
pub const ASSEMBLY_DIR: &str = ".covmap-bin";

fn default_assemblies() -> FileSet {
    let include = format!("{ASSEMBLY_DIR}/**/*.dll");
    FileSet::new(&[include.as_str()], &["**/obj/**/*.dll"])
}

fn default_sources() -> FileSet {
    FileSet::new(
        &["**/*.cs"],
        &[
            "**/bin/**/*.cs",
            "**/obj/**/*.cs",
            "tests/**/*.cs",
            "test/**/*.cs",
            "**/*.Tests/**/*.cs",
        ],
    )
}

fn default_tests() -> FileSet {
    FileSet::new(
        &["tests/**/*.cs", "test/**/*.cs", "**/*.Tests/**/*.cs"],
        &["**/bin/**/*.cs", "**/obj/**/*.cs"],
    )
}

impl Settings {
    /// Load `<root>/.covmap/settings.json`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = settings_path(root);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CovmapError::Settings(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| CovmapError::Settings(format!("invalid {}: {}", path.display(), e)))
    }

    /// The provider for `settings_id`.
    pub fn provider(&self, settings_id: &str) -> Result<&Provider> {
        validate_settings_id(settings_id)?;
        self.providers
            .iter()
            .find(|p| p.id == settings_id)
            .ok_or_else(|| {
                CovmapError::Validation(format!(
                    "The settings file did not contain a provider for ID {settings_id}"
                ))
            })
    }
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_DIR).join("settings.json")
}

fn validate_settings_id(settings_id: &str) -> Result<()> {
    if settings_id.trim().is_empty() {
        return Err(CovmapError::Validation("Settings ID not specified.".to_string()));
    }
    if settings_id.contains(|c: char| c == '/' || c == '\\') || settings_id == "." || settings_id == ".." {
        return Err(CovmapError::Validation(format!(
            "Settings ID '{settings_id}' must not contain path separators"
        )));
    }
    Ok(())
}

/// Artifact locations for one settings id. Nothing is shared across scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    dir: PathBuf,
}

impl Scope {
    pub fn new(root: &Path, settings_id: &str) -> Result<Self> {
        validate_settings_id(settings_id)?;
        Ok(Self {
            dir: root.join(SETTINGS_DIR).join("temp").join(settings_id),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn probe_map_path(&self) -> PathBuf {
        self.dir.join("coverage.json")
    }

    pub fn hits_dir(&self) -> PathBuf {
        self.dir.join("hits")
    }

    pub fn request_path(&self) -> PathBuf {
        self.dir.join("instrumentation.json")
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }
}
