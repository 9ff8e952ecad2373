//! The `prefab.toml` manifest: remote origin, modules, build settings, and
//! the optional companion tool.

use std::path::Path;

use serde::{Deserialize, Serialize};

use prefab_keys::{BuildSettings, WindowsToolset};

/// The `prefab.toml` manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub origin: Origin,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleEntry>,
    pub companion: Option<Companion>,
}

/// Remote origin serving prebuilt artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Origin {
    /// Base URL of the artifact server, without a trailing slash.
    pub base_url: String,
    /// Version identifier spliced into URLs and cache paths.
    pub version: String,
}

/// Host build switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Debug builds link the debug C runtime.
    #[serde(default)]
    pub use_debug_crt: bool,
    /// Windows toolset variant, `vs2015` or `vs2013`.
    #[serde(default = "default_toolset")]
    pub windows_toolset: String,
}

fn default_toolset() -> String {
    "vs2015".to_owned()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_debug_crt: false,
            windows_toolset: default_toolset(),
        }
    }
}

/// One prebuilt module to resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Module name; artifact file names are derived from it.
    pub name: String,
    /// Path (relative to the project root) probed for the module's own
    /// source. When the probe exists, the module is built from source and
    /// no prebuilt artifact is resolved.
    pub source_probe: Option<String>,
    /// Directory (relative to the project root) searched for a locally
    /// built artifact that may supersede the cached one.
    pub override_dir: Option<String>,
}

/// The auxiliary long-lived tool updated alongside the library artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Companion {
    /// Executable file name, e.g. `ScriptIde.exe`.
    pub executable: String,
    /// Process name to search for when the tool may be running.
    pub process_name: String,
    /// Install directory, relative to the project root.
    pub install_dir: String,
}

impl Manifest {
    /// Read and parse a `prefab.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Parse a manifest from TOML text. `origin` names the source for error
    /// messages.
    ///
    /// # Errors
    /// Returns an error on invalid TOML or failed validation.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(content).map_err(|e| ManifestError::Parse {
            path: origin.to_owned(),
            source: e,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.origin.base_url.is_empty() {
            return Err(ManifestError::Invalid {
                message: "origin.base_url must not be empty".to_owned(),
            });
        }
        if self.origin.version.is_empty() {
            return Err(ManifestError::Invalid {
                message: "origin.version must not be empty".to_owned(),
            });
        }
        if self.modules.is_empty() && self.companion.is_none() {
            return Err(ManifestError::Invalid {
                message: "at least one [[module]] or a [companion] is required".to_owned(),
            });
        }
        for module in &self.modules {
            if module.name.is_empty() {
                return Err(ManifestError::Invalid {
                    message: "module.name must not be empty".to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Typed build settings for the key resolver.
    ///
    /// # Errors
    /// Returns an error if `windows_toolset` is not a known toolset.
    pub fn build_settings(&self) -> Result<BuildSettings, ManifestError> {
        let windows_toolset: WindowsToolset =
            self.settings
                .windows_toolset
                .parse()
                .map_err(|e: prefab_keys::KeyError| ManifestError::Invalid {
                    message: e.to_string(),
                })?;
        Ok(BuildSettings {
            use_debug_crt: self.settings.use_debug_crt,
            windows_toolset,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid prefab.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid prefab.toml: {message}")]
    Invalid { message: String },
}
