#![forbid(unsafe_code)]
//! Artifact key resolution for Prefab.
//!
//! Maps an [`ArtifactKey`] (platform, configuration, link mode) to the naming
//! scheme and cache path segments of a prebuilt artifact. Resolution is pure
//! and total: an unsupported platform yields an empty segment set, meaning
//! "no prebuilt artifacts here", never an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A target platform for prebuilt artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Win32,
    Win64,
    Mac,
    Ios,
    Tvos,
    Android,
    Linux,
}

impl Platform {
    /// Whether debug builds on this platform always link the debug C runtime.
    ///
    /// On these platforms there is no optimized-CRT debug variant, so the
    /// debug-runtime flag is overridden to `true` before naming.
    fn forces_debug_crt(self) -> bool {
        matches!(
            self,
            Platform::Mac | Platform::Ios | Platform::Tvos | Platform::Android
        )
    }

    /// Sub-architectures this platform fans out to, if any.
    ///
    /// Only Android ships one artifact per architecture; everywhere else the
    /// platform directory is a single segment.
    pub fn architectures(self) -> &'static [Architecture] {
        match self {
            Platform::Android => &[
                Architecture::Arm,
                Architecture::Arm64,
                Architecture::X86,
                Architecture::X64,
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Win32 => "Win32",
            Platform::Win64 => "Win64",
            Platform::Mac => "Mac",
            Platform::Ios => "IOS",
            Platform::Tvos => "TVOS",
            Platform::Android => "Android",
            Platform::Linux => "Linux",
        };
        f.write_str(name)
    }
}

impl FromStr for Platform {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "win32" => Ok(Platform::Win32),
            "win64" => Ok(Platform::Win64),
            "mac" => Ok(Platform::Mac),
            "ios" => Ok(Platform::Ios),
            "tvos" => Ok(Platform::Tvos),
            "android" => Ok(Platform::Android),
            "linux" => Ok(Platform::Linux),
            _ => Err(KeyError::UnknownPlatform {
                value: s.to_owned(),
            }),
        }
    }
}

/// A sub-architecture of a multi-architecture platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    Arm,
    Arm64,
    X86,
    X64,
}

impl Architecture {
    /// Directory segment used in cache paths and origin URLs.
    pub fn segment(self) -> &'static str {
        match self {
            Architecture::Arm => "ARM",
            Architecture::Arm64 => "ARM64",
            Architecture::X86 => "x86",
            Architecture::X64 => "x64",
        }
    }
}

/// A build configuration.
///
/// `DebugOptimizedRuntime` is a debug build linked against the optimized C
/// runtime; it is the normalized form of `Debug` when the debug runtime is
/// not in use, so exactly four configurations map to exactly four suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Configuration {
    Debug,
    DebugOptimizedRuntime,
    Development,
    Shipping,
}

impl Configuration {
    /// Artifact name suffix for this configuration.
    pub fn suffix(self) -> &'static str {
        match self {
            Configuration::Debug => "-Debug",
            Configuration::DebugOptimizedRuntime => "-DebugCRTOpt",
            Configuration::Development => "-Development",
            Configuration::Shipping => "-Shipping",
        }
    }

    /// Apply the debug-runtime rule for a platform and settings.
    ///
    /// Debug-family configurations collapse to `Debug` when the debug C
    /// runtime is in use (forced on platforms without an optimized-CRT debug
    /// variant) and to `DebugOptimizedRuntime` otherwise. Development and
    /// Shipping pass through unchanged.
    fn normalized(self, platform: Platform, settings: &BuildSettings) -> Configuration {
        match self {
            Configuration::Debug | Configuration::DebugOptimizedRuntime => {
                if settings.use_debug_crt || platform.forces_debug_crt() {
                    Configuration::Debug
                } else {
                    Configuration::DebugOptimizedRuntime
                }
            }
            other => other,
        }
    }
}

impl FromStr for Configuration {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "debuggame" and "test" are host-orchestrator configurations that
        // share naming with Debug and Development respectively.
        match s.to_ascii_lowercase().as_str() {
            "debug" | "debuggame" => Ok(Configuration::Debug),
            "debugcrtopt" => Ok(Configuration::DebugOptimizedRuntime),
            "development" | "test" => Ok(Configuration::Development),
            "shipping" => Ok(Configuration::Shipping),
            _ => Err(KeyError::UnknownConfiguration {
                value: s.to_owned(),
            }),
        }
    }
}

/// Whether the consuming build links one monolithic binary or dynamically
/// loads modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkMode {
    Monolithic,
    Dynamic,
}

/// Windows toolset variant; prebuilt Windows artifacts are keyed by the
/// compiler that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowsToolset {
    Vs2015,
    Vs2013,
}

impl WindowsToolset {
    fn segment(self) -> &'static str {
        match self {
            WindowsToolset::Vs2015 => "VS2015",
            WindowsToolset::Vs2013 => "VS2013",
        }
    }
}

impl FromStr for WindowsToolset {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vs2015" => Ok(WindowsToolset::Vs2015),
            "vs2013" => Ok(WindowsToolset::Vs2013),
            _ => Err(KeyError::UnknownToolset {
                value: s.to_owned(),
            }),
        }
    }
}

/// Host build switches that affect naming, passed in explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSettings {
    /// Debug builds link the debug C runtime.
    pub use_debug_crt: bool,
    /// Toolset variant for Windows artifact paths.
    pub windows_toolset: WindowsToolset,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            use_debug_crt: false,
            windows_toolset: WindowsToolset::Vs2015,
        }
    }
}

/// The immutable key that fully determines artifact naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub platform: Platform,
    pub configuration: Configuration,
    pub link_mode: LinkMode,
}

/// Naming scheme derived from an [`ArtifactKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactNaming {
    /// Library file name prefix (`lib` everywhere except Windows).
    pub prefix: &'static str,
    /// Configuration suffix, e.g. `-Development`.
    pub suffix: &'static str,
    /// Extension of the link artifact (`.lib` on Windows, `.a` elsewhere).
    pub lib_extension: &'static str,
    /// Extension of the dynamic loader companion (`.dll` / `.dylib`).
    pub loader_extension: &'static str,
}

impl ArtifactNaming {
    /// File name of the link artifact for `module`.
    pub fn file_name(&self, module: &str) -> String {
        format!("{}{module}{}{}", self.prefix, self.suffix, self.lib_extension)
    }

    /// File name of the dynamic loader companion for `module`.
    pub fn loader_file_name(&self, module: &str) -> String {
        format!(
            "{}{module}{}{}",
            self.prefix, self.suffix, self.loader_extension
        )
    }
}

/// Result of resolving an [`ArtifactKey`]: the naming scheme plus the ordered
/// set of path segments to append to the cache root. Multi-architecture
/// platforms yield one segment per architecture; an unsupported platform
/// yields none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyResolution {
    pub naming: ArtifactNaming,
    pub segments: Vec<String>,
}

impl KeyResolution {
    /// `true` when the platform has no prebuilt artifacts at all.
    pub fn is_unsupported(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Resolve an [`ArtifactKey`] to its naming scheme and path segments.
///
/// Pure: no I/O, no hidden state. Identical inputs always produce identical
/// output.
pub fn resolve(key: &ArtifactKey, settings: &BuildSettings) -> KeyResolution {
    let configuration = key.configuration.normalized(key.platform, settings);

    let (prefix, lib_extension, loader_extension) = match key.platform {
        Platform::Win32 | Platform::Win64 => ("", ".lib", ".dll"),
        _ => ("lib", ".a", ".dylib"),
    };

    let segments = match key.platform {
        Platform::Win32 => vec![format!("Win32/{}", settings.windows_toolset.segment())],
        Platform::Win64 => vec![format!("Win64/{}", settings.windows_toolset.segment())],
        Platform::Mac => vec!["Mac".to_owned()],
        Platform::Ios => vec!["IOS".to_owned()],
        Platform::Tvos => vec!["TVOS".to_owned()],
        Platform::Android => Platform::Android
            .architectures()
            .iter()
            .map(|arch| format!("Android/{}", arch.segment()))
            .collect(),
        Platform::Linux => Vec::new(),
    };

    KeyResolution {
        naming: ArtifactNaming {
            prefix,
            suffix: configuration.suffix(),
            lib_extension,
            loader_extension,
        },
        segments,
    }
}

/// Join a `/`-separated path segment onto a base directory, one component at
/// a time, so the result uses the host's path separator.
pub fn join_segment(base: &Path, segment: &str) -> PathBuf {
    segment
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |path, part| path.join(part))
}

/// Errors from parsing key components supplied by the host as strings.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("unknown platform \"{value}\" — expected Win32, Win64, Mac, IOS, TVOS, Android, or Linux")]
    UnknownPlatform { value: String },

    #[error("unknown configuration \"{value}\" — expected Debug, DebugCRTOpt, Development, or Shipping")]
    UnknownConfiguration { value: String },

    #[error("unknown Windows toolset \"{value}\" — expected vs2015 or vs2013")]
    UnknownToolset { value: String },
}
