//! Remote artifact fetching: download to a process-unique temp file, verify,
//! and atomically place at the canonical path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use prefab_util::fs;

use crate::error::EngineError;

/// Kind discriminator in origin URLs: link artifacts live under `lib/`,
/// companion executables under `bin/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Lib,
    Bin,
}

impl ArtifactKind {
    fn segment(self) -> &'static str {
        match self {
            ArtifactKind::Lib => "lib",
            ArtifactKind::Bin => "bin",
        }
    }
}

/// A versioned remote origin serving prebuilt artifacts.
///
/// URL scheme: `<base>/<version>/<kind>/<platformPathSegment>/<fileName>`.
#[derive(Debug, Clone)]
pub struct RemoteOrigin {
    base_url: String,
    version: String,
}

impl RemoteOrigin {
    /// Create an origin, validating the version identifier (it is spliced
    /// into URLs and cache paths).
    ///
    /// # Errors
    /// Returns an error if the version contains characters outside
    /// `[A-Za-z0-9._-]`.
    pub fn new(base_url: &str, version: &str) -> Result<Self, EngineError> {
        fs::validate_version(version)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            version: version.to_owned(),
        })
    }

    /// The version identifier this origin serves.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Build the URL for an artifact. `segment` is the platform path segment
    /// for link artifacts; companion executables have none.
    pub fn url_for(&self, kind: ArtifactKind, segment: Option<&str>, file_name: &str) -> String {
        match segment {
            Some(seg) => format!(
                "{}/{}/{}/{}/{}",
                self.base_url,
                self.version,
                kind.segment(),
                seg,
                file_name
            ),
            None => format!(
                "{}/{}/{}/{}",
                self.base_url,
                self.version,
                kind.segment(),
                file_name
            ),
        }
    }
}

/// Caller-tunable fetch behavior.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Bound on the whole transfer. Never infinite.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
        }
    }
}

/// A successfully fetched artifact.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    /// Canonical path the artifact was installed at.
    pub path: PathBuf,
    /// Hex-encoded SHA-256 of the downloaded content.
    pub sha256: String,
}

/// Download `url` and install it at `dest`, atomically.
///
/// The transfer goes to a `.tmp-<name>-<pid>` sibling of `dest` so that
/// concurrent invocations sharing the cache never collide, then is renamed
/// onto the final name. On any failure the temp file is removed and nothing
/// is left at `dest` that was not already there.
///
/// # Errors
/// Returns `Download` (naming the URL) on network failure or non-success
/// response, `Integrity` on a zero-length body, and `Io` on filesystem
/// failure.
pub fn fetch(
    url: &str,
    dest: &Path,
    label: &str,
    version: &str,
    options: &FetchOptions,
) -> Result<FetchedArtifact, EngineError> {
    if let Some(parent) = dest.parent() {
        fs::ensure_dir(parent)?;
    }

    let tmp = tmp_sibling(dest);

    let sha256 = match prefab_util::download::download(url, &tmp, label, version, options.timeout)
    {
        Ok(hash) => hash,
        Err(prefab_util::error::UtilError::Download { message }) => {
            let _ = fs::remove_file_if_exists(&tmp);
            return Err(EngineError::Download {
                url: url.to_owned(),
                message,
            });
        }
        Err(other) => {
            let _ = fs::remove_file_if_exists(&tmp);
            return Err(other.into());
        }
    };

    if !fs::is_nonempty_file(&tmp) {
        let _ = fs::remove_file_if_exists(&tmp);
        return Err(EngineError::Integrity {
            path: dest.display().to_string(),
            reason: format!("origin returned an empty body for {url}"),
        });
    }

    place_atomically(&tmp, dest)?;

    Ok(FetchedArtifact {
        path: dest.to_path_buf(),
        sha256,
    })
}

/// Process-unique temp sibling of `dest`, in the same directory so the final
/// rename never crosses a filesystem boundary.
fn tmp_sibling(dest: &Path) -> PathBuf {
    let pid = std::process::id();
    let name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let tmp_name = format!(".tmp-{name}-{pid}");
    dest.parent()
        .map(|p| p.join(&tmp_name))
        .unwrap_or_else(|| PathBuf::from(&tmp_name))
}

/// Rename `tmp` onto `dest`, overwriting. If the rename fails but `dest`
/// exists, another invocation placed the artifact concurrently; accept its
/// file and discard ours.
pub(crate) fn place_atomically(tmp: &Path, dest: &Path) -> Result<(), EngineError> {
    match std::fs::rename(tmp, dest) {
        Ok(()) => Ok(()),
        Err(_) if dest.exists() => {
            let _ = fs::remove_file_if_exists(tmp);
            Ok(())
        }
        Err(source) => {
            let _ = fs::remove_file_if_exists(tmp);
            Err(EngineError::Io {
                path: dest.display().to_string(),
                source,
            })
        }
    }
}
