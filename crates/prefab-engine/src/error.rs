//! Error types for prefab-engine.

/// Errors produced by artifact resolution and acquisition.
///
/// An unsupported platform is not represented here: it resolves to an empty
/// artifact set, silently. Everything below aborts the resolution step.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A required artifact could not be downloaded. The message names the
    /// origin URL that was attempted.
    #[error("cannot download {url}: {message}")]
    Download { url: String, message: String },

    /// A downloaded artifact failed validation (e.g. zero-length body).
    /// Treated identically to a download failure by callers.
    #[error("invalid artifact at {path}: {reason}")]
    Integrity { path: String, reason: String },

    /// The companion executable did not exit within the graceful-exit
    /// timeout. Remediation differs from network errors: close the tool.
    #[error("{process_name} is still running after {timeout_secs}s — close it manually, then retry the build")]
    CompanionRunning {
        process_name: String,
        timeout_secs: u64,
    },

    /// The companion executable could not be replaced on disk.
    #[error("cannot replace {path}: {message} — make sure {process_name} is not running, then retry")]
    CompanionReplace {
        path: String,
        process_name: String,
        message: String,
    },

    /// An error propagated from prefab-util.
    #[error("{0}")]
    Util(#[from] prefab_util::error::UtilError),

    /// An error propagated from manifest parsing.
    #[error("{0}")]
    Manifest(#[from] prefab_config::ManifestError),
}
