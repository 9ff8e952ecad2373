//! Error types for prefab-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A download failed.
    #[error("download failed: {message}")]
    Download { message: String },

    /// A version string contains unsafe characters.
    #[error("invalid version \"{version}\": only alphanumeric characters, dots, hyphens, and underscores are allowed")]
    InvalidVersion { version: String },

    /// A process-control command failed to execute.
    #[error("cannot execute process command: {source}")]
    CommandExec { source: std::io::Error },
}
