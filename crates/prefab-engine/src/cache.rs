//! Read-only probe of the on-disk artifact cache.

use std::path::{Path, PathBuf};

use prefab_util::fs;

/// Outcome of probing the cache for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// A complete artifact exists at the canonical path; no fetch needed.
    Hit(PathBuf),
    /// The canonical artifact is absent (or empty), but a locally built
    /// candidate with the same name exists. The caller should still attempt
    /// a fetch and may fall back to this path if the fetch fails.
    StaleOverrideAvailable(PathBuf),
    /// Nothing usable on disk; the caller must fetch, and a fetch failure
    /// is fatal.
    Miss,
}

/// Probe the cache for an artifact. Pure read: no side effects.
///
/// A zero-length file is never a Hit — a killed writer may have created the
/// file without completing it, and the atomic-rename fetch discipline means
/// a canonical file should only ever be complete.
pub fn probe(canonical: &Path, override_candidate: Option<&Path>) -> CacheStatus {
    if fs::is_nonempty_file(canonical) {
        return CacheStatus::Hit(canonical.to_path_buf());
    }
    if let Some(candidate) = override_candidate {
        if fs::is_nonempty_file(candidate) {
            return CacheStatus::StaleOverrideAvailable(candidate.to_path_buf());
        }
    }
    CacheStatus::Miss
}
