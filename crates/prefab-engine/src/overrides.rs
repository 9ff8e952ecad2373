//! Locally built artifacts supersede cached ones when strictly newer.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use prefab_util::fs;

/// Override candidates modified before 2015-11-01 00:00:00 UTC are leftovers
/// from an earlier, incompatible artifact-naming generation that happens to
/// share file names; they must never win.
pub const MIN_OVERRIDE_EPOCH_SECS: u64 = 1_446_336_000;

/// The minimum-valid epoch as a [`SystemTime`].
pub fn min_override_epoch() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(MIN_OVERRIDE_EPOCH_SECS)
}

/// Which artifact the caller should hand to the link step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideDecision {
    /// The locally built artifact wins; link against this path.
    UseOverride(PathBuf),
    /// Keep the cached/downloaded artifact.
    UseCached,
}

/// Decide between a cached artifact and a locally built override candidate.
///
/// `UseOverride` iff the candidate exists AND (the cached artifact is absent
/// OR the candidate's mtime strictly exceeds the cached artifact's) AND the
/// candidate's mtime is at or after the minimum-valid epoch. Equal mtimes
/// keep the cached artifact. Pure decision over metadata: nothing is copied.
pub fn resolve_override(cached: &Path, candidate: &Path) -> OverrideDecision {
    if !candidate.is_file() {
        return OverrideDecision::UseCached;
    }
    let Some(candidate_mtime) = fs::modified(candidate) else {
        return OverrideDecision::UseCached;
    };
    if candidate_mtime < min_override_epoch() {
        return OverrideDecision::UseCached;
    }

    match fs::modified(cached) {
        None => OverrideDecision::UseOverride(candidate.to_path_buf()),
        Some(cached_mtime) if candidate_mtime > cached_mtime => {
            OverrideDecision::UseOverride(candidate.to_path_buf())
        }
        Some(_) => OverrideDecision::UseCached,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs as stdfs;

    use super::*;

    /// Write a file and pin its mtime to `secs` after the Unix epoch.
    fn write_with_mtime(path: &Path, secs: u64) {
        stdfs::write(path, b"bytes").unwrap();
        let file = stdfs::File::options().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    // Some timestamps, all after the 2015-11-01 cutoff.
    const T_2020: u64 = 1_577_836_800; // 2020-01-01
    const T_2021: u64 = 1_609_459_200; // 2021-01-01

    #[test]
    fn newer_override_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let cached = tmp.path().join("cached.a");
        let local = tmp.path().join("local.a");
        write_with_mtime(&cached, T_2020);
        write_with_mtime(&local, T_2021);

        assert_eq!(
            resolve_override(&cached, &local),
            OverrideDecision::UseOverride(local)
        );
    }

    #[test]
    fn equal_mtimes_use_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let cached = tmp.path().join("cached.a");
        let local = tmp.path().join("local.a");
        write_with_mtime(&cached, T_2020);
        write_with_mtime(&local, T_2020);

        assert_eq!(resolve_override(&cached, &local), OverrideDecision::UseCached);
    }

    #[test]
    fn older_override_uses_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let cached = tmp.path().join("cached.a");
        let local = tmp.path().join("local.a");
        write_with_mtime(&cached, T_2021);
        write_with_mtime(&local, T_2020);

        assert_eq!(resolve_override(&cached, &local), OverrideDecision::UseCached);
    }

    #[test]
    fn absent_cached_takes_valid_override() {
        let tmp = tempfile::tempdir().unwrap();
        let cached = tmp.path().join("cached.a");
        let local = tmp.path().join("local.a");
        write_with_mtime(&local, T_2020);

        assert_eq!(
            resolve_override(&cached, &local),
            OverrideDecision::UseOverride(local)
        );
    }

    #[test]
    fn pre_epoch_override_never_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let cached = tmp.path().join("cached.a");
        let local = tmp.path().join("local.a");
        // 2014-01-01, before the naming-scheme cutoff — even with no cached
        // artifact at all, this leftover must be rejected.
        write_with_mtime(&local, 1_388_534_400);

        assert_eq!(resolve_override(&cached, &local), OverrideDecision::UseCached);
    }

    #[test]
    fn override_exactly_at_epoch_is_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let cached = tmp.path().join("cached.a");
        let local = tmp.path().join("local.a");
        write_with_mtime(&local, MIN_OVERRIDE_EPOCH_SECS);

        assert_eq!(
            resolve_override(&cached, &local),
            OverrideDecision::UseOverride(local)
        );
    }

    #[test]
    fn missing_override_uses_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let cached = tmp.path().join("cached.a");
        let local = tmp.path().join("local.a");
        write_with_mtime(&cached, T_2020);

        assert_eq!(resolve_override(&cached, &local), OverrideDecision::UseCached);
    }
}
