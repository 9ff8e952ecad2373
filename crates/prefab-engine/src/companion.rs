//! Companion-executable updater.
//!
//! The companion is a long-lived auxiliary tool distributed alongside the
//! library artifacts. Updating it is riskier than updating a library: an
//! instance may be running, and the binary on disk may be OS-locked until
//! that instance fully exits. One updater run happens per build invocation:
//!
//! marker current → done; otherwise download to temp → terminate running
//! instances (gracefully, bounded) → delete-then-move replace → prune all
//! old markers → write the new zero-byte marker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use prefab_util::fs;
use prefab_util::process::ProcessControl;

use crate::error::EngineError;
use crate::fetch::{ArtifactKind, FetchOptions, RemoteOrigin};

/// The destination can stay locked briefly after the owning process exits;
/// retry the replace a few times before giving up.
const REPLACE_ATTEMPTS: u32 = 4;
const REPLACE_BACKOFF: Duration = Duration::from_millis(250);

/// What to update and how to find a running instance of it.
#[derive(Debug, Clone)]
pub struct CompanionSpec {
    /// Directory the executable and its version marker live in.
    pub install_dir: PathBuf,
    /// Executable file name, e.g. `ScriptIde.exe`.
    pub executable: String,
    /// Process name to search for.
    pub process_name: String,
    /// Bound on the graceful-exit wait per instance.
    pub graceful_exit_timeout: Duration,
}

impl CompanionSpec {
    /// Spec with the default 5-second graceful-exit bound.
    pub fn new(install_dir: PathBuf, executable: String, process_name: String) -> Self {
        Self {
            install_dir,
            executable,
            process_name,
            graceful_exit_timeout: Duration::from_secs(5),
        }
    }

    /// Path of the zero-byte marker recording that `version` is installed.
    fn marker_path(&self, version: &str) -> PathBuf {
        self.install_dir.join(format!("{version}.version"))
    }
}

/// Outcome of an updater run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionOutcome {
    /// The marker for the current version exists; nothing was done.
    AlreadyCurrent,
    /// The executable was replaced and the marker rewritten.
    Updated,
}

/// Run the updater state machine once.
///
/// On success exactly one `.version` marker exists in the install directory,
/// named for the origin's version, no matter how many stale markers previous
/// (possibly crashed) runs left behind. On failure the temp download and any
/// partially written marker are removed; a previously installed executable
/// and its marker are left untouched.
///
/// # Errors
/// `Download`/`Integrity` if the executable cannot be fetched,
/// `CompanionRunning` if an instance outlives the graceful-exit timeout,
/// `CompanionReplace` if the binary cannot be swapped, `Io` otherwise.
pub fn update(
    spec: &CompanionSpec,
    origin: &RemoteOrigin,
    processes: &dyn ProcessControl,
    options: &FetchOptions,
) -> Result<CompanionOutcome, EngineError> {
    let marker = spec.marker_path(origin.version());
    if marker.exists() {
        return Ok(CompanionOutcome::AlreadyCurrent);
    }

    fs::ensure_dir(&spec.install_dir)?;

    let url = origin.url_for(ArtifactKind::Bin, None, &spec.executable);
    let tmp = spec.install_dir.join(format!(
        ".tmp-{}-{}",
        spec.executable,
        std::process::id()
    ));

    if let Err(e) = prefab_util::download::download(
        &url,
        &tmp,
        &spec.executable,
        origin.version(),
        options.timeout,
    ) {
        let _ = fs::remove_file_if_exists(&tmp);
        return Err(match e {
            prefab_util::error::UtilError::Download { message } => {
                EngineError::Download { url, message }
            }
            other => other.into(),
        });
    }

    if !fs::is_nonempty_file(&tmp) {
        let _ = fs::remove_file_if_exists(&tmp);
        return Err(EngineError::Integrity {
            path: tmp.display().to_string(),
            reason: format!("origin returned an empty body for {url}"),
        });
    }

    // Terminate, replace, mark. Any failure in this sequence cleans up the
    // temp download and the (possibly partially written) new marker, leaving
    // the previous installation intact for a retry.
    if let Err(e) = install(spec, processes, &tmp, &marker) {
        let _ = fs::remove_file_if_exists(&tmp);
        let _ = fs::remove_file_if_exists(&marker);
        return Err(e);
    }

    eprintln!(
        "    {} updated to version {}.",
        spec.executable,
        origin.version()
    );
    Ok(CompanionOutcome::Updated)
}

fn install(
    spec: &CompanionSpec,
    processes: &dyn ProcessControl,
    tmp: &Path,
    marker: &Path,
) -> Result<(), EngineError> {
    terminate_running_instances(spec, processes)?;

    let exe = spec.install_dir.join(&spec.executable);
    replace_binary(tmp, &exe, &spec.process_name)?;

    prune_markers(&spec.install_dir)?;
    write_marker(marker)?;
    Ok(())
}

/// Ask every running instance to exit and wait, bounded. Zero, one, or many
/// instances are handled uniformly. Exceeding the bound is fatal and
/// operator-actionable; instances are never force-killed, since killing an
/// interactive tool risks losing its unsaved state.
fn terminate_running_instances(
    spec: &CompanionSpec,
    processes: &dyn ProcessControl,
) -> Result<(), EngineError> {
    let pids = processes.find_by_name(&spec.process_name)?;
    if pids.is_empty() {
        return Ok(());
    }

    eprintln!(
        "    {} is running — asking it to exit so the executable can be updated...",
        spec.process_name
    );
    for pid in pids {
        processes.request_exit(pid)?;
        let exited = processes.wait_exit(pid, spec.graceful_exit_timeout)?;
        if !exited {
            return Err(EngineError::CompanionRunning {
                process_name: spec.process_name.clone(),
                timeout_secs: spec.graceful_exit_timeout.as_secs(),
            });
        }
    }
    Ok(())
}

/// Delete-then-move replacement, retried with backoff.
fn replace_binary(tmp: &Path, exe: &Path, process_name: &str) -> Result<(), EngineError> {
    let mut last_error: Option<std::io::Error> = None;
    for attempt in 0..REPLACE_ATTEMPTS {
        if attempt > 0 {
            std::thread::sleep(REPLACE_BACKOFF);
        }
        match try_replace(tmp, exe) {
            Ok(()) => return Ok(()),
            Err(e) => last_error = Some(e),
        }
    }

    Err(EngineError::CompanionReplace {
        path: exe.display().to_string(),
        process_name: process_name.to_owned(),
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_owned()),
    })
}

fn try_replace(tmp: &Path, exe: &Path) -> std::io::Result<()> {
    if exe.exists() {
        std::fs::remove_file(exe)?;
    }
    std::fs::rename(tmp, exe)
}

/// Remove every `.version` marker in the install directory. Runs before the
/// new marker is written, so the exactly-one-marker invariant holds even
/// when prior crashed runs left several behind.
fn prune_markers(dir: &Path) -> Result<(), EngineError> {
    let pattern = dir.join("*.version").display().to_string();
    let entries = glob::glob(&pattern).map_err(|e| EngineError::Io {
        path: pattern.clone(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
    })?;
    for entry in entries.flatten() {
        fs::remove_file_if_exists(&entry)?;
    }
    Ok(())
}

fn write_marker(marker: &Path) -> Result<(), EngineError> {
    std::fs::File::create(marker)
        .map(|_| ())
        .map_err(|source| EngineError::Io {
            path: marker.display().to_string(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::fs as stdfs;

    use prefab_util::error::UtilError;

    use super::*;
    use crate::testutil;

    /// In-memory [`ProcessControl`]: a fixed pid set that either exits on
    /// request or ignores it.
    struct FakeProcesses {
        pids: Vec<u32>,
        exits: bool,
        requested: RefCell<Vec<u32>>,
    }

    impl FakeProcesses {
        fn none() -> Self {
            Self {
                pids: Vec::new(),
                exits: true,
                requested: RefCell::new(Vec::new()),
            }
        }

        fn running(pids: Vec<u32>, exits: bool) -> Self {
            Self {
                pids,
                exits,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessControl for FakeProcesses {
        fn find_by_name(&self, _name: &str) -> Result<Vec<u32>, UtilError> {
            Ok(self.pids.clone())
        }

        fn request_exit(&self, pid: u32) -> Result<(), UtilError> {
            self.requested.borrow_mut().push(pid);
            Ok(())
        }

        fn wait_exit(&self, _pid: u32, _timeout: Duration) -> Result<bool, UtilError> {
            Ok(self.exits)
        }
    }

    fn spec(dir: &Path) -> CompanionSpec {
        CompanionSpec {
            install_dir: dir.to_path_buf(),
            executable: "ScriptIde.exe".to_owned(),
            process_name: "ScriptIde".to_owned(),
            graceful_exit_timeout: Duration::from_millis(50),
        }
    }

    fn markers_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = stdfs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.ends_with(".version"))
            .collect();
        names.sort();
        names
    }

    fn tmp_files_in(dir: &Path) -> Vec<String> {
        stdfs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.starts_with(".tmp-"))
            .collect()
    }

    #[test]
    fn current_marker_skips_update_entirely() {
        let tmp = tempfile::tempdir().unwrap();
        stdfs::write(tmp.path().join("2234.version"), b"").unwrap();

        // Unreachable origin: passing proves no network call happened.
        let origin = RemoteOrigin::new("http://127.0.0.1:1", "2234").unwrap();
        let processes = FakeProcesses::none();

        let outcome = update(
            &spec(tmp.path()),
            &origin,
            &processes,
            &FetchOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome, CompanionOutcome::AlreadyCurrent);
        assert!(processes.requested.borrow().is_empty());
    }

    fn run_update_with_stale_markers(stale: &[&str]) {
        let tmp = tempfile::tempdir().unwrap();
        stdfs::write(tmp.path().join("ScriptIde.exe"), b"old executable").unwrap();
        for marker in stale {
            stdfs::write(tmp.path().join(marker), b"").unwrap();
        }

        let server = testutil::spawn_origin(vec![(200, b"new executable".to_vec())]);
        let origin = RemoteOrigin::new(&server.base_url, "2234").unwrap();
        let processes = FakeProcesses::none();

        let outcome = update(
            &spec(tmp.path()),
            &origin,
            &processes,
            &FetchOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome, CompanionOutcome::Updated);
        assert_eq!(
            stdfs::read(tmp.path().join("ScriptIde.exe")).unwrap(),
            b"new executable"
        );
        // Exactly one marker, named for the installed version.
        assert_eq!(markers_in(tmp.path()), vec!["2234.version".to_owned()]);
        assert!(tmp_files_in(tmp.path()).is_empty());
    }

    #[test]
    fn update_with_no_stale_markers() {
        run_update_with_stale_markers(&[]);
    }

    #[test]
    fn update_with_one_stale_marker() {
        run_update_with_stale_markers(&["1956.version"]);
    }

    #[test]
    fn update_with_three_stale_markers() {
        run_update_with_stale_markers(&["1784.version", "1956.version", "2100.version"]);
    }

    #[test]
    fn fresh_install_without_existing_binary() {
        let tmp = tempfile::tempdir().unwrap();
        let install_dir = tmp.path().join("Tools").join("ScriptIde");

        let server = testutil::spawn_origin(vec![(200, b"brand new".to_vec())]);
        let origin = RemoteOrigin::new(&server.base_url, "2234").unwrap();
        let processes = FakeProcesses::none();

        let outcome = update(
            &spec(&install_dir),
            &origin,
            &processes,
            &FetchOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome, CompanionOutcome::Updated);
        assert_eq!(
            stdfs::read(install_dir.join("ScriptIde.exe")).unwrap(),
            b"brand new"
        );
        assert_eq!(markers_in(&install_dir), vec!["2234.version".to_owned()]);
    }

    #[test]
    fn running_instance_that_never_exits_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        stdfs::write(tmp.path().join("ScriptIde.exe"), b"old executable").unwrap();
        stdfs::write(tmp.path().join("1956.version"), b"").unwrap();

        let server = testutil::spawn_origin(vec![(200, b"new executable".to_vec())]);
        let origin = RemoteOrigin::new(&server.base_url, "2234").unwrap();
        let processes = FakeProcesses::running(vec![4242], false);

        let err = update(
            &spec(tmp.path()),
            &origin,
            &processes,
            &FetchOptions::default(),
        )
        .unwrap_err();

        assert!(
            matches!(err, EngineError::CompanionRunning { .. }),
            "got: {err}"
        );
        // Previously installed binary and marker are untouched.
        assert_eq!(
            stdfs::read(tmp.path().join("ScriptIde.exe")).unwrap(),
            b"old executable"
        );
        assert_eq!(markers_in(tmp.path()), vec!["1956.version".to_owned()]);
        assert!(tmp_files_in(tmp.path()).is_empty());
    }

    #[test]
    fn graceful_exit_requested_for_every_instance() {
        let tmp = tempfile::tempdir().unwrap();

        let server = testutil::spawn_origin(vec![(200, b"new executable".to_vec())]);
        let origin = RemoteOrigin::new(&server.base_url, "2234").unwrap();
        let processes = FakeProcesses::running(vec![11, 22, 33], true);

        update(
            &spec(tmp.path()),
            &origin,
            &processes,
            &FetchOptions::default(),
        )
        .unwrap();

        assert_eq!(*processes.requested.borrow(), vec![11, 22, 33]);
    }

    #[test]
    fn download_failure_leaves_no_trace() {
        let tmp = tempfile::tempdir().unwrap();
        stdfs::write(tmp.path().join("1956.version"), b"").unwrap();

        let origin = RemoteOrigin::new("http://127.0.0.1:1", "2234").unwrap();
        let processes = FakeProcesses::none();

        let err = update(
            &spec(tmp.path()),
            &origin,
            &processes,
            &FetchOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::Download { .. }), "got: {err}");
        assert!(tmp_files_in(tmp.path()).is_empty());
        // Old marker intact, new marker absent.
        assert_eq!(markers_in(tmp.path()), vec!["1956.version".to_owned()]);
    }
}
