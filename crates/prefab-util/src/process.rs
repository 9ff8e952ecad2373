//! Process enumeration and graceful-termination capability.
//!
//! The companion-executable updater needs to find running instances of a tool
//! by name, ask them to exit, and wait with a bound. That capability belongs
//! to the host platform, so it is modeled as a trait; [`SystemProcesses`]
//! implements it for Unix hosts on top of `pgrep` and `kill`.

use std::process::Command;
use std::time::{Duration, Instant};

use crate::error::UtilError;

/// Host-platform process control: list by name, request a graceful exit,
/// wait with a timeout.
pub trait ProcessControl {
    /// Process IDs of all running instances whose executable name matches
    /// `name` exactly. Zero matches is a normal result, not an error.
    ///
    /// # Errors
    /// Returns an error if the host process table cannot be queried.
    fn find_by_name(&self, name: &str) -> Result<Vec<u32>, UtilError>;

    /// Ask a process to exit gracefully (never force-kill). Requesting exit
    /// of a process that already exited is not an error.
    ///
    /// # Errors
    /// Returns an error if the request cannot be delivered to the host.
    fn request_exit(&self, pid: u32) -> Result<(), UtilError>;

    /// Wait up to `timeout` for a process to exit. Returns `true` if it
    /// exited (or was already gone), `false` if it is still alive.
    ///
    /// # Errors
    /// Returns an error if the host process table cannot be queried.
    fn wait_exit(&self, pid: u32, timeout: Duration) -> Result<bool, UtilError>;
}

/// [`ProcessControl`] implementation for Unix hosts.
#[derive(Debug, Default)]
pub struct SystemProcesses;

impl SystemProcesses {
    /// `true` if the process is still alive (signal 0 probe).
    fn is_alive(pid: u32) -> Result<bool, UtilError> {
        let status = Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .output()
            .map_err(|source| UtilError::CommandExec { source })?;
        Ok(status.status.success())
    }
}

impl ProcessControl for SystemProcesses {
    fn find_by_name(&self, name: &str) -> Result<Vec<u32>, UtilError> {
        let output = Command::new("pgrep")
            .arg("-x")
            .arg(name)
            .output()
            .map_err(|source| UtilError::CommandExec { source })?;

        // pgrep exits 1 when nothing matches.
        if !output.status.success() {
            return Ok(Vec::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .collect())
    }

    fn request_exit(&self, pid: u32) -> Result<(), UtilError> {
        // SIGTERM is the graceful-exit request; a failure here means the
        // process is already gone, which is the outcome we wanted.
        let _ = Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .output()
            .map_err(|source| UtilError::CommandExec { source })?;
        Ok(())
    }

    fn wait_exit(&self, pid: u32, timeout: Duration) -> Result<bool, UtilError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !Self::is_alive(pid)? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}
