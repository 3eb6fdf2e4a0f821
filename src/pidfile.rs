use crate::Result;
use crate::error::FileError;
use crate::procs::PROCS;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// What the PID file says about the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    NotRunning,
    Running(u32),
    /// The file names a process that is gone
    Crashed(u32),
}

impl Display for WatchdogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchdogState::NotRunning => write!(f, "not running"),
            WatchdogState::Running(pid) => write!(f, "running (pid {pid})"),
            WatchdogState::Crashed(pid) => write!(f, "crashed (stale pid {pid})"),
        }
    }
}

/// The watchdog's own pid as decimal text.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Option<u32> {
        let raw = xx::file::read_to_string(&self.path).ok()?;
        match raw.trim().parse() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("ignoring unreadable pid file {}: {e}", self.path.display());
                None
            }
        }
    }

    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            xx::file::mkdirp(parent)?;
        }
        xx::file::write(&self.path, pid.to_string()).map_err(|e| FileError::WriteError {
            path: self.path.clone(),
            details: Some(e.to_string()),
        })?;
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            xx::file::remove_file(&self.path).map_err(|e| FileError::WriteError {
                path: self.path.clone(),
                details: Some(e.to_string()),
            })?;
        }
        Ok(())
    }

    pub fn state(&self) -> WatchdogState {
        match self.read() {
            None => WatchdogState::NotRunning,
            Some(pid) if PROCS.is_running(pid) => WatchdogState::Running(pid),
            Some(pid) => WatchdogState::Crashed(pid),
        }
    }
}
