use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Mutex;
use sysinfo::{ProcessStatus, ProcessesToUpdate};

pub struct Procs {
    system: Mutex<sysinfo::System>,
}

pub static PROCS: Lazy<Procs> = Lazy::new(Procs::new);

impl Default for Procs {
    fn default() -> Self {
        Self::new()
    }
}

impl Procs {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
        }
    }

    fn lock_system(&self) -> std::sync::MutexGuard<'_, sysinfo::System> {
        self.system.lock().unwrap_or_else(|poisoned| {
            warn!("System mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn title(&self, pid: u32) -> Option<String> {
        self.refresh_pids(&[pid]);
        self.lock_system()
            .process(sysinfo::Pid::from_u32(pid))
            .map(|p| p.name().to_string_lossy().to_string())
    }

    /// Live check against the OS. Zombies count as exited.
    pub fn is_running(&self, pid: u32) -> bool {
        self.refresh_pids(&[pid]);
        self.lock_system()
            .process(sysinfo::Pid::from_u32(pid))
            .is_some_and(|p| p.status() != ProcessStatus::Zombie)
    }

    pub fn refresh_pids(&self, pids: &[u32]) {
        let pids = pids
            .iter()
            .map(|p| sysinfo::Pid::from_u32(*p))
            .collect::<Vec<_>>();
        self.lock_system()
            .refresh_processes(ProcessesToUpdate::Some(&pids), true);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Signal {
    /// SIGTERM, or `taskkill /T` on windows
    Graceful,
    /// SIGKILL, or `taskkill /T /F` on windows
    Forceful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TerminationResult {
    pub pid: u32,
    pub signal: Signal,
    pub success: bool,
}

/// Sends `signal` to `pid`. A process that is already gone counts as
/// success; permission and other OS errors are logged and reported as
/// failure, never raised.
pub fn terminate(pid: u32, signal: Signal) -> TerminationResult {
    let success = send_signal(pid, signal);
    TerminationResult {
        pid,
        signal,
        success,
    }
}

pub async fn terminate_async(pid: u32, signal: Signal) -> TerminationResult {
    tokio::task::spawn_blocking(move || terminate(pid, signal))
        .await
        .unwrap_or_else(|e| {
            warn!("terminate task for pid {pid} failed: {e}");
            TerminationResult {
                pid,
                signal,
                success: false,
            }
        })
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!("pid {pid} out of range");
        return false;
    };
    let sig = match signal {
        Signal::Graceful => NixSignal::SIGTERM,
        Signal::Forceful => NixSignal::SIGKILL,
    };
    debug!("sending {sig} to pid {pid}");
    match signal::kill(Pid::from_raw(raw), sig) {
        Ok(()) => true,
        Err(Errno::ESRCH) => {
            trace!("pid {pid} already gone");
            true
        }
        Err(Errno::EPERM) => {
            warn!("permission denied sending {sig} to pid {pid}");
            false
        }
        Err(e) => {
            warn!("failed to send {sig} to pid {pid}: {e}");
            false
        }
    }
}

#[cfg(windows)]
fn send_signal(pid: u32, signal: Signal) -> bool {
    // taskkill exits 128 when the process does not exist
    const NOT_FOUND: i32 = 128;

    let pid_arg = pid.to_string();
    let mut args = vec!["/PID", pid_arg.as_str(), "/T"];
    if signal == Signal::Forceful {
        args.push("/F");
    }
    debug!("taskkill {}", args.join(" "));
    match duct::cmd("taskkill", args.clone())
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run()
    {
        Ok(output) if output.status.success() => true,
        Ok(output) if output.status.code() == Some(NOT_FOUND) => true,
        Ok(output) => {
            warn!("taskkill for pid {pid} exited with {}", output.status);
            false
        }
        Err(e) => {
            warn!("failed to run taskkill for pid {pid}: {e}");
            false
        }
    }
}
