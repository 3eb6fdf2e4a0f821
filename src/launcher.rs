//! Detached server launching.
//!
//! Launched servers get their own session (unix) or process group (windows)
//! so that stopping or restarting portkeeper never takes them down with it.
//! The child handle is dropped after the spawn check; tokio reaps it in the
//! background if it exits while we are still running.

use crate::config::Config;
use crate::env;
use crate::error::SupervisorError;
use crate::logger;
use crate::registry::ManagedServer;
use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::time;

const LAUNCH_MARKER: &str = "--- launching";
const LOG_TAIL_LINES: usize = 10;

/// A process we just started. Never stored; the OS stays the source of truth.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessHandle {
    pub pid: u32,
    pub port: u16,
    pub started_at: DateTime<Local>,
}

pub struct Launcher {
    config: Arc<Config>,
}

impl Launcher {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn log_path(&self, port: u16) -> PathBuf {
        self.config.port_log_file(port)
    }

    /// Starts the server registered under `key`, with its output appended to
    /// the per-port log. Fails with `UnknownScript` before touching the OS,
    /// and with `SpawnFailure` if the process is already gone after the
    /// spawn check.
    pub async fn launch(&self, key: &str, port: u16) -> Result<ProcessHandle, SupervisorError> {
        let server = self.config.registry.lookup(key)?;
        let argv = split_command(server)?;
        let log_path = self.log_path(port);
        let (stdout, stderr) =
            open_log(&log_path, server, port).map_err(|source| SupervisorError::SpawnError {
                script: key.to_string(),
                source,
            })?;

        let mut cmd = command_for(&argv);
        cmd.current_dir(&self.config.root)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .env("PORT", port.to_string());
        if let Some(ref path) = *env::ORIGINAL_PATH {
            cmd.env("PATH", path);
        }
        detach(&mut cmd);

        info!("launching {key} on port {port}: {argv:?}");
        let mut child = cmd.spawn().map_err(|source| SupervisorError::SpawnError {
            script: key.to_string(),
            source,
        })?;
        let started_at = Local::now();
        let Some(pid) = child.id() else {
            return Err(SupervisorError::SpawnFailure {
                script: key.to_string(),
                port,
                exit_code: None,
                detail: log_tail(&log_path),
            });
        };

        time::sleep(self.config.timings.spawn_check).await;
        match child.try_wait() {
            Ok(Some(status)) => {
                warn!("{key} (pid {pid}) exited immediately with {status}");
                return Err(SupervisorError::SpawnFailure {
                    script: key.to_string(),
                    port,
                    exit_code: status.code(),
                    detail: log_tail(&log_path),
                });
            }
            Ok(None) => {}
            Err(e) => warn!("could not check {key} (pid {pid}) after spawn: {e}"),
        }
        info!("started {key} on port {port} with pid {pid}");
        drop(child);

        Ok(ProcessHandle {
            pid,
            port,
            started_at,
        })
    }
}

fn split_command(server: &ManagedServer) -> Result<Vec<String>, SupervisorError> {
    let invalid = |msg: String| SupervisorError::SpawnError {
        script: server.key.clone(),
        source: io::Error::new(io::ErrorKind::InvalidInput, msg),
    };
    let argv = shell_words::split(&server.command)
        .map_err(|e| invalid(format!("cannot parse command '{}': {e}", server.command)))?;
    if argv.is_empty() {
        return Err(invalid("empty command".to_string()));
    }
    Ok(argv)
}

#[cfg(windows)]
fn command_for(argv: &[String]) -> tokio::process::Command {
    // npm and friends are .cmd shims that only cmd.exe resolves
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/C").args(argv);
    cmd
}

#[cfg(not(windows))]
fn command_for(argv: &[String]) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    cmd
}

fn open_log(path: &Path, server: &ManagedServer, port: u16) -> io::Result<(File, File)> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if logger::rotate_if_large(path, logger::MAX_LOG_BYTES)? {
        debug!("rotated {}", path.display());
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "{} {LAUNCH_MARKER} {} on port {port}: {} ---",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        server.key,
        server.command
    )?;
    let stderr = file.try_clone()?;
    Ok((file, stderr))
}

/// Last lines the most recent launch wrote to its log.
fn log_tail(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let lines = rev_lines::RevLines::new(file)
        .filter_map(Result::ok)
        .take_while(|line| !line.contains(LAUNCH_MARKER))
        .take(LOG_TAIL_LINES)
        .collect_vec();
    if lines.is_empty() {
        return None;
    }
    Some(lines.into_iter().rev().join("\n"))
}

/// Puts the child in its own session so it outlives us and our terminal.
#[cfg(unix)]
pub(crate) fn detach(cmd: &mut tokio::process::Command) {
    // SAFETY: setsid is async-signal-safe and only affects the child
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid()?;
            Ok(())
        });
    }
}

#[cfg(windows)]
pub(crate) fn detach(cmd: &mut tokio::process::Command) {
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

/// Same as [`detach`] for std commands (used when backgrounding ourselves).
#[cfg(unix)]
pub(crate) fn detach_std(cmd: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;
    // SAFETY: setsid is async-signal-safe and only affects the child
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid()?;
            Ok(())
        });
    }
}

#[cfg(windows)]
pub(crate) fn detach_std(cmd: &mut std::process::Command) {
    use std::os::windows::process::CommandExt;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
