//! The watchdog keeps a fixed roster of servers alive.
//!
//! It brings every roster server up once, then on every interval clears all
//! roster ports and relaunches every server, whether or not it looked
//! healthy. Each pass is recorded as one JSON line in the watchdog log.

use crate::Result;
use crate::config::Config;
use crate::error::WatchdogError;
use crate::pidfile::{PidFile, WatchdogState};
use crate::registry::ManagedServer;
use crate::supervisor::Supervisor;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicBool};
use std::time::Duration;
#[cfg(unix)]
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tokio::{signal, time};

/// One bring-up or restart pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogCycle {
    /// 0 is the initial bring-up
    pub iteration: u64,
    pub started_at: DateTime<Local>,
    /// Whether each port's server launched
    pub per_port_status: BTreeMap<u16, bool>,
}

impl WatchdogCycle {
    pub fn healthy(&self) -> usize {
        self.per_port_status.values().filter(|ok| **ok).count()
    }
}

/// Stops a running [`Watchdog`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

pub struct Watchdog {
    supervisor: Arc<Supervisor>,
    roster: Vec<ManagedServer>,
    interval: Duration,
    pidfile: PidFile,
    cycle_log: PathBuf,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Watchdog {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_supervisor(Arc::new(Supervisor::new(config)))
    }

    pub fn with_supervisor(supervisor: Arc<Supervisor>) -> Self {
        let config = supervisor.config();
        let (shutdown, _) = watch::channel(false);
        Self {
            roster: config.roster(),
            interval: config.watchdog.interval,
            pidfile: PidFile::new(config.pid_file()),
            cycle_log: config.watchdog_log_file(),
            supervisor,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs until shut down: PID file, bring-up, then a restart cycle every
    /// interval. Clears every roster port and removes the PID file on the
    /// way out.
    pub async fn run(&self) -> Result<()> {
        if self.roster.is_empty() {
            return Err(WatchdogError::EmptyRoster.into());
        }
        let mut stop = self.shutdown.subscribe();
        self.acquire_pidfile()?;
        info!(
            "watchdog started with pid {}, {} server(s), restarting every {}",
            std::process::id(),
            self.roster.len(),
            humantime::format_duration(self.interval)
        );

        let mut iteration = 0;
        self.record(&self.launch_all(iteration).await);
        while !self.stopping() {
            tokio::select! {
                _ = time::sleep(self.interval) => {}
                _ = stop.changed() => break,
            }
            iteration += 1;
            let cycle = self.cycle(iteration).await;
            self.record(&cycle);
        }

        self.close().await
    }

    fn acquire_pidfile(&self) -> Result<()> {
        let own = std::process::id();
        match self.pidfile.state() {
            WatchdogState::Running(pid) if pid != own => {
                return Err(WatchdogError::AlreadyRunning { pid }.into());
            }
            WatchdogState::Crashed(pid) => {
                warn!("overwriting stale pid file for crashed watchdog (pid {pid})");
            }
            _ => {}
        }
        self.pidfile.write(own)
    }

    /// Clears every roster port, then relaunches every roster server.
    pub async fn cycle(&self, iteration: u64) -> WatchdogCycle {
        info!("restart cycle {iteration}");
        for server in &self.roster {
            if self.stopping() {
                break;
            }
            self.supervisor.kill_server(server.port).await;
        }
        self.launch_all(iteration).await
    }

    async fn launch_all(&self, iteration: u64) -> WatchdogCycle {
        let started_at = Local::now();
        let mut per_port_status = BTreeMap::new();
        for server in &self.roster {
            if self.stopping() {
                break;
            }
            let ok = match self.supervisor.start_server(server.port, &server.key).await {
                Ok(outcome) => {
                    info!("{}", outcome.message());
                    true
                }
                Err(err) => {
                    error!("failed to start {server}: {}", err.message());
                    false
                }
            };
            per_port_status.insert(server.port, ok);
        }
        WatchdogCycle {
            iteration,
            started_at,
            per_port_status,
        }
    }

    fn record(&self, cycle: &WatchdogCycle) {
        info!(
            "cycle {}: {}/{} server(s) up",
            cycle.iteration,
            cycle.healthy(),
            cycle.per_port_status.len()
        );
        let line = match serde_json::to_string(cycle) {
            Ok(line) => line,
            Err(e) => {
                warn!("failed to serialize cycle {}: {e}", cycle.iteration);
                return;
            }
        };
        let written = self
            .cycle_log
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.cycle_log)?;
                writeln!(file, "{line}")
            });
        if let Err(e) = written {
            warn!("failed to write {}: {e}", self.cycle_log.display());
        }
    }

    async fn close(&self) -> Result<()> {
        info!("watchdog stopping, clearing {} port(s)", self.roster.len());
        for server in &self.roster {
            let report = self.supervisor.kill_server(server.port).await;
            if !report.is_clean() {
                warn!("port {} still held by {:?}", server.port, report.survivors);
            }
        }
        self.pidfile.remove()?;
        info!("watchdog stopped");
        Ok(())
    }

    /// First signal starts a clean shutdown; a second one exits immediately.
    #[cfg(unix)]
    pub fn signals(&self) {
        let signals = [
            SignalKind::terminate(),
            SignalKind::interrupt(),
            SignalKind::quit(),
            SignalKind::hangup(),
        ];
        static RECEIVED_SIGNAL: AtomicBool = AtomicBool::new(false);
        for kind in signals {
            let mut stream = match signal::unix::signal(kind) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to register signal handler for {kind:?}: {e}");
                    continue;
                }
            };
            let handle = self.shutdown_handle();
            tokio::spawn(async move {
                loop {
                    stream.recv().await;
                    if RECEIVED_SIGNAL.swap(true, atomic::Ordering::SeqCst) {
                        exit(1);
                    }
                    info!("received signal, stopping");
                    handle.shutdown();
                }
            });
        }
    }

    #[cfg(windows)]
    pub fn signals(&self) {
        static RECEIVED_SIGNAL: AtomicBool = AtomicBool::new(false);
        let handle = self.shutdown_handle();
        tokio::spawn(async move {
            loop {
                if let Err(e) = signal::ctrl_c().await {
                    error!("Failed to wait for ctrl-c: {}", e);
                    return;
                }
                if RECEIVED_SIGNAL.swap(true, atomic::Ordering::SeqCst) {
                    exit(1);
                }
                info!("received ctrl-c, stopping");
                handle.shutdown();
            }
        });
    }
}

/// Reads the cycle records back out of the watchdog log.
pub fn read_cycles(config: &Config) -> Vec<WatchdogCycle> {
    let Ok(raw) = xx::file::read_to_string(config.watchdog_log_file()) else {
        return vec![];
    };
    raw.lines()
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
