use crate::error::SupervisorError;
use crate::launcher::ProcessHandle;
use crate::probe;
use crate::supervisor::{ClearReport, Supervisor};
use tokio::time;

/// A server that was (re)started on a port.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub key: String,
    pub handle: ProcessHandle,
    /// Processes removed from the port before launching
    pub killed_existing: usize,
    pub survivors: Vec<u32>,
}

impl StartOutcome {
    pub fn message(&self) -> String {
        let mut msg = format!(
            "started {} on port {} with pid {}",
            self.key, self.handle.port, self.handle.pid
        );
        if self.killed_existing > 0 {
            msg.push_str(&format!(
                " (stopped {} existing process{})",
                self.killed_existing,
                if self.killed_existing == 1 { "" } else { "es" }
            ));
        }
        msg
    }
}

impl Supervisor {
    /// Clears `port` and launches the server registered as `key` on it.
    ///
    /// An unknown key fails before anything on the port is touched. When
    /// `port` differs from the key's registered port, both are cleared. Calls
    /// for the same port run one after another; the later one replaces the
    /// earlier one's process.
    pub async fn start_server(&self, port: u16, key: &str) -> Result<StartOutcome, SupervisorError> {
        if port == 0 {
            return Err(SupervisorError::InvalidPort {
                raw: port.to_string(),
            });
        }
        let server = self.config.registry.lookup(key)?;
        // the command may bind its registered port regardless of $PORT
        let mut ports = vec![port];
        if server.port != port {
            debug!(
                "{server} requested on port {port}, also clearing port {}",
                server.port
            );
            ports.push(server.port);
            ports.sort_unstable();
        }

        // locks are always taken in ascending port order
        let locks = ports.iter().map(|p| self.port_lock(*p)).collect::<Vec<_>>();
        let mut guards = Vec::with_capacity(locks.len());
        for lock in &locks {
            guards.push(lock.lock().await);
        }

        let mut found = false;
        let mut killed_existing = 0;
        let mut survivors = vec![];
        for p in &ports {
            let report = self.clear_port(*p).await;
            found |= !report.pids.is_empty();
            killed_existing += report.killed;
            survivors.extend(report.survivors);
        }
        if found {
            time::sleep(self.config.timings.socket_release).await;
        }
        let handle = self.launcher.launch(key, port).await?;
        Ok(StartOutcome {
            key: key.to_string(),
            handle,
            killed_existing,
            survivors,
        })
    }

    /// Clears `port` without launching anything. Idempotent: an empty port
    /// reports nothing killed.
    pub async fn kill_server(&self, port: u16) -> ClearReport {
        let lock = self.port_lock(port);
        let _guard = lock.lock().await;
        let report = self.clear_port(port).await;
        info!(
            "kill on port {port}: {} killed, {} surviving",
            report.killed,
            report.survivors.len()
        );
        report
    }

    /// Whether something answers HTTP on `port`. Read-only, takes no lock.
    pub async fn server_status(&self, port: u16) -> bool {
        probe::probe(port, self.config.timings.probe_timeout).await
    }
}
