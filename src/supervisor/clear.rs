use crate::error::SupervisorError;
use crate::ports;
use crate::procs::{PROCS, Signal, terminate_async};
use crate::supervisor::Supervisor;
use serde::Serialize;
use std::collections::BTreeSet;
use tokio::time;

/// Outcome of clearing one port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    /// Every distinct pid seen on the port during the procedure
    pub pids: Vec<u32>,
    /// Pids that no longer own the port afterwards
    pub killed: usize,
    /// Pids still listening after the forceful pass
    pub survivors: Vec<u32>,
}

impl ClearReport {
    pub fn is_clean(&self) -> bool {
        self.survivors.is_empty()
    }
}

impl Supervisor {
    /// Frees `port`: graceful termination of every listener, a grace period,
    /// then forceful termination of whatever is still there. Never fails;
    /// listeners that survive are reported in [`ClearReport::survivors`].
    ///
    /// Callers that mutate a port hold its lock around this.
    pub(crate) async fn clear_port(&self, port: u16) -> ClearReport {
        let pids = self.listeners(port).await;
        if pids.is_empty() {
            trace!("port {port} is free");
            return ClearReport::default();
        }
        let mut seen: BTreeSet<u32> = pids.iter().copied().collect();

        for pid in &pids {
            let name = PROCS.title(*pid).unwrap_or_else(|| "?".to_string());
            info!("port {port} held by {name} (pid {pid}), terminating");
            terminate_async(*pid, Signal::Graceful).await;
        }
        time::sleep(self.config.timings.grace).await;

        let remaining = self.listeners(port).await;
        seen.extend(&remaining);
        let survivors = if remaining.is_empty() {
            vec![]
        } else {
            info!("port {port} still held by {remaining:?}, killing");
            for pid in &remaining {
                terminate_async(*pid, Signal::Forceful).await;
            }
            time::sleep(self.config.timings.grace / 4).await;
            let survivors = self.listeners(port).await;
            seen.extend(&survivors);
            survivors
        };

        if !survivors.is_empty() {
            let err = SupervisorError::PartialKillFailure {
                port,
                pids: survivors.clone(),
            };
            warn!("{err}");
        }

        ClearReport {
            killed: seen.len() - survivors.len(),
            pids: seen.into_iter().collect(),
            survivors,
        }
    }

    /// Listeners on `port`, never including this process.
    async fn listeners(&self, port: u16) -> Vec<u32> {
        let own = std::process::id();
        let mut pids = ports::resolve(&self.resolver, port).await;
        if pids.contains(&own) {
            warn!("port {port} is held by portkeeper itself (pid {own}), leaving it alone");
            pids.retain(|pid| *pid != own);
        }
        pids
    }
}
