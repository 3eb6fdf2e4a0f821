use crate::Result;
use crate::config::Config;
use crate::supervisor::Supervisor;
use crate::ui::style::up_down;
use crate::ui::table::{new_table, print_table};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Probe ports for a running HTTP server
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "stat",
    verbatim_doc_comment,
    long_about = "\
Probe ports for a running HTTP server

Sends HEAD / to each port on localhost. Any HTTP answer counts as up.
With no ports, every registered port is probed.

Example:
  portkeeper status
  portkeeper status 6666 7777

Output:
  Port  Key       Status
  6666  dev:6666  up
  7777  dev:7777  down"
)]
pub struct Status {
    /// Ports to probe
    #[clap(value_parser = super::port_parser())]
    ports: Vec<u16>,
}

impl Status {
    pub async fn run(&self) -> Result<()> {
        let config = Arc::new(Config::load()?);
        let ports = if self.ports.is_empty() {
            config.registry.iter().map(|s| s.port).collect()
        } else {
            self.ports.clone()
        };
        let supervisor = Arc::new(Supervisor::new(config.clone()));
        let statuses = probe_all(&supervisor, &ports).await;

        let mut table = new_table();
        if console::user_attended() {
            table.set_header(vec!["Port", "Key", "Status"]);
        }
        for (port, up) in ports.iter().zip(statuses) {
            let key = config
                .registry
                .by_port(*port)
                .map(|s| s.key.clone())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![port.to_string(), key, up_down(up).to_string()]);
        }
        print_table(table)
    }
}

/// Probes every port concurrently; results follow the order of `ports`.
pub(crate) async fn probe_all(supervisor: &Arc<Supervisor>, ports: &[u16]) -> Vec<bool> {
    let mut set = JoinSet::new();
    for (idx, port) in ports.iter().copied().enumerate() {
        let supervisor = supervisor.clone();
        set.spawn(async move { (idx, supervisor.server_status(port).await) });
    }
    let mut results = vec![false; ports.len()];
    while let Some(res) = set.join_next().await {
        match res {
            Ok((idx, up)) => results[idx] = up,
            Err(e) => warn!("probe task failed: {e}"),
        }
    }
    results
}
