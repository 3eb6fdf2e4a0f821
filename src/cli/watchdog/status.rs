use crate::Result;
use crate::cli::status::probe_all;
use crate::config::Config;
use crate::pidfile::{PidFile, WatchdogState};
use crate::supervisor::Supervisor;
use crate::watchdog::read_cycles;
use crate::ui::style::{ncyan, nred, nyellow, up_down};
use crate::ui::table::{new_table, print_table};
use std::sync::Arc;

/// Shows whether the watchdog runs and probes its roster
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Shows whether the watchdog runs and probes its roster

Example:
  portkeeper watchdog status

Output:
  watchdog: running (pid 4242), every 1m
  last cycle 12 at 2024-05-01 10:42:07: 2/2 launched
  Port  Key       Status
  1111  dev:1111  up
  6666  dev:6666  down"
)]
pub struct Status {}

impl Status {
    pub async fn run(&self) -> Result<()> {
        let config = Arc::new(Config::load()?);
        let state = PidFile::new(config.pid_file()).state();
        let styled = match state {
            WatchdogState::Running(_) => ncyan(state.to_string()),
            WatchdogState::NotRunning => nyellow(state.to_string()),
            WatchdogState::Crashed(_) => nred(state.to_string()),
        };
        println!(
            "watchdog: {styled}, every {}",
            humantime::format_duration(config.watchdog.interval)
        );
        if let Some(last) = read_cycles(&config).last() {
            println!(
                "last cycle {} at {}: {}/{} launched",
                last.iteration,
                last.started_at.format("%Y-%m-%d %H:%M:%S"),
                last.healthy(),
                last.per_port_status.len()
            );
        }

        let roster = config.roster();
        let ports = roster.iter().map(|s| s.port).collect::<Vec<_>>();
        let supervisor = Arc::new(Supervisor::new(config.clone()));
        let statuses = probe_all(&supervisor, &ports).await;

        let mut table = new_table();
        if console::user_attended() {
            table.set_header(vec!["Port", "Key", "Status"]);
        }
        for (server, up) in roster.iter().zip(statuses) {
            table.add_row(vec![
                server.port.to_string(),
                server.key.clone(),
                up_down(up).to_string(),
            ]);
        }
        print_table(table)
    }
}
