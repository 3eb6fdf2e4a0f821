use crate::Result;
use crate::config::Config;
use crate::error::SupervisorError;
use crate::supervisor::Supervisor;
use std::sync::Arc;

/// Stop whatever is listening on the given ports
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Stop whatever is listening on the given ports

Each listener gets a graceful termination first and a forceful one if it
is still there after the grace period. Ports with nothing on them are
left alone.

Example:
  portkeeper kill 6666
  portkeeper kill 1111 5555 6666"
)]
pub struct Kill {
    /// Ports to clear
    #[clap(required = true, value_parser = super::port_parser())]
    ports: Vec<u16>,
}

impl Kill {
    pub async fn run(&self) -> Result<()> {
        let supervisor = Supervisor::new(Arc::new(Config::load()?));
        let mut failed = None;
        for port in &self.ports {
            let report = supervisor.kill_server(*port).await;
            if report.pids.is_empty() {
                println!("{port}: nothing listening");
            } else if report.is_clean() {
                println!("{port}: stopped {:?}", report.pids);
            } else {
                println!("{port}: {:?} still running", report.survivors);
                failed.get_or_insert(SupervisorError::PartialKillFailure {
                    port: *port,
                    pids: report.survivors,
                });
            }
        }
        match failed {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
