use crate::Result;
use crate::pidfile::PidFile;
use crate::procs::{PROCS, Signal, terminate_async};
use std::time::Duration;
use tokio::time;

mod logs;
mod run;
mod start;
mod status;
mod stop;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Start, stop, and inspect the restart watchdog
#[derive(Debug, clap::Args)]
#[clap(visible_alias = "wd", verbatim_doc_comment)]
pub struct Watchdog {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    Logs(logs::Logs),
    Run(run::Run),
    Start(start::Start),
    Status(status::Status),
    Stop(stop::Stop),
}

impl Watchdog {
    pub fn is_run(&self) -> bool {
        matches!(self.command, Commands::Run(_))
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Logs(logs) => logs.run().await,
            Commands::Run(run) => run.run().await,
            Commands::Start(start) => start.run().await,
            Commands::Status(status) => status.run().await,
            Commands::Stop(stop) => stop.run().await,
        }
    }
}

/// Asks the watchdog to shut down, escalating to a forceful kill when it
/// hasn't exited after `timeout`. Returns false if it had to be killed.
pub(crate) async fn stop_watchdog(pidfile: &PidFile, pid: u32, timeout: Duration) -> Result<bool> {
    info!("stopping watchdog with pid {pid}");
    terminate_async(pid, Signal::Graceful).await;

    let deadline = time::Instant::now() + timeout;
    while time::Instant::now() < deadline {
        if !PROCS.is_running(pid) {
            // it removes its own pid file; this covers a crash mid-shutdown
            pidfile.remove()?;
            return Ok(true);
        }
        time::sleep(Duration::from_millis(100)).await;
    }

    let err = crate::error::WatchdogError::StopTimeout {
        pid,
        seconds: timeout.as_secs(),
    };
    warn!("{err}, killing it");
    terminate_async(pid, Signal::Forceful).await;
    pidfile.remove()?;
    Ok(false)
}
