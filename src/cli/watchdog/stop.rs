use crate::Result;
use crate::cli::watchdog::{STOP_TIMEOUT, stop_watchdog};
use crate::config::Config;
use crate::pidfile::{PidFile, WatchdogState};

/// Stops the background watchdog
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Stops the background watchdog

Sends a graceful termination and waits up to 10s for the watchdog to clear
its ports and exit, then kills it.

Example:
  portkeeper watchdog stop"
)]
pub struct Stop {}

impl Stop {
    pub async fn run(&self) -> Result<()> {
        let config = Config::load()?;
        let pidfile = PidFile::new(config.pid_file());
        match pidfile.state() {
            WatchdogState::NotRunning => println!("watchdog is not running"),
            WatchdogState::Crashed(pid) => {
                pidfile.remove()?;
                println!("watchdog is not running (removed stale pid file for {pid})");
            }
            WatchdogState::Running(pid) => {
                if stop_watchdog(&pidfile, pid, STOP_TIMEOUT).await? {
                    println!("watchdog stopped");
                } else {
                    println!("watchdog killed; its servers may still be running");
                }
            }
        }
        Ok(())
    }
}
