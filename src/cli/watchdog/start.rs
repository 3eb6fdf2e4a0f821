use crate::cli::watchdog::{STOP_TIMEOUT, stop_watchdog};
use crate::config::Config;
use crate::error::WatchdogError;
use crate::launcher::detach_std;
use crate::pidfile::{PidFile, WatchdogState};
use crate::{Result, env};
use miette::IntoDiagnostic;
use std::time::Duration;
use tokio::time;

/// Starts the watchdog in the background
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Starts the watchdog in the background

Refuses to start a second watchdog unless --force is given, which stops
the running one first.

Example:
  portkeeper watchdog start
  portkeeper watchdog start --force"
)]
pub struct Start {
    /// stop an already running watchdog first
    #[clap(short, long)]
    force: bool,
}

impl Start {
    pub async fn run(&self) -> Result<()> {
        let config = Config::load()?;
        let pidfile = PidFile::new(config.pid_file());
        match pidfile.state() {
            WatchdogState::Running(pid) if self.force => {
                stop_watchdog(&pidfile, pid, STOP_TIMEOUT).await?;
            }
            WatchdogState::Running(pid) => return Err(WatchdogError::AlreadyRunning { pid }.into()),
            WatchdogState::Crashed(pid) => {
                warn!("removing stale pid file of crashed watchdog (pid {pid})");
                pidfile.remove()?;
            }
            WatchdogState::NotRunning => {}
        }

        start_in_background()?;

        for _ in 0..50 {
            if let WatchdogState::Running(pid) = pidfile.state() {
                println!("watchdog started with pid {pid}");
                return Ok(());
            }
            time::sleep(Duration::from_millis(100)).await;
        }
        Err(miette::miette!(
            "watchdog did not write {} within 5s, see {}",
            pidfile.path().display(),
            config.watchdog_log_file().display()
        ))
    }
}

fn start_in_background() -> Result<()> {
    debug!("starting watchdog in background");
    duct::cmd!(&*env::PORTKEEPER_BIN, "watchdog", "run")
        .env("PORTKEEPER_CONFIG", &*env::PORTKEEPER_CONFIG)
        .stdin_null()
        .stdout_null()
        .stderr_null()
        .before_spawn(|cmd| {
            detach_std(cmd);
            Ok(())
        })
        .start()
        .into_diagnostic()?;
    Ok(())
}
