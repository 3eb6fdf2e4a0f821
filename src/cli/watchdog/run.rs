use crate::Result;
use crate::config::Config;
use crate::watchdog::Watchdog;
use std::sync::Arc;

/// Runs the watchdog in the foreground
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Runs the watchdog in the foreground

Brings every roster server up, then clears and relaunches all of them
every interval until it receives SIGTERM/SIGINT (ctrl-c on windows).
A second signal exits immediately.

Example:
  portkeeper watchdog run
  PORTKEEPER_INTERVAL_SECS=5 portkeeper watchdog run"
)]
pub struct Run {}

impl Run {
    pub async fn run(&self) -> Result<()> {
        let config = Arc::new(Config::load()?);
        let watchdog = Watchdog::new(config);
        watchdog.signals();
        watchdog.run().await
    }
}
