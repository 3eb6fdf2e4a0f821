use crate::Result;
use crate::config::Config;
use crate::supervisor::Supervisor;
use std::sync::Arc;

/// Clear a port and launch a registered server on it
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Clear a port and launch a registered server on it

Whatever is listening on the port is stopped first (gracefully, then
forcefully). Runs the same procedure as POST /start-server without going
through the control API.

Example:
  portkeeper start 6666 dev:6666"
)]
pub struct Start {
    /// Port to clear and launch on
    #[clap(value_parser = super::port_parser())]
    port: u16,
    /// Registered script key, see `portkeeper list`
    script: String,
}

impl Start {
    pub async fn run(&self) -> Result<()> {
        let supervisor = Supervisor::new(Arc::new(Config::load()?));
        let outcome = supervisor.start_server(self.port, &self.script).await?;
        println!("{}", outcome.message());
        Ok(())
    }
}
