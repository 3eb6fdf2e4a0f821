use crate::Result;
use crate::config::Config;
use crate::supervisor::Supervisor;
use crate::web;
use std::sync::Arc;

/// Run the HTTP control API in the foreground
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Run the HTTP control API in the foreground

Endpoints:
  POST /start-server          {\"port\": 6666, \"script\": \"dev:6666\"}
  GET  /server-status/{port}
  POST /kill-server/{port}
  GET  /servers
  GET  /health

Example:
  portkeeper serve
  portkeeper serve --port 4001 --bind 0.0.0.0"
)]
pub struct Serve {
    /// Address to bind (defaults to api.bind, then 127.0.0.1)
    #[clap(long)]
    bind: Option<String>,
    /// Port to listen on (defaults to api.port, then 3001)
    #[clap(short, long, env = "PORTKEEPER_API_PORT", value_parser = super::port_parser())]
    port: Option<u16>,
}

impl Serve {
    pub async fn run(&self) -> Result<()> {
        let config = Arc::new(Config::load()?);
        let bind = self.bind.clone().unwrap_or_else(|| config.api.bind.clone());
        let port = self.port.unwrap_or(config.api.port);
        if let Some(path) = &config.path {
            info!("using {}", path.display());
        }
        let supervisor = Arc::new(Supervisor::new(config));
        web::serve(&bind, port, supervisor).await
    }
}
