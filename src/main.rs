use portkeeper::{Result, cli, probe};
#[cfg(unix)]
use tokio::signal::{self, unix::SignalKind};

#[macro_use]
extern crate log;

#[tokio::main]
async fn main() -> Result<()> {
    probe::install_crypto_provider();
    #[cfg(unix)]
    handle_epipe();
    cli::run().await
}

#[cfg(unix)]
fn handle_epipe() {
    match signal::unix::signal(SignalKind::pipe()) {
        Ok(mut pipe_stream) => {
            tokio::spawn(async move {
                pipe_stream.recv().await;
                debug!("received SIGPIPE");
            });
        }
        Err(e) => {
            warn!("Could not set up SIGPIPE handler: {e}");
        }
    }
}
