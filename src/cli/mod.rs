use crate::{Result, env, logger};
use clap::Parser;

mod kill;
mod list;
mod schema;
mod serve;
mod start;
mod status;
mod watchdog;

/// Keeps dev servers on their ports: an HTTP control API plus a restart watchdog
#[derive(Debug, clap::Parser)]
#[clap(name = "portkeeper", version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Kill(kill::Kill),
    List(list::List),
    Schema(schema::Schema),
    Serve(serve::Serve),
    Start(start::Start),
    Status(status::Status),
    Watchdog(watchdog::Watchdog),
}

impl Command {
    /// Long-running commands also log to a file.
    fn log_file(&self) -> Option<&'static std::path::Path> {
        match self {
            Command::Serve(_) => Some(env::SERVE_LOG_FILE.as_path()),
            Command::Watchdog(wd) if wd.is_run() => Some(env::WATCHDOG_LOG_FILE.as_path()),
            _ => None,
        }
    }
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    logger::init_with_file(args.command.log_file());
    match args.command {
        Command::Kill(kill) => kill.run().await,
        Command::List(list) => list.run().await,
        Command::Schema(schema) => schema.run().await,
        Command::Serve(serve) => serve.run().await,
        Command::Start(start) => start.run().await,
        Command::Status(status) => status.run().await,
        Command::Watchdog(wd) => wd.run().await,
    }
}

/// clap parser for ports, rejecting 0.
pub(crate) fn port_parser() -> clap::builder::RangedI64ValueParser<u16> {
    clap::value_parser!(u16).range(1..)
}
