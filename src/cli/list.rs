use crate::Result;
use crate::config::Config;
use crate::ui::table::{new_table, print_table};

/// List registered servers
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "ls",
    verbatim_doc_comment,
    long_about = "\
List registered servers

Shows every script key from portkeeper.toml (or the built-in dev roster)
with the port it binds and the command that launches it.

Example:
  portkeeper list

Output:
  Key       Port  Command
  dev:1111  1111  npm run dev:1111
  dev:6666  6666  npm run dev:6666"
)]
pub struct List {
    /// Hide the table header row
    #[clap(long)]
    hide_header: bool,
}

impl List {
    pub async fn run(&self) -> Result<()> {
        let config = Config::load()?;
        let mut table = new_table();
        if !self.hide_header && console::user_attended() {
            table.set_header(vec!["Key", "Port", "Command"]);
        }
        for server in config.registry.iter() {
            table.add_row(vec![
                server.key.clone(),
                server.port.to_string(),
                server.command.clone(),
            ]);
        }
        print_table(table)
    }
}
