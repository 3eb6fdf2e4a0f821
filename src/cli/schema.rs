use crate::Result;
use crate::config::PortkeeperToml;
use miette::IntoDiagnostic;
use schemars::schema_for;

/// Generate JSON Schema for portkeeper.toml configuration
#[derive(Debug, clap::Args)]
#[clap(hide = true)]
pub struct Schema;

impl Schema {
    pub async fn run(&self) -> Result<()> {
        let schema = schema_for!(PortkeeperToml);
        let json = serde_json::to_string_pretty(&schema).into_diagnostic()?;
        println!("{json}");
        Ok(())
    }
}
