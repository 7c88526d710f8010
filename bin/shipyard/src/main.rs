//! shipyard is a CLI tool to deploy the protocol contracts in order, one resumable step at a time.

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use shipyard_deploy::{DeployerBuilder, plan_table, status_table};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    tracing::debug!(command = %cli.command, "Starting shipyard");

    let mut builder = DeployerBuilder::new();
    if let Some(config) = &cli.config {
        builder = builder.config_path(config);
    }

    match cli.command {
        Command::Deploy(args) => {
            let mut builder = builder
                .network(args.selection.network.network)
                .targets(args.selection.tags)
                .redeploy(args.redeploy);
            if let Some(confirmations) = args.confirmations {
                builder = builder.confirmations(confirmations);
            }

            builder.build()?.deploy().await?;
        }
        Command::Plan(selection) => {
            let deployer = builder
                .network(selection.network.network)
                .targets(selection.tags)
                .build()?;

            let entries = deployer.plan()?;
            println!("{}", plan_table(&entries));
        }
        Command::Status(network) => {
            let deployer = builder.network(network.network).build()?;

            let artifacts = deployer.status()?;
            if artifacts.is_empty() {
                println!("No deployments recorded for `{}`", deployer.network);
            } else {
                println!("{}", status_table(&artifacts));
            }
        }
    }

    Ok(())
}
