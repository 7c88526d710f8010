use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(
    author,
    version,
    about = "Deploy the protocol contracts in dependency order, resuming where the last run stopped"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "SHIPYARD_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Shipyard.toml configuration file.
    ///
    /// If not provided, ./Shipyard.toml is used when it exists. Values can be overridden
    /// with SHIPYARD_* environment variables (e.g. SHIPYARD_PARAMS__ORACLE).
    #[arg(long, alias = "conf", global = true, env = "SHIPYARD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Command {
    /// Run the pending deployment steps.
    Deploy(DeployArgs),
    /// Show the execution plan and which steps are already deployed.
    Plan(Selection),
    /// List the artifacts recorded for a network.
    Status(NetworkArg),
}

#[derive(Debug, Clone, Args)]
pub struct NetworkArg {
    /// The network to deploy to, as named in the configuration.
    #[arg(short, long, env = "SHIPYARD_NETWORK", default_value = shipyard_deploy::LOCALHOST_NETWORK)]
    pub network: String,
}

#[derive(Debug, Clone, Args)]
pub struct Selection {
    #[clap(flatten)]
    pub network: NetworkArg,

    /// Step names or tags to deploy, comma separated. Prerequisites are always included.
    ///
    /// If not provided, every step is selected.
    #[arg(short, long, value_delimiter = ',', env = "SHIPYARD_TAGS")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[clap(flatten)]
    pub selection: Selection,

    /// Redeploy the selected steps even when an artifact already exists.
    ///
    /// Only steps matched by `--tags` (every step when no tag is given) are redeployed;
    /// prerequisites that already have an artifact are kept.
    #[arg(long, env = "SHIPYARD_REDEPLOY", default_value_t = false)]
    pub redeploy: bool,

    /// Number of confirmations to wait for, overriding the network configuration.
    #[arg(long, env = "SHIPYARD_CONFIRMATIONS")]
    pub confirmations: Option<u64>,
}
