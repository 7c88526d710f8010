//! shipyard-deploy - Ordered, resumable smart-contract deployments.
//!
//! This crate registers deployment steps with their prerequisites, resolves them into a
//! deterministic execution plan and runs that plan against an EVM network, recording one
//! durable artifact per completed step so interrupted runs pick up where they stopped.

mod artifacts;
pub use artifacts::{
    Artifact, ArtifactStore, CHAIN_ID_FILENAME, Deployment, FileArtifactStore, LOCK_FILENAME,
    MemoryArtifactStore,
};

mod builder;
pub use builder::DeployerBuilder;

pub mod catalog;
pub use catalog::default_registry;

mod chain;
pub use chain::{ChainClient, DeployedContract, RpcChainClient, TransactionReceipt};

mod config;
pub use config::{
    CONFIG_FILENAME, DeployParams, ENV_PREFIX, LOCALHOST_NETWORK, NetworkConfig, PrivateKey,
    ShipyardConfig,
};

pub mod contracts;
pub use contracts::{CompiledContract, ContractSources};

mod deployer;
pub use deployer::{Deployer, PlanEntry, PlanStatus, plan_table, status_table};

mod deployment_hash;
pub use deployment_hash::DeploymentInputs;

mod error;
pub use error::DeployError;

mod executor;
pub use executor::{Executor, RunReport, StepOutcome, StepReport};

mod fs;

mod resolver;
pub use resolver::{ExecutionPlan, resolve, resolve_targets, targeted_steps};

mod rpc;

mod step;
pub use step::{Step, StepAction, StepContext, StepRegistry};

mod transaction;
