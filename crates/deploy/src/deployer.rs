use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};

use crate::{
    ChainClient, ContractSources, Executor, FileArtifactStore, RpcChainClient, RunReport,
    ShipyardConfig,
    artifacts::{Artifact, ArtifactStore},
    resolver::{ExecutionPlan, resolve_targets, targeted_steps},
    step::StepRegistry,
};

/// Whether a planned step already has an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PlanStatus {
    Deployed,
    /// Contract deployed, follow-up calls still to run.
    Incomplete,
    Pending,
}

/// One line of a plan preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub name: String,
    pub prerequisites: Vec<String>,
    pub status: PlanStatus,
    pub address: Option<Address>,
}

/// Runs the protocol deployment against one configured network.
///
/// Built through [`crate::DeployerBuilder`].
#[derive(Debug)]
pub struct Deployer {
    /// Resolved configuration, including per-run overrides.
    pub config: ShipyardConfig,
    /// Name of the target network in [`ShipyardConfig::networks`].
    pub network: String,
    /// Step names or tags to deploy; everything when empty.
    pub targets: Vec<String>,
    /// Redeploy the targeted steps even when they already have an artifact.
    ///
    /// Prerequisites pulled into the plan are never redeployed.
    pub redeploy: bool,
    registry: StepRegistry,
}

impl Deployer {
    pub(crate) fn new(
        config: ShipyardConfig,
        network: String,
        targets: Vec<String>,
        redeploy: bool,
        registry: StepRegistry,
    ) -> Self {
        Self {
            config,
            network,
            targets,
            redeploy,
            registry,
        }
    }

    /// Steps this deployer knows about.
    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// The execution plan for the selected targets.
    pub fn execution_plan(&self) -> Result<ExecutionPlan> {
        Ok(resolve_targets(&self.registry, &self.targets)?)
    }

    /// Connect to the configured network and run the deployment.
    pub async fn deploy(&self) -> Result<RunReport> {
        let network = self.config.network(&self.network)?;
        let sources = ContractSources::new(&self.config.artifacts_dir);

        tracing::info!(
            network = %self.network,
            rpc_url = %network.rpc_url,
            "Connecting to network..."
        );
        let chain = RpcChainClient::connect(network, sources)
            .await
            .with_context(|| format!("Failed to connect to network `{}`", self.network))?;

        self.deploy_with(&chain).await
    }

    /// Run the deployment through an already connected chain client.
    pub async fn deploy_with(&self, chain: &dyn ChainClient) -> Result<RunReport> {
        let chain_id = chain.chain_id().await.context("Failed to read chain id")?;
        let mut store =
            FileArtifactStore::open(&self.config.deployments_dir, &self.network, Some(chain_id))?;

        let plan = self.execution_plan()?;
        tracing::info!(
            network = %self.network,
            chain_id,
            steps = plan.len(),
            redeploy = self.redeploy,
            "Starting deployment: {}",
            plan
        );

        let redeploy = if self.redeploy {
            targeted_steps(&self.registry, &self.targets)?
        } else {
            Vec::new()
        };
        let report = Executor::new(&self.registry, &self.config.params, chain)
            .redeploy(redeploy)
            .run(&plan, &mut store)
            .await?;

        tracing::info!(
            deployed = report.executed().count(),
            skipped = report.skipped().count(),
            "✓ Deployment complete!\n{}",
            report.to_table()
        );

        Ok(report)
    }

    /// Preview the plan against the recorded artifacts without touching the chain.
    ///
    /// Reads the store without locking it, so it works while a deployment is running.
    pub fn plan(&self) -> Result<Vec<PlanEntry>> {
        let store = FileArtifactStore::open_read_only(&self.config.deployments_dir, &self.network);
        let plan = self.execution_plan()?;

        plan.iter()
            .map(|name| -> Result<PlanEntry> {
                let artifact = store.get(name)?;
                let status = match &artifact {
                    Some(a) if a.pending => PlanStatus::Incomplete,
                    Some(_) => PlanStatus::Deployed,
                    None => PlanStatus::Pending,
                };
                let address = artifact.map(|a| a.address);
                let prerequisites = self
                    .registry
                    .get(name)
                    .map(|s| s.prerequisites().to_vec())
                    .unwrap_or_default();
                Ok(PlanEntry {
                    name: name.clone(),
                    prerequisites,
                    status,
                    address,
                })
            })
            .collect()
    }

    /// Artifacts recorded for the network, in deployment order.
    pub fn status(&self) -> Result<Vec<Artifact>> {
        let store = FileArtifactStore::open_read_only(&self.config.deployments_dir, &self.network);
        Ok(store.list()?)
    }
}

/// Render a plan preview as a table.
pub fn plan_table(entries: &[PlanEntry]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Step", "Prerequisites", "Status", "Address"]);
    for (i, entry) in entries.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            entry.name.clone(),
            entry.prerequisites.join(", "),
            entry.status.to_string(),
            entry.address.map(|a| a.to_string()).unwrap_or_default(),
        ]);
    }
    table
}

/// Render recorded artifacts as a table.
pub fn status_table(artifacts: &[Artifact]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Name", "Contract", "Address", "Deployed at", "State"]);
    for artifact in artifacts {
        let deployed_at = chrono::DateTime::from_timestamp(artifact.deployed_at as i64, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        table.add_row(vec![
            artifact.ordinal.to_string(),
            artifact.name.clone(),
            artifact.contract.clone(),
            artifact.address.to_string(),
            deployed_at,
            if artifact.pending { "incomplete" } else { "complete" }.to_string(),
        ]);
    }
    table
}
