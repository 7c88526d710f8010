//! Deployment execution engine.

use std::collections::HashSet;

use alloy_core::primitives::Address;
use comfy_table::{Table, presets::UTF8_FULL};

use crate::{
    artifacts::{Artifact, ArtifactStore},
    chain::ChainClient,
    config::DeployParams,
    error::DeployError,
    resolver::ExecutionPlan,
    step::{StepContext, StepRegistry},
};

/// How a step was handled in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StepOutcome {
    /// The action ran and its artifact was recorded.
    Deployed,
    /// The action ran over an existing artifact because redeploy was forced.
    Redeployed,
    /// A previous run deployed the contract but stopped in its follow-up calls; only the
    /// follow-up calls ran.
    Resumed,
    /// An artifact already existed; the action did not run.
    Skipped,
}

/// Per-step record of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
    pub address: Address,
}

/// Summary of an executor run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    /// Names of steps whose action ran.
    pub fn executed(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(|s| s.outcome != StepOutcome::Skipped)
            .map(|s| s.name.as_str())
    }

    /// Names of steps that were already deployed.
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Skipped)
            .map(|s| s.name.as_str())
    }

    /// Render the report as a table.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Step", "Outcome", "Address"]);
        for step in &self.steps {
            table.add_row(vec![
                step.name.clone(),
                step.outcome.to_string(),
                step.address.to_string(),
            ]);
        }
        table
    }
}

/// Runs execution plans one step at a time.
pub struct Executor<'a> {
    registry: &'a StepRegistry,
    params: &'a DeployParams,
    chain: &'a dyn ChainClient,
    redeploy: HashSet<String>,
}

impl<'a> Executor<'a> {
    pub fn new(
        registry: &'a StepRegistry,
        params: &'a DeployParams,
        chain: &'a dyn ChainClient,
    ) -> Self {
        Self {
            registry,
            params,
            chain,
            redeploy: HashSet::new(),
        }
    }

    /// Deploy the named steps again even when an artifact already exists.
    ///
    /// Every other step in the plan keeps its recorded artifact.
    pub fn redeploy<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redeploy = steps.into_iter().map(Into::into).collect();
        self
    }

    fn context<'s>(&'s self, step: &'s str, store: &'s dyn ArtifactStore) -> StepContext<'s> {
        StepContext {
            step,
            params: self.params,
            artifacts: store,
            chain: self.chain,
        }
    }

    /// Execute `plan` against `store`.
    ///
    /// Steps run strictly in plan order. A step's contract is recorded as a pending
    /// artifact as soon as it is deployed, and the artifact is marked complete once the
    /// follow-up calls succeeded, before the next step starts. On the first failure the run
    /// stops and everything recorded so far stays in the store, so running the same plan
    /// again resumes at the failed step without deploying its contract a second time.
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        store: &mut dyn ArtifactStore,
    ) -> Result<RunReport, DeployError> {
        let mut report = RunReport::default();

        for (position, name) in plan.iter().enumerate() {
            let step = self
                .registry
                .get(name)
                .ok_or_else(|| DeployError::UnknownTarget {
                    target: name.clone(),
                })?;
            let forced = self.redeploy.contains(name);
            let failed = |source: anyhow::Error| {
                tracing::error!(step = %name, error = %format!("{source:#}"), "Step failed");
                DeployError::StepExecution {
                    step: name.clone(),
                    source,
                }
            };

            let existing = store.get(name)?;
            let (mut artifact, outcome) = match existing {
                Some(existing) if !forced && !existing.pending => {
                    tracing::info!(
                        step = %name,
                        address = %existing.address,
                        "Already deployed, skipping"
                    );
                    report.steps.push(StepReport {
                        name: name.clone(),
                        outcome: StepOutcome::Skipped,
                        address: existing.address,
                    });
                    continue;
                }
                Some(checkpoint) if !forced => {
                    tracing::info!(
                        step = %name,
                        address = %checkpoint.address,
                        "Contract already deployed, resuming follow-up calls..."
                    );
                    (checkpoint, StepOutcome::Resumed)
                }
                existing => {
                    tracing::info!(
                        step = %name,
                        position = position + 1,
                        total = plan.len(),
                        "Running step..."
                    );
                    let deployment = step
                        .action()
                        .deploy(self.context(name, &*store))
                        .await
                        .map_err(failed)?;

                    let checkpoint =
                        Artifact::checkpoint(name.clone(), deployment, store.next_ordinal()?);
                    match existing {
                        Some(previous) => {
                            tracing::warn!(
                                step = %name,
                                previous = %previous.address,
                                address = %checkpoint.address,
                                inputs_changed = previous.inputs_hash != checkpoint.inputs_hash,
                                "Replacing existing deployment"
                            );
                            store.replace(checkpoint.clone())?;
                            (checkpoint, StepOutcome::Redeployed)
                        }
                        None => {
                            store.put(checkpoint.clone())?;
                            (checkpoint, StepOutcome::Deployed)
                        }
                    }
                }
            };

            let deployment = artifact.deployment();
            step.action()
                .configure(self.context(name, &*store), &deployment)
                .await
                .map_err(failed)?;

            artifact.pending = false;
            let address = artifact.address;
            store.replace(artifact)?;

            tracing::info!(step = %name, address = %address, "Step complete");
            report.steps.push(StepReport {
                name: name.clone(),
                outcome,
                address,
            });
        }

        Ok(report)
    }
}
