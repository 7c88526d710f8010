//! Deployment steps and the registry holding them.

use std::{collections::HashMap, fmt, sync::Arc};

use alloy_core::primitives::{Address, Bytes};
use anyhow::Result;
use futures::future::BoxFuture;

use crate::{
    artifacts::{ArtifactStore, Deployment},
    chain::{ChainClient, TransactionReceipt},
    config::DeployParams,
    deployment_hash::DeploymentInputs,
};

/// What a step can see while it runs.
pub struct StepContext<'a> {
    /// Name of the running step.
    pub step: &'a str,
    /// Constructor parameters from configuration.
    pub params: &'a DeployParams,
    /// Artifacts recorded so far, including those of every prerequisite.
    pub artifacts: &'a dyn ArtifactStore,
    /// Ledger access.
    pub chain: &'a dyn ChainClient,
}

impl StepContext<'_> {
    /// Address recorded by an earlier step.
    pub fn address_of(&self, name: &str) -> Result<Address> {
        self.artifacts.address_of(name)
    }

    /// Deploy `contract` and wait for confirmation.
    pub async fn deploy_contract(&self, contract: &str, constructor_args: Bytes) -> Result<Deployment> {
        let inputs = DeploymentInputs::new(contract, constructor_args.clone());
        let deployed = self.chain.deploy(contract, constructor_args).await?;

        tracing::info!(
            step = self.step,
            contract,
            address = %deployed.address,
            tx_hash = %deployed.receipt.transaction_hash,
            "Contract deployed"
        );

        Ok(Deployment {
            contract: contract.to_string(),
            address: deployed.address,
            transaction_hash: Some(deployed.receipt.transaction_hash),
            inputs_hash: Some(inputs.compute_hash()),
        })
    }

    /// Send a follow-up call and wait for confirmation.
    pub async fn send(&self, to: Address, calldata: Vec<u8>, label: &str) -> Result<TransactionReceipt> {
        let receipt = self.chain.send(to, calldata.into()).await?;
        tracing::info!(
            step = self.step,
            call = label,
            to = %to,
            tx_hash = %receipt.transaction_hash,
            "Call confirmed"
        );
        Ok(receipt)
    }
}

/// The work performed by a step.
///
/// A step runs in two phases. [`StepAction::deploy`] creates the contract; its result is
/// recorded before [`StepAction::configure`] sends the follow-up calls. When a follow-up
/// call fails, the next run reuses the recorded contract and only calls `configure` again,
/// so follow-up calls must be safe to repeat.
pub trait StepAction: Send + Sync {
    fn deploy<'a>(&'a self, ctx: StepContext<'a>) -> BoxFuture<'a, Result<Deployment>>;

    /// Calls made against the deployed contract. Does nothing by default.
    fn configure<'a>(
        &'a self,
        _ctx: StepContext<'a>,
        _deployment: &'a Deployment,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// A named deployment action with declared prerequisites.
#[derive(Clone)]
pub struct Step {
    name: String,
    tags: Vec<String>,
    prerequisites: Vec<String>,
    action: Arc<dyn StepAction>,
}

impl Step {
    pub fn new(name: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            prerequisites: Vec::new(),
            action: Arc::new(action),
        }
    }

    /// Add a tag the step can be selected by.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Require `step` to run before this one.
    pub fn depends_on(mut self, step: impl Into<String>) -> Self {
        let step = step.into();
        if !self.prerequisites.contains(&step) {
            self.prerequisites.push(step);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    pub fn action(&self) -> &dyn StepAction {
        self.action.as_ref()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("prerequisites", &self.prerequisites)
            .finish_non_exhaustive()
    }
}

/// Steps in declaration order.
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step. Names must be unique.
    pub fn register(&mut self, step: Step) -> Result<(), crate::DeployError> {
        if self.index.contains_key(step.name()) {
            return Err(crate::DeployError::DuplicateStep {
                name: step.name().to_string(),
            });
        }
        self.index.insert(step.name().to_string(), self.steps.len());
        self.steps.push(step);
        Ok(())
    }

    /// Chaining form of [`StepRegistry::register`].
    pub fn with(mut self, step: Step) -> Result<Self, crate::DeployError> {
        self.register(step)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Step> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    /// Declaration index of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Steps carrying `tag`, in declaration order.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Step> + 'a {
        self.steps
            .iter()
            .filter(move |s| s.tags.iter().any(|t| t == tag))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::DeployError;

    /// Action recording a fixed address without touching the chain.
    pub(crate) struct Fixed(pub Address);

    impl StepAction for Fixed {
        fn deploy<'a>(&'a self, ctx: StepContext<'a>) -> BoxFuture<'a, Result<Deployment>> {
            Box::pin(async move { Ok(Deployment::new(ctx.step, self.0)) })
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = StepRegistry::new();
        registry.register(Step::new("A", Fixed(Address::ZERO))).unwrap();

        let err = registry
            .register(Step::new("A", Fixed(Address::ZERO)))
            .unwrap_err();
        assert!(matches!(err, DeployError::DuplicateStep { name } if name == "A"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_by_name_and_tag() {
        let registry = StepRegistry::new()
            .with(Step::new("A", Fixed(Address::ZERO)).tag("core"))
            .unwrap()
            .with(Step::new("B", Fixed(Address::ZERO)).tag("extra"))
            .unwrap()
            .with(Step::new("C", Fixed(Address::ZERO)).tag("core").depends_on("A"))
            .unwrap();

        assert_eq!(registry.position("C"), Some(2));
        assert_eq!(registry.get("C").unwrap().prerequisites(), ["A"]);
        let core: Vec<_> = registry.tagged("core").map(Step::name).collect();
        assert_eq!(core, vec!["A", "C"]);
        assert!(registry.get("D").is_none());
    }

    #[test]
    fn test_depends_on_deduplicates() {
        let step = Step::new("B", Fixed(Address::ZERO))
            .depends_on("A")
            .depends_on("A");
        assert_eq!(step.prerequisites(), ["A"]);
    }
}
