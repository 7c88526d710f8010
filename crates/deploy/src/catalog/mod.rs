//! The deployment steps of the protocol.
//!
//! Two product lines, Voyage and Neural, share one deployment shape. Each line gets a fee
//! handler, a token, a vesting module and a token staking pool, all built from the same
//! templates. The Voyage fee handler additionally backs four Curve pool integrations, and a
//! shared operating system contract whitelists the staking pools.

mod curve;
mod operating_system;
mod product;

pub use curve::{CurveIntegrationStep, CurvePool};
pub use operating_system::{
    DEFAULT_MINIMUM_DISTRIBUTION, OPERATING_SYSTEM, OPERATING_SYSTEM_STAKING,
    OperatingSystemStakingStep,
};
pub use product::{FeeHandlerStep, ProductLine, StakingTerms, TokenStakingStep, TokenStep};

use alloy_core::primitives::Bytes;
use anyhow::Result;
use futures::future::BoxFuture;
use strum::IntoEnumIterator;

use crate::{
    artifacts::Deployment,
    error::DeployError,
    step::{Step, StepAction, StepContext, StepRegistry},
};

/// Deploys a contract that takes no constructor arguments and needs no follow-up calls.
#[derive(Debug, Clone)]
pub struct ContractStep {
    contract: String,
}

impl ContractStep {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
        }
    }
}

impl StepAction for ContractStep {
    fn deploy<'a>(&'a self, ctx: StepContext<'a>) -> BoxFuture<'a, Result<Deployment>> {
        Box::pin(async move { ctx.deploy_contract(&self.contract, Bytes::new()).await })
    }
}

/// Tag selecting a step, following the `deploy<Name>` convention.
pub(crate) fn deploy_tag(name: &str) -> String {
    format!("deploy{name}")
}

/// Every protocol step, in declaration order.
pub fn default_registry() -> Result<StepRegistry, DeployError> {
    let mut registry = StepRegistry::new();

    for line in ProductLine::iter() {
        registry.register(FeeHandlerStep::step(line))?;
    }
    for pool in CurvePool::iter() {
        registry.register(CurveIntegrationStep::step(pool))?;
    }
    for line in ProductLine::iter() {
        registry.register(TokenStep::step(line))?;
    }
    registry.register(operating_system::operating_system_step())?;
    for line in ProductLine::iter() {
        registry.register(
            Step::new(line.vesting(), ContractStep::new(line.vesting()))
                .tag(deploy_tag(&line.vesting()))
                .depends_on(line.token()),
        )?;
    }
    for line in ProductLine::iter() {
        registry.register(TokenStakingStep::step(line, StakingTerms::default()))?;
    }
    registry.register(OperatingSystemStakingStep::step(DEFAULT_MINIMUM_DISTRIBUTION))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{resolve, resolve_targets};

    #[test]
    fn test_default_registry_resolves_in_declaration_order() {
        let registry = default_registry().unwrap();
        let plan = resolve(&registry).unwrap();

        assert_eq!(
            *plan,
            vec![
                "NeuralFeeHandler",
                "VoyageFeeHandler",
                "CurveIntegrationFrax3Crv",
                "CurveIntegrationMim3Crv",
                "CurveIntegrationPwrd3Crv",
                "CurveIntegrationUsdd3Crv",
                "Neural",
                "Voyage",
                "OperatingSystem",
                "NeuralVesting",
                "VoyageVesting",
                "NeuralTokenStaking",
                "VoyageTokenStaking",
                "OperatingSystemStaking",
            ]
        );
    }

    #[test]
    fn test_tags_select_prerequisites() {
        let registry = default_registry().unwrap();

        let plan = resolve_targets(&registry, &["deployVoyageStaking"]).unwrap();
        assert_eq!(
            *plan,
            vec!["VoyageFeeHandler", "Voyage", "OperatingSystem", "VoyageTokenStaking"]
        );

        let plan = resolve_targets(&registry, &["deployCurveIntegrationMin3Crv"]).unwrap();
        assert_eq!(*plan, vec!["VoyageFeeHandler", "CurveIntegrationMim3Crv"]);

        let plan = resolve_targets(&registry, &["deployNeuralVesting"]).unwrap();
        assert_eq!(*plan, vec!["NeuralFeeHandler", "Neural", "NeuralVesting"]);
    }
}
