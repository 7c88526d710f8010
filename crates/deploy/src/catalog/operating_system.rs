use alloy_core::{
    primitives::U256,
    sol_types::{SolCall, SolValue},
};
use anyhow::Result;
use futures::future::BoxFuture;

use super::{ContractStep, deploy_tag};
use crate::{
    artifacts::Deployment,
    contracts::{IDepositable, IOperatingSystem, IOperatingSystemStaking},
    step::{Step, StepAction, StepContext},
};

pub const OPERATING_SYSTEM: &str = "OperatingSystem";
pub const OPERATING_SYSTEM_STAKING: &str = "OperatingSystemStaking";

/// Smallest reward distribution the operating system staking pool pays out.
pub const DEFAULT_MINIMUM_DISTRIBUTION: u64 = 10_000_000;

pub(crate) fn operating_system_step() -> Step {
    Step::new(OPERATING_SYSTEM, ContractStep::new(OPERATING_SYSTEM)).tag(deploy_tag(OPERATING_SYSTEM))
}

/// Deploys the operating system staking pool, whitelists it and opens it for deposits.
#[derive(Debug, Clone)]
pub struct OperatingSystemStakingStep {
    minimum_distribution: u64,
}

impl OperatingSystemStakingStep {
    pub fn step(minimum_distribution: u64) -> Step {
        Step::new(
            OPERATING_SYSTEM_STAKING,
            Self {
                minimum_distribution,
            },
        )
        .tag(deploy_tag(OPERATING_SYSTEM_STAKING))
        .depends_on(OPERATING_SYSTEM)
    }
}

impl StepAction for OperatingSystemStakingStep {
    fn deploy<'a>(&'a self, ctx: StepContext<'a>) -> BoxFuture<'a, Result<Deployment>> {
        Box::pin(async move {
            let args = (
                ctx.params.oracle()?,
                ctx.address_of(OPERATING_SYSTEM)?,
                ctx.params.staking_fund()?,
            )
                .abi_encode_params();
            ctx.deploy_contract(OPERATING_SYSTEM_STAKING, args.into())
                .await
        })
    }

    fn configure<'a>(
        &'a self,
        ctx: StepContext<'a>,
        deployment: &'a Deployment,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let operating_system = ctx.address_of(OPERATING_SYSTEM)?;
            let staking = deployment.address;

            ctx.send(
                staking,
                IOperatingSystemStaking::setMinimumDistributionCall {
                    minimumDistribution: U256::from(self.minimum_distribution),
                }
                .abi_encode(),
                "setMinimumDistribution",
            )
            .await?;
            ctx.send(
                operating_system,
                IOperatingSystem::updateWhitelistCall {
                    account: staking,
                    whitelisted: true,
                }
                .abi_encode(),
                "OperatingSystem.updateWhitelist",
            )
            .await?;
            ctx.send(
                staking,
                IDepositable::enableDepositingCall {}.abi_encode(),
                "enableDepositing",
            )
            .await?;

            Ok(())
        })
    }
}
