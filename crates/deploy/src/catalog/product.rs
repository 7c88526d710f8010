//! Steps shared by both product lines.

use alloy_core::{
    primitives::{Address, U256},
    sol_types::{SolCall, SolValue},
};
use anyhow::Result;
use futures::future::BoxFuture;
use strum::{Display, EnumIter};

use super::{OPERATING_SYSTEM, deploy_tag};
use crate::{
    artifacts::Deployment,
    contracts::{IDepositable, IERC20, IFeeHandler, IOperatingSystem, ITokenStaking},
    step::{Step, StepAction, StepContext},
};

/// A product line of the protocol. The token contract carries the line's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ProductLine {
    Neural,
    Voyage,
}

impl ProductLine {
    pub fn token(self) -> String {
        self.to_string()
    }

    pub fn fee_handler(self) -> String {
        format!("{self}FeeHandler")
    }

    pub fn vesting(self) -> String {
        format!("{self}Vesting")
    }

    pub fn staking(self) -> String {
        format!("{self}TokenStaking")
    }

    /// Calldata registering `token` with the line's fee handler.
    fn register_token_call(self, token: Address) -> Vec<u8> {
        match self {
            ProductLine::Neural => IFeeHandler::setNeuralCall { neural: token }.abi_encode(),
            ProductLine::Voyage => IFeeHandler::setVoyageCall { voyage: token }.abi_encode(),
        }
    }
}

/// Reward schedule of a token staking pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingTerms {
    /// Tokens funding the rewards, approved to the pool once deployed.
    pub total_rewards: U256,
    pub minimum_deposit: U256,
    /// Annual rates, in percent, for the four lock durations.
    pub rates: [u64; 4],
}

impl Default for StakingTerms {
    fn default() -> Self {
        Self {
            total_rewards: U256::from(20_000_000u64) * U256::from(10u64).pow(U256::from(18u64)),
            minimum_deposit: U256::ZERO,
            rates: [80, 120, 200, 365],
        }
    }
}

/// Deploys a line's fee handler from the oracle, staking fund and treasury parameters.
#[derive(Debug, Clone)]
pub struct FeeHandlerStep {
    line: ProductLine,
}

impl FeeHandlerStep {
    pub fn step(line: ProductLine) -> Step {
        let name = line.fee_handler();
        Step::new(name.clone(), Self { line }).tag(deploy_tag(&name))
    }
}

impl StepAction for FeeHandlerStep {
    fn deploy<'a>(&'a self, ctx: StepContext<'a>) -> BoxFuture<'a, Result<Deployment>> {
        Box::pin(async move {
            let args = (
                ctx.params.oracle()?,
                ctx.params.staking_fund()?,
                ctx.params.treasury()?,
            )
                .abi_encode_params();
            ctx.deploy_contract(&self.line.fee_handler(), args.into())
                .await
        })
    }
}

/// Deploys a line's token and registers it with the line's fee handler.
#[derive(Debug, Clone)]
pub struct TokenStep {
    line: ProductLine,
}

impl TokenStep {
    pub fn step(line: ProductLine) -> Step {
        let name = line.token();
        Step::new(name.clone(), Self { line })
            .tag(deploy_tag(&name))
            .depends_on(line.fee_handler())
    }
}

impl StepAction for TokenStep {
    fn deploy<'a>(&'a self, ctx: StepContext<'a>) -> BoxFuture<'a, Result<Deployment>> {
        Box::pin(async move {
            ctx.deploy_contract(&self.line.token(), Default::default())
                .await
        })
    }

    fn configure<'a>(
        &'a self,
        ctx: StepContext<'a>,
        deployment: &'a Deployment,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let fee_handler = ctx.address_of(&self.line.fee_handler())?;
            let label = format!("{}.set{}", self.line.fee_handler(), self.line);
            ctx.send(
                fee_handler,
                self.line.register_token_call(deployment.address),
                &label,
            )
            .await?;
            Ok(())
        })
    }
}

/// Deploys a line's staking pool, whitelists it, funds it and opens it for deposits.
#[derive(Debug, Clone)]
pub struct TokenStakingStep {
    line: ProductLine,
    terms: StakingTerms,
}

impl TokenStakingStep {
    pub fn step(line: ProductLine, terms: StakingTerms) -> Step {
        Step::new(line.staking(), Self { line, terms })
            .tag(deploy_tag(&format!("{line}Staking")))
            .depends_on(line.token())
            .depends_on(OPERATING_SYSTEM)
    }
}

impl StepAction for TokenStakingStep {
    fn deploy<'a>(&'a self, ctx: StepContext<'a>) -> BoxFuture<'a, Result<Deployment>> {
        Box::pin(async move {
            let [r1, r2, r3, r4] = self.terms.rates.map(U256::from);
            let args = (
                ctx.address_of(&self.line.token())?,
                ctx.address_of(OPERATING_SYSTEM)?,
                self.terms.total_rewards,
                self.terms.minimum_deposit,
                r1,
                r2,
                r3,
                r4,
            )
                .abi_encode_params();
            ctx.deploy_contract(&self.line.staking(), args.into())
                .await
        })
    }

    fn configure<'a>(
        &'a self,
        ctx: StepContext<'a>,
        deployment: &'a Deployment,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let token = ctx.address_of(&self.line.token())?;
            let operating_system = ctx.address_of(OPERATING_SYSTEM)?;
            let staking = deployment.address;

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
                token,
                IERC20::approveCall {
                    spender: staking,
                    amount: self.terms.total_rewards,
                }
                .abi_encode(),
                &format!("{}.approve", self.line),
            )
            .await?;
            ctx.send(
                staking,
                ITokenStaking::initializeCall {}.abi_encode(),
                "initialize",
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
