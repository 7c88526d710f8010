use alloy_core::sol_types::{SolCall, SolValue};
use anyhow::Result;
use futures::future::BoxFuture;
use strum::{Display, EnumIter};

use super::ProductLine;
use crate::{
    artifacts::Deployment,
    contracts::IDepositable,
    step::{Step, StepAction, StepContext},
};

/// Curve metapools the Voyage line integrates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum CurvePool {
    Frax3Crv,
    Mim3Crv,
    Pwrd3Crv,
    Usdd3Crv,
}

impl CurvePool {
    pub fn step_name(self) -> String {
        format!("CurveIntegration{self}")
    }

    pub fn contract(self) -> &'static str {
        match self {
            CurvePool::Frax3Crv => "VoyageFRAX3CRVIntegration",
            CurvePool::Mim3Crv => "VoyageMIM3CRVIntegration",
            CurvePool::Pwrd3Crv => "VoyagePWRD3CRVIntegration",
            CurvePool::Usdd3Crv => "VoyageUSDD3CRVIntegration",
        }
    }

    /// Selection tag. The MIM pool keeps the tag existing scripts select it by.
    pub fn tag(self) -> String {
        match self {
            CurvePool::Mim3Crv => "deployCurveIntegrationMin3Crv".to_string(),
            pool => super::deploy_tag(&pool.step_name()),
        }
    }
}

/// Deploys an integration against the Voyage fee handler and enables deposits on it.
#[derive(Debug, Clone)]
pub struct CurveIntegrationStep {
    pool: CurvePool,
}

impl CurveIntegrationStep {
    pub fn step(pool: CurvePool) -> Step {
        Step::new(pool.step_name(), Self { pool })
            .tag(pool.tag())
            .depends_on(ProductLine::Voyage.fee_handler())
    }
}

impl StepAction for CurveIntegrationStep {
    fn deploy<'a>(&'a self, ctx: StepContext<'a>) -> BoxFuture<'a, Result<Deployment>> {
        Box::pin(async move {
            let fee_handler = ctx.address_of(&ProductLine::Voyage.fee_handler())?;
            let args = (ctx.params.oracle()?, fee_handler).abi_encode_params();
            ctx.deploy_contract(self.pool.contract(), args.into()).await
        })
    }

    fn configure<'a>(
        &'a self,
        ctx: StepContext<'a>,
        deployment: &'a Deployment,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.send(
                deployment.address,
                IDepositable::enableDepositingCall {}.abi_encode(),
                "enableDepositing",
            )
            .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_pool_naming() {
        let tags: Vec<_> = CurvePool::iter().map(CurvePool::tag).collect();
        assert_eq!(
            tags,
            vec![
                "deployCurveIntegrationFrax3Crv",
                "deployCurveIntegrationMin3Crv",
                "deployCurveIntegrationPwrd3Crv",
                "deployCurveIntegrationUsdd3Crv",
            ]
        );
        assert_eq!(CurvePool::Usdd3Crv.step_name(), "CurveIntegrationUsdd3Crv");
        assert_eq!(CurvePool::Frax3Crv.contract(), "VoyageFRAX3CRVIntegration");
    }
}
