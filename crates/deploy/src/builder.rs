//! Builder module for creating a [`Deployer`].
//!
//! [`DeployerBuilder`] resolves the configuration (explicit value, file or the default
//! layering), applies command-line overrides and checks the selected network and targets
//! before anything touches the chain.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    Deployer, ShipyardConfig, StepRegistry, catalog::default_registry, config::LOCALHOST_NETWORK,
    resolver::resolve_targets,
};

/// Builder for creating a [`Deployer`].
///
/// # Example
///
/// ```no_run
/// use shipyard_deploy::DeployerBuilder;
///
/// # async fn example() -> anyhow::Result<()> {
/// let deployer = DeployerBuilder::new()
///     .network("sepolia")
///     .targets(["deployVoyageStaking"])
///     .confirmations(3)
///     .build()?;
/// deployer.deploy().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct DeployerBuilder {
    /// Explicit configuration, bypassing file and environment loading.
    config: Option<ShipyardConfig>,
    /// Configuration file to load (optional, `Shipyard.toml` if present).
    config_path: Option<PathBuf>,
    /// The target network (optional, `localhost` if not provided).
    network: Option<String>,
    /// Step names or tags to deploy.
    targets: Vec<String>,
    /// Whether to redeploy targeted steps that already have an artifact.
    redeploy: bool,
    /// Override of the network's confirmation threshold.
    confirmations: Option<u64>,
    /// Custom step registry (optional, the protocol catalog if not provided).
    registry: Option<StepRegistry>,
}

impl DeployerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` as is instead of loading one.
    pub fn config(mut self, config: ShipyardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the configuration from `path`.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set the target network.
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Restrict the run to the given step names or tags and their prerequisites.
    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether the targeted steps are deployed again over an existing artifact.
    pub fn redeploy(mut self, redeploy: bool) -> Self {
        self.redeploy = redeploy;
        self
    }

    /// Override the number of confirmations to wait for.
    pub fn confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = Some(confirmations);
        self
    }

    /// Deploy a custom set of steps instead of the protocol catalog.
    pub fn registry(mut self, registry: StepRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the [`Deployer`].
    ///
    /// Fails when the network is not configured or a target matches no step or tag.
    pub fn build(self) -> Result<Deployer> {
        let mut config = match self.config {
            Some(config) => config,
            None => ShipyardConfig::load(self.config_path.as_deref())?,
        };
        let network = self
            .network
            .unwrap_or_else(|| LOCALHOST_NETWORK.to_string());

        config.network(&network)?;
        if let Some(confirmations) = self.confirmations {
            if let Some(settings) = config.networks.get_mut(&network) {
                settings.confirmations = confirmations;
            }
        }

        let registry = match self.registry {
            Some(registry) => registry,
            None => default_registry().context("Failed to build the step catalog")?,
        };
        resolve_targets(&registry, &self.targets)?;

        tracing::info!(
            network,
            targets = ?self.targets,
            redeploy = self.redeploy,
            steps = registry.len(),
            "Building deployer..."
        );

        Ok(Deployer::new(
            config,
            network,
            self.targets,
            self.redeploy,
            registry,
        ))
    }
}
