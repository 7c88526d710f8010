//! Layered configuration: built-in defaults, then a TOML file, then `SHIPYARD_*` variables.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Shipyard.toml";
/// Prefix of environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "SHIPYARD_";

/// Name of the network defined out of the box.
pub const LOCALHOST_NETWORK: &str = "localhost";
const LOCALHOST_RPC_URL: &str = "http://127.0.0.1:8545";
const LOCALHOST_GAS: u64 = 6_012_388;
const DEFAULT_CONFIRMATIONS: u64 = 1;
const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 300;

/// Environment-specific addresses fed to constructors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployParams {
    /// Price oracle used by fee handlers, integrations and the operating system staking pool.
    pub oracle: Option<Address>,
    /// Receives the staking share of fees.
    pub staking_fund: Option<Address>,
    /// Receives the treasury share of fees.
    pub treasury: Option<Address>,
}

impl DeployParams {
    pub fn oracle(&self) -> Result<Address> {
        self.oracle.context("Missing `params.oracle` in configuration")
    }

    pub fn staking_fund(&self) -> Result<Address> {
        self.staking_fund
            .context("Missing `params.staking_fund` in configuration")
    }

    pub fn treasury(&self) -> Result<Address> {
        self.treasury
            .context("Missing `params.treasury` in configuration")
    }
}

/// Secret key of a locally signing account. Its value is never printed or saved.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(B256);

impl PrivateKey {
    pub fn new(key: B256) -> Self {
        Self(key)
    }

    pub(crate) fn secret(&self) -> &B256 {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Connection settings for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Node-managed account transactions are sent from. Defaults to the node's first account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Key to sign transactions with locally, for nodes that manage no accounts.
    ///
    /// Usually supplied as `SHIPYARD_NETWORKS__<NAME>__PRIVATE_KEY`.
    #[serde(default, skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// Number of blocks a transaction must be buried under before it counts as final.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Fixed gas limit for every transaction; estimated by the node when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    /// How long to wait for a receipt before giving up.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

fn default_receipt_timeout_secs() -> u64 {
    DEFAULT_RECEIPT_TIMEOUT_SECS
}

impl NetworkConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            from: None,
            private_key: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            gas: None,
            receipt_timeout_secs: DEFAULT_RECEIPT_TIMEOUT_SECS,
        }
    }

    fn localhost() -> Self {
        Self {
            gas: Some(LOCALHOST_GAS),
            ..Self::new(Url::parse(LOCALHOST_RPC_URL).expect("static URL is valid"))
        }
    }
}

/// Full configuration of a shipyard project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipyardConfig {
    /// Directory holding compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    /// Directory holding one sub-directory of deployment records per network.
    pub deployments_dir: PathBuf,
    /// Constructor parameters.
    #[serde(default)]
    pub params: DeployParams,
    /// Known networks by name.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for ShipyardConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            deployments_dir: PathBuf::from("deployments"),
            params: DeployParams::default(),
            networks: BTreeMap::from([(LOCALHOST_NETWORK.to_string(), NetworkConfig::localhost())]),
        }
    }
}

impl ShipyardConfig {
    /// Build the configuration figment for an optional file path.
    ///
    /// When `path` is `None`, `Shipyard.toml` in the working directory is used if present.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        Figment::from(Serialized::defaults(ShipyardConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
        }

        let config: Self = Self::figment(path)
            .extract()
            .context("Failed to load configuration")?;

        tracing::debug!(
            networks = ?config.networks.keys().collect::<Vec<_>>(),
            artifacts_dir = %config.artifacts_dir.display(),
            deployments_dir = %config.deployments_dir.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Settings for the network called `name`.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).with_context(|| {
            format!(
                "Unknown network `{}` (configured: {})",
                name,
                self.networks
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;
    use tempdir::TempDir;

    #[test]
    fn test_defaults_include_localhost() {
        let config = ShipyardConfig::default();
        let localhost = config.network(LOCALHOST_NETWORK).unwrap();

        assert_eq!(localhost.rpc_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(localhost.gas, Some(6_012_388));
        assert_eq!(localhost.confirmations, 1);
        assert!(config.params.oracle().is_err());
    }

    #[test]
    fn test_unknown_network_lists_known_ones() {
        let err = ShipyardConfig::default().network("mainnet").unwrap_err();
        assert!(err.to_string().contains("localhost"));
    }

    #[test]
    fn test_load_merges_file_over_defaults() {
        let temp_dir = TempDir::new("shipyard-config").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
deployments_dir = "out/deployments"

[params]
oracle = "0x1111111111111111111111111111111111111111"
treasury = "0x3333333333333333333333333333333333333333"

[networks.sepolia]
rpc_url = "https://ethereum-sepolia-rpc.publicnode.com"
confirmations = 3
"#,
        )
        .unwrap();

        let config = ShipyardConfig::load(Some(&path)).expect("load config");

        assert_eq!(config.deployments_dir, PathBuf::from("out/deployments"));
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(
            config.params.oracle().unwrap(),
            address!("0x1111111111111111111111111111111111111111")
        );
        assert!(config.params.staking_fund().is_err());
        assert!(config.networks.contains_key(LOCALHOST_NETWORK));

        let sepolia = config.network("sepolia").unwrap();
        assert_eq!(sepolia.confirmations, 3);
        assert_eq!(sepolia.receipt_timeout_secs, 300);
        assert_eq!(sepolia.gas, None);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new("shipyard-config").expect("Failed to create temp dir");
        let result = ShipyardConfig::load(Some(&temp_dir.path().join("nope.toml")));
        assert!(result.is_err(), "Loading missing file should return error");
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new("shipyard-config").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);

        let mut original = ShipyardConfig::default();
        original.params.staking_fund = Some(address!("0x2222222222222222222222222222222222222222"));
        original.save_to_file(&path).expect("save");

        let loaded = ShipyardConfig::load(Some(&path)).expect("load");
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_private_key_is_loaded_but_never_written() {
        let temp_dir = TempDir::new("shipyard-config").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);
        let key = "0x4646464646464646464646464646464646464646464646464646464646464646";
        std::fs::write(
            &path,
            format!(
                r#"
[networks.sepolia]
rpc_url = "https://ethereum-sepolia-rpc.publicnode.com"
private_key = "{key}"
"#
            ),
        )
        .unwrap();

        let config = ShipyardConfig::load(Some(&path)).expect("load config");
        let sepolia = config.network("sepolia").unwrap();
        assert_eq!(
            sepolia.private_key.as_ref().map(PrivateKey::secret),
            Some(&key.parse::<B256>().unwrap())
        );
        assert!(!format!("{sepolia:?}").contains("4646"));

        let saved = temp_dir.path().join("saved.toml");
        config.save_to_file(&saved).expect("save");
        assert!(!std::fs::read_to_string(&saved).unwrap().contains("private_key"));
    }
}
