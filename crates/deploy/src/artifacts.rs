//! Durable records of completed deployment steps.
//!
//! Every step leaves exactly one [`Artifact`] behind, keyed by the step name. The record is
//! written as pending as soon as the step's contract is deployed and marked complete once
//! its follow-up calls went through. Later steps read these records to wire contracts
//! together, and later runs use them to skip work that is already done.

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{error::DeployError, fs::FsHandler};

/// File pinning a network directory to a chain id.
pub const CHAIN_ID_FILENAME: &str = ".chainId";
/// Advisory lock held while a store is open.
pub const LOCK_FILENAME: &str = ".lock";

/// What a step's action reports after deploying its contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Compiled contract that was deployed.
    pub contract: String,
    /// Address of the deployed contract.
    pub address: Address,
    /// Hash of the creation transaction.
    pub transaction_hash: Option<B256>,
    /// Hash of the deployment inputs, see [`crate::DeploymentInputs`].
    pub inputs_hash: Option<String>,
}

impl Deployment {
    pub fn new(contract: impl Into<String>, address: Address) -> Self {
        Self {
            contract: contract.into(),
            address,
            transaction_hash: None,
            inputs_hash: None,
        }
    }
}

/// The durable record of a step's deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Step name; also the key in the store.
    pub name: String,
    /// Compiled contract name, used to find the ABI.
    pub contract: String,
    pub address: Address,
    /// Position of the step run that produced this artifact within the environment.
    pub ordinal: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_hash: Option<String>,
    /// Unix timestamp of when the artifact was recorded.
    pub deployed_at: u64,
    /// Set while the contract is deployed but its follow-up calls have not all succeeded.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl Artifact {
    /// Build the artifact for step `name` from the deployment its action produced.
    pub fn from_deployment(name: impl Into<String>, deployment: Deployment, ordinal: u64) -> Self {
        Self {
            name: name.into(),
            contract: deployment.contract,
            address: deployment.address,
            ordinal,
            transaction_hash: deployment.transaction_hash,
            inputs_hash: deployment.inputs_hash,
            deployed_at: chrono::Utc::now().timestamp().max(0) as u64,
            pending: false,
        }
    }

    /// Checkpoint for step `name`, recorded before its follow-up calls run.
    pub fn checkpoint(name: impl Into<String>, deployment: Deployment, ordinal: u64) -> Self {
        Self {
            pending: true,
            ..Self::from_deployment(name, deployment, ordinal)
        }
    }

    /// The deployment this artifact records.
    pub fn deployment(&self) -> Deployment {
        Deployment {
            contract: self.contract.clone(),
            address: self.address,
            transaction_hash: self.transaction_hash,
            inputs_hash: self.inputs_hash.clone(),
        }
    }

    /// Whether `other` records the same on-chain deployment.
    ///
    /// Bookkeeping fields (ordinal, timestamp) are ignored.
    pub fn same_deployment(&self, other: &Artifact) -> bool {
        self.name == other.name && self.contract == other.contract && self.address == other.address
    }
}

/// A mapping from step name to artifact.
pub trait ArtifactStore: Send + Sync {
    /// Look up the artifact recorded for `name`.
    fn get(&self, name: &str) -> Result<Option<Artifact>, DeployError>;

    /// All artifacts, ordered by ordinal.
    fn list(&self) -> Result<Vec<Artifact>, DeployError>;

    /// Record a new artifact.
    ///
    /// Storing the same deployment twice is a no-op. Storing a different address under an
    /// existing name fails with [`DeployError::ArtifactConflict`] and leaves the store
    /// untouched.
    fn put(&mut self, artifact: Artifact) -> Result<(), DeployError>;

    /// Record an artifact, replacing whatever was stored under its name.
    ///
    /// Used to complete a checkpoint and for forced redeployments.
    fn replace(&mut self, artifact: Artifact) -> Result<(), DeployError>;

    /// Ordinal to assign to the next recorded artifact.
    fn next_ordinal(&self) -> Result<u64, DeployError> {
        Ok(self
            .list()?
            .iter()
            .map(|a| a.ordinal)
            .max()
            .unwrap_or(0)
            + 1)
    }

    /// Address recorded for `name`, or an error naming the missing artifact.
    fn address_of(&self, name: &str) -> anyhow::Result<Address> {
        self.get(name)?
            .map(|a| a.address)
            .with_context(|| format!("No deployment recorded for `{name}`"))
    }
}

fn check_conflict(existing: &Artifact, attempted: &Artifact) -> Result<bool, DeployError> {
    if existing.same_deployment(attempted) {
        return Ok(true);
    }
    Err(DeployError::ArtifactConflict {
        name: attempted.name.clone(),
        existing: existing.address,
        attempted: attempted.address,
    })
}

/// Non-durable store, used for planning and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    artifacts: BTreeMap<String, Artifact>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn get(&self, name: &str) -> Result<Option<Artifact>, DeployError> {
        Ok(self.artifacts.get(name).cloned())
    }

    fn list(&self) -> Result<Vec<Artifact>, DeployError> {
        let mut all: Vec<_> = self.artifacts.values().cloned().collect();
        all.sort_by_key(|a| a.ordinal);
        Ok(all)
    }

    fn put(&mut self, artifact: Artifact) -> Result<(), DeployError> {
        if let Some(existing) = self.artifacts.get(&artifact.name) {
            check_conflict(existing, &artifact)?;
            return Ok(());
        }
        self.artifacts.insert(artifact.name.clone(), artifact);
        Ok(())
    }

    fn replace(&mut self, artifact: Artifact) -> Result<(), DeployError> {
        self.artifacts.insert(artifact.name.clone(), artifact);
        Ok(())
    }
}

/// Store persisting one JSON file per artifact under `<root>/<network>/`.
///
/// The directory is pinned to a chain id through a `.chainId` file and locked for the
/// lifetime of the store. Stores opened with [`FileArtifactStore::open_read_only`] take no
/// lock and refuse writes.
#[derive(Debug)]
pub struct FileArtifactStore {
    dir: PathBuf,
    network: String,
    /// `None` for read-only stores.
    lock: Option<File>,
}

impl FileArtifactStore {
    /// Open (creating if needed) the store for `network` under `root`.
    ///
    /// When `chain_id` is known it is checked against, or written to, the `.chainId` file.
    pub fn open(root: &Path, network: &str, chain_id: Option<u64>) -> Result<Self, DeployError> {
        let dir = root.join(network);
        FsHandler::create_dir(&dir)?;

        let lock_path = dir.join(LOCK_FILENAME);
        let lock = FsHandler::try_lock(&lock_path)?
            .ok_or(DeployError::StoreLocked { path: dir.clone() })?;

        let store = Self {
            dir,
            network: network.to_string(),
            lock: Some(lock),
        };

        if let Some(actual) = chain_id {
            match store.chain_id()? {
                Some(expected) if expected != actual => {
                    return Err(DeployError::ChainIdMismatch {
                        network: store.network.clone(),
                        expected,
                        actual,
                    });
                }
                Some(_) => {}
                None => {
                    FsHandler::write_atomic(
                        &store.dir.join(CHAIN_ID_FILENAME),
                        actual.to_string().as_bytes(),
                    )?;
                }
            }
        }

        tracing::debug!(
            network,
            path = %store.dir.display(),
            chain_id = ?chain_id,
            "Opened artifact store"
        );

        Ok(store)
    }

    /// Open the store for `network` under `root` for reading only.
    ///
    /// Neither creates the directory nor takes the lock, so it works while a deployment
    /// holds the store. A missing directory reads as an empty store.
    pub fn open_read_only(root: &Path, network: &str) -> Self {
        Self {
            dir: root.join(network),
            network: network.to_string(),
            lock: None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.lock.is_none()
    }

    /// Directory holding this network's artifacts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Chain id the directory is pinned to, if any.
    pub fn chain_id(&self) -> Result<Option<u64>, DeployError> {
        let path = self.dir.join(CHAIN_ID_FILENAME);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let chain_id = content
            .trim()
            .parse()
            .with_context(|| format!("Malformed chain id in {}", path.display()))?;
        Ok(Some(chain_id))
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn read(path: &Path) -> anyhow::Result<Artifact> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }

    fn write(&self, artifact: &Artifact) -> Result<(), DeployError> {
        if self.is_read_only() {
            return Err(anyhow::anyhow!(
                "Artifact store {} was opened read-only",
                self.dir.display()
            )
            .into());
        }
        let json = serde_json::to_string_pretty(artifact)
            .context("Failed to serialize artifact")?;
        let path = self.artifact_path(&artifact.name);
        FsHandler::write_atomic(&path, json.as_bytes())?;

        tracing::debug!(
            network = %self.network,
            name = %artifact.name,
            address = %artifact.address,
            path = %path.display(),
            "Artifact saved"
        );
        Ok(())
    }
}

impl ArtifactStore for FileArtifactStore {
    fn get(&self, name: &str) -> Result<Option<Artifact>, DeployError> {
        let path = self.artifact_path(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read(&path)?))
    }

    fn list(&self) -> Result<Vec<Artifact>, DeployError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut artifacts = Vec::new();
        for entry in entries {
            let path = entry.context("Failed to read directory entry")?.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if is_record {
                artifacts.push(Self::read(&path)?);
            }
        }
        artifacts.sort_by_key(|a| a.ordinal);
        Ok(artifacts)
    }

    fn put(&mut self, artifact: Artifact) -> Result<(), DeployError> {
        if let Some(existing) = self.get(&artifact.name)? {
            check_conflict(&existing, &artifact)?;
            return Ok(());
        }
        self.write(&artifact)
    }

    fn replace(&mut self, artifact: Artifact) -> Result<(), DeployError> {
        self.write(&artifact)
    }
}
