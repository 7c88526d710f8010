//! Compiled contract artifacts and the call interfaces used by follow-up transactions.

use std::path::{Path, PathBuf};

use alloy_core::{primitives::Bytes, sol};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

sol! {
    /// Fee handlers route protocol fees to the staking fund and the treasury.
    interface IFeeHandler {
        function setVoyage(address voyage) external;
        function setNeural(address neural) external;
    }

    /// Pools and integrations that accept deposits once switched on.
    interface IDepositable {
        function enableDepositing() external;
    }

    /// Registry of contracts allowed to act on behalf of the operating system.
    interface IOperatingSystem {
        function updateWhitelist(address account, bool whitelisted) external;
    }

    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface ITokenStaking {
        function initialize() external;
    }

    interface IOperatingSystemStaking {
        function setMinimumDistribution(uint256 minimumDistribution) external;
    }
}

/// A compiled contract as emitted by the build toolchain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledContract {
    pub contract_name: String,
    #[serde(default)]
    pub abi: Value,
    pub bytecode: Bytes,
}

/// Lookup of compiled contracts under an artifacts directory.
///
/// Artifacts are expected in the Hardhat layout, `<dir>/**/<Contract>.json`; debug files
/// (`*.dbg.json`) are ignored.
#[derive(Debug, Clone)]
pub struct ContractSources {
    root: PathBuf,
}

impl ContractSources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the artifact file for `contract`.
    pub fn find(&self, contract: &str) -> Result<PathBuf> {
        let file_name = format!("{contract}.json");
        find_file(&self.root, &file_name)?.with_context(|| {
            format!(
                "No compiled artifact for `{}` under {}",
                contract,
                self.root.display()
            )
        })
    }

    /// Load the compiled artifact for `contract`.
    pub fn load(&self, contract: &str) -> Result<CompiledContract> {
        let path = self.find(contract)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let compiled: CompiledContract = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if compiled.bytecode.is_empty() {
            anyhow::bail!(
                "`{}` has no bytecode; abstract contracts and interfaces cannot be deployed",
                contract
            );
        }

        tracing::trace!(contract, path = %path.display(), "Loaded compiled contract");
        Ok(compiled)
    }
}

fn find_file(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path.file_name().is_some_and(|n| n == file_name) {
            return Ok(Some(path));
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_file(&subdir, file_name)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::{primitives::Address, sol_types::SolCall};
    use tempdir::TempDir;

    #[test]
    fn test_load_from_nested_layout() {
        let temp_dir = TempDir::new("shipyard-artifacts").expect("Failed to create temp dir");
        let dir = temp_dir.path().join("contracts/Voyage.sol");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Voyage.dbg.json"),
            r#"{"buildInfo": "../../build-info/abc.json"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("Voyage.json"),
            r#"{"contractName": "Voyage", "abi": [], "bytecode": "0x6080604052"}"#,
        )
        .unwrap();

        let sources = ContractSources::new(temp_dir.path());
        let compiled = sources.load("Voyage").expect("load Voyage");

        assert_eq!(compiled.contract_name, "Voyage");
        assert_eq!(compiled.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_missing_contract() {
        let temp_dir = TempDir::new("shipyard-artifacts").expect("Failed to create temp dir");
        let err = ContractSources::new(temp_dir.path())
            .load("Neural")
            .unwrap_err();
        assert!(err.to_string().contains("Neural"));
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let temp_dir = TempDir::new("shipyard-artifacts").expect("Failed to create temp dir");
        std::fs::write(
            temp_dir.path().join("IERC20.json"),
            r#"{"contractName": "IERC20", "abi": [], "bytecode": "0x"}"#,
        )
        .unwrap();

        assert!(ContractSources::new(temp_dir.path()).load("IERC20").is_err());
    }

    #[test]
    fn test_call_selectors() {
        let whitelist = IOperatingSystem::updateWhitelistCall {
            account: Address::ZERO,
            whitelisted: true,
        };
        assert_eq!(
            IOperatingSystem::updateWhitelistCall::SIGNATURE,
            "updateWhitelist(address,bool)"
        );
        assert_eq!(whitelist.abi_encode().len(), 4 + 32 * 2);

        assert_eq!(IDepositable::enableDepositingCall {}.abi_encode().len(), 4);
    }
}
