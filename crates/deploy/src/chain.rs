//! Access to the ledger: contract creation and confirmed write calls.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::{
    config::NetworkConfig, contracts::ContractSources, rpc, transaction::LegacyTransaction,
};

/// Interval between receipt and block-number polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Receipt of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(deserialize_with = "rpc::deserialize_u64_from_hex")]
    pub block_number: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl TransactionReceipt {
    /// Whether the transaction executed without reverting.
    ///
    /// Pre-Byzantium receipts have no status and are treated as successful.
    pub fn succeeded(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| rpc::parse_quantity(s).map(|v| v == 1).unwrap_or(false))
            .unwrap_or(true)
    }
}

/// A contract created on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub address: Address,
    pub receipt: TransactionReceipt,
}

/// Write access to a ledger.
///
/// Every method resolves only once the transaction has reached the client's confirmation
/// threshold; a reverted transaction is an error.
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the node.
    fn chain_id(&self) -> BoxFuture<'_, Result<u64>>;

    /// Create `contract` with the given ABI-encoded constructor arguments.
    fn deploy<'a>(
        &'a self,
        contract: &'a str,
        constructor_args: Bytes,
    ) -> BoxFuture<'a, Result<DeployedContract>>;

    /// Send `calldata` to `to`.
    fn send(&self, to: Address, calldata: Bytes) -> BoxFuture<'_, Result<TransactionReceipt>>;
}

/// Key and chain id used to sign transactions before handing them to the node.
#[derive(Debug, Clone)]
struct LocalAccount {
    signer: PrivateKeySigner,
    chain_id: u64,
}

/// [`ChainClient`] speaking JSON-RPC.
///
/// Transactions are signed locally when the network configures a private key, and sent
/// from a node-managed account otherwise.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    client: reqwest::Client,
    rpc_url: Url,
    from: Address,
    local: Option<LocalAccount>,
    confirmations: u64,
    gas: Option<u64>,
    receipt_timeout: Duration,
    sources: ContractSources,
}

impl RpcChainClient {
    /// Connect to the network described by `network`.
    ///
    /// With a private key, the key's address sends every transaction. Otherwise the
    /// configured sender is used, or the node's first account when none is configured.
    pub async fn connect(network: &NetworkConfig, sources: ContractSources) -> Result<Self> {
        let client = rpc::create_client()?;

        let signer = network
            .private_key
            .as_ref()
            .map(|key| PrivateKeySigner::from_bytes(key.secret()))
            .transpose()
            .map_err(|err| anyhow::anyhow!("Invalid private key: {err}"))?;
        if let (Some(signer), Some(from)) = (&signer, network.from) {
            if from != signer.address() {
                anyhow::bail!(
                    "Configured sender {} does not match the private key's address {}",
                    from,
                    signer.address()
                );
            }
        }

        let local = match signer {
            Some(signer) => {
                let chain_id: String =
                    rpc::json_rpc_call(&client, network.rpc_url.as_str(), "eth_chainId", vec![])
                        .await
                        .context("Failed to read chain id")?;
                Some(LocalAccount {
                    signer,
                    chain_id: rpc::parse_quantity(&chain_id)?,
                })
            }
            None => None,
        };

        let from = match (&local, network.from) {
            (Some(local), _) => local.signer.address(),
            (None, Some(from)) => from,
            (None, None) => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&client, network.rpc_url.as_str(), "eth_accounts", vec![])
                        .await
                        .context("Failed to list node accounts")?;
                accounts
                    .first()
                    .copied()
                    .context("Node manages no accounts; set `from` for this network")?
            }
        };

        tracing::debug!(
            rpc_url = %network.rpc_url,
            from = %from,
            local_signing = local.is_some(),
            confirmations = network.confirmations,
            "Connected chain client"
        );

        Ok(Self {
            client,
            rpc_url: network.rpc_url.clone(),
            from,
            local,
            confirmations: network.confirmations.max(1),
            gas: network.gas,
            receipt_timeout: Duration::from_secs(network.receipt_timeout_secs),
            sources,
        })
    }

    /// Account transactions are sent from.
    pub fn sender(&self) -> Address {
        self.from
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        rpc::json_rpc_call(&self.client, self.rpc_url.as_str(), method, params).await
    }

    async fn block_number(&self) -> Result<u64> {
        let number: String = self.call("eth_blockNumber", vec![]).await?;
        rpc::parse_quantity(&number)
    }

    async fn send_transaction(&self, to: Option<Address>, data: Bytes) -> Result<B256> {
        if let Some(local) = &self.local {
            return self.send_signed_transaction(local, to, data).await;
        }

        let mut tx = json!({
            "from": self.from,
            "data": data,
        });
        if let Some(to) = to {
            tx["to"] = json!(to);
        }
        if let Some(gas) = self.gas {
            tx["gas"] = json!(format!("0x{:x}", gas));
        }

        self.call("eth_sendTransaction", vec![tx])
            .await
            .context("Failed to send transaction")
    }

    /// Sign the transaction with the local key and submit it raw.
    async fn send_signed_transaction(
        &self,
        local: &LocalAccount,
        to: Option<Address>,
        data: Bytes,
    ) -> Result<B256> {
        let nonce: String = self
            .call("eth_getTransactionCount", vec![json!(self.from), json!("pending")])
            .await
            .context("Failed to read account nonce")?;
        let gas_price: String = self
            .call("eth_gasPrice", vec![])
            .await
            .context("Failed to read gas price")?;
        let gas_limit = match self.gas {
            Some(gas) => gas,
            None => {
                let mut call = json!({ "from": self.from, "data": data });
                if let Some(to) = to {
                    call["to"] = json!(to);
                }
                let estimate: String = self
                    .call("eth_estimateGas", vec![call])
                    .await
                    .context("Failed to estimate gas")?;
                rpc::parse_quantity(&estimate)?
            }
        };

        let tx = LegacyTransaction {
            nonce: rpc::parse_quantity(&nonce)?,
            gas_price: u128::from(rpc::parse_quantity(&gas_price)?),
            gas_limit,
            to,
            value: U256::ZERO,
            data,
            chain_id: local.chain_id,
        };
        tracing::trace!(
            nonce = tx.nonce,
            gas_price = tx.gas_price,
            gas_limit,
            "Signing transaction"
        );
        let raw = tx.sign(&local.signer)?;

        self.call("eth_sendRawTransaction", vec![json!(raw)])
            .await
            .context("Failed to send signed transaction")
    }

    fn max_polls(&self) -> usize {
        (self.receipt_timeout.as_secs() / POLL_INTERVAL.as_secs()).max(1) as usize
    }

    /// Wait for `tx_hash` to be mined, succeed and reach the confirmation threshold.
    async fn wait_for_confirmation(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let receipt = (move || async move {
            let receipt: Option<TransactionReceipt> = self
                .call("eth_getTransactionReceipt", vec![json!(tx_hash)])
                .await?;
            receipt.context("Transaction not mined yet")
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(POLL_INTERVAL)
                .with_max_times(self.max_polls()),
        )
        .notify(|err, _| {
            tracing::trace!(tx_hash = %tx_hash, error = %err, "Waiting for receipt...");
        })
        .await
        .with_context(|| {
            format!(
                "Timeout waiting for receipt of {} after {}s",
                tx_hash,
                self.receipt_timeout.as_secs()
            )
        })?;

        if !receipt.succeeded() {
            anyhow::bail!(
                "Transaction {} reverted in block {}",
                tx_hash,
                receipt.block_number
            );
        }

        let target = receipt.block_number + self.confirmations - 1;
        (move || async move {
            let head = self.block_number().await?;
            if head >= target {
                Ok::<(), anyhow::Error>(())
            } else {
                anyhow::bail!("Block {} below confirmation target {}", head, target)
            }
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(POLL_INTERVAL)
                .with_max_times(self.max_polls()),
        )
        .await
        .with_context(|| {
            format!(
                "Timeout waiting for {} confirmations of {}",
                self.confirmations, tx_hash
            )
        })?;

        tracing::debug!(
            tx_hash = %tx_hash,
            block_number = receipt.block_number,
            confirmations = self.confirmations,
            "Transaction confirmed"
        );

        Ok(receipt)
    }
}

impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let id: String = self.call("eth_chainId", vec![]).await?;
            rpc::parse_quantity(&id)
        })
    }

    fn deploy<'a>(
        &'a self,
        contract: &'a str,
        constructor_args: Bytes,
    ) -> BoxFuture<'a, Result<DeployedContract>> {
        Box::pin(async move {
            let compiled = self.sources.load(contract)?;
            let mut init_code = compiled.bytecode.to_vec();
            init_code.extend_from_slice(&constructor_args);

            let tx_hash = self
                .send_transaction(None, init_code.into())
                .await
                .with_context(|| format!("Failed to deploy {}", contract))?;

            tracing::info!(contract, tx_hash = %tx_hash, "Deployment transaction sent");

            let receipt = self.wait_for_confirmation(tx_hash).await?;
            let address = receipt
                .contract_address
                .with_context(|| format!("Receipt of {} carries no contract address", tx_hash))?;

            Ok(DeployedContract { address, receipt })
        })
    }

    fn send(&self, to: Address, calldata: Bytes) -> BoxFuture<'_, Result<TransactionReceipt>> {
        Box::pin(async move {
            let tx_hash = self.send_transaction(Some(to), calldata).await?;
            tracing::debug!(to = %to, tx_hash = %tx_hash, "Transaction sent");
            self.wait_for_confirmation(tx_hash).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrivateKey;

    #[test]
    fn test_receipt_parsing() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x8f2c1b0a7e3d6c5b4a39281706f5e4d3c2b1a0f9e8d7c6b5a4938271605f4e3d",
            "blockNumber": "0x1b4",
            "status": "0x1",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "gasUsed": "0x5208"
        }))
        .expect("parse receipt");

        assert_eq!(receipt.block_number, 436);
        assert!(receipt.succeeded());
        assert!(receipt.contract_address.is_some());
    }

    #[test]
    fn test_reverted_receipt() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x8f2c1b0a7e3d6c5b4a39281706f5e4d3c2b1a0f9e8d7c6b5a4938271605f4e3d",
            "blockNumber": "0x2",
            "status": "0x0",
            "contractAddress": null
        }))
        .expect("parse receipt");

        assert!(!receipt.succeeded());
        assert_eq!(receipt.contract_address, None);
    }

    #[tokio::test]
    async fn test_private_key_must_match_configured_sender() {
        let mut network = NetworkConfig::new(Url::parse("http://127.0.0.1:1").unwrap());
        network.private_key = Some(PrivateKey::new(B256::repeat_byte(0x46)));
        network.from = Some(Address::repeat_byte(0x01));

        let err = RpcChainClient::connect(&network, ContractSources::new("artifacts"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F"));
    }

    #[tokio::test]
    async fn test_rejects_invalid_private_key() {
        let mut network = NetworkConfig::new(Url::parse("http://127.0.0.1:1").unwrap());
        network.private_key = Some(PrivateKey::new(B256::ZERO));

        let err = RpcChainClient::connect(&network, ContractSources::new("artifacts"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid private key"));
    }
}
