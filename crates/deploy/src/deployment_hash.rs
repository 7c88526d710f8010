use alloy_core::primitives::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Inputs that determine what a contract deployment produces on chain.
///
/// Two deployments with the same inputs are interchangeable. The hash of these inputs is
/// stored with every artifact so that a forced redeploy can report whether anything
/// actually changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentInputs {
    /// Name of the compiled contract (not the artifact name).
    pub contract: String,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
}

impl DeploymentInputs {
    pub fn new(contract: impl Into<String>, constructor_args: Bytes) -> Self {
        Self {
            contract: contract.into(),
            constructor_args,
        }
    }

    /// Compute a SHA-256 hash of these inputs.
    ///
    /// The inputs are serialized to JSON before hashing; field order is fixed by the struct
    /// definition so the hash is deterministic.
    pub fn compute_hash(&self) -> String {
        let json = serde_json::to_string(self)
            .expect("DeploymentInputs serialization should never fail");

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{Address, address};
    use alloy_core::sol_types::SolValue;

    fn fee_handler_inputs() -> DeploymentInputs {
        let oracle: Address = address!("0x1111111111111111111111111111111111111111");
        let fund: Address = address!("0x2222222222222222222222222222222222222222");
        let treasury: Address = address!("0x3333333333333333333333333333333333333333");
        DeploymentInputs::new(
            "VoyageFeeHandler",
            (oracle, fund, treasury).abi_encode_params().into(),
        )
    }

    #[test]
    fn test_hash_determinism() {
        let inputs = fee_handler_inputs();

        let hash1 = inputs.compute_hash();
        let hash2 = inputs.clone().compute_hash();

        assert_eq!(hash1, hash2, "Hash should be deterministic");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn test_hash_changes_with_contract() {
        let inputs1 = fee_handler_inputs();
        let mut inputs2 = inputs1.clone();
        inputs2.contract = "NeuralFeeHandler".to_string();

        assert_ne!(
            inputs1.compute_hash(),
            inputs2.compute_hash(),
            "Hash should change when the contract changes"
        );
    }

    #[test]
    fn test_hash_changes_with_constructor_args() {
        let inputs1 = fee_handler_inputs();
        let mut inputs2 = inputs1.clone();
        inputs2.constructor_args = Bytes::new();

        assert_ne!(
            inputs1.compute_hash(),
            inputs2.compute_hash(),
            "Hash should change when constructor arguments change"
        );
    }
}
