//! Locally signed legacy transactions, replay-protected per EIP-155.

use alloy_core::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    rlp::{Encodable, Header},
};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};

/// A transaction ready to be signed by a local key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// `None` creates a contract.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

impl LegacyTransaction {
    /// Recipient as an RLP string; empty for contract creation.
    fn recipient(&self) -> Bytes {
        self.to
            .map(|to| Bytes::copy_from_slice(to.as_slice()))
            .unwrap_or_default()
    }

    /// Hash the sender signs.
    pub fn signing_hash(&self) -> B256 {
        let recipient = self.recipient();
        keccak256(rlp_list(&[
            &self.nonce,
            &self.gas_price,
            &self.gas_limit,
            &recipient,
            &self.value,
            &self.data,
            &self.chain_id,
            &0u8,
            &0u8,
        ]))
    }

    /// Sign with `signer` and return the raw transaction for `eth_sendRawTransaction`.
    pub fn sign(&self, signer: &PrivateKeySigner) -> Result<Bytes> {
        let signature = signer
            .sign_hash_sync(&self.signing_hash())
            .context("Failed to sign transaction")?;

        let v = self.chain_id * 2 + 35 + u64::from(signature.v());
        let (r, s) = (signature.r(), signature.s());
        let recipient = self.recipient();
        Ok(rlp_list(&[
            &self.nonce,
            &self.gas_price,
            &self.gas_limit,
            &recipient,
            &self.value,
            &self.data,
            &v,
            &r,
            &s,
        ])
        .into())
    }
}

fn rlp_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let payload_length = fields.iter().map(|field| field.length()).sum();
    let mut out = Vec::with_capacity(payload_length + 3);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{address, b256, bytes};

    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Some(address!("0x3535353535353535353535353535353535353535")),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: Bytes::new(),
            chain_id: 1,
        }
    }

    #[test]
    fn test_signs_eip155_example() {
        let signer: PrivateKeySigner =
            "0x4646464646464646464646464646464646464646464646464646464646464646"
                .parse()
                .unwrap();
        assert_eq!(
            signer.address(),
            address!("0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F")
        );

        let tx = eip155_example();
        assert_eq!(
            tx.signing_hash(),
            b256!("0xdaf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53")
        );
        assert_eq!(
            tx.sign(&signer).unwrap(),
            bytes!(
                "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
            )
        );
    }

    #[test]
    fn test_contract_creation_has_empty_recipient() {
        let signer: PrivateKeySigner =
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
                .parse()
                .unwrap();
        let tx = LegacyTransaction {
            nonce: 0,
            gas_price: 1_000_000_000,
            gas_limit: 3_000_000,
            to: None,
            value: U256::ZERO,
            data: bytes!("0x6080604052"),
            chain_id: 31337,
        };

        assert_eq!(
            tx.signing_hash(),
            b256!("0x489e46311751bbab2458294bb9cd5f93fbc3777c6a7f97d03e95140f1657c868")
        );
        let raw = tx.sign(&signer).unwrap();
        // 31337 * 2 + 35 + 1 = 0xf4f5, right after the init code.
        assert_eq!(
            raw,
            bytes!(
                "0xf85780843b9aca00832dc6c0808085608060405282f4f5a0e27084e0d57b9cf37ee8ca58b62fe0c3861c498cc4cf0e6e50cf251f680a6d40a05374658a3f607dc81d47d50aff1f0b9428c7d7630d1e551275ff3b02908842b2"
            )
        );
    }
}
