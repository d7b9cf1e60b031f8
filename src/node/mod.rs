//! Access to the wallet node that owns the keys and the coins
//!
//! The exchange logic only talks to a node through [`NodeBackend`]:
//! - [`RpcNode`] speaks JSON-RPC to a running wallet daemon
//! - [`MemoryNode`] runs against an in-process [`SimLedger`], used by the
//!   demo and the tests

pub mod memory;
pub mod rpc;

pub use memory::{MemoryNode, MultisigScript, ScriptError, SimLedger, SimTransaction};
pub use rpc::RpcNode;

use crate::core::{Amount, SigningInput};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a node backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rejected by node: {0}")]
    Rejected(String),
    #[error("Node unavailable: {0}")]
    Unavailable(String),
    #[error("Unexpected node reply: {0}")]
    Protocol(String),
}

/// An unspent output as listed by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: String,
    pub vout: u32,
    pub address: String,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    #[serde(rename = "redeemScript", skip_serializing_if = "Option::is_none")]
    pub redeem_script: Option<String>,
    pub amount: Amount,
    pub confirmations: u32,
}

impl UnspentOutput {
    /// Signing metadata for spending this output, if it is script-locked
    pub fn signing_input(&self) -> Option<SigningInput> {
        self.redeem_script.as_ref().map(|redeem_script| SigningInput {
            txid: self.txid.clone(),
            vout: self.vout,
            script_pub_key: self.script_pub_key.clone(),
            redeem_script: redeem_script.clone(),
        })
    }
}

/// A payment output of a transaction being built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: Amount,
}

/// Result of a signing round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hex: String,
    pub complete: bool,
}

/// A private key in the node's export format
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Operations the exchange needs from a wallet node.
///
/// Implementations block the calling thread.
pub trait NodeBackend: Send + Sync {
    /// All unspent outputs of the wallet with at least `min_conf` confirmations
    fn list_unspent(&self, min_conf: u32) -> Result<Vec<UnspentOutput>, NodeError>;

    /// Resolve an address or account name to a multisig address
    fn resolve_paying_address(&self, identifier: &str) -> Result<String, NodeError>;

    /// Participant addresses of a multisig address, in script order
    fn multisig_participants(&self, address: &str) -> Result<Vec<String>, NodeError>;

    /// Assemble an unsigned raw transaction
    fn build_raw_transaction(
        &self,
        inputs: &[SigningInput],
        outputs: &[TxOutput],
    ) -> Result<String, NodeError>;

    /// Add signatures made with `keys` to a raw transaction
    fn sign_raw_transaction(
        &self,
        hex: &str,
        inputs: &[SigningInput],
        keys: &[PrivateKey],
    ) -> Result<SignedTransaction, NodeError>;

    /// Submit a transaction to the network, returning its id
    fn broadcast_raw_transaction(&self, hex: &str) -> Result<String, NodeError>;

    fn has_private_key_for(&self, address: &str) -> Result<bool, NodeError>;

    fn private_key_for(&self, address: &str) -> Result<PrivateKey, NodeError>;

    /// Generate a fresh wallet address under `label`
    fn new_change_address(&self, label: &str) -> Result<String, NodeError>;

    fn confirmations(&self, txid: &str) -> Result<u32, NodeError>;
}

macro_rules! forward_node_backend {
    ($($ptr:ty),*) => {$(
        impl<T: NodeBackend + ?Sized> NodeBackend for $ptr {
            fn list_unspent(&self, min_conf: u32) -> Result<Vec<UnspentOutput>, NodeError> {
                (**self).list_unspent(min_conf)
            }

            fn resolve_paying_address(&self, identifier: &str) -> Result<String, NodeError> {
                (**self).resolve_paying_address(identifier)
            }

            fn multisig_participants(&self, address: &str) -> Result<Vec<String>, NodeError> {
                (**self).multisig_participants(address)
            }

            fn build_raw_transaction(
                &self,
                inputs: &[SigningInput],
                outputs: &[TxOutput],
            ) -> Result<String, NodeError> {
                (**self).build_raw_transaction(inputs, outputs)
            }

            fn sign_raw_transaction(
                &self,
                hex: &str,
                inputs: &[SigningInput],
                keys: &[PrivateKey],
            ) -> Result<SignedTransaction, NodeError> {
                (**self).sign_raw_transaction(hex, inputs, keys)
            }

            fn broadcast_raw_transaction(&self, hex: &str) -> Result<String, NodeError> {
                (**self).broadcast_raw_transaction(hex)
            }

            fn has_private_key_for(&self, address: &str) -> Result<bool, NodeError> {
                (**self).has_private_key_for(address)
            }

            fn private_key_for(&self, address: &str) -> Result<PrivateKey, NodeError> {
                (**self).private_key_for(address)
            }

            fn new_change_address(&self, label: &str) -> Result<String, NodeError> {
                (**self).new_change_address(label)
            }

            fn confirmations(&self, txid: &str) -> Result<u32, NodeError> {
                (**self).confirmations(txid)
            }
        }
    )*};
}

forward_node_backend!(Box<T>, Arc<T>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_debug_is_redacted() {
        let key = PrivateKey::new("L1secret");
        assert_eq!(format!("{:?}", key), "PrivateKey(<redacted>)");
        assert_eq!(key.expose(), "L1secret");
    }

    #[test]
    fn test_signing_input_requires_redeem_script() {
        let mut output = UnspentOutput {
            txid: "ab".repeat(32),
            vout: 2,
            address: "3Addr".to_string(),
            script_pub_key: "a914".to_string(),
            redeem_script: None,
            amount: Amount::from_sat(5),
            confirmations: 1,
        };
        assert!(output.signing_input().is_none());

        output.redeem_script = Some("5221".to_string());
        let input = output.signing_input().unwrap();
        assert_eq!(input.vout, 2);
        assert_eq!(input.redeem_script, "5221");
    }

    #[test]
    fn test_unspent_output_json_names() {
        let json = r#"{"txid":"aa","vout":0,"address":"3A","scriptPubKey":"a9",
            "redeemScript":"52","amount":10,"confirmations":4}"#;
        let output: UnspentOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.script_pub_key, "a9");
        assert_eq!(output.redeem_script.as_deref(), Some("52"));
        assert_eq!(output.amount, Amount::from_sat(10));
    }
}
