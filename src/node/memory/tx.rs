//! Raw transaction format of the simulated ledger
//!
//! Serialized as hex-encoded JSON. Signatures commit to the version, the
//! spent outpoints and the outputs, so adding signatures never changes the
//! transaction id.

use super::script::MultisigScript;
use crate::core::{Amount, SigningInput};
use crate::crypto::{double_sha256, double_sha256_hex};
use crate::node::{NodeError, TxOutput};
use serde::{Deserialize, Serialize};

pub const TX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSignature {
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInput {
    pub txid: String,
    pub vout: u32,
    pub signatures: Vec<InputSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimOutput {
    pub address: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimTransaction {
    pub version: u32,
    pub inputs: Vec<SimInput>,
    pub outputs: Vec<SimOutput>,
}

impl SimTransaction {
    /// Unsigned transaction spending `inputs` into `outputs`
    pub fn new(inputs: &[SigningInput], outputs: &[TxOutput]) -> Self {
        Self {
            version: TX_VERSION,
            inputs: inputs
                .iter()
                .map(|i| SimInput {
                    txid: i.txid.clone(),
                    vout: i.vout,
                    signatures: Vec::new(),
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|o| SimOutput {
                    address: o.address.clone(),
                    amount: o.amount,
                })
                .collect(),
        }
    }

    pub fn from_hex(raw: &str) -> Result<Self, NodeError> {
        let bytes =
            hex::decode(raw).map_err(|_| NodeError::Rejected("TX decode failed".to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| NodeError::Rejected(format!("TX decode failed: {}", e)))
    }

    pub fn to_hex(&self) -> Result<String, NodeError> {
        let bytes = serde_json::to_vec(self).map_err(|e| NodeError::Protocol(e.to_string()))?;
        Ok(hex::encode(bytes))
    }

    /// Digest every signature commits to
    pub fn signing_hash(&self) -> Vec<u8> {
        let mut preimage = Vec::new();
        preimage.extend_from_slice(&self.version.to_le_bytes());
        preimage.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            preimage.extend_from_slice(input.txid.as_bytes());
            preimage.extend_from_slice(&input.vout.to_le_bytes());
        }
        preimage.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            preimage.extend_from_slice(&(output.address.len() as u32).to_le_bytes());
            preimage.extend_from_slice(output.address.as_bytes());
            preimage.extend_from_slice(&output.amount.to_sat().to_le_bytes());
        }
        double_sha256(&preimage)
    }

    pub fn txid(&self) -> String {
        double_sha256_hex(&self.signing_hash())
    }

    pub fn total_output(&self) -> Amount {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// Add a signature to an input, keeping signatures in script key order.
    ///
    /// Returns `false` if the key is not part of `script` or already signed.
    pub fn add_signature(
        &mut self,
        input_index: usize,
        signature: InputSignature,
        script: &MultisigScript,
    ) -> bool {
        if script.position_of(&signature.public_key).is_none() {
            return false;
        }
        let Some(input) = self.inputs.get_mut(input_index) else {
            return false;
        };
        if input
            .signatures
            .iter()
            .any(|s| s.public_key == signature.public_key)
        {
            return false;
        }

        input.signatures.push(signature);
        input
            .signatures
            .sort_by_key(|s| script.position_of(&s.public_key).unwrap_or(usize::MAX));
        true
    }
}
