//! The in-flight transaction record carried inside a token

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-input metadata the signer needs: the outpoint being spent plus the
/// scripts that lock it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningInput {
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    #[serde(rename = "redeemScript")]
    pub redeem_script: String,
}

/// Coarse lifecycle position derived from the `(complete, sent)` flags.
///
/// A freshly created record and a partially signed one share the same flags,
/// so both report [`Phase::AwaitingSignatures`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    AwaitingSignatures,
    FullySigned,
    Sent,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AwaitingSignatures => "awaiting signatures",
            Phase::FullySigned => "fully signed",
            Phase::Sent => "sent",
        };
        f.write_str(name)
    }
}

/// State of one multisig spend as it travels between signers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionState {
    /// Current (un/partially/fully) signed raw transaction
    pub raw_hex: String,
    /// Inputs in transaction order; fixed at creation
    pub signing_inputs: Vec<SigningInput>,
    /// Multisig address paying out
    pub from_address: String,
    /// Addresses whose keys may contribute signatures, in script order
    pub participant_addresses: Vec<String>,
    /// Previous txid of every selected input, in selection order
    pub used_input_ids: Vec<String>,
    /// Mean confirmations of the used inputs at creation, `-1` if unknown
    pub average_confirmations: i64,
    /// Minimum confirmations requested at creation
    pub min_confirmations: u32,
    /// Signature threshold satisfied
    pub complete: bool,
    /// Broadcast succeeded
    pub sent: bool,
    /// Network transaction id, set by a successful broadcast
    pub network_tx_id: Option<String>,
}

impl TransactionState {
    /// Create an unsigned record
    pub fn new(
        raw_hex: String,
        signing_inputs: Vec<SigningInput>,
        from_address: String,
        participant_addresses: Vec<String>,
        used_input_ids: Vec<String>,
        average_confirmations: i64,
        min_confirmations: u32,
    ) -> Self {
        Self {
            raw_hex,
            signing_inputs,
            from_address,
            participant_addresses,
            used_input_ids,
            average_confirmations,
            min_confirmations,
            complete: false,
            sent: false,
            network_tx_id: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match (self.complete, self.sent) {
            (_, true) => Phase::Sent,
            (true, false) => Phase::FullySigned,
            (false, false) => Phase::AwaitingSignatures,
        }
    }

    /// Number of used inputs (the `usedunspenttxidsamount` wire field)
    pub fn used_input_count(&self) -> usize {
        self.used_input_ids.len()
    }

    /// Adopt the result of a signing round
    pub fn apply_signatures(&mut self, raw_hex: String, complete: bool) {
        self.raw_hex = raw_hex;
        self.complete = complete;
    }

    /// Record a successful broadcast
    pub fn mark_sent(&mut self, network_tx_id: String) {
        self.sent = true;
        self.network_tx_id = Some(network_tx_id);
    }

    /// Check the structural invariants every transported record must hold
    pub fn validate(&self) -> Result<(), String> {
        if self.raw_hex.is_empty() || hex::decode(&self.raw_hex).is_err() {
            return Err("raw transaction is not valid hex".to_string());
        }
        if self.signing_inputs.is_empty() {
            return Err("no signing inputs".to_string());
        }
        if self.used_input_ids.len() != self.signing_inputs.len() {
            return Err(format!(
                "{} used input ids for {} signing inputs",
                self.used_input_ids.len(),
                self.signing_inputs.len()
            ));
        }
        if self.from_address.is_empty() {
            return Err("missing paying address".to_string());
        }
        if self.participant_addresses.is_empty() {
            return Err("no participant addresses".to_string());
        }
        if self.sent && !self.complete {
            return Err("sent transaction is not complete".to_string());
        }
        match (&self.network_tx_id, self.sent) {
            (Some(txid), true) if !txid.is_empty() => Ok(()),
            (None, false) => Ok(()),
            (_, true) => Err("sent transaction has no network id".to_string()),
            (Some(_), false) => Err("unsent transaction has a network id".to_string()),
        }
    }
}
