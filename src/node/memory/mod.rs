//! In-process node backend
//!
//! A [`MemoryNode`] is one party's wallet: it holds that party's private keys
//! and talks to a [`SimLedger`] that may be shared with other parties.

pub mod ledger;
pub mod script;
pub mod tx;

pub use ledger::SimLedger;
pub use script::{MultisigScript, ScriptError, MAX_SIGNERS, P2SH_VERSION};
pub use tx::{InputSignature, SimTransaction};

use crate::core::SigningInput;
use crate::crypto::{base58check_decode, KeyPair};
use crate::node::{NodeBackend, NodeError, PrivateKey, SignedTransaction, TxOutput, UnspentOutput};
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// A wallet node backed by a simulated ledger
#[derive(Debug)]
pub struct MemoryNode {
    ledger: SimLedger,
    keys: RwLock<HashMap<String, KeyPair>>,
    labels: RwLock<HashMap<String, String>>,
    offline: AtomicBool,
    list_unspent_calls: AtomicUsize,
    broadcast_calls: AtomicUsize,
}

impl MemoryNode {
    pub fn new(ledger: SimLedger) -> Self {
        Self {
            ledger,
            keys: RwLock::new(HashMap::new()),
            labels: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            list_unspent_calls: AtomicUsize::new(0),
            broadcast_calls: AtomicUsize::new(0),
        }
    }

    /// Node holding the given keys
    pub fn with_keys(ledger: SimLedger, keys: &[KeyPair]) -> Self {
        let node = Self::new(ledger);
        for key in keys {
            node.import_key(key);
        }
        node
    }

    pub fn import_key(&self, key: &KeyPair) {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.address(), key.clone());
    }

    pub fn ledger(&self) -> &SimLedger {
        &self.ledger
    }

    /// While offline every call fails with [`NodeError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn list_unspent_calls(&self) -> usize {
        self.list_unspent_calls.load(Ordering::SeqCst)
    }

    pub fn broadcast_calls(&self) -> usize {
        self.broadcast_calls.load(Ordering::SeqCst)
    }

    /// Label given to an address generated by this node
    pub fn label_of(&self, address: &str) -> Option<String> {
        self.labels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(address)
            .cloned()
    }

    fn ensure_online(&self) -> Result<(), NodeError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NodeError::Unavailable("node is offline".to_string()));
        }
        Ok(())
    }

    fn key_for(&self, address: &str) -> Option<KeyPair> {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(address)
            .cloned()
    }
}

impl NodeBackend for MemoryNode {
    fn list_unspent(&self, min_conf: u32) -> Result<Vec<UnspentOutput>, NodeError> {
        self.ensure_online()?;
        self.list_unspent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ledger.unspent(min_conf))
    }

    fn resolve_paying_address(&self, identifier: &str) -> Result<String, NodeError> {
        self.ensure_online()?;
        if base58check_decode(identifier).is_some() {
            return match self.ledger.multisig(identifier) {
                Some(_) => Ok(identifier.to_string()),
                None => Err(NodeError::NotFound(format!(
                    "{} is not a multisig address",
                    identifier
                ))),
            };
        }

        let multisig: Vec<String> = self
            .ledger
            .account_addresses(identifier)
            .into_iter()
            .filter(|a| self.ledger.multisig(a).is_some())
            .collect();
        match multisig.as_slice() {
            [address] => Ok(address.clone()),
            [] => Err(NodeError::NotFound(format!(
                "account {} has no multisig address",
                identifier
            ))),
            _ => Err(NodeError::NotFound(format!(
                "account {} has {} multisig addresses",
                identifier,
                multisig.len()
            ))),
        }
    }

    fn multisig_participants(&self, address: &str) -> Result<Vec<String>, NodeError> {
        self.ensure_online()?;
        self.ledger
            .multisig(address)
            .map(|script| script.participant_addresses())
            .ok_or_else(|| NodeError::NotFound(format!("{} is not a multisig address", address)))
    }

    fn build_raw_transaction(
        &self,
        inputs: &[SigningInput],
        outputs: &[TxOutput],
    ) -> Result<String, NodeError> {
        self.ensure_online()?;
        if inputs.is_empty() {
            return Err(NodeError::Rejected("no inputs".to_string()));
        }
        for output in outputs {
            if base58check_decode(&output.address).is_none() {
                return Err(NodeError::Rejected(format!(
                    "Invalid address: {}",
                    output.address
                )));
            }
            if !output.amount.is_positive() {
                return Err(NodeError::Rejected("Invalid amount".to_string()));
            }
        }
        SimTransaction::new(inputs, outputs).to_hex()
    }

    fn sign_raw_transaction(
        &self,
        hex: &str,
        inputs: &[SigningInput],
        keys: &[PrivateKey],
    ) -> Result<SignedTransaction, NodeError> {
        self.ensure_online()?;
        let mut tx = SimTransaction::from_hex(hex)?;
        let signers = keys
            .iter()
            .map(|k| KeyPair::from_private_key_hex(k.expose()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| NodeError::Rejected("Invalid private key".to_string()))?;
        let hash = tx.signing_hash();

        let mut complete = true;
        for index in 0..tx.inputs.len() {
            let (txid, vout) = (tx.inputs[index].txid.clone(), tx.inputs[index].vout);
            let Some(meta) = inputs.iter().find(|i| i.txid == txid && i.vout == vout) else {
                complete = false;
                continue;
            };
            let script = MultisigScript::from_hex(&meta.redeem_script)
                .map_err(|e| NodeError::Rejected(e.to_string()))?;

            for signer in &signers {
                if script.position_of(&signer.public_key_hex()).is_none() {
                    continue;
                }
                let signature = signer
                    .sign(&hash)
                    .map_err(|e| NodeError::Rejected(e.to_string()))?;
                tx.add_signature(
                    index,
                    InputSignature {
                        public_key: signer.public_key_hex(),
                        signature: hex::encode(signature),
                    },
                    &script,
                );
            }

            if tx.inputs[index].signatures.len() < script.threshold() as usize {
                complete = false;
            }
        }

        debug!(
            "Signed {} inputs with {} keys (complete: {})",
            tx.inputs.len(),
            signers.len(),
            complete
        );
        Ok(SignedTransaction {
            hex: tx.to_hex()?,
            complete,
        })
    }

    fn broadcast_raw_transaction(&self, hex: &str) -> Result<String, NodeError> {
        self.ensure_online()?;
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        let tx = SimTransaction::from_hex(hex)?;
        self.ledger.submit(&tx)
    }

    fn has_private_key_for(&self, address: &str) -> Result<bool, NodeError> {
        self.ensure_online()?;
        Ok(self.key_for(address).is_some())
    }

    fn private_key_for(&self, address: &str) -> Result<PrivateKey, NodeError> {
        self.ensure_online()?;
        self.key_for(address)
            .map(|k| PrivateKey::new(k.private_key_hex()))
            .ok_or_else(|| {
                NodeError::NotFound(format!("Private key for address {} is not known", address))
            })
    }

    fn new_change_address(&self, label: &str) -> Result<String, NodeError> {
        self.ensure_online()?;
        let key = KeyPair::generate();
        let address = key.address();
        self.import_key(&key);
        self.labels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address.clone(), label.to_string());
        self.ledger.label_address(label, &address);
        Ok(address)
    }

    fn confirmations(&self, txid: &str) -> Result<u32, NodeError> {
        self.ensure_online()?;
        self.ledger
            .confirmations(txid)
            .ok_or_else(|| NodeError::NotFound("Invalid or non-wallet transaction id".to_string()))
    }
}
