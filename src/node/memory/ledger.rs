//! Shared in-process ledger backing the simulated nodes
//!
//! Tracks registered multisig scripts, account labels, unspent outputs and
//! per-transaction confirmation counts. Several [`MemoryNode`]s can share one
//! ledger, each holding a different subset of the private keys.
//!
//! [`MemoryNode`]: super::MemoryNode

use super::script::MultisigScript;
use super::tx::SimTransaction;
use crate::core::Amount;
use crate::crypto::{base58check_decode, public_key_from_hex, sha256_hex, verify_signature};
use crate::node::{NodeError, UnspentOutput};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct LedgerOutput {
    txid: String,
    vout: u32,
    address: String,
    amount: Amount,
}

#[derive(Debug, Default)]
struct LedgerState {
    scripts: HashMap<String, MultisigScript>,
    accounts: HashMap<String, Vec<String>>,
    /// Unspent outputs in creation order
    unspent: Vec<LedgerOutput>,
    confirmations: HashMap<String, u32>,
    funding_counter: u64,
}

/// Handle to a shared simulated ledger
#[derive(Debug, Clone, Default)]
pub struct SimLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl SimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a multisig script, optionally under an account name.
    /// Returns its address.
    pub fn register_multisig(&self, script: MultisigScript, account: Option<&str>) -> String {
        let address = script.address();
        let mut state = self.write();
        if let Some(account) = account {
            let addresses = state.accounts.entry(account.to_string()).or_default();
            if !addresses.contains(&address) {
                addresses.push(address.clone());
            }
        }
        info!("Registered {} multisig {}", script.description(), address);
        state.scripts.insert(address.clone(), script);
        address
    }

    /// Attach a plain address to an account
    pub fn label_address(&self, account: &str, address: &str) {
        let mut state = self.write();
        let addresses = state.accounts.entry(account.to_string()).or_default();
        if !addresses.iter().any(|a| a == address) {
            addresses.push(address.to_string());
        }
    }

    pub fn multisig(&self, address: &str) -> Option<MultisigScript> {
        self.read().scripts.get(address).cloned()
    }

    pub fn account_addresses(&self, account: &str) -> Vec<String> {
        self.read().accounts.get(account).cloned().unwrap_or_default()
    }

    /// Credit `address` with a new output that already has `confirmations`.
    /// Returns the funding transaction id.
    pub fn fund(&self, address: &str, amount: Amount, confirmations: u32) -> String {
        let mut state = self.write();
        state.funding_counter += 1;
        let txid = sha256_hex(
            format!("fund:{}:{}:{}", state.funding_counter, address, amount.to_sat()).as_bytes(),
        );
        state.unspent.push(LedgerOutput {
            txid: txid.clone(),
            vout: 0,
            address: address.to_string(),
            amount,
        });
        state.confirmations.insert(txid.clone(), confirmations);
        debug!("Funded {} with {} ({} conf)", address, amount, confirmations);
        txid
    }

    /// Add `blocks` confirmations to every known transaction
    pub fn mine(&self, blocks: u32) {
        let mut state = self.write();
        for confs in state.confirmations.values_mut() {
            *confs = confs.saturating_add(blocks);
        }
    }

    pub fn confirmations(&self, txid: &str) -> Option<u32> {
        self.read().confirmations.get(txid).copied()
    }

    /// Unspent outputs with at least `min_conf` confirmations, in ledger order
    pub fn unspent(&self, min_conf: u32) -> Vec<UnspentOutput> {
        let state = self.read();
        state
            .unspent
            .iter()
            .filter_map(|out| {
                let confirmations = state.confirmations.get(&out.txid).copied().unwrap_or(0);
                if confirmations < min_conf {
                    return None;
                }
                let script = state.scripts.get(&out.address);
                Some(UnspentOutput {
                    txid: out.txid.clone(),
                    vout: out.vout,
                    address: out.address.clone(),
                    script_pub_key: match script {
                        Some(script) => script.script_pub_key_hex(),
                        None => p2pkh_script_pub_key(&out.address),
                    },
                    redeem_script: script.map(|s| s.to_hex()),
                    amount: out.amount,
                    confirmations,
                })
            })
            .collect()
    }

    pub fn balance(&self, address: &str) -> Amount {
        self.read()
            .unspent
            .iter()
            .filter(|out| out.address == address)
            .map(|out| out.amount)
            .sum()
    }

    /// Validate a fully signed transaction and apply it.
    /// Returns the transaction id.
    pub fn submit(&self, tx: &SimTransaction) -> Result<String, NodeError> {
        let reject = |reason: &str| NodeError::Rejected(reason.to_string());

        if tx.inputs.is_empty() {
            return Err(reject("bad-txns-vin-empty"));
        }
        if tx.outputs.is_empty() {
            return Err(reject("bad-txns-vout-empty"));
        }
        if tx.outputs.iter().any(|o| !o.amount.is_positive()) {
            return Err(reject("bad-txns-vout-notpositive"));
        }

        let txid = tx.txid();
        let hash = tx.signing_hash();
        let mut state = self.write();
        if state.confirmations.contains_key(&txid) {
            return Err(reject("transaction already in block chain"));
        }

        let mut seen = HashSet::new();
        let mut spent_positions = Vec::with_capacity(tx.inputs.len());
        let mut total_in = Amount::ZERO;
        for input in &tx.inputs {
            if !seen.insert((input.txid.as_str(), input.vout)) {
                return Err(reject("bad-txns-inputs-duplicate"));
            }
            let position = state
                .unspent
                .iter()
                .position(|out| out.txid == input.txid && out.vout == input.vout)
                .ok_or_else(|| reject("bad-txns-inputs-missingorspent"))?;
            let spent = &state.unspent[position];
            let script = state
                .scripts
                .get(&spent.address)
                .ok_or_else(|| reject("non-multisig input"))?;

            let valid = input
                .signatures
                .iter()
                .filter(|sig| script.position_of(&sig.public_key).is_some())
                .filter(|sig| signature_is_valid(&sig.public_key, &sig.signature, &hash))
                .map(|sig| sig.public_key.as_str())
                .collect::<HashSet<_>>()
                .len();
            if valid < script.threshold() as usize {
                return Err(reject("mandatory-script-verify-flag-failed"));
            }

            total_in += spent.amount;
            spent_positions.push(position);
        }

        if total_in < tx.total_output() {
            return Err(reject("bad-txns-in-belowout"));
        }

        spent_positions.sort_unstable();
        for position in spent_positions.into_iter().rev() {
            state.unspent.remove(position);
        }
        for (vout, output) in tx.outputs.iter().enumerate() {
            state.unspent.push(LedgerOutput {
                txid: txid.clone(),
                vout: vout as u32,
                address: output.address.clone(),
                amount: output.amount,
            });
        }
        state.confirmations.insert(txid.clone(), 0);

        info!(
            "Accepted transaction {} ({} in, {} out, fee {})",
            txid,
            tx.inputs.len(),
            tx.outputs.len(),
            total_in - tx.total_output()
        );
        Ok(txid)
    }
}

fn signature_is_valid(public_key_hex: &str, signature_hex: &str, hash: &[u8]) -> bool {
    let (Ok(public_key), Ok(signature)) =
        (public_key_from_hex(public_key_hex), hex::decode(signature_hex))
    else {
        return false;
    };
    verify_signature(&public_key, hash, &signature).unwrap_or(false)
}

fn p2pkh_script_pub_key(address: &str) -> String {
    match base58check_decode(address) {
        Some((_, hash)) => format!("76a914{}88ac", hex::encode(hash)),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::node::memory::tx::InputSignature;
    use crate::node::TxOutput;

    fn setup() -> (SimLedger, Vec<KeyPair>, String) {
        let ledger = SimLedger::new();
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let script =
            MultisigScript::new(2, keys.iter().map(|k| k.public_key_hex()).collect()).unwrap();
        let address = ledger.register_multisig(script, Some("treasury"));
        (ledger, keys, address)
    }

    fn spend(ledger: &SimLedger, address: &str, amount: i64) -> SimTransaction {
        let utxo = ledger
            .unspent(0)
            .into_iter()
            .find(|u| u.address == address)
            .unwrap();
        SimTransaction::new(
            &[utxo.signing_input().unwrap()],
            &[TxOutput {
                address: KeyPair::generate().address(),
                amount: Amount::from_sat(amount),
            }],
        )
    }

    fn sign_with(tx: &mut SimTransaction, ledger: &SimLedger, address: &str, key: &KeyPair) {
        let script = ledger.multisig(address).unwrap();
        let sig = key.sign(&tx.signing_hash()).unwrap();
        tx.add_signature(
            0,
            InputSignature {
                public_key: key.public_key_hex(),
                signature: hex::encode(sig),
            },
            &script,
        );
    }

    #[test]
    fn test_fund_and_list() {
        let (ledger, _, address) = setup();
        let txid = ledger.fund(&address, Amount::from_sat(1_000), 3);

        let unspent = ledger.unspent(0);
        assert_eq!(unspent.len(), 1);
        assert_eq!(unspent[0].txid, txid);
        assert_eq!(unspent[0].confirmations, 3);
        assert!(unspent[0].redeem_script.is_some());
        assert!(unspent[0].script_pub_key.starts_with("a914"));
        assert_eq!(ledger.balance(&address), Amount::from_sat(1_000));
        assert_eq!(ledger.account_addresses("treasury"), vec![address]);
    }

    #[test]
    fn test_min_conf_filter_and_mining() {
        let (ledger, _, address) = setup();
        let txid = ledger.fund(&address, Amount::from_sat(1_000), 0);

        assert!(ledger.unspent(1).is_empty());
        ledger.mine(2);
        assert_eq!(ledger.unspent(1).len(), 1);
        assert_eq!(ledger.confirmations(&txid), Some(2));
        assert_eq!(ledger.confirmations("unknown"), None);
    }

    #[test]
    fn test_plain_address_output() {
        let ledger = SimLedger::new();
        let address = KeyPair::generate().address();
        ledger.fund(&address, Amount::from_sat(5), 1);

        let unspent = ledger.unspent(0);
        assert!(unspent[0].redeem_script.is_none());
        assert!(unspent[0].script_pub_key.starts_with("76a914"));
    }

    #[test]
    fn test_submit_requires_threshold() {
        let (ledger, keys, address) = setup();
        ledger.fund(&address, Amount::from_sat(1_000), 1);

        let mut tx = spend(&ledger, &address, 900);
        sign_with(&mut tx, &ledger, &address, &keys[0]);
        assert!(matches!(ledger.submit(&tx), Err(NodeError::Rejected(_))));

        sign_with(&mut tx, &ledger, &address, &keys[2]);
        let txid = ledger.submit(&tx).unwrap();

        assert_eq!(ledger.balance(&address), Amount::ZERO);
        assert_eq!(ledger.confirmations(&txid), Some(0));
        assert!(matches!(ledger.submit(&tx), Err(NodeError::Rejected(_))));
    }

    #[test]
    fn test_submit_rejects_forged_signature() {
        let (ledger, keys, address) = setup();
        ledger.fund(&address, Amount::from_sat(1_000), 1);

        let mut tx = spend(&ledger, &address, 900);
        sign_with(&mut tx, &ledger, &address, &keys[0]);
        let script = ledger.multisig(&address).unwrap();
        tx.add_signature(
            0,
            InputSignature {
                public_key: keys[1].public_key_hex(),
                signature: hex::encode([7u8; 64]),
            },
            &script,
        );
        assert!(ledger.submit(&tx).is_err());
    }

    #[test]
    fn test_submit_rejects_overspend() {
        let (ledger, keys, address) = setup();
        ledger.fund(&address, Amount::from_sat(1_000), 1);

        let mut tx = spend(&ledger, &address, 1_001);
        sign_with(&mut tx, &ledger, &address, &keys[0]);
        sign_with(&mut tx, &ledger, &address, &keys[1]);
        assert_eq!(
            ledger.submit(&tx),
            Err(NodeError::Rejected("bad-txns-in-belowout".to_string()))
        );
    }
}
