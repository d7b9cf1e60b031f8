//! Token-based create/sign/send operations
//!
//! A token moves through `awaiting signatures -> fully signed -> sent`.
//! Every operation decodes the token it is given, works on the decoded
//! state, and hands back a fresh token. A failed operation leaves nothing
//! changed; the caller still holds the token it passed in.

use super::builder::build_transaction;
use super::{check_raw_hex, map_node_error};
use super::selector::{check_amounts, multisig_unspent, resolve_multisig_address, select_coins};
use crate::codec::TokenCodec;
use crate::config::Config;
use crate::core::{Amount, ExchangeError, SigningInput, TransactionState};
use crate::node::{NodeBackend, NodeError, PrivateKey, UnspentOutput};
use log::{debug, info, warn};
use serde::Serialize;

/// Outcome of a signing round that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignStatus {
    /// Keys were found and the signer ran
    Signed,
    /// This node holds no key of any participant; token content unchanged
    NoUsableKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignReport {
    pub token: String,
    pub complete: bool,
    /// Participant addresses whose keys were used, in participant order
    pub signers: Vec<String>,
    pub status: SignStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub token: String,
    pub network_tx_id: String,
}

/// Inputs and outputs a create call would use, without building anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub from_address: String,
    pub inputs: Vec<SigningInput>,
    pub used_input_ids: Vec<String>,
    pub total_input: Amount,
    pub amount: Amount,
    pub fee: Amount,
    /// Surplus that would go to a new change address
    pub change: Amount,
}

/// A multisig address and the addresses of its key holders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMultisig {
    pub address: String,
    pub participants: Vec<String>,
}

/// Runs the multisig workflow against one node
pub struct MultisigCoordinator<N: NodeBackend> {
    node: N,
    codec: TokenCodec,
    change_label: String,
    default_min_confirmations: u32,
}

impl<N: NodeBackend> MultisigCoordinator<N> {
    /// Coordinator with the default change label and confirmation count
    pub fn new(node: N, codec: TokenCodec) -> Self {
        let defaults = Config::default();
        Self {
            node,
            codec,
            change_label: defaults.change_label,
            default_min_confirmations: defaults.default_min_confirmations,
        }
    }

    pub fn from_config(node: N, config: &Config) -> Self {
        Self {
            node,
            codec: TokenCodec::new(&config.token_key),
            change_label: config.change_label.clone(),
            default_min_confirmations: config.default_min_confirmations,
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    fn decode(&self, token: &str) -> Result<TransactionState, ExchangeError> {
        self.codec.decode(token).map_err(ExchangeError::DecodeFailed)
    }

    fn encode(&self, state: &TransactionState) -> Result<String, ExchangeError> {
        // Everything in the state came from the node, so an unencodable
        // state means the node handed back bad data
        self.codec.encode(state).map_err(|e| {
            ExchangeError::CollaboratorUnavailable(format!("node data not usable: {}", e))
        })
    }

    /// Create an unsigned spend of `amount` (plus `fee`) from the multisig
    /// address of `paying` to `destination`. Returns its token.
    pub fn create(
        &self,
        paying: &str,
        destination: &str,
        amount: Amount,
        fee: Amount,
        min_confirmations: Option<u32>,
    ) -> Result<String, ExchangeError> {
        check_amounts(amount, fee)?;
        if destination.trim().is_empty() {
            return Err(ExchangeError::InvalidAddressOrAccount(
                "empty destination address".to_string(),
            ));
        }
        let min_conf = min_confirmations.unwrap_or(self.default_min_confirmations);

        let selection = select_coins(&self.node, paying, amount, fee, min_conf)?;
        let change_address = if selection.surplus.is_positive() {
            let address = self
                .node
                .new_change_address(&self.change_label)
                .map_err(|e| map_node_error(e, ExchangeError::BuildFailed))?;
            Some(address)
        } else {
            None
        };

        let state = build_transaction(
            &self.node,
            &selection,
            destination,
            amount,
            change_address.as_deref(),
            min_conf,
        )?;
        let token = self.encode(&state)?;

        info!(
            "Created spend of {} from {} to {} using {} inputs",
            amount,
            state.from_address,
            destination,
            state.used_input_count()
        );
        Ok(token)
    }

    /// Run coin selection for a spend without building it
    pub fn preview(
        &self,
        paying: &str,
        amount: Amount,
        fee: Amount,
        min_confirmations: Option<u32>,
    ) -> Result<Preview, ExchangeError> {
        let min_conf = min_confirmations.unwrap_or(self.default_min_confirmations);
        let selection = select_coins(&self.node, paying, amount, fee, min_conf)?;
        Ok(Preview {
            from_address: selection.from_address,
            inputs: selection.inputs,
            used_input_ids: selection.used_input_ids,
            total_input: selection.total,
            amount,
            fee,
            change: selection.surplus,
        })
    }

    /// Add this node's signatures to a token.
    ///
    /// Keys are gathered in participant order. A `max_signers` between 1 and
    /// the participant count stops after that many keys; any other value
    /// uses every key this node holds.
    pub fn sign(
        &self,
        token: &str,
        max_signers: Option<usize>,
    ) -> Result<SignReport, ExchangeError> {
        let mut state = self.decode(token)?;
        if state.sent {
            return Err(ExchangeError::AlreadySent);
        }
        if state.complete {
            return Err(ExchangeError::AlreadyComplete);
        }

        let limit = max_signers
            .filter(|&n| n > 0 && n < state.participant_addresses.len())
            .unwrap_or(usize::MAX);
        let (signers, keys) = self.collect_keys(&state.participant_addresses, limit)?;

        if keys.is_empty() {
            debug!("No participant keys on this node for {}", state.from_address);
            return Ok(SignReport {
                token: self.encode(&state)?,
                complete: state.complete,
                signers,
                status: SignStatus::NoUsableKeys,
            });
        }

        let signed = self
            .node
            .sign_raw_transaction(&state.raw_hex, &state.signing_inputs, &keys)
            .map_err(|e| {
                map_node_error(e, |msg| {
                    ExchangeError::BuildFailed(format!("signing failed: {}", msg))
                })
            })?;
        check_raw_hex(&signed.hex, "signed")?;
        state.apply_signatures(signed.hex, signed.complete);
        let token = self.encode(&state)?;

        info!(
            "Signed spend from {} with {} keys (complete: {})",
            state.from_address,
            signers.len(),
            state.complete
        );
        Ok(SignReport {
            token,
            complete: state.complete,
            signers,
            status: SignStatus::Signed,
        })
    }

    fn collect_keys(
        &self,
        participants: &[String],
        limit: usize,
    ) -> Result<(Vec<String>, Vec<PrivateKey>), ExchangeError> {
        let mut signers = Vec::new();
        let mut keys = Vec::new();
        for address in participants {
            if keys.len() >= limit {
                break;
            }
            if !self.node.has_private_key_for(address)? {
                continue;
            }
            match self.node.private_key_for(address) {
                Ok(key) => {
                    signers.push(address.clone());
                    keys.push(key);
                }
                Err(NodeError::NotFound(msg)) | Err(NodeError::Rejected(msg)) => {
                    warn!("Key for {} could not be exported: {}", address, msg);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok((signers, keys))
    }

    /// Broadcast a fully signed token
    pub fn send(&self, token: &str) -> Result<SendReport, ExchangeError> {
        let mut state = self.decode(token)?;
        if !state.complete {
            return Err(ExchangeError::NotComplete);
        }
        if state.sent {
            return Err(ExchangeError::AlreadySent);
        }

        let network_tx_id = self
            .node
            .broadcast_raw_transaction(&state.raw_hex)
            .map_err(|e| map_node_error(e, ExchangeError::BroadcastRejected))?;
        if network_tx_id.trim().is_empty() {
            warn!(
                "Node returned no txid for the spend from {}; it may have been broadcast",
                state.from_address
            );
            return Err(ExchangeError::CollaboratorUnavailable(
                "broadcast returned an empty transaction id".to_string(),
            ));
        }
        state.mark_sent(network_tx_id.clone());
        let token = self.encode(&state)?;

        info!("Sent spend from {} as {}", state.from_address, network_tx_id);
        Ok(SendReport {
            token,
            network_tx_id,
        })
    }

    /// Sign, then broadcast if that completed the transaction
    pub fn try_sign_and_send(&self, token: &str) -> Result<SendReport, ExchangeError> {
        let signed = self.sign(token, None)?;
        if !signed.complete {
            return Err(ExchangeError::NotComplete);
        }
        let sent = self.send(&signed.token)?;
        if !self.decode(&sent.token)?.sent {
            return Err(ExchangeError::BroadcastRejected(
                "token not marked as sent".to_string(),
            ));
        }
        Ok(sent)
    }

    /// [`try_sign_and_send`](Self::try_sign_and_send) reduced to success or failure
    pub fn sign_and_send(&self, token: &str) -> bool {
        match self.try_sign_and_send(token) {
            Ok(report) => {
                debug!("sign-and-send finished as {}", report.network_tx_id);
                true
            }
            Err(err) => {
                warn!("sign-and-send failed: {}", err);
                false
            }
        }
    }

    /// Decode a token for display
    pub fn inspect(&self, token: &str) -> Result<TransactionState, ExchangeError> {
        self.decode(token)
    }

    pub fn resolve(&self, identifier: &str) -> Result<ResolvedMultisig, ExchangeError> {
        let address = resolve_multisig_address(&self.node, identifier)?;
        let participants = self
            .node
            .multisig_participants(&address)
            .map_err(|e| map_node_error(e, ExchangeError::InvalidAddressOrAccount))?;
        Ok(ResolvedMultisig {
            address,
            participants,
        })
    }

    /// Unspent outputs of the multisig address behind `identifier`
    pub fn list_unspent(&self, identifier: &str) -> Result<Vec<UnspentOutput>, ExchangeError> {
        let address = resolve_multisig_address(&self.node, identifier)?;
        multisig_unspent(&self.node, &address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, Phase};
    use crate::crypto::KeyPair;
    use crate::node::{MemoryNode, MultisigScript, SignedTransaction, SimLedger, TxOutput};

    const KEY: &str = "coordinator-test";

    fn coins(s: &str) -> Amount {
        s.parse().unwrap()
    }

    struct Party {
        ledger: SimLedger,
        keys: Vec<KeyPair>,
        address: String,
    }

    impl Party {
        fn new() -> Self {
            let ledger = SimLedger::new();
            let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
            let script =
                MultisigScript::new(2, keys.iter().map(|k| k.public_key_hex()).collect()).unwrap();
            let address = ledger.register_multisig(script, Some("treasury"));
            Self {
                ledger,
                keys,
                address,
            }
        }

        fn holder(&self, key_indexes: &[usize]) -> MultisigCoordinator<MemoryNode> {
            let keys: Vec<KeyPair> = key_indexes.iter().map(|&i| self.keys[i].clone()).collect();
            MultisigCoordinator::new(
                MemoryNode::with_keys(self.ledger.clone(), &keys),
                TokenCodec::new(KEY),
            )
        }
    }

    /// Memory node whose replies can be replaced
    #[derive(Default)]
    struct Overrides {
        raw_hex: Option<String>,
        signed_hex: Option<String>,
        broadcast_txid: Option<String>,
    }

    struct FaultyNode {
        inner: MemoryNode,
        overrides: Overrides,
    }

    impl NodeBackend for FaultyNode {
        fn list_unspent(&self, min_conf: u32) -> Result<Vec<UnspentOutput>, NodeError> {
            self.inner.list_unspent(min_conf)
        }

        fn resolve_paying_address(&self, identifier: &str) -> Result<String, NodeError> {
            self.inner.resolve_paying_address(identifier)
        }

        fn multisig_participants(&self, address: &str) -> Result<Vec<String>, NodeError> {
            self.inner.multisig_participants(address)
        }

        fn build_raw_transaction(
            &self,
            inputs: &[SigningInput],
            outputs: &[TxOutput],
        ) -> Result<String, NodeError> {
            let hex = self.inner.build_raw_transaction(inputs, outputs)?;
            Ok(self.overrides.raw_hex.clone().unwrap_or(hex))
        }

        fn sign_raw_transaction(
            &self,
            hex: &str,
            inputs: &[SigningInput],
            keys: &[PrivateKey],
        ) -> Result<SignedTransaction, NodeError> {
            let mut signed = self.inner.sign_raw_transaction(hex, inputs, keys)?;
            if let Some(hex) = &self.overrides.signed_hex {
                signed.hex = hex.clone();
            }
            Ok(signed)
        }

        fn broadcast_raw_transaction(&self, hex: &str) -> Result<String, NodeError> {
            let txid = self.inner.broadcast_raw_transaction(hex)?;
            Ok(self.overrides.broadcast_txid.clone().unwrap_or(txid))
        }

        fn has_private_key_for(&self, address: &str) -> Result<bool, NodeError> {
            self.inner.has_private_key_for(address)
        }

        fn private_key_for(&self, address: &str) -> Result<PrivateKey, NodeError> {
            self.inner.private_key_for(address)
        }

        fn new_change_address(&self, label: &str) -> Result<String, NodeError> {
            self.inner.new_change_address(label)
        }

        fn confirmations(&self, txid: &str) -> Result<u32, NodeError> {
            self.inner.confirmations(txid)
        }
    }

    impl Party {
        fn faulty_holder(
            &self,
            key_indexes: &[usize],
            overrides: Overrides,
        ) -> MultisigCoordinator<FaultyNode> {
            let keys: Vec<KeyPair> = key_indexes.iter().map(|&i| self.keys[i].clone()).collect();
            MultisigCoordinator::new(
                FaultyNode {
                    inner: MemoryNode::with_keys(self.ledger.clone(), &keys),
                    overrides,
                },
                TokenCodec::new(KEY),
            )
        }
    }

    #[test]
    fn test_two_of_three_walkthrough() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("1.5"), 6);
        let destination = KeyPair::generate().address();

        let alice = party.holder(&[0]);
        let bob = party.holder(&[1]);
        let carol = party.holder(&[2]);

        let token = alice
            .create(&party.address, &destination, coins("1.0"), coins("0.0001"), Some(1))
            .unwrap();
        let created = alice.inspect(&token).unwrap();
        assert_eq!(created.used_input_count(), 1);
        assert_eq!(created.phase(), Phase::AwaitingSignatures);
        assert_eq!(created.average_confirmations, 6);
        assert_eq!(created.min_confirmations, 1);

        let first = alice.sign(&token, None).unwrap();
        assert_eq!(first.status, SignStatus::Signed);
        assert!(!first.complete);
        assert_eq!(first.signers, vec![party.keys[0].address()]);

        let second = bob.sign(&first.token, None).unwrap();
        assert!(second.complete);
        assert_eq!(bob.inspect(&second.token).unwrap().phase(), Phase::FullySigned);

        let sent = carol.send(&second.token).unwrap();
        let final_state = carol.inspect(&sent.token).unwrap();
        assert!(final_state.sent);
        assert_eq!(final_state.network_tx_id.as_deref(), Some(sent.network_tx_id.as_str()));

        assert_eq!(party.ledger.balance(&destination), coins("1.0"));
        assert_eq!(party.ledger.balance(&party.address), Amount::ZERO);
        let change = party.ledger.account_addresses("multisig_change_address");
        assert_eq!(change.len(), 1);
        assert_eq!(party.ledger.balance(&change[0]), coins("0.4999"));
    }

    #[test]
    fn test_create_rejects_bad_amounts_before_listing() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("1.5"), 6);
        let alice = party.holder(&[0]);
        let destination = KeyPair::generate().address();

        for (amount, fee) in [("0.0001", "0.0001"), ("0", "0"), ("1", "-0.1"), ("0.1", "0.5")] {
            let err = alice
                .create(&party.address, &destination, coins(amount), coins(fee), None)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        }
        assert_eq!(alice.node().list_unspent_calls(), 0);
    }

    #[test]
    fn test_create_insufficient_and_unknown() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("0.5"), 6);
        let alice = party.holder(&[0]);
        let destination = KeyPair::generate().address();

        let err = alice
            .create("treasury", &destination, coins("1"), coins("0.0001"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let err = alice
            .create("nobody", &destination, coins("0.1"), coins("0.0001"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddressOrAccount);

        let err = alice
            .create(&party.address, "", coins("0.1"), coins("0.0001"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddressOrAccount);

        // nothing reserved for change on failure
        assert!(party
            .ledger
            .account_addresses("multisig_change_address")
            .is_empty());
    }

    #[test]
    fn test_exact_amount_creates_no_change_address() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("1.0001"), 1);
        let alice = party.holder(&[0]);

        alice
            .create(
                &party.address,
                &KeyPair::generate().address(),
                coins("1"),
                coins("0.0001"),
                None,
            )
            .unwrap();
        assert!(party
            .ledger
            .account_addresses("multisig_change_address")
            .is_empty());
    }

    #[test]
    fn test_sign_without_keys_is_a_no_op() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("2"), 1);
        let outsider = party.holder(&[]);

        let token = outsider
            .create(&party.address, &KeyPair::generate().address(), coins("1"), Amount::ZERO, None)
            .unwrap();
        let report = outsider.sign(&token, None).unwrap();

        assert_eq!(report.status, SignStatus::NoUsableKeys);
        assert!(report.signers.is_empty());
        assert!(!report.complete);
        assert_eq!(outsider.inspect(&report.token).unwrap(), outsider.inspect(&token).unwrap());
    }

    #[test]
    fn test_max_signers_limits_keys() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("2"), 1);
        let holder = party.holder(&[0, 2]);
        let token = holder
            .create(&party.address, &KeyPair::generate().address(), coins("1"), Amount::ZERO, None)
            .unwrap();

        let limited = holder.sign(&token, Some(1)).unwrap();
        assert!(!limited.complete);
        assert_eq!(limited.signers, vec![party.keys[0].address()]);

        // out-of-range limits use every key
        for max in [None, Some(0), Some(3), Some(10)] {
            let full = holder.sign(&token, max).unwrap();
            assert!(full.complete);
            assert_eq!(
                full.signers,
                vec![party.keys[0].address(), party.keys[2].address()]
            );
        }
    }

    #[test]
    fn test_signing_is_monotonic_and_terminal() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("2"), 1);
        let alice = party.holder(&[0]);
        let bob = party.holder(&[1]);

        let token = alice
            .create(&party.address, &KeyPair::generate().address(), coins("1"), Amount::ZERO, None)
            .unwrap();
        assert_eq!(alice.send(&token).unwrap_err().kind(), ErrorKind::NotComplete);

        let partial = alice.sign(&token, None).unwrap();
        // signing again with the same key adds nothing but does not regress
        let again = alice.sign(&partial.token, None).unwrap();
        assert!(!again.complete);

        let complete = bob.sign(&again.token, None).unwrap();
        assert!(complete.complete);
        assert_eq!(
            alice.sign(&complete.token, None).unwrap_err().kind(),
            ErrorKind::AlreadyComplete
        );

        let sent = bob.send(&complete.token).unwrap();
        assert_eq!(bob.send(&sent.token).unwrap_err().kind(), ErrorKind::AlreadySent);
        assert_eq!(
            bob.sign(&sent.token, None).unwrap_err().kind(),
            ErrorKind::AlreadySent
        );
        assert!(!bob.sign_and_send(&sent.token));
    }

    #[test]
    fn test_broadcast_rejection_leaves_token_unsent() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("2"), 1);
        let holder = party.holder(&[0, 1]);
        let destination = KeyPair::generate().address();

        // two spends racing for the same output
        let first = holder
            .create(&party.address, &destination, coins("1"), Amount::ZERO, None)
            .unwrap();
        let second = holder
            .create(&party.address, &destination, coins("1.5"), Amount::ZERO, None)
            .unwrap();
        let first = holder.sign(&first, None).unwrap();
        let second = holder.sign(&second, None).unwrap();

        holder.send(&first.token).unwrap();
        let err = holder.send(&second.token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BroadcastRejected);
        assert!(!holder.inspect(&second.token).unwrap().sent);
    }

    #[test]
    fn test_sign_and_send() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("2"), 1);
        let single = party.holder(&[1]);
        let pair = party.holder(&[1, 2]);

        let token = pair
            .create(&party.address, &KeyPair::generate().address(), coins("1"), Amount::ZERO, None)
            .unwrap();

        assert!(!single.sign_and_send(&token));
        assert_eq!(
            single.try_sign_and_send(&token).unwrap_err().kind(),
            ErrorKind::NotComplete
        );
        assert_eq!(single.node().broadcast_calls(), 0);

        assert!(pair.sign_and_send(&token));
        assert_eq!(pair.node().broadcast_calls(), 1);
    }

    #[test]
    fn test_offline_node_is_unavailable() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("2"), 1);
        let alice = party.holder(&[0]);
        let token = alice
            .create(&party.address, &KeyPair::generate().address(), coins("1"), Amount::ZERO, None)
            .unwrap();

        alice.node().set_offline(true);
        let err = alice
            .create(&party.address, &KeyPair::generate().address(), coins("1"), Amount::ZERO, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);
        assert_eq!(
            alice.sign(&token, None).unwrap_err().kind(),
            ErrorKind::CollaboratorUnavailable
        );
    }

    #[test]
    fn test_tampered_or_foreign_tokens_fail_to_decode() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("2"), 1);
        let alice = party.holder(&[0]);
        let token = alice
            .create(&party.address, &KeyPair::generate().address(), coins("1"), Amount::ZERO, None)
            .unwrap();

        let mut bytes = token.clone().into_bytes();
        bytes[10] = if bytes[10] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_eq!(alice.sign(&tampered, None).unwrap_err().kind(), ErrorKind::DecodeFailed);

        let foreign = MultisigCoordinator::new(
            MemoryNode::new(party.ledger.clone()),
            TokenCodec::new("other-deployment"),
        );
        assert_eq!(foreign.inspect(&token).unwrap_err().kind(), ErrorKind::DecodeFailed);
    }

    #[test]
    fn test_preview_resolve_and_unspent() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("0.7"), 1);
        party.ledger.fund(&party.address, coins("0.7"), 1);
        let alice = party.holder(&[0]);

        let preview = alice
            .preview("treasury", coins("1"), coins("0.0001"), None)
            .unwrap();
        assert_eq!(preview.inputs.len(), 2);
        assert_eq!(preview.change, coins("0.3999"));
        assert!(party
            .ledger
            .account_addresses("multisig_change_address")
            .is_empty());

        let resolved = alice.resolve("treasury").unwrap();
        assert_eq!(resolved.address, party.address);
        assert_eq!(resolved.participants.len(), 3);

        assert_eq!(alice.list_unspent("treasury").unwrap().len(), 2);
        assert_eq!(
            alice.list_unspent("nobody").unwrap_err().kind(),
            ErrorKind::InvalidAddressOrAccount
        );
    }

    #[test]
    fn test_malformed_node_transactions_are_unavailable() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("1.5"), 2);
        let destination = KeyPair::generate().address();

        let builder = party.faulty_holder(
            &[],
            Overrides {
                raw_hex: Some(String::new()),
                ..Default::default()
            },
        );
        let err = builder
            .create(&party.address, &destination, coins("1"), coins("0.0001"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);

        let token = party
            .holder(&[])
            .create(&party.address, &destination, coins("1"), coins("0.0001"), None)
            .unwrap();
        let signer = party.faulty_holder(
            &[0],
            Overrides {
                signed_hex: Some("zz-not-hex".to_string()),
                ..Default::default()
            },
        );
        let err = signer.sign(&token, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);
    }

    #[test]
    fn test_empty_broadcast_txid_is_unavailable() {
        let party = Party::new();
        party.ledger.fund(&party.address, coins("1.5"), 2);
        let destination = KeyPair::generate().address();
        let both = party.holder(&[0, 1]);
        let token = both
            .create(&party.address, &destination, coins("1"), coins("0.0001"), None)
            .unwrap();
        let signed = both.sign(&token, None).unwrap();

        let sender = party.faulty_holder(
            &[],
            Overrides {
                broadcast_txid: Some(String::new()),
                ..Default::default()
            },
        );
        let err = sender.send(&signed.token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);
        assert_eq!(sender.node().inner.broadcast_calls(), 1);
        assert_eq!(party.ledger.balance(&destination), coins("1"));

        // Retrying the unsent token cannot spend the outputs twice
        let err = party.holder(&[]).send(&signed.token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BroadcastRejected);
        assert_eq!(party.ledger.balance(&destination), coins("1"));
    }
}
