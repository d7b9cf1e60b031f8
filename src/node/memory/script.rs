//! M-of-N pay-to-script-hash multisig scripts

use crate::crypto::{
    base58check_encode, hash160, public_key_from_hex, public_key_to_address, KeyError,
};
use thiserror::Error;

/// Version byte of pay-to-script-hash addresses ('3...')
pub const P2SH_VERSION: u8 = 0x05;

/// Largest key count a bare multisig script can carry
pub const MAX_SIGNERS: usize = 16;

const OP_1: u8 = 0x50;
const OP_CHECKMULTISIG: u8 = 0xae;
const PUSH_33: u8 = 0x21;

/// Errors related to multisig scripts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Invalid signer count: need at least 2 signers")]
    InsufficientSigners,
    #[error("Too many signers: {0} (max 16)")]
    TooManySigners(usize),
    #[error("Duplicate signer public key")]
    DuplicateSigner,
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Malformed redeem script: {0}")]
    Malformed(String),
}

/// A `OP_m <pubkey>... OP_n OP_CHECKMULTISIG` redeem script
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigScript {
    threshold: u8,
    /// Compressed public keys (hex) in script order
    public_keys: Vec<String>,
}

impl MultisigScript {
    /// Create a script requiring `threshold` of `public_keys`.
    ///
    /// Keys keep the order given; the same keys in another order give another
    /// script and address.
    pub fn new(threshold: u8, public_keys: Vec<String>) -> Result<Self, ScriptError> {
        if threshold == 0 {
            return Err(ScriptError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }
        if public_keys.len() < 2 {
            return Err(ScriptError::InsufficientSigners);
        }
        if public_keys.len() > MAX_SIGNERS {
            return Err(ScriptError::TooManySigners(public_keys.len()));
        }
        if threshold as usize > public_keys.len() {
            return Err(ScriptError::InvalidThreshold(format!(
                "threshold {} exceeds signer count {}",
                threshold,
                public_keys.len()
            )));
        }

        let mut normalized = Vec::with_capacity(public_keys.len());
        for key in &public_keys {
            let parsed = public_key_from_hex(key)
                .map_err(|_: KeyError| ScriptError::InvalidPublicKey(key.clone()))?;
            normalized.push(hex::encode(parsed.serialize()));
        }

        let mut sorted = normalized.clone();
        sorted.sort();
        if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(ScriptError::DuplicateSigner);
        }

        Ok(Self {
            threshold,
            public_keys: normalized,
        })
    }

    /// Parse a serialized redeem script
    pub fn from_hex(script_hex: &str) -> Result<Self, ScriptError> {
        let bytes = hex::decode(script_hex).map_err(|e| ScriptError::Malformed(e.to_string()))?;
        let malformed = |what: &str| ScriptError::Malformed(what.to_string());

        let (&first, rest) = bytes.split_first().ok_or_else(|| malformed("empty script"))?;
        let (&last, rest) = rest.split_last().ok_or_else(|| malformed("truncated script"))?;
        let (&count_op, mut keys) = rest.split_last().ok_or_else(|| malformed("truncated script"))?;
        if last != OP_CHECKMULTISIG {
            return Err(malformed("missing OP_CHECKMULTISIG"));
        }
        if !(OP_1 + 1..=OP_1 + 16).contains(&first) || !(OP_1 + 1..=OP_1 + 16).contains(&count_op)
        {
            return Err(malformed("bad small integer opcode"));
        }

        let mut public_keys = Vec::new();
        while let Some((&push, tail)) = keys.split_first() {
            if push != PUSH_33 || tail.len() < 33 {
                return Err(malformed("expected 33-byte key push"));
            }
            public_keys.push(hex::encode(&tail[..33]));
            keys = &tail[33..];
        }
        if public_keys.len() != (count_op - OP_1) as usize {
            return Err(malformed("key count does not match script"));
        }

        Self::new(first - OP_1, public_keys)
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn signer_count(&self) -> usize {
        self.public_keys.len()
    }

    pub fn public_keys(&self) -> &[String] {
        &self.public_keys
    }

    /// Script position of a public key
    pub fn position_of(&self, public_key_hex: &str) -> Option<usize> {
        self.public_keys.iter().position(|k| k == public_key_hex)
    }

    /// e.g. "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.public_keys.len())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(3 + self.public_keys.len() * 34);
        script.push(OP_1 + self.threshold);
        for key in &self.public_keys {
            // keys were validated on construction
            if let Ok(bytes) = hex::decode(key) {
                script.push(PUSH_33);
                script.extend_from_slice(&bytes);
            }
        }
        script.push(OP_1 + self.public_keys.len() as u8);
        script.push(OP_CHECKMULTISIG);
        script
    }

    /// Redeem script as hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Base58Check(0x05 || HASH160(script))
    pub fn address(&self) -> String {
        base58check_encode(P2SH_VERSION, &hash160(&self.to_bytes()))
    }

    /// `OP_HASH160 <script hash> OP_EQUAL`
    pub fn script_pub_key_hex(&self) -> String {
        format!("a914{}87", hex::encode(hash160(&self.to_bytes())))
    }

    /// P2PKH address of every participant key, in script order
    pub fn participant_addresses(&self) -> Vec<String> {
        self.public_keys
            .iter()
            .filter_map(|k| public_key_from_hex(k).ok())
            .map(|pk| public_key_to_address(&pk))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn sample_pubkeys() -> Vec<String> {
        (0..3).map(|_| KeyPair::generate().public_key_hex()).collect()
    }

    #[test]
    fn test_script_creation() {
        let script = MultisigScript::new(2, sample_pubkeys()).unwrap();

        assert_eq!(script.threshold(), 2);
        assert_eq!(script.signer_count(), 3);
        assert_eq!(script.description(), "2-of-3");
        assert!(script.address().starts_with('3'));
        assert_eq!(script.participant_addresses().len(), 3);
    }

    #[test]
    fn test_script_validation() {
        assert_eq!(
            MultisigScript::new(0, sample_pubkeys()),
            Err(ScriptError::InvalidThreshold(
                "threshold must be at least 1".to_string()
            ))
        );
        assert!(MultisigScript::new(4, sample_pubkeys()).is_err());
        assert_eq!(
            MultisigScript::new(1, vec![KeyPair::generate().public_key_hex()]),
            Err(ScriptError::InsufficientSigners)
        );

        let key = KeyPair::generate().public_key_hex();
        assert_eq!(
            MultisigScript::new(2, vec![key.clone(), key]),
            Err(ScriptError::DuplicateSigner)
        );
        assert!(matches!(
            MultisigScript::new(1, vec!["zz".to_string(), "02ab".to_string()]),
            Err(ScriptError::InvalidPublicKey(_))
        ));

        let many: Vec<String> = (0..17).map(|_| KeyPair::generate().public_key_hex()).collect();
        assert_eq!(
            MultisigScript::new(2, many),
            Err(ScriptError::TooManySigners(17))
        );
    }

    #[test]
    fn test_script_layout() {
        let script = MultisigScript::new(2, sample_pubkeys()).unwrap();
        let bytes = script.to_bytes();

        assert_eq!(bytes.len(), 3 + 3 * 34);
        assert_eq!(bytes[0], 0x52);
        assert_eq!(bytes[1], 0x21);
        assert_eq!(bytes[bytes.len() - 2], 0x53);
        assert_eq!(bytes[bytes.len() - 1], 0xae);

        let spk = script.script_pub_key_hex();
        assert!(spk.starts_with("a914") && spk.ends_with("87"));
        assert_eq!(spk.len(), 46);
    }

    #[test]
    fn test_parse_round_trip() {
        let script = MultisigScript::new(2, sample_pubkeys()).unwrap();
        let parsed = MultisigScript::from_hex(&script.to_hex()).unwrap();
        assert_eq!(parsed, script);
        assert_eq!(parsed.address(), script.address());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let script = MultisigScript::new(2, sample_pubkeys()).unwrap();
        let hex_script = script.to_hex();

        assert!(MultisigScript::from_hex("").is_err());
        assert!(MultisigScript::from_hex("zz").is_err());
        assert!(MultisigScript::from_hex(&hex_script[..hex_script.len() - 2]).is_err());
        // claims 4 keys but carries 3
        let wrong_count = format!("{}54ae", &hex_script[..hex_script.len() - 4]);
        assert!(MultisigScript::from_hex(&wrong_count).is_err());
    }

    #[test]
    fn test_address_depends_on_key_order() {
        let keys = sample_pubkeys();
        let mut reversed = keys.clone();
        reversed.reverse();

        let a = MultisigScript::new(2, keys.clone()).unwrap();
        let b = MultisigScript::new(2, keys).unwrap();
        let c = MultisigScript::new(2, reversed).unwrap();

        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }
}
