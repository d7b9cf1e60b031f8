//! Opaque text tokens carrying a [`TransactionState`]
//!
//! A token is built in three layers:
//! - frame: `version (1 byte) || compact JSON || checksum (4 bytes)`, the
//!   checksum being the first four bytes of double SHA-256 over
//!   `version || JSON`
//! - the whole frame XORed with a keystream derived from a configured key
//! - standard padded base64 for transport
//!
//! Decoding checks every layer and never yields a partially populated state.
//! The key only keeps tokens from being read or casually edited; anyone
//! holding a token can act on it.

pub mod keystream;
mod wire;

use crate::core::TransactionState;
use crate::crypto::double_sha256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use wire::TokenBody;

/// Leading frame byte of the current token format
pub const TOKEN_VERSION: u8 = 0x01;

const CHECKSUM_LEN: usize = 4;

/// Errors raised while encoding or decoding a token
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Token too short: {0} bytes")]
    TooShort(usize),
    #[error("Unsupported token version: {0}")]
    Version(u8),
    #[error("Checksum mismatch")]
    Checksum,
    #[error("Token body is not UTF-8")]
    Utf8,
    #[error("Malformed token body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Used input count {declared} does not match {actual} ids")]
    CountMismatch { declared: usize, actual: usize },
    #[error("Invalid transaction state: {0}")]
    Invalid(String),
}

/// Encodes and decodes tokens under one key
#[derive(Clone)]
pub struct TokenCodec {
    key: Vec<u8>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("key", &"<redacted>").finish()
    }
}

impl TokenCodec {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    /// Serialize a state into a token
    pub fn encode(&self, state: &TransactionState) -> Result<String, CodecError> {
        state.validate().map_err(CodecError::Invalid)?;
        let json = serde_json::to_vec(&TokenBody::from(state))?;
        Ok(self.seal(&json))
    }

    /// Parse a token back into a state
    pub fn decode(&self, token: &str) -> Result<TransactionState, CodecError> {
        let json = self.open(token)?;
        let text = std::str::from_utf8(&json).map_err(|_| CodecError::Utf8)?;
        let body: TokenBody = serde_json::from_str(text)?;
        TransactionState::try_from(body)
    }

    fn seal(&self, payload: &[u8]) -> String {
        let mut frame = Vec::with_capacity(1 + payload.len() + CHECKSUM_LEN);
        frame.push(TOKEN_VERSION);
        frame.extend_from_slice(payload);
        let checksum = double_sha256(&frame);
        frame.extend_from_slice(&checksum[..CHECKSUM_LEN]);

        keystream::apply(&self.key, &mut frame);
        STANDARD.encode(frame)
    }

    fn open(&self, token: &str) -> Result<Vec<u8>, CodecError> {
        let mut frame = STANDARD.decode(token)?;
        if frame.len() <= 1 + CHECKSUM_LEN {
            return Err(CodecError::TooShort(frame.len()));
        }
        keystream::apply(&self.key, &mut frame);

        let (body, checksum) = frame.split_at(frame.len() - CHECKSUM_LEN);
        if double_sha256(body)[..CHECKSUM_LEN] != *checksum {
            return Err(CodecError::Checksum);
        }
        if body[0] != TOKEN_VERSION {
            return Err(CodecError::Version(body[0]));
        }
        Ok(body[1..].to_vec())
    }
}
