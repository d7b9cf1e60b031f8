//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 / HASH160 hashing and Base58Check
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{
    base58check_decode, base58check_encode, double_sha256, double_sha256_hex, hash160, sha256,
    sha256_hex,
};
pub use keys::{
    public_key_from_hex, public_key_to_address, sign_message, verify_signature, KeyError, KeyPair,
    P2PKH_VERSION,
};
