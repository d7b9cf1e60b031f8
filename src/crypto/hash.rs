//! Hashing utilities
//!
//! SHA-256 based digests used for transaction ids, address payloads,
//! token checksums and the token keystream.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for transaction ids and Base58Check checksums
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// RIPEMD160(SHA256(data)), the payload of P2PKH and P2SH addresses
pub fn hash160(data: &[u8]) -> Vec<u8> {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn double_sha256_hex(data: &[u8]) -> String {
    hex::encode(double_sha256(data))
}

/// Base58Check encoding: version || payload || first 4 bytes of double SHA-256
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(1 + payload.len() + 4);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    let checksum = double_sha256(&bytes);
    bytes.extend_from_slice(&checksum[..4]);
    bs58::encode(bytes).into_string()
}

/// Decode a Base58Check string into (version, payload), verifying the checksum
pub fn base58check_decode(encoded: &str) -> Option<(u8, Vec<u8>)> {
    let bytes = bs58::decode(encoded).into_vec().ok()?;
    if bytes.len() < 5 {
        return None;
    }
    let (body, checksum) = bytes.split_at(bytes.len() - 4);
    if double_sha256(body)[..4] != *checksum {
        return None;
    }
    Some((body[0], body[1..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_double_sha256() {
        let data = b"hello world";
        let hash = double_sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, sha256(&sha256(data)));
    }

    #[test]
    fn test_hash160_length() {
        assert_eq!(hash160(b"redeem script").len(), 20);
    }

    #[test]
    fn test_base58check_roundtrip() {
        let payload = hash160(b"payload");
        let encoded = base58check_encode(0x05, &payload);
        assert!(encoded.starts_with('3'));

        let (version, decoded) = base58check_decode(&encoded).unwrap();
        assert_eq!(version, 0x05);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_base58check_rejects_bad_checksum() {
        let encoded = base58check_encode(0x00, &hash160(b"payload"));
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '1' { '2' } else { '1' };
        let tampered: String = chars.into_iter().collect();

        assert!(base58check_decode(&tampered).is_none());
    }
}
