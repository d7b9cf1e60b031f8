//! Keyed XOR keystream used to obfuscate token frames
//!
//! Block `i` of the stream is `SHA-256(key || i as u64 big-endian)`.

use crate::crypto::sha256;

const BLOCK_LEN: usize = 32;

/// XOR `data` in place with the keystream derived from `key`.
///
/// Applying it twice with the same key restores the input.
pub fn apply(key: &[u8], data: &mut [u8]) {
    let mut seed = Vec::with_capacity(key.len() + 8);
    for (index, chunk) in data.chunks_mut(BLOCK_LEN).enumerate() {
        seed.clear();
        seed.extend_from_slice(key);
        seed.extend_from_slice(&(index as u64).to_be_bytes());
        let block = sha256(&seed);
        for (byte, mask) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_is_involution() {
        let original: Vec<u8> = (0..100u8).collect();
        let mut data = original.clone();

        apply(b"key", &mut data);
        assert_ne!(data, original);

        apply(b"key", &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_blocks_differ() {
        let mut data = vec![0u8; 64];
        apply(b"key", &mut data);
        assert_ne!(data[..32], data[32..]);
        assert_eq!(data[..32], sha256(&[b"key".as_slice(), &0u64.to_be_bytes()].concat())[..]);
    }

    #[test]
    fn test_key_changes_stream() {
        let mut a = vec![0u8; 16];
        let mut b = vec![0u8; 16];
        apply(b"one", &mut a);
        apply(b"two", &mut b);
        assert_ne!(a, b);
    }
}
