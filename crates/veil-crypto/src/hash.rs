//! BLAKE3 hashing and keyed message authentication.

use crate::{MAC_SIZE, SessionKey};

/// Hash output (32 bytes).
pub type HashOutput = [u8; 32];

/// Compute the BLAKE3 hash of input data.
#[must_use]
pub fn hash(data: &[u8]) -> HashOutput {
    *blake3::hash(data).as_bytes()
}

/// Keyed-hash tag over `data`, keyed by the session key.
///
/// This is the fragment MAC: a 32-byte keyed BLAKE3 output computed over
/// the nonce-and-ciphertext region of a sealed fragment.
#[must_use]
pub fn mac(key: &SessionKey, data: &[u8]) -> [u8; MAC_SIZE] {
    *blake3::keyed_hash(key.as_bytes(), data).as_bytes()
}

/// Keyed-hash with an arbitrary 32-byte key.
///
/// Used by the transport DH to bind the key-exchange nonce into the
/// derived session secret.
#[must_use]
pub fn keyed(key: &[u8; 32], data: &[u8]) -> HashOutput {
    *blake3::keyed_hash(key, data).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_deterministic() {
        assert_eq!(hash(b"hello world"), hash(b"hello world"));
        assert_ne!(hash(b"input1"), hash(b"input2"));
    }

    // BLAKE3 hash of the empty string, from the official test vectors.
    #[test]
    fn hash_empty_vector() {
        let expected = [
            0xaf, 0x13, 0x49, 0xb9, 0xf5, 0xf9, 0xa1, 0xa6, 0xa0, 0x40, 0x4d, 0xea, 0x36, 0xdc,
            0xc9, 0x49, 0x9b, 0xcb, 0x25, 0xc9, 0xad, 0xc1, 0x12, 0xb7, 0xcc, 0x9a, 0x93, 0xca,
            0xe4, 0x1f, 0x32, 0x62,
        ];
        assert_eq!(hash(b""), expected);
    }

    #[test]
    fn mac_depends_on_key() {
        let k1 = SessionKey::from_bytes([1u8; 32]);
        let k2 = SessionKey::from_bytes([2u8; 32]);
        assert_ne!(mac(&k1, b"payload"), mac(&k2, b"payload"));
        assert_eq!(mac(&k1, b"payload"), mac(&k1, b"payload"));
    }
}
