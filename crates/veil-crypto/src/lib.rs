//! # Veil Crypto
//!
//! Cryptographic primitives for the veil link layer.
//!
//! This crate provides:
//! - X25519 transport Diffie-Hellman with nonce-bound key derivation
//! - Keyed BLAKE3 message authentication (32-byte tags)
//! - `XChaCha20` in-place stream encryption
//! - Ed25519 identity signatures for router contacts
//! - Secure random number generation
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm |
//! |----------|-----------|
//! | Key Exchange | X25519 |
//! | Session KDF | keyed BLAKE3 |
//! | Fragment MAC | keyed BLAKE3 |
//! | Fragment Cipher | XChaCha20 |
//! | Signatures | Ed25519 |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cipher;
pub mod constant_time;
pub mod error;
pub mod hash;
pub mod random;
pub mod signatures;
pub mod x25519;

pub use error::CryptoError;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// X25519 public key size
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// X25519 secret key size
pub const X25519_SECRET_KEY_SIZE: usize = 32;

/// Symmetric session key size
pub const SESSION_KEY_SIZE: usize = 32;

/// Keyed-hash (MAC) output size
pub const MAC_SIZE: usize = 32;

/// XChaCha20 key size
pub const XCHACHA_KEY_SIZE: usize = 32;

/// XChaCha20 nonce size
pub const XCHACHA_NONCE_SIZE: usize = 24;

/// Key-exchange nonce size (the handshake's one-shot nonce N)
pub const KEY_EXCHANGE_NONCE_SIZE: usize = 32;

/// Ed25519 public key size
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Random nonce mixed into the transport DH during the handshake.
pub type KeyExchangeNonce = [u8; KEY_EXCHANGE_NONCE_SIZE];

/// Symmetric session secret derived from the transport DH.
///
/// Keys both the fragment MAC and the fragment stream cipher.
/// Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Wrap raw key material.
    #[must_use]
    pub fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}
