//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Transport DH produced a degenerate shared secret
    #[error("key exchange failed")]
    KeyExchangeFailed,

    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Signature bytes were malformed or did not verify
    #[error("invalid signature")]
    InvalidSignature,

    /// Public key bytes do not decode to a valid point
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,
}
