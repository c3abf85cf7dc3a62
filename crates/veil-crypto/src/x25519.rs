//! X25519 transport key exchange (RFC 7748).
//!
//! The link handshake derives one symmetric session key from a single DH
//! between the initiator's encryption keypair and the responder's transport
//! keypair, bound to the handshake nonce N:
//!
//! ```text
//! session_key = keyed_blake3(N, x25519(local_secret, remote_public))
//! ```
//!
//! Both sides compute the same shared point, so `transport_dh_client` and
//! `transport_dh_server` differ only in which keypair plays which role.

use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, KeyExchangeNonce, SessionKey, hash};

/// X25519 private key (32 bytes). Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(x25519_dalek::StaticSecret);

/// X25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(x25519_dalek::PublicKey);

impl PrivateKey {
    /// Generate a new random private key with RFC 7748 clamping.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(x25519_dalek::StaticSecret::random_from_rng(rng))
    }

    /// Derive the public key from this private key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(x25519_dalek::PublicKey::from(&self.0))
    }

    /// Raw Diffie-Hellman. Returns `None` for a low-order peer point.
    #[must_use]
    fn exchange(&self, peer: &PublicKey) -> Option<[u8; 32]> {
        let shared = self.0.diffie_hellman(&peer.0);
        if shared.as_bytes() == &[0u8; 32] {
            return None;
        }
        Some(*shared.as_bytes())
    }

    /// Export as bytes. The returned bytes contain the raw private key.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Import from bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(x25519_dalek::StaticSecret::from(bytes))
    }
}

impl PublicKey {
    /// Export public key as bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        *self.0.as_bytes()
    }

    /// Import public key from bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(x25519_dalek::PublicKey::from(bytes))
    }

    /// Get bytes as a reference.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

/// Generate a fresh transport/encryption keypair secret.
///
/// # Errors
///
/// Never fails today; the `Result` mirrors the fallible CSPRNG path used
/// elsewhere in this crate.
pub fn encryption_keygen() -> Result<PrivateKey, CryptoError> {
    let seed = crate::random::random_32()?;
    Ok(PrivateKey::from_bytes(seed))
}

fn transport_dh(
    remote: &PublicKey,
    local: &PrivateKey,
    nonce: &KeyExchangeNonce,
) -> Result<SessionKey, CryptoError> {
    let mut shared = local
        .exchange(remote)
        .ok_or(CryptoError::KeyExchangeFailed)?;
    let key = SessionKey::from_bytes(hash::keyed(nonce, &shared));
    shared.zeroize();
    Ok(key)
}

/// Derive the session key as the handshake initiator.
///
/// `remote` is the responder's transport public key (from its dial
/// information), `local` is our encryption secret, `nonce` is the N we
/// send in the link intro.
pub fn transport_dh_client(
    remote: &PublicKey,
    local: &PrivateKey,
    nonce: &KeyExchangeNonce,
) -> Result<SessionKey, CryptoError> {
    transport_dh(remote, local, nonce)
}

/// Derive the session key as the handshake responder.
///
/// `remote` is the initiator's encryption public key (from its router
/// contact), `local` is our transport secret, `nonce` is the N carried in
/// the received link intro.
pub fn transport_dh_server(
    remote: &PublicKey,
    local: &PrivateKey,
    nonce: &KeyExchangeNonce,
) -> Result<SessionKey, CryptoError> {
    transport_dh(remote, local, nonce)
}
