//! `XChaCha20` in-place stream encryption.
//!
//! The fragment envelope is encrypt-then-MAC: the body is encrypted with
//! the raw XChaCha20 stream cipher and integrity comes from a detached
//! keyed hash, so no AEAD construction is used here.

use chacha20::XChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher};

use crate::{SessionKey, XCHACHA_NONCE_SIZE};

/// Encrypt or decrypt `buf` in place with XChaCha20.
///
/// The operation is an involution: applying it twice with the same key and
/// nonce restores the original bytes.
pub fn xchacha20(buf: &mut [u8], key: &SessionKey, nonce: &[u8; XCHACHA_NONCE_SIZE]) {
    let mut cipher = XChaCha20::new(key.as_bytes().into(), nonce.into());
    cipher.apply_keystream(buf);
}
