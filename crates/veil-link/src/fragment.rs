//! Fragment sealing, opening, and message reassembly.
//!
//! Every data fragment is a fixed 576-byte unit:
//!
//! ```text
//! [ 0..32)   keyed-hash tag over bytes [32..576)
//! [32..56)   random cipher nonce
//! [56..576)  XChaCha20 ciphertext of:
//!              [0..4)    flag, big-endian: 0 = last fragment, 1 = more
//!              [4..8)    payload length, big-endian, at most 512
//!              [8..520)  payload, unused tail randomized before encryption
//! ```
//!
//! The whole buffer is randomized before the header and payload are
//! written, so the unused payload tail rides under the MAC as random
//! bytes rather than a known-plaintext pattern.

use veil_crypto::{SessionKey, constant_time, hash, random};

use crate::error::{FragmentError, LinkError};
use crate::{
    FRAGMENT_BODY_PAYLOAD_SIZE, FRAGMENT_BUFFER_SIZE, FRAGMENT_HASH_SIZE, FRAGMENT_NONCE_SIZE,
    FRAGMENT_OVERHEAD_SIZE, MAX_LINK_MSG_SIZE,
};

/// One wire fragment.
pub type FragmentBuffer = [u8; FRAGMENT_BUFFER_SIZE];

const HEADER_END: usize = FRAGMENT_OVERHEAD_SIZE + 8;

fn read_u32_be(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Seal a payload into a fragment: randomize, write header and payload,
/// encrypt the body, tag the nonce-and-ciphertext region.
///
/// # Errors
///
/// Fails with [`FragmentError::PayloadTooLarge`] when the payload exceeds
/// the 512-byte fragment capacity, or if the CSPRNG fails.
pub fn seal(
    payload: &[u8],
    is_last: bool,
    key: &SessionKey,
) -> Result<FragmentBuffer, LinkError> {
    if payload.len() > FRAGMENT_BODY_PAYLOAD_SIZE {
        return Err(FragmentError::PayloadTooLarge(payload.len()).into());
    }
    let mut buf: FragmentBuffer = [0u8; FRAGMENT_BUFFER_SIZE];
    random::fill_random(&mut buf).map_err(LinkError::Crypto)?;

    let flag: u32 = if is_last { 0 } else { 1 };
    buf[FRAGMENT_OVERHEAD_SIZE..FRAGMENT_OVERHEAD_SIZE + 4].copy_from_slice(&flag.to_be_bytes());
    buf[FRAGMENT_OVERHEAD_SIZE + 4..HEADER_END]
        .copy_from_slice(&(payload.len() as u32).to_be_bytes());
    buf[HEADER_END..HEADER_END + payload.len()].copy_from_slice(payload);

    let mut nonce = [0u8; FRAGMENT_NONCE_SIZE];
    nonce.copy_from_slice(&buf[FRAGMENT_HASH_SIZE..FRAGMENT_OVERHEAD_SIZE]);
    veil_crypto::cipher::xchacha20(&mut buf[FRAGMENT_OVERHEAD_SIZE..], key, &nonce);

    let tag = hash::mac(key, &buf[FRAGMENT_HASH_SIZE..]);
    buf[..FRAGMENT_HASH_SIZE].copy_from_slice(&tag);
    Ok(buf)
}

/// Verify and decrypt a fragment in place, yielding the payload slice and
/// whether this was the last fragment of its message.
///
/// # Errors
///
/// [`FragmentError::Integrity`] on tag mismatch (constant-time compare),
/// [`FragmentError::Malformed`] when the decrypted length field exceeds
/// the payload capacity.
pub fn open<'a>(
    buf: &'a mut FragmentBuffer,
    key: &SessionKey,
) -> Result<(&'a [u8], bool), FragmentError> {
    let expected = hash::mac(key, &buf[FRAGMENT_HASH_SIZE..]);
    let mut received = [0u8; FRAGMENT_HASH_SIZE];
    received.copy_from_slice(&buf[..FRAGMENT_HASH_SIZE]);
    if !constant_time::verify_32(&received, &expected) {
        return Err(FragmentError::Integrity);
    }

    let mut nonce = [0u8; FRAGMENT_NONCE_SIZE];
    nonce.copy_from_slice(&buf[FRAGMENT_HASH_SIZE..FRAGMENT_OVERHEAD_SIZE]);
    veil_crypto::cipher::xchacha20(&mut buf[FRAGMENT_OVERHEAD_SIZE..], key, &nonce);

    let flag = read_u32_be(&buf[FRAGMENT_OVERHEAD_SIZE..]);
    let len = read_u32_be(&buf[FRAGMENT_OVERHEAD_SIZE + 4..]);
    if len as usize > FRAGMENT_BODY_PAYLOAD_SIZE {
        return Err(FragmentError::Malformed(len));
    }
    Ok((&buf[HEADER_END..HEADER_END + len as usize], flag == 0))
}

/// Buffers decrypted fragment payloads into one full link message.
///
/// The reliable stream delivers fragments in send order, so reassembly is
/// pure concatenation; a `last` fragment yields the message and resets.
pub struct Reassembler {
    buf: Box<[u8; MAX_LINK_MSG_SIZE]>,
    offset: usize,
}

impl Reassembler {
    /// Fresh, empty reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Box::new([0u8; MAX_LINK_MSG_SIZE]),
            offset: 0,
        }
    }

    /// Append one decrypted payload. Returns the completed message when
    /// `is_last` is set.
    ///
    /// # Errors
    ///
    /// [`FragmentError::OversizeMessage`] when the payload would push the
    /// message past [`MAX_LINK_MSG_SIZE`].
    pub fn push(&mut self, payload: &[u8], is_last: bool) -> Result<Option<&[u8]>, FragmentError> {
        if self.offset + payload.len() > MAX_LINK_MSG_SIZE {
            return Err(FragmentError::OversizeMessage);
        }
        self.buf[self.offset..self.offset + payload.len()].copy_from_slice(payload);
        self.offset += payload.len();
        if is_last {
            let len = self.offset;
            self.offset = 0;
            Ok(Some(&self.buf[..len]))
        } else {
            Ok(None)
        }
    }

    /// Bytes buffered so far for the in-flight message.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.offset
    }

    /// Drop any partially assembled message.
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
