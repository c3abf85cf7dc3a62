//! Error types for the link layer.

use thiserror::Error;

use crate::{FRAGMENT_BODY_PAYLOAD_SIZE, MAX_LINK_MSG_SIZE};

/// Top-level link errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// Send attempted on a session that is not ready
    #[error("session not ready")]
    NotReady,

    /// Fragment-level error
    #[error("fragment error: {0}")]
    Fragment(#[from] FragmentError),

    /// Handshake error
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Cryptographic error
    #[error("crypto error: {0}")]
    Crypto(#[from] veil_crypto::CryptoError),

    /// The router rejected a delivered link message
    #[error("link message rejected by router")]
    Rejected,

    /// Inactivity timeout reached
    #[error("session timed out")]
    Timeout,
}

/// Fragment-level errors
#[derive(Debug, Error)]
pub enum FragmentError {
    /// MAC mismatch on a received fragment
    #[error("fragment integrity check failed")]
    Integrity,

    /// Decrypted header declares an impossible payload length
    #[error("malformed fragment: length {0} exceeds {FRAGMENT_BODY_PAYLOAD_SIZE}")]
    Malformed(u32),

    /// Payload handed to seal exceeds the fragment capacity
    #[error("payload of {0} bytes does not fit in one fragment")]
    PayloadTooLarge(usize),

    /// Reassembly would exceed the maximum link message size
    #[error("reassembled message would exceed {MAX_LINK_MSG_SIZE} bytes")]
    OversizeMessage,
}

/// Handshake errors
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// First delivery shorter than the 8-byte handshake header
    #[error("handshake shorter than header")]
    Truncated,

    /// Protocol version field did not match ours
    #[error("protocol version mismatch: got {got}, expected {expected}")]
    VersionMismatch {
        /// Version the peer sent
        got: u32,
        /// Version we require
        expected: u32,
    },

    /// Declared intro size exceeds the bytes actually received
    #[error("declared intro size {declared} exceeds received {available} bytes")]
    ShortHandshake {
        /// Size the header declared
        declared: u32,
        /// Bytes available after the header
        available: usize,
    },

    /// The router rejected the link intro
    #[error("link intro rejected")]
    BadIntro,

    /// Our own intro does not fit in a handshake frame
    #[error("link intro too large for handshake frame")]
    IntroTooLarge,

    /// Intro body failed to decode
    #[error("intro decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Wire decoding errors (bencode and fixed-width fields)
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input ended before the value did
    #[error("truncated input")]
    Truncated,

    /// A byte that cannot start or continue a value at this position
    #[error("unexpected byte 0x{0:02x}")]
    UnexpectedByte(u8),

    /// A declared length that cannot be satisfied or parsed
    #[error("invalid length")]
    BadLength,

    /// A required dictionary key was absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field decoded to the wrong type or an invalid value
    #[error("invalid field: {0}")]
    InvalidField(&'static str),
}
