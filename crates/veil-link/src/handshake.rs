//! Handshake framing: the one-shot cleartext frame that opens a session.
//!
//! ```text
//! offset 0 : u32 big-endian  PROTOCOL_VERSION
//! offset 4 : u32 big-endian  intro body size
//! offset 8 : bencoded link intro
//! ```
//!
//! The frame is written directly to the reliable stream before any session
//! key exists. The stream may coalesce it with the peer's first sealed
//! fragments in a single delivery, so parsing returns any trailing bytes
//! for the fragment-stream path.

use crate::error::HandshakeError;
use crate::messages::LinkIntro;
use crate::{FRAGMENT_BUFFER_SIZE, PROTOCOL_VERSION};

/// Size of the cleartext handshake header.
pub const HANDSHAKE_HEADER_SIZE: usize = 8;

/// Parsed handshake header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    /// Protocol version the peer announced
    pub version: u32,
    /// Declared intro body size in bytes
    pub body_size: u32,
}

/// Encode the handshake frame for an outbound session.
///
/// # Errors
///
/// [`HandshakeError::IntroTooLarge`] when the encoded intro would not fit
/// in one handshake frame.
pub fn encode_handshake(intro: &LinkIntro) -> Result<Vec<u8>, HandshakeError> {
    let body = intro.encode();
    if HANDSHAKE_HEADER_SIZE + body.len() > FRAGMENT_BUFFER_SIZE {
        return Err(HandshakeError::IntroTooLarge);
    }
    let mut out = Vec::with_capacity(HANDSHAKE_HEADER_SIZE + body.len());
    out.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse and validate the handshake frame from the first delivery of an
/// inbound session. Returns the decoded intro and any trailing bytes,
/// which are the peer's first sealed fragments.
///
/// # Errors
///
/// [`HandshakeError::Truncated`] unless more than a header was delivered,
/// [`HandshakeError::VersionMismatch`] on any version other than ours,
/// [`HandshakeError::ShortHandshake`] when the declared body size exceeds
/// the bytes received, and a decode error if the intro body is malformed.
pub fn parse_handshake(buf: &[u8]) -> Result<(LinkIntro, &[u8]), HandshakeError> {
    if buf.len() <= HANDSHAKE_HEADER_SIZE {
        return Err(HandshakeError::Truncated);
    }
    let version = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if version != PROTOCOL_VERSION {
        return Err(HandshakeError::VersionMismatch {
            got: version,
            expected: PROTOCOL_VERSION,
        });
    }
    let body_size = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let available = buf.len() - HANDSHAKE_HEADER_SIZE;
    if body_size as usize > available {
        return Err(HandshakeError::ShortHandshake {
            declared: body_size,
            available,
        });
    }
    let body_end = HANDSHAKE_HEADER_SIZE + body_size as usize;
    let intro = LinkIntro::decode(&buf[HANDSHAKE_HEADER_SIZE..body_end])?;
    Ok((intro, &buf[body_end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;
    use veil_crypto::signatures::{Signature, SigningKey};
    use veil_crypto::x25519::PrivateKey;

    use crate::contact::{AddressInfo, RouterContact};

    fn intro() -> LinkIntro {
        let identity = SigningKey::generate(&mut OsRng);
        let mut rc = RouterContact {
            addrs: vec![AddressInfo {
                addr: "192.168.1.1:7100".parse().unwrap(),
                transport_key: PrivateKey::generate(&mut OsRng).public_key(),
            }],
            enckey: PrivateKey::generate(&mut OsRng).public_key(),
            identity: identity.verifying_key().to_bytes(),
            version: 0,
            signature: Signature::from_bytes([0u8; 64]),
        };
        rc.sign(&identity);
        LinkIntro {
            rc,
            nonce: [0x11; 32],
        }
    }

    #[test]
    fn encode_parse_roundtrip() {
        let intro = intro();
        let frame = encode_handshake(&intro).unwrap();
        let (parsed, leftover) = parse_handshake(&frame).unwrap();
        assert_eq!(parsed, intro);
        assert!(leftover.is_empty());
    }

    #[test]
    fn leftover_preserved() {
        let intro = intro();
        let mut frame = encode_handshake(&intro).unwrap();
        frame.extend_from_slice(b"first sealed fragment bytes");
        let (_, leftover) = parse_handshake(&frame).unwrap();
        assert_eq!(leftover, b"first sealed fragment bytes");
    }

    #[test]
    fn header_only_rejected() {
        let frame = encode_handshake(&intro()).unwrap();
        assert!(matches!(
            parse_handshake(&frame[..HANDSHAKE_HEADER_SIZE]),
            Err(HandshakeError::Truncated)
        ));
        assert!(matches!(
            parse_handshake(&[]),
            Err(HandshakeError::Truncated)
        ));
    }

    #[test]
    fn version_mismatch_rejected() {
        let mut frame = encode_handshake(&intro()).unwrap();
        let bad = PROTOCOL_VERSION.wrapping_sub(1);
        frame[..4].copy_from_slice(&bad.to_be_bytes());
        assert!(matches!(
            parse_handshake(&frame),
            Err(HandshakeError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn short_declared_size_rejected() {
        let frame = encode_handshake(&intro()).unwrap();
        // drop the last byte so the declared size exceeds what arrived
        assert!(matches!(
            parse_handshake(&frame[..frame.len() - 1]),
            Err(HandshakeError::ShortHandshake { .. })
        ));
    }
}
