//! Link-level message bodies: the link intro and the discard keepalive.

use veil_crypto::KeyExchangeNonce;

use crate::bencode::{self, Value};
use crate::contact::RouterContact;
use crate::error::DecodeError;

/// The one-shot introduction the initiator sends in cleartext after the
/// stream connects: its router contact plus the key-exchange nonce N.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIntro {
    /// The initiator's signed router contact
    pub rc: RouterContact,
    /// Key-exchange nonce mixed into the transport DH
    pub nonce: KeyExchangeNonce,
}

impl LinkIntro {
    /// Encode the intro body.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        bencode::begin_dict(&mut out);
        bencode::put_bytes(&mut out, b"a");
        bencode::put_bytes(&mut out, b"i");
        bencode::put_bytes(&mut out, b"n");
        bencode::put_bytes(&mut out, &self.nonce);
        bencode::put_bytes(&mut out, b"r");
        out.extend_from_slice(&self.rc.encode());
        bencode::put_bytes(&mut out, b"v");
        bencode::put_int(&mut out, 0);
        bencode::end(&mut out);
        out
    }

    /// Decode an intro body.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let value = Value::decode(buf)?;
        let kind = value
            .dict_get(b"a")
            .ok_or(DecodeError::MissingField("a"))?
            .as_bytes()
            .ok_or(DecodeError::InvalidField("a"))?;
        if kind != b"i" {
            return Err(DecodeError::InvalidField("a"));
        }
        let nonce: KeyExchangeNonce = value
            .dict_get(b"n")
            .ok_or(DecodeError::MissingField("n"))?
            .as_bytes()
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::InvalidField("n"))?;
        let rc = value
            .dict_get(b"r")
            .ok_or(DecodeError::MissingField("r"))
            .and_then(RouterContact::from_value)?;
        Ok(Self { rc, nonce })
    }
}

/// Encode a discard message: the minimal keepalive body peers drop on
/// receipt.
#[must_use]
pub fn encode_discard() -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    bencode::begin_dict(&mut out);
    bencode::put_bytes(&mut out, b"a");
    bencode::put_bytes(&mut out, b"x");
    bencode::end(&mut out);
    out
}

/// True if the bytes are a discard message.
#[must_use]
pub fn is_discard(buf: &[u8]) -> bool {
    Value::decode(buf)
        .ok()
        .and_then(|v| v.dict_get(b"a").and_then(Value::as_bytes).map(|a| a == b"x"))
        .unwrap_or(false)
}
