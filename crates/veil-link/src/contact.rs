//! Router contacts: the signed identity bundle peers exchange in the
//! link intro.
//!
//! A contact carries the router's Ed25519 identity key, its X25519
//! transport encryption key, and the addresses it listens on, all under
//! one identity signature. The signature covers the bencoded contact with
//! the signature field omitted.

use std::net::{IpAddr, SocketAddr};

use veil_crypto::signatures::{Signature, SigningKey};
use veil_crypto::x25519::PublicKey;

use crate::bencode::{self, Value};
use crate::error::DecodeError;

/// Raw Ed25519 identity key bytes; the key of the pubkey→session map.
pub type IdentityKey = [u8; 32];

/// One dialable address of a router: where to reach it and the transport
/// public key its link layer answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressInfo {
    /// UDP address the link listens on
    pub addr: SocketAddr,
    /// Transport public key for the handshake DH
    pub transport_key: PublicKey,
}

impl AddressInfo {
    fn encode_into(&self, out: &mut Vec<u8>) {
        bencode::begin_dict(out);
        bencode::put_bytes(out, b"h");
        bencode::put_bytes(out, self.addr.ip().to_string().as_bytes());
        bencode::put_bytes(out, b"p");
        bencode::put_int(out, i64::from(self.addr.port()));
        bencode::put_bytes(out, b"t");
        bencode::put_bytes(out, self.transport_key.as_bytes());
        bencode::end(out);
    }

    fn decode(value: &Value<'_>) -> Result<Self, DecodeError> {
        let host = value
            .dict_get(b"h")
            .ok_or(DecodeError::MissingField("h"))?
            .as_bytes()
            .ok_or(DecodeError::InvalidField("h"))?;
        let host = std::str::from_utf8(host)
            .ok()
            .and_then(|s| s.parse::<IpAddr>().ok())
            .ok_or(DecodeError::InvalidField("h"))?;
        let port = value
            .dict_get(b"p")
            .ok_or(DecodeError::MissingField("p"))?
            .as_int()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or(DecodeError::InvalidField("p"))?;
        let transport_key = value
            .dict_get(b"t")
            .ok_or(DecodeError::MissingField("t"))?
            .as_bytes()
            .and_then(|b| <[u8; 32]>::try_from(b).ok())
            .map(PublicKey::from_bytes)
            .ok_or(DecodeError::InvalidField("t"))?;
        Ok(Self {
            addr: SocketAddr::new(host, port),
            transport_key,
        })
    }
}

/// A router's signed identity bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterContact {
    /// Dialable addresses
    pub addrs: Vec<AddressInfo>,
    /// X25519 encryption public key (the initiator side of the handshake DH)
    pub enckey: PublicKey,
    /// Ed25519 identity public key
    pub identity: IdentityKey,
    /// Contact format version
    pub version: i64,
    /// Identity signature over the unsigned encoding
    pub signature: Signature,
}

impl RouterContact {
    /// Encode the full contact, signature included.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(192);
        self.encode_inner(&mut out, true);
        out
    }

    /// The byte string the identity signature covers.
    #[must_use]
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        self.encode_inner(&mut out, false);
        out
    }

    fn encode_inner(&self, out: &mut Vec<u8>, with_signature: bool) {
        bencode::begin_dict(out);
        bencode::put_bytes(out, b"a");
        bencode::begin_list(out);
        for ai in &self.addrs {
            ai.encode_into(out);
        }
        bencode::end(out);
        bencode::put_bytes(out, b"e");
        bencode::put_bytes(out, self.enckey.as_bytes());
        bencode::put_bytes(out, b"k");
        bencode::put_bytes(out, &self.identity);
        bencode::put_bytes(out, b"v");
        bencode::put_int(out, self.version);
        if with_signature {
            bencode::put_bytes(out, b"z");
            bencode::put_bytes(out, self.signature.as_bytes());
        }
        bencode::end(out);
    }

    /// Decode a contact from a bencode value.
    pub fn from_value(value: &Value<'_>) -> Result<Self, DecodeError> {
        let addrs = value
            .dict_get(b"a")
            .ok_or(DecodeError::MissingField("a"))?
            .as_list()
            .ok_or(DecodeError::InvalidField("a"))?
            .iter()
            .map(AddressInfo::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let enckey = value
            .dict_get(b"e")
            .ok_or(DecodeError::MissingField("e"))?
            .as_bytes()
            .and_then(|b| <[u8; 32]>::try_from(b).ok())
            .map(PublicKey::from_bytes)
            .ok_or(DecodeError::InvalidField("e"))?;
        let identity: IdentityKey = value
            .dict_get(b"k")
            .ok_or(DecodeError::MissingField("k"))?
            .as_bytes()
            .and_then(|b| <[u8; 32]>::try_from(b).ok())
            .ok_or(DecodeError::InvalidField("k"))?;
        let version = value
            .dict_get(b"v")
            .ok_or(DecodeError::MissingField("v"))?
            .as_int()
            .ok_or(DecodeError::InvalidField("v"))?;
        let signature = value
            .dict_get(b"z")
            .ok_or(DecodeError::MissingField("z"))?
            .as_bytes()
            .and_then(|b| Signature::from_slice(b).ok())
            .ok_or(DecodeError::InvalidField("z"))?;
        Ok(Self {
            addrs,
            enckey,
            identity,
            version,
            signature,
        })
    }

    /// Decode a contact from its encoded bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::from_value(&Value::decode(buf)?)
    }

    /// Sign the contact with the matching identity key, filling the
    /// signature field.
    pub fn sign(&mut self, key: &SigningKey) {
        self.signature = key.sign(&self.signable_bytes());
    }

    /// Verify the identity signature.
    #[must_use]
    pub fn verify(&self) -> bool {
        match veil_crypto::signatures::VerifyingKey::from_bytes(&self.identity) {
            Ok(key) => key.verify(&self.signable_bytes(), &self.signature),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;
    use veil_crypto::x25519::PrivateKey;

    fn test_contact() -> (RouterContact, SigningKey) {
        let identity = SigningKey::generate(&mut OsRng);
        let enc = PrivateKey::generate(&mut OsRng);
        let transport = PrivateKey::generate(&mut OsRng);
        let mut rc = RouterContact {
            addrs: vec![AddressInfo {
                addr: "127.0.0.1:7000".parse().unwrap(),
                transport_key: transport.public_key(),
            }],
            enckey: enc.public_key(),
            identity: identity.verifying_key().to_bytes(),
            version: 0,
            signature: Signature::from_bytes([0u8; 64]),
        };
        rc.sign(&identity);
        (rc, identity)
    }

    #[test]
    fn encode_decode_roundtrip() {
        let (rc, _) = test_contact();
        let decoded = RouterContact::decode(&rc.encode()).unwrap();
        assert_eq!(decoded, rc);
        assert!(decoded.verify());
    }

    #[test]
    fn tampered_contact_fails_verify() {
        let (rc, _) = test_contact();
        let mut decoded = RouterContact::decode(&rc.encode()).unwrap();
        decoded.version = 1;
        assert!(!decoded.verify());
    }

    #[test]
    fn missing_field_rejected() {
        assert!(matches!(
            RouterContact::decode(b"de"),
            Err(DecodeError::MissingField("a"))
        ));
    }

    #[test]
    fn ipv6_address_roundtrip() {
        let (mut rc, identity) = test_contact();
        rc.addrs[0].addr = "[::1]:9000".parse().unwrap();
        rc.sign(&identity);
        let decoded = RouterContact::decode(&rc.encode()).unwrap();
        assert_eq!(decoded.addrs[0].addr, rc.addrs[0].addr);
        assert!(decoded.verify());
    }
}
