//! # Veil Link
//!
//! Session-oriented, encrypted, authenticated, fragmented message transport
//! riding on a reliable datagram stream (a uTP-style connection over UDP).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        LinkLayer                             │
//! │  (stream context, UDP socket, addr→session, pubkey→session)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │                         Session                              │
//! │  (handshake, send queue, receive buffer, keepalive, timeout) │
//! ├──────────────────────────────────────────────────────────────┤
//! │                        Fragments                             │
//! │  (fixed 576-byte encrypt-then-MAC units, 512-byte payloads)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inbound: UDP datagram → stream context → ordered bytes per socket →
//! session → handshake codec or fragment codec → reassembler → router.
//! Outbound: message → fragments sealed onto a FIFO queue → pumped into the
//! stream context → UDP datagrams.
//!
//! The whole core runs single-threaded on the link thread; the only
//! cross-thread seam is the [`logic`] work queue.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod bencode;
pub mod config;
pub mod contact;
pub mod error;
pub mod fragment;
pub mod handshake;
pub mod link;
pub mod logic;
pub mod messages;
pub mod router;
pub mod session;
pub mod stream;
pub mod udp;

pub use config::LinkConfig;
pub use contact::{AddressInfo, IdentityKey, RouterContact};
pub use error::{DecodeError, FragmentError, HandshakeError, LinkError};
pub use fragment::{FragmentBuffer, Reassembler};
pub use link::LinkLayer;
pub use messages::LinkIntro;
pub use router::Router;
pub use session::{Session, SessionState};
pub use stream::{ContextOptions, SocketId, StreamContext, StreamEvent, Transmit};

/// Keyed-hash tag size at the front of each fragment
pub const FRAGMENT_HASH_SIZE: usize = 32;

/// Per-fragment cipher nonce size
pub const FRAGMENT_NONCE_SIZE: usize = 24;

/// Bytes of a fragment that precede the ciphertext region
pub const FRAGMENT_OVERHEAD_SIZE: usize = FRAGMENT_HASH_SIZE + FRAGMENT_NONCE_SIZE;

/// Encrypted header: flag and length, both big-endian u32
pub const FRAGMENT_BODY_OVERHEAD: usize = 8;

/// Maximum payload bytes carried by one fragment
pub const FRAGMENT_BODY_PAYLOAD_SIZE: usize = 512;

/// Plaintext body region: header plus payload
pub const FRAGMENT_BODY_SIZE: usize = FRAGMENT_BODY_OVERHEAD + FRAGMENT_BODY_PAYLOAD_SIZE;

/// Total wire size of one fragment
pub const FRAGMENT_BUFFER_SIZE: usize = FRAGMENT_OVERHEAD_SIZE + FRAGMENT_BODY_SIZE;

/// Maximum size of one reassembled link message
pub const MAX_LINK_MSG_SIZE: usize = 8192;

/// Link protocol version carried in the handshake header
pub const PROTOCOL_VERSION: u32 = 0;

/// Inactivity timeout for an established session, in milliseconds
pub const SESSION_TIMEOUT_MS: u64 = 30_000;

/// Link layer name, for link selection among multiple link layers
pub const LINK_NAME: &str = "utp";

/// Link layer rank (priority hint)
pub const LINK_RANK: u16 = 1;
