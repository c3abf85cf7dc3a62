//! Shared fixtures: a scripted stream engine, a recording router, and a
//! two-link harness wired back to back at the stream boundary.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use rand_core::OsRng;
use veil_crypto::signatures::{Signature, SigningKey};
use veil_crypto::x25519::{self, PrivateKey, PublicKey};
use veil_crypto::{KeyExchangeNonce, SessionKey};

use veil_link::contact::{AddressInfo, IdentityKey, RouterContact};
use veil_link::handshake::encode_handshake;
use veil_link::messages::LinkIntro;
use veil_link::router::Router;
use veil_link::stream::{ContextOptions, SocketId, StreamContext, StreamEvent, Transmit};
use veil_link::udp::DatagramSocket;
use veil_link::{LinkConfig, LinkLayer};

/// Deterministic in-memory stream engine. Tests push the events a real
/// engine would surface and read back what the link layer wrote.
pub struct ScriptedContext {
    next_sock: u64,
    events: VecDeque<StreamEvent>,
    written: HashMap<SocketId, Vec<u8>>,
    caps: VecDeque<usize>,
    pub shutdowns: HashMap<SocketId, usize>,
    pub closes: HashMap<SocketId, usize>,
    pub connects: Vec<(SocketId, SocketAddr)>,
    pub drained: Vec<SocketId>,
    pub options: Option<ContextOptions>,
}

impl ScriptedContext {
    pub fn new() -> Self {
        Self {
            next_sock: 1,
            events: VecDeque::new(),
            written: HashMap::new(),
            caps: VecDeque::new(),
            shutdowns: HashMap::new(),
            closes: HashMap::new(),
            connects: Vec::new(),
            drained: Vec::new(),
            options: None,
        }
    }

    /// Script the engine to accept at most these byte counts on the next
    /// writes, in order. Unscripted writes accept everything.
    pub fn cap_next_writes(&mut self, caps: &[usize]) {
        self.caps.extend(caps.iter().copied());
    }

    /// The socket most recently created by the link layer.
    pub fn last_socket(&self) -> SocketId {
        SocketId(self.next_sock - 1)
    }

    /// Simulate a remote opening a stream to us.
    pub fn fire_accept(&mut self, from: SocketAddr) -> SocketId {
        let sock = SocketId(self.next_sock);
        self.next_sock += 1;
        self.events.push_back(StreamEvent::Accepted { sock, from });
        sock
    }

    pub fn fire_connected(&mut self, sock: SocketId) {
        self.events.push_back(StreamEvent::Connected { sock });
    }

    pub fn fire_read(&mut self, sock: SocketId, data: Vec<u8>) {
        self.events.push_back(StreamEvent::Read { sock, data });
    }

    pub fn fire_writable(&mut self, sock: SocketId) {
        self.events.push_back(StreamEvent::Writable { sock });
    }

    pub fn fire_eof(&mut self, sock: SocketId) {
        self.events.push_back(StreamEvent::Eof { sock });
    }

    /// Drain everything the link layer has written to a socket.
    pub fn take_written(&mut self, sock: SocketId) -> Vec<u8> {
        self.written.remove(&sock).unwrap_or_default()
    }

    pub fn written_len(&self, sock: SocketId) -> usize {
        self.written.get(&sock).map_or(0, Vec::len)
    }
}

impl Default for ScriptedContext {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamContext for ScriptedContext {
    fn configure(&mut self, opts: &ContextOptions) {
        self.options = Some(opts.clone());
    }

    fn create_socket(&mut self) -> SocketId {
        let sock = SocketId(self.next_sock);
        self.next_sock += 1;
        sock
    }

    fn connect(&mut self, sock: SocketId, remote: SocketAddr) {
        self.connects.push((sock, remote));
    }

    fn write(&mut self, sock: SocketId, data: &[u8]) -> usize {
        let cap = self.caps.pop_front().unwrap_or(usize::MAX);
        let n = data.len().min(cap);
        self.written.entry(sock).or_default().extend_from_slice(&data[..n]);
        n
    }

    fn shutdown(&mut self, sock: SocketId) {
        *self.shutdowns.entry(sock).or_default() += 1;
    }

    fn close(&mut self, sock: SocketId) {
        *self.closes.entry(sock).or_default() += 1;
    }

    fn read_drained(&mut self, sock: SocketId) {
        self.drained.push(sock);
    }

    fn process_udp(&mut self, _datagram: &[u8], _from: SocketAddr) -> bool {
        true
    }

    fn process_icmp_fragmentation(&mut self, _from: SocketAddr, _mtu: u32) {}

    fn issue_deferred_acks(&mut self) {}

    fn check_timeouts(&mut self, _now_ms: u64) {}

    fn poll_event(&mut self) -> Option<StreamEvent> {
        self.events.pop_front()
    }

    fn poll_transmit(&mut self) -> Option<Transmit> {
        None
    }
}

/// Discards transmits; these tests drive the stream boundary directly.
#[derive(Default)]
pub struct NullUdp {
    pub sent: Vec<(SocketAddr, Vec<u8>)>,
}

impl DatagramSocket for NullUdp {
    fn send_to(&mut self, to: SocketAddr, data: &[u8]) -> std::io::Result<usize> {
        self.sent.push((to, data.to_vec()));
        Ok(data.len())
    }
}

/// Records everything the link layer reports.
pub struct TestRouter {
    pub rc: RouterContact,
    pub enc: PrivateKey,
    pub established: Vec<RouterContact>,
    pub messages: Vec<(IdentityKey, Vec<u8>)>,
    pub accept_intro: bool,
    pub accept_messages: bool,
}

impl TestRouter {
    /// A router listening at `addr` behind a link whose transport public
    /// key is `transport_key`.
    pub fn new(addr: SocketAddr, transport_key: PublicKey) -> Self {
        let identity = SigningKey::generate(&mut OsRng);
        let enc = PrivateKey::generate(&mut OsRng);
        let mut rc = RouterContact {
            addrs: vec![AddressInfo {
                addr,
                transport_key,
            }],
            enckey: enc.public_key(),
            identity: identity.verifying_key().to_bytes(),
            version: 0,
            signature: Signature::from_bytes([0u8; 64]),
        };
        rc.sign(&identity);
        Self {
            rc,
            enc,
            established: Vec::new(),
            messages: Vec::new(),
            accept_intro: true,
            accept_messages: true,
        }
    }

    pub fn identity(&self) -> IdentityKey {
        self.rc.identity
    }
}

impl Router for TestRouter {
    fn contact(&self) -> &RouterContact {
        &self.rc
    }

    fn encryption_secret(&self) -> &PrivateKey {
        &self.enc
    }

    fn handle_intro(&mut self, intro: &LinkIntro) -> bool {
        self.accept_intro && intro.rc.verify()
    }

    fn handle_link_message(&mut self, from: &IdentityKey, msg: &[u8]) -> bool {
        self.messages.push((*from, msg.to_vec()));
        self.accept_messages
    }

    fn handle_session_established(&mut self, rc: &RouterContact) {
        self.established.push(rc.clone());
    }
}

pub type TestLink = LinkLayer<ScriptedContext, NullUdp>;

pub fn a_addr() -> SocketAddr {
    "10.1.0.1:7100".parse().unwrap()
}

pub fn b_addr() -> SocketAddr {
    "10.1.0.2:7200".parse().unwrap()
}

/// Two link layers joined at the stream boundary: bytes written by one
/// side are delivered to the other as read events.
pub struct Pair {
    pub a: TestLink,
    pub b: TestLink,
    pub ra: TestRouter,
    pub rb: TestRouter,
    /// A's socket toward B
    pub sa: SocketId,
    /// B's socket toward A
    pub sb: SocketId,
}

/// Build two links and routers, with A holding B's contact.
pub fn make_pair(config: LinkConfig) -> Pair {
    let a_secret = PrivateKey::generate(&mut OsRng);
    let b_secret = PrivateKey::generate(&mut OsRng);
    let a = LinkLayer::new(
        ScriptedContext::new(),
        NullUdp::default(),
        a_secret,
        config.clone(),
    );
    let b = LinkLayer::new(
        ScriptedContext::new(),
        NullUdp::default(),
        b_secret,
        config,
    );
    let ra = TestRouter::new(a_addr(), a.transport_pubkey());
    let rb = TestRouter::new(b_addr(), b.transport_pubkey());
    Pair {
        a,
        b,
        ra,
        rb,
        sa: SocketId(0),
        sb: SocketId(0),
    }
}

impl Pair {
    /// Dial from A to B and run the handshake to completion on both
    /// sides. After this both routers saw establishment.
    pub fn establish(&mut self, now: u64) {
        let ai = self.rb.rc.addrs[0];
        assert!(self.a.connect_to(&mut self.ra, self.rb.rc.clone(), &ai, now));
        self.sa = self.a.context_mut().last_socket();
        self.a.context_mut().fire_connected(self.sa);
        self.a.pump(&mut self.ra, now);

        let blob = self.a.context_mut().take_written(self.sa);
        assert!(!blob.is_empty(), "initiator must send a handshake");
        self.sb = self.b.context_mut().fire_accept(a_addr());
        self.b.pump(&mut self.rb, now);
        self.b.context_mut().fire_read(self.sb, blob);
        self.b.pump(&mut self.rb, now);
    }

    /// Deliver everything A has written to B, in one chunk.
    pub fn flow_a_to_b(&mut self, now: u64) {
        let bytes = self.a.context_mut().take_written(self.sa);
        if !bytes.is_empty() {
            self.b.context_mut().fire_read(self.sb, bytes);
            self.b.pump(&mut self.rb, now);
        }
    }

    /// Deliver everything B has written to A, in one chunk.
    pub fn flow_b_to_a(&mut self, now: u64) {
        let bytes = self.b.context_mut().take_written(self.sb);
        if !bytes.is_empty() {
            self.a.context_mut().fire_read(self.sa, bytes);
            self.a.pump(&mut self.ra, now);
        }
    }

    /// Deliver everything A has written to B, split at the given sizes.
    pub fn flow_a_to_b_chunked(&mut self, sizes: &[usize], now: u64) {
        let bytes = self.a.context_mut().take_written(self.sa);
        let mut rest = &bytes[..];
        for &size in sizes {
            if rest.is_empty() {
                break;
            }
            let take = size.min(rest.len());
            self.b
                .context_mut()
                .fire_read(self.sb, rest[..take].to_vec());
            rest = &rest[take..];
        }
        if !rest.is_empty() {
            self.b.context_mut().fire_read(self.sb, rest.to_vec());
        }
        self.b.pump(&mut self.rb, now);
    }
}

/// Seal a whole message the way a sending session does: 512-byte chunks,
/// last one flagged, an empty message as a single empty final fragment.
pub fn seal_message(msg: &[u8], key: &SessionKey) -> Vec<u8> {
    use veil_link::{FRAGMENT_BODY_PAYLOAD_SIZE, fragment};

    let mut wire = Vec::new();
    if msg.is_empty() {
        wire.extend_from_slice(&fragment::seal(&[], true, key).expect("seal"));
        return wire;
    }
    let count = msg.len().div_ceil(FRAGMENT_BODY_PAYLOAD_SIZE);
    for (i, chunk) in msg.chunks(FRAGMENT_BODY_PAYLOAD_SIZE).enumerate() {
        wire.extend_from_slice(&fragment::seal(chunk, i == count - 1, key).expect("seal"));
    }
    wire
}

/// Build the cleartext handshake frame and the session key an initiator
/// with this contact would derive toward a responder transport key.
pub fn craft_handshake(
    rc: &RouterContact,
    enc: &PrivateKey,
    responder_transport: &PublicKey,
    nonce: KeyExchangeNonce,
) -> (Vec<u8>, SessionKey) {
    let intro = LinkIntro {
        rc: rc.clone(),
        nonce,
    };
    let frame = encode_handshake(&intro).expect("intro fits in a handshake frame");
    let key = x25519::transport_dh_client(responder_transport, enc, &nonce)
        .expect("test keys are well-formed");
    (frame, key)
}
