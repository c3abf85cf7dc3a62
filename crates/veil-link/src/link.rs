//! The link layer: owns the stream engine and the UDP socket, and
//! multiplexes datagrams and stream events into per-peer sessions.
//!
//! Sessions live in the address map; the pubkey map holds only addresses
//! and is populated when a session becomes ready. Stream events carry a
//! socket id that is resolved through a socket→address table, the
//! "userdata" back-reference: once an entry is gone or its session is
//! closed, late events fall through as no-ops.
//!
//! Closed sessions are never deallocated from inside event dispatch; they
//! stay in the maps until the next [`LinkLayer::tick`] sweep.

use std::collections::HashMap;
use std::net::SocketAddr;

use veil_crypto::CryptoError;
use veil_crypto::x25519::{self, PrivateKey, PublicKey};

use crate::config::LinkConfig;
use crate::contact::{AddressInfo, IdentityKey, RouterContact};
use crate::router::Router;
use crate::session::{Session, SessionState};
use crate::stream::{SocketId, StreamContext, StreamEvent};
use crate::udp::DatagramSocket;
use crate::{LINK_NAME, LINK_RANK};

/// One link layer instance: stream engine, UDP socket, session maps, and
/// the transport identity.
pub struct LinkLayer<C: StreamContext, U: DatagramSocket> {
    ctx: C,
    udp: U,
    transport_secret: PrivateKey,
    config: LinkConfig,
    sessions: HashMap<SocketAddr, Session>,
    by_pubkey: HashMap<IdentityKey, SocketAddr>,
    socks: HashMap<SocketId, SocketAddr>,
}

impl<C: StreamContext, U: DatagramSocket> LinkLayer<C, U> {
    /// Build a link layer around a stream engine and a UDP socket.
    pub fn new(mut ctx: C, udp: U, transport_secret: PrivateKey, config: LinkConfig) -> Self {
        ctx.configure(&config.context_options());
        Self {
            ctx,
            udp,
            transport_secret,
            config,
            sessions: HashMap::new(),
            by_pubkey: HashMap::new(),
            socks: HashMap::new(),
        }
    }

    /// Link layer name, for link selection.
    #[must_use]
    pub fn name(&self) -> &'static str {
        LINK_NAME
    }

    /// Priority rank among link layers.
    #[must_use]
    pub fn rank(&self) -> u16 {
        LINK_RANK
    }

    /// Generate a fresh transport secret.
    ///
    /// # Errors
    ///
    /// Propagates CSPRNG failure.
    pub fn keygen() -> Result<PrivateKey, CryptoError> {
        x25519::encryption_keygen()
    }

    /// Public half of this link's transport identity; peers dial it.
    #[must_use]
    pub fn transport_pubkey(&self) -> PublicKey {
        self.transport_secret.public_key()
    }

    /// Dial a peer at one of its addresses. Returns false when a session
    /// for that address already exists.
    pub fn connect_to(
        &mut self,
        router: &mut dyn Router,
        rc: RouterContact,
        ai: &AddressInfo,
        now: u64,
    ) -> bool {
        if self.sessions.contains_key(&ai.addr) {
            tracing::debug!(remote = %ai.addr, "session already exists");
            return false;
        }
        let sock = self.ctx.create_socket();
        let mut session = Session::outbound(sock, rc, ai, self.config.session_timeout_ms, now);
        session.start(&mut self.ctx);
        self.socks.insert(sock, ai.addr);
        self.sessions.insert(ai.addr, session);
        self.drive(router, now);
        true
    }

    /// Feed one received UDP datagram to the stream engine and handle
    /// whatever falls out.
    pub fn recv_from(
        &mut self,
        router: &mut dyn Router,
        datagram: &[u8],
        from: SocketAddr,
        now: u64,
    ) {
        if !self.ctx.process_udp(datagram, from) {
            tracing::debug!(%from, len = datagram.len(), "datagram not for stream engine");
        }
        self.drive(router, now);
    }

    /// Flush deferred acks and pump every session's send queue.
    pub fn pump(&mut self, router: &mut dyn Router, now: u64) {
        self.ctx.issue_deferred_acks();
        for session in self.sessions.values_mut() {
            session.pump(&mut self.ctx);
        }
        self.drive(router, now);
    }

    /// Periodic maintenance: engine timeouts, keepalives, the inactivity
    /// sweep, and collection of closed sessions.
    pub fn tick(&mut self, router: &mut dyn Router, now: u64) {
        self.ctx.check_timeouts(now);
        for session in self.sessions.values_mut() {
            session.tick(
                &mut self.ctx,
                self.config.keepalive,
                self.config.max_send_queue,
                now,
            );
            if session.state() != SessionState::Closed && session.timed_out(now) {
                tracing::warn!(
                    remote = %session.remote_endpoint(),
                    "session inactivity timeout"
                );
                session.close(&mut self.ctx);
            }
        }
        self.drive(router, now);
        self.sweep_closed();
    }

    /// Send one logical message to an established peer. Returns false
    /// when no ready session exists or the message is dropped.
    pub fn send_to(&mut self, pubkey: &IdentityKey, msg: &[u8], now: u64) -> bool {
        let Some(addr) = self.by_pubkey.get(pubkey).copied() else {
            tracing::debug!(to = %hex::encode(&pubkey[..8]), "no session for pubkey");
            return false;
        };
        let Some(session) = self.sessions.get_mut(&addr) else {
            return false;
        };
        let sent = session.send_message(&mut self.ctx, msg, self.config.max_send_queue, now);
        self.flush_transmits();
        sent
    }

    /// Close the session to a peer, if any. The record is collected at
    /// the next tick.
    pub fn close_peer(&mut self, pubkey: &IdentityKey) -> bool {
        let Some(addr) = self.by_pubkey.get(pubkey).copied() else {
            return false;
        };
        if let Some(session) = self.sessions.get_mut(&addr) {
            session.close(&mut self.ctx);
        }
        self.flush_transmits();
        true
    }

    /// Whether a ready session to this peer exists.
    #[must_use]
    pub fn is_connected_to(&self, pubkey: &IdentityKey) -> bool {
        self.by_pubkey
            .get(pubkey)
            .and_then(|addr| self.sessions.get(addr))
            .is_some_and(|s| s.state() == SessionState::SessionReady)
    }

    /// Number of live session records, closed-but-unswept included.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The session record for an address, if any.
    #[must_use]
    pub fn session_at(&self, addr: &SocketAddr) -> Option<&Session> {
        self.sessions.get(addr)
    }

    /// Direct access to the stream engine, for engine-specific
    /// maintenance the link layer does not mediate.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    fn drive(&mut self, router: &mut dyn Router, now: u64) {
        while let Some(event) = self.ctx.poll_event() {
            match event {
                StreamEvent::Accepted { sock, from } => self.on_accept(sock, from, now),
                StreamEvent::Connected { sock } => self.on_connected(router, sock, now),
                StreamEvent::Writable { sock } => {
                    if let Some(addr) = self.socks.get(&sock).copied() {
                        if let Some(session) = self.sessions.get_mut(&addr) {
                            session.on_writable(&mut self.ctx);
                        }
                    }
                }
                StreamEvent::Read { sock, data } => self.on_read(router, sock, &data, now),
                StreamEvent::Eof { sock } => {
                    if let Some(addr) = self.socks.get(&sock).copied() {
                        if let Some(session) = self.sessions.get_mut(&addr) {
                            tracing::debug!(remote = %addr, "got eof");
                            session.close(&mut self.ctx);
                        }
                    }
                }
                StreamEvent::Error { sock, code } => {
                    tracing::error!(%sock, %code, "stream error");
                }
            }
        }
        self.flush_transmits();
    }

    fn on_accept(&mut self, sock: SocketId, from: SocketAddr, now: u64) {
        tracing::debug!(remote = %from, "accepted inbound stream");
        if let Some(old) = self.sessions.get_mut(&from) {
            tracing::warn!(remote = %from, "replacing existing session on accept");
            old.close(&mut self.ctx);
            let old_sock = old.sock();
            let old_pubkey = old.remote_pubkey();
            self.socks.remove(&old_sock);
            if let Some(pk) = old_pubkey {
                if self.by_pubkey.get(&pk) == Some(&from) {
                    self.by_pubkey.remove(&pk);
                }
            }
        }
        let mut session = Session::inbound(sock, from, self.config.session_timeout_ms, now);
        session.accepted();
        self.socks.insert(sock, from);
        self.sessions.insert(from, session);
    }

    fn on_connected(&mut self, router: &mut dyn Router, sock: SocketId, now: u64) {
        let Some(addr) = self.socks.get(&sock).copied() else {
            tracing::debug!(%sock, "connect event for detached socket");
            return;
        };
        let Some(session) = self.sessions.get_mut(&addr) else {
            return;
        };
        if session.state() == SessionState::Closed {
            return;
        }
        match session.on_connected(&mut self.ctx, router, now) {
            Ok(true) => self.register_established(router, addr, now),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(remote = %addr, %err, "outbound handshake failed");
                session.close(&mut self.ctx);
            }
        }
    }

    fn on_read(&mut self, router: &mut dyn Router, sock: SocketId, data: &[u8], now: u64) {
        let Some(addr) = self.socks.get(&sock).copied() else {
            tracing::warn!(%sock, "data with no underlying session");
            return;
        };
        let Some(session) = self.sessions.get_mut(&addr) else {
            return;
        };
        match session.state() {
            SessionState::Closed => {}
            SessionState::SessionReady => {
                if let Err(err) = session.recv(router, data, now) {
                    tracing::warn!(remote = %addr, %err, "recv failed");
                    session.close(&mut self.ctx);
                    return;
                }
                self.ctx.read_drained(sock);
            }
            SessionState::LinkEstablished => {
                match session.recv_handshake(router, &self.transport_secret, data, now) {
                    Ok(leftover) => {
                        self.ctx.read_drained(sock);
                        self.register_established(router, addr, now);
                        if !leftover.is_empty() {
                            if let Some(session) = self.sessions.get_mut(&addr) {
                                if let Err(err) = session.recv(router, &leftover, now) {
                                    tracing::warn!(
                                        remote = %addr,
                                        %err,
                                        "recv of coalesced data failed"
                                    );
                                    session.close(&mut self.ctx);
                                }
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(remote = %addr, %err, "inbound handshake failed");
                        session.close(&mut self.ctx);
                    }
                }
            }
            SessionState::Initial | SessionState::Connecting => {
                tracing::warn!(remote = %addr, "data before link established");
            }
        }
    }

    /// A session reached `SessionReady`: map its pubkey, resolve any
    /// duplicate (the older session is closed, the newer adopted), notify
    /// the router exactly once, and prime the keepalive.
    fn register_established(&mut self, router: &mut dyn Router, addr: SocketAddr, now: u64) {
        let Some(session) = self.sessions.get_mut(&addr) else {
            return;
        };
        let Some(rc) = session.remote_rc().cloned() else {
            return;
        };
        if let Some(old_addr) = self.by_pubkey.insert(rc.identity, addr) {
            if old_addr != addr {
                tracing::warn!(
                    peer = %hex::encode(&rc.identity[..8]),
                    old = %old_addr,
                    new = %addr,
                    "duplicate session for peer, closing older"
                );
                if let Some(old) = self.sessions.get_mut(&old_addr) {
                    old.close(&mut self.ctx);
                }
            }
        }
        tracing::info!(
            peer = %hex::encode(&rc.identity[..8]),
            remote = %addr,
            "session established"
        );
        router.handle_session_established(&rc);
        if self.config.keepalive {
            if let Some(session) = self.sessions.get_mut(&addr) {
                session.tick(&mut self.ctx, true, self.config.max_send_queue, now);
            }
        }
    }

    fn sweep_closed(&mut self) {
        let closed: Vec<SocketAddr> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.state() == SessionState::Closed)
            .map(|(addr, _)| *addr)
            .collect();
        for addr in closed {
            if let Some(session) = self.sessions.remove(&addr) {
                self.socks.remove(&session.sock());
                if let Some(pk) = session.remote_pubkey() {
                    if self.by_pubkey.get(&pk) == Some(&addr) {
                        self.by_pubkey.remove(&pk);
                    }
                }
                tracing::debug!(remote = %addr, "session record collected");
            }
        }
    }

    fn flush_transmits(&mut self) {
        while let Some(t) = self.ctx.poll_transmit() {
            if let Err(err) = self.udp.send_to(t.to, &t.data) {
                tracing::error!(to = %t.to, %err, "sendto failed");
            }
        }
    }
}
