//! Per-peer session state machine.
//!
//! A session drives one remote peer from dial or accept through the
//! cleartext handshake into the encrypted fragment stream, and owns the
//! send queue, receive buffer, and reassembly buffer for that peer.
//!
//! ```text
//! Initial ──connect()──▶ Connecting ──stream connected──▶ LinkEstablished
//!    │                                                        │
//!    └──accepted()──▶ LinkEstablished ──recv LIM──▶ SessionReady
//!                          (outbound: send LIM) ──▶ SessionReady
//!
//! SessionReady ──integrity/decode failure, EOF, timeout, close──▶ Closed
//! ```
//!
//! Backpressure is the `stalled` flag: a short write parks the queue until
//! the stream signals writable again. Nothing here blocks.

use std::collections::VecDeque;
use std::net::SocketAddr;

use veil_crypto::x25519::{self, PrivateKey};
use veil_crypto::{SessionKey, random};

use crate::contact::{AddressInfo, IdentityKey, RouterContact};
use crate::error::{HandshakeError, LinkError};
use crate::fragment::{self, FragmentBuffer, Reassembler};
use crate::handshake;
use crate::messages::{LinkIntro, encode_discard};
use crate::router::Router;
use crate::stream::{SocketId, StreamContext};
use crate::{FRAGMENT_BODY_PAYLOAD_SIZE, FRAGMENT_BUFFER_SIZE};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet dialing or accepted
    Initial,
    /// Outbound dial in progress
    Connecting,
    /// Reliable stream is up; handshake not yet complete
    LinkEstablished,
    /// Session key derived; fragments flow
    SessionReady,
    /// Terminal
    Closed,
}

/// One peer session.
pub struct Session {
    state: SessionState,
    sock: SocketId,
    remote_addr: SocketAddr,
    remote_transport_key: Option<x25519::PublicKey>,
    remote_rc: Option<RouterContact>,
    session_key: Option<SessionKey>,
    last_active: u64,
    timeout_ms: u64,
    stalled: bool,
    got_lim: bool,
    inbound: bool,
    sendq: VecDeque<FragmentBuffer>,
    send_offset: usize,
    recv_buf: FragmentBuffer,
    recv_offset: usize,
    reassembler: Reassembler,
}

impl Session {
    /// New outbound session toward a known contact at one of its
    /// addresses. The remote transport key comes from the dial info.
    #[must_use]
    pub fn outbound(
        sock: SocketId,
        rc: RouterContact,
        ai: &AddressInfo,
        timeout_ms: u64,
        now: u64,
    ) -> Self {
        Self {
            state: SessionState::Initial,
            sock,
            remote_addr: ai.addr,
            remote_transport_key: Some(ai.transport_key),
            remote_rc: Some(rc),
            session_key: None,
            last_active: now,
            timeout_ms,
            stalled: false,
            got_lim: false,
            inbound: false,
            sendq: VecDeque::new(),
            send_offset: 0,
            recv_buf: [0u8; FRAGMENT_BUFFER_SIZE],
            recv_offset: 0,
            reassembler: Reassembler::new(),
        }
    }

    /// New inbound session for an accepted stream. The peer's keys are
    /// learned from its link intro.
    #[must_use]
    pub fn inbound(sock: SocketId, remote_addr: SocketAddr, timeout_ms: u64, now: u64) -> Self {
        Self {
            state: SessionState::Initial,
            sock,
            remote_addr,
            remote_transport_key: None,
            remote_rc: None,
            session_key: None,
            last_active: now,
            timeout_ms,
            stalled: false,
            got_lim: false,
            inbound: true,
            sendq: VecDeque::new(),
            send_offset: 0,
            recv_buf: [0u8; FRAGMENT_BUFFER_SIZE],
            recv_offset: 0,
            reassembler: Reassembler::new(),
        }
    }

    /// Begin the outbound dial. No-op for inbound sessions.
    pub fn start<C: StreamContext>(&mut self, ctx: &mut C) {
        if self.inbound {
            return;
        }
        ctx.connect(self.sock, self.remote_addr);
        self.state = SessionState::Connecting;
    }

    /// The stream accepted this inbound session.
    pub fn accepted(&mut self) {
        self.state = SessionState::LinkEstablished;
        tracing::debug!(remote = %self.remote_addr, "link established");
    }

    /// The outbound stream connected: derive the session key, send our
    /// link intro in cleartext, and become ready.
    ///
    /// Returns true when the session reached `SessionReady` (the caller
    /// registers it and notifies the router), false when the event raced
    /// a close and was ignored.
    ///
    /// # Errors
    ///
    /// Key exchange or intro encoding failures; the caller closes the
    /// session.
    pub fn on_connected<C: StreamContext>(
        &mut self,
        ctx: &mut C,
        router: &mut dyn Router,
        now: u64,
    ) -> Result<bool, LinkError> {
        if self.state == SessionState::Closed {
            return Ok(false);
        }
        self.state = SessionState::LinkEstablished;
        tracing::debug!(remote = %self.remote_addr, "link established");

        let remote_key = self
            .remote_transport_key
            .as_ref()
            .ok_or(LinkError::NotReady)?;
        let nonce = random::random_nonce().map_err(LinkError::Crypto)?;
        let key = x25519::transport_dh_client(remote_key, router.encryption_secret(), &nonce)
            .map_err(LinkError::Crypto)?;
        self.session_key = Some(key);
        self.got_lim = true;

        let intro = LinkIntro {
            rc: router.contact().clone(),
            nonce,
        };
        let frame = handshake::encode_handshake(&intro)?;
        let wrote = ctx.write(self.sock, &frame);
        if wrote < frame.len() {
            tracing::warn!(
                remote = %self.remote_addr,
                wrote,
                expected = frame.len(),
                "short write sending handshake"
            );
        }
        self.enter_ready(now);
        Ok(true)
    }

    /// First delivery on an inbound session: parse the handshake frame,
    /// gate it through the router, derive the session key, and become
    /// ready. Returns any bytes that trailed the intro; they are the
    /// peer's first sealed fragments and must be fed to [`Session::recv`]
    /// after the establishment bookkeeping.
    ///
    /// # Errors
    ///
    /// Any parse, vetting, or key-exchange failure; the caller closes the
    /// session.
    pub fn recv_handshake(
        &mut self,
        router: &mut dyn Router,
        transport_secret: &PrivateKey,
        data: &[u8],
        now: u64,
    ) -> Result<Vec<u8>, LinkError> {
        tracing::debug!(remote = %self.remote_addr, len = data.len(), "recv handshake");
        let (intro, leftover) = handshake::parse_handshake(data)?;
        if !router.handle_intro(&intro) {
            return Err(HandshakeError::BadIntro.into());
        }
        let key = x25519::transport_dh_server(&intro.rc.enckey, transport_secret, &intro.nonce)
            .map_err(LinkError::Crypto)?;
        self.session_key = Some(key);
        self.remote_rc = Some(intro.rc);
        self.got_lim = true;
        let leftover = leftover.to_vec();
        if !leftover.is_empty() {
            tracing::debug!(
                remote = %self.remote_addr,
                len = leftover.len(),
                "handshake coalesced with data"
            );
        }
        self.enter_ready(now);
        Ok(leftover)
    }

    fn enter_ready(&mut self, now: u64) {
        self.state = SessionState::SessionReady;
        self.last_active = now;
    }

    /// Bytes delivered by the reliable stream on a ready session.
    /// Completes any in-flight fragment, opens whole fragments in place,
    /// and stashes the tail.
    ///
    /// # Errors
    ///
    /// Integrity, decode, or oversize failures, and a router rejection of
    /// a delivered message; the caller closes the session.
    pub fn recv(&mut self, router: &mut dyn Router, data: &[u8], now: u64) -> Result<(), LinkError> {
        if self.state != SessionState::SessionReady {
            tracing::warn!(remote = %self.remote_addr, "data on non-ready session");
            return Err(LinkError::NotReady);
        }
        self.last_active = now;
        let from = match &self.remote_rc {
            Some(rc) => rc.identity,
            None => return Err(LinkError::NotReady),
        };
        let key = match &self.session_key {
            Some(k) => k.clone(),
            None => return Err(LinkError::NotReady),
        };

        let mut ptr = data;
        // finish the in-flight fragment first
        if self.recv_offset > 0 {
            let left = FRAGMENT_BUFFER_SIZE - self.recv_offset;
            if ptr.len() < left {
                self.recv_buf[self.recv_offset..self.recv_offset + ptr.len()].copy_from_slice(ptr);
                self.recv_offset += ptr.len();
                return Ok(());
            }
            self.recv_buf[self.recv_offset..].copy_from_slice(&ptr[..left]);
            ptr = &ptr[left..];
            self.recv_offset = 0;
            Self::open_and_deliver(&mut self.recv_buf, &mut self.reassembler, &key, &from, router)?;
        }
        // whole fragments
        while ptr.len() >= FRAGMENT_BUFFER_SIZE {
            self.recv_buf.copy_from_slice(&ptr[..FRAGMENT_BUFFER_SIZE]);
            ptr = &ptr[FRAGMENT_BUFFER_SIZE..];
            Self::open_and_deliver(&mut self.recv_buf, &mut self.reassembler, &key, &from, router)?;
        }
        // hold onto leftovers
        if !ptr.is_empty() {
            self.recv_buf[..ptr.len()].copy_from_slice(ptr);
            self.recv_offset = ptr.len();
        }
        Ok(())
    }

    fn open_and_deliver(
        frag: &mut FragmentBuffer,
        reassembler: &mut Reassembler,
        key: &SessionKey,
        from: &IdentityKey,
        router: &mut dyn Router,
    ) -> Result<(), LinkError> {
        let (payload, is_last) = fragment::open(frag, key)?;
        if let Some(msg) = reassembler.push(payload, is_last)? {
            if !router.handle_link_message(from, msg) {
                tracing::warn!(
                    from = %hex::encode(&from[..8]),
                    len = msg.len(),
                    "router rejected link message"
                );
                return Err(LinkError::Rejected);
            }
        }
        Ok(())
    }

    /// Queue one logical message as sealed fragments and pump. Returns
    /// false (dropping the message) when the session is not ready or the
    /// send queue is at capacity.
    pub fn send_message<C: StreamContext>(
        &mut self,
        ctx: &mut C,
        data: &[u8],
        max_queue: usize,
        now: u64,
    ) -> bool {
        if self.state != SessionState::SessionReady {
            tracing::warn!(
                remote = %self.remote_addr,
                state = ?self.state,
                len = data.len(),
                "send on non-ready session"
            );
            return false;
        }
        let key = match &self.session_key {
            Some(k) => k.clone(),
            None => return false,
        };
        let needed = data.len().div_ceil(FRAGMENT_BODY_PAYLOAD_SIZE).max(1);
        if self.sendq.len() + needed > max_queue {
            tracing::warn!(
                remote = %self.remote_addr,
                queued = self.sendq.len(),
                needed,
                "send queue full, dropping message"
            );
            return false;
        }

        // seal everything before queueing anything, so a failure cannot
        // leave half a message on the wire
        let mut sealed = Vec::with_capacity(needed);
        if data.is_empty() {
            match fragment::seal(&[], true, &key) {
                Ok(frag) => sealed.push(frag),
                Err(err) => {
                    tracing::error!(%err, "failed to seal fragment");
                    return false;
                }
            }
        } else {
            let last_index = needed - 1;
            for (i, chunk) in data.chunks(FRAGMENT_BODY_PAYLOAD_SIZE).enumerate() {
                match fragment::seal(chunk, i == last_index, &key) {
                    Ok(frag) => sealed.push(frag),
                    Err(err) => {
                        tracing::error!(%err, "failed to seal fragment");
                        return false;
                    }
                }
            }
        }
        self.last_active = now;
        self.sendq.extend(sealed);
        self.pump(ctx);
        true
    }

    /// Drain the send queue into the stream until it stalls or empties.
    pub fn pump<C: StreamContext>(&mut self, ctx: &mut C) {
        loop {
            if self.stalled {
                break;
            }
            let Some(front) = self.sendq.front() else {
                break;
            };
            let remaining = FRAGMENT_BUFFER_SIZE - self.send_offset;
            let accepted = ctx.write(self.sock, &front[self.send_offset..]);
            if accepted < remaining {
                self.send_offset += accepted;
                self.stalled = true;
                tracing::debug!(
                    remote = %self.remote_addr,
                    offset = self.send_offset,
                    "write stalled"
                );
            } else {
                self.send_offset = 0;
                self.sendq.pop_front();
            }
        }
    }

    /// The stream can take writes again.
    pub fn on_writable<C: StreamContext>(&mut self, ctx: &mut C) {
        if self.is_established() {
            tracing::debug!(remote = %self.remote_addr, "write resumed");
            self.stalled = false;
            self.pump(ctx);
        }
    }

    /// Periodic maintenance: when keepalive is enabled and nothing is
    /// queued, send a discard message so the stream sees traffic.
    pub fn tick<C: StreamContext>(
        &mut self,
        ctx: &mut C,
        keepalive: bool,
        max_queue: usize,
        now: u64,
    ) {
        if keepalive && self.state == SessionState::SessionReady && self.sendq.is_empty() {
            self.send_message(ctx, &encode_discard(), max_queue, now);
        }
    }

    /// Inactivity check, guarded against clocks moving backwards. Closed
    /// sessions count as timed out so sweeps collect them.
    #[must_use]
    pub fn timed_out(&self, now: u64) -> bool {
        if self.state == SessionState::Closed {
            return true;
        }
        if now < self.last_active {
            return false;
        }
        now - self.last_active >= self.timeout_ms
    }

    /// Close the session. Idempotent: the stream sees at most one
    /// shutdown and close, and later calls are no-ops.
    pub fn close<C: StreamContext>(&mut self, ctx: &mut C) {
        if self.state == SessionState::Closed {
            return;
        }
        ctx.shutdown(self.sock);
        ctx.close(self.sock);
        tracing::debug!(remote = %self.remote_addr, "session closed");
        self.state = SessionState::Closed;
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once the stream is up, whether or not the handshake finished.
    #[must_use]
    pub fn is_established(&self) -> bool {
        matches!(
            self.state,
            SessionState::LinkEstablished | SessionState::SessionReady
        )
    }

    /// The stream socket backing this session.
    #[must_use]
    pub fn sock(&self) -> SocketId {
        self.sock
    }

    /// Remote identity key, once known.
    #[must_use]
    pub fn remote_pubkey(&self) -> Option<IdentityKey> {
        self.remote_rc.as_ref().map(|rc| rc.identity)
    }

    /// Remote contact, once known.
    #[must_use]
    pub fn remote_rc(&self) -> Option<&RouterContact> {
        self.remote_rc.as_ref()
    }

    /// Remote UDP address.
    #[must_use]
    pub fn remote_endpoint(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Whether the link intro has been exchanged.
    #[must_use]
    pub fn got_lim(&self) -> bool {
        self.got_lim
    }

    /// Queued outbound fragments.
    #[must_use]
    pub fn send_queue_len(&self) -> usize {
        self.sendq.len()
    }

    /// Whether the send path is parked on backpressure.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    #[cfg(test)]
    pub(crate) fn set_ready_for_test(&mut self, key: SessionKey, rc: RouterContact, now: u64) {
        self.session_key = Some(key);
        self.remote_rc = Some(rc);
        self.enter_ready(now);
    }
}
