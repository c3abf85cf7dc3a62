//! The reliable-stream library boundary.
//!
//! The core does not implement congestion control or retransmission; it
//! drives a uTP-style engine through this trait. The engine turns UDP
//! datagrams into in-order byte deliveries per socket and accepts writes
//! that it may truncate under backpressure.
//!
//! The engine is polled, not called back: state transitions surface as
//! [`StreamEvent`]s and outgoing datagrams as [`Transmit`]s, both drained
//! by the link layer after every call that can advance the engine.

use std::net::SocketAddr;

use crate::MAX_LINK_MSG_SIZE;

/// Opaque identifier of one stream socket inside the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(pub u64);

impl std::fmt::Display for SocketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sock#{}", self.0)
    }
}

/// Per-socket error codes the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorCode {
    /// Remote refused the connection
    ConnectionRefused,
    /// Connection reset by the remote
    ConnectionReset,
    /// Engine-level timeout on the socket
    TimedOut,
}

impl std::fmt::Display for StreamErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConnectionRefused => "connection refused",
            Self::ConnectionReset => "connection reset",
            Self::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

/// Events surfaced by the engine, in occurrence order.
#[derive(Debug)]
pub enum StreamEvent {
    /// A remote initiated a stream to us; a fresh socket now exists
    Accepted {
        /// The new socket
        sock: SocketId,
        /// Remote UDP address
        from: SocketAddr,
    },
    /// An outbound connect completed
    Connected {
        /// The connecting socket
        sock: SocketId,
    },
    /// A previously full socket can take writes again
    Writable {
        /// The writable socket
        sock: SocketId,
    },
    /// In-order bytes arrived; chunk boundaries are arbitrary
    Read {
        /// The delivering socket
        sock: SocketId,
        /// Delivered bytes
        data: Vec<u8>,
    },
    /// The remote closed its half of the stream
    Eof {
        /// The closed socket
        sock: SocketId,
    },
    /// Engine-level socket error; state is driven separately via
    /// `Eof`/`Connected`, so this is informational
    Error {
        /// The failing socket
        sock: SocketId,
        /// What went wrong
        code: StreamErrorCode,
    },
}

/// An outgoing UDP datagram produced by the engine.
#[derive(Debug)]
pub struct Transmit {
    /// Destination address
    pub to: SocketAddr,
    /// Datagram payload
    pub data: Vec<u8>,
}

/// Context-wide options the link layer sets at construction.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Engine send buffer, at least 16x the maximum link message
    pub send_buffer: usize,
    /// Engine receive buffer, at least 64x the maximum link message
    pub recv_buffer: usize,
    /// Log MTU probe decisions
    pub log_mtu: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            send_buffer: MAX_LINK_MSG_SIZE * 16,
            recv_buffer: MAX_LINK_MSG_SIZE * 64,
            log_mtu: true,
        }
    }
}

/// The reliable-stream engine as consumed by the link layer.
pub trait StreamContext {
    /// Apply context-wide options. Called once before any socket exists.
    fn configure(&mut self, opts: &ContextOptions);

    /// Create an unconnected socket for an outbound dial.
    fn create_socket(&mut self) -> SocketId;

    /// Begin connecting a socket; completion surfaces as
    /// [`StreamEvent::Connected`].
    fn connect(&mut self, sock: SocketId, remote: SocketAddr);

    /// Write bytes to a socket. Returns how many bytes the engine
    /// accepted; anything short of `data.len()` is backpressure, not an
    /// error. A [`StreamEvent::Writable`] follows when room opens up.
    fn write(&mut self, sock: SocketId, data: &[u8]) -> usize;

    /// Shut down both directions of a socket.
    fn shutdown(&mut self, sock: SocketId);

    /// Close a socket. Pending events for it may still be polled.
    fn close(&mut self, sock: SocketId);

    /// Tell the engine a `Read` delivery has been fully consumed, opening
    /// receive window.
    fn read_drained(&mut self, sock: SocketId);

    /// Feed one received UDP datagram into the engine. Returns false if
    /// the datagram was not the engine's.
    fn process_udp(&mut self, datagram: &[u8], from: SocketAddr) -> bool;

    /// Feed an ICMP fragmentation-needed hint into the engine's PMTU
    /// discovery.
    fn process_icmp_fragmentation(&mut self, from: SocketAddr, mtu: u32);

    /// Flush acks the engine deferred for batching.
    fn issue_deferred_acks(&mut self);

    /// Run the engine's own per-socket timeout checks.
    fn check_timeouts(&mut self, now_ms: u64);

    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<StreamEvent>;

    /// Next outgoing datagram, if any.
    fn poll_transmit(&mut self) -> Option<Transmit>;
}
