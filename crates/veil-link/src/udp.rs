//! UDP socket transport under the stream engine.
//!
//! The link layer owns exactly one UDP socket: every datagram the engine
//! emits goes out through it, and every datagram received is fed back via
//! [`crate::LinkLayer::recv_from`]. Non-blocking; the caller polls.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::config::LinkConfig;

/// Where the link layer writes outgoing datagrams.
pub trait DatagramSocket {
    /// Send one datagram. Short sends do not happen on UDP; errors are
    /// logged by the caller.
    fn send_to(&mut self, to: SocketAddr, data: &[u8]) -> io::Result<usize>;
}

/// A bound, non-blocking UDP socket with buffer sizes from the link
/// configuration.
pub struct UdpTransport {
    socket: UdpSocket,
    recv_buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind to the given address. Use port 0 for automatic selection.
    pub fn bind(addr: SocketAddr, config: &LinkConfig) -> io::Result<Self> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        socket.set_send_buffer_size(config.send_buffer)?;
        socket.set_recv_buffer_size(config.recv_buffer)?;
        socket.bind(&addr.into())?;

        Ok(Self {
            socket: socket.into(),
            recv_buf: vec![0u8; 65536],
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive one datagram, if any is queued. Returns the payload length
    /// and sender; the bytes are in [`Self::recv_buffer`]. `WouldBlock`
    /// means nothing is pending.
    pub fn recv_from(&mut self) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(&mut self.recv_buf)
    }

    /// The receive scratch holding the last datagram.
    #[must_use]
    pub fn recv_buffer(&self) -> &[u8] {
        &self.recv_buf
    }
}

impl DatagramSocket for UdpTransport {
    fn send_to(&mut self, to: SocketAddr, data: &[u8]) -> io::Result<usize> {
        self.socket.send_to(data, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_roundtrip() {
        let cfg = LinkConfig::default();
        let mut a = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), &cfg).unwrap();
        let mut b = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), &cfg).unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b_addr, b"ping").unwrap();

        // non-blocking receive with a short retry loop
        let mut got = None;
        for _ in 0..100 {
            match b.recv_from() {
                Ok((len, from)) => {
                    got = Some((b.recv_buffer()[..len].to_vec(), from));
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(e) => panic!("recv failed: {e}"),
            }
        }
        let (data, from) = got.expect("datagram should arrive on loopback");
        assert_eq!(data, b"ping");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[test]
    fn would_block_when_empty() {
        let cfg = LinkConfig::default();
        let mut t = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), &cfg).unwrap();
        match t.recv_from() {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::WouldBlock),
            Ok(_) => panic!("unexpected datagram"),
        }
    }
}
