//! Link layer configuration.

use crate::stream::ContextOptions;
use crate::{MAX_LINK_MSG_SIZE, SESSION_TIMEOUT_MS};

/// Tunables for one link layer instance.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Inactivity timeout before a session is closed (milliseconds)
    pub session_timeout_ms: u64,
    /// Send discard messages on idle established sessions
    pub keepalive: bool,
    /// Cap on queued outbound fragments per session
    pub max_send_queue: usize,
    /// Stream engine send buffer size
    pub send_buffer: usize,
    /// Stream engine receive buffer size
    pub recv_buffer: usize,
    /// Log MTU probe decisions in the stream engine
    pub log_mtu: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: SESSION_TIMEOUT_MS,
            keepalive: false,
            max_send_queue: 1024,
            send_buffer: MAX_LINK_MSG_SIZE * 16,
            recv_buffer: MAX_LINK_MSG_SIZE * 64,
            log_mtu: true,
        }
    }
}

impl LinkConfig {
    /// The stream-context options this configuration implies.
    #[must_use]
    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            send_buffer: self.send_buffer,
            recv_buffer: self.recv_buffer,
            log_mtu: self.log_mtu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_meet_floors() {
        let cfg = LinkConfig::default();
        assert!(cfg.send_buffer >= MAX_LINK_MSG_SIZE * 16);
        assert!(cfg.recv_buffer >= MAX_LINK_MSG_SIZE * 64);
        assert_eq!(cfg.session_timeout_ms, 30_000);
        assert!(!cfg.keepalive);
    }
}
