//! Low-level socket creation.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, warn};

use super::TransportConfig;
use crate::error::{Result, TransportError};

/// Socket configuration options.
#[derive(Debug, Clone, Default)]
pub struct SocketConfig {
    pub recv_buffer_size: usize,
    pub reuse_addr: bool,
    pub reuse_port: bool,
    /// Allow sending to broadcast addresses.
    pub broadcast: bool,
}

impl SocketConfig {
    /// Create from transport config.
    pub fn from_transport_config(config: &TransportConfig) -> Self {
        Self {
            recv_buffer_size: config.recv_buffer_size,
            reuse_addr: config.reuse_addr,
            reuse_port: config.reuse_port,
            broadcast: false,
        }
    }

    /// Enable or disable SO_BROADCAST.
    pub fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }
}

/// Create a bound, non-blocking UDP socket.
pub fn create_udp_socket(addr: SocketAddr, config: &SocketConfig) -> Result<Socket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    configure_socket(&socket, config)?;

    socket.bind(&addr.into()).map_err(|e| TransportError::BindFailed {
        addr,
        reason: e.to_string(),
    })?;

    socket
        .set_nonblocking(true)
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    debug!(%addr, broadcast = config.broadcast, "UDP socket bound");
    Ok(socket)
}

fn configure_socket(socket: &Socket, config: &SocketConfig) -> Result<()> {
    if config.reuse_addr {
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::SocketError(e.to_string()))?;
    }

    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    if config.reuse_port {
        if let Err(e) = socket.set_reuse_port(true) {
            warn!("Failed to set SO_REUSEPORT: {}", e);
        }
    }

    socket
        .set_broadcast(config.broadcast)
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    if config.recv_buffer_size > 0 {
        if let Err(e) = socket.set_recv_buffer_size(config.recv_buffer_size) {
            warn!("Failed to set recv buffer size: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_udp_socket() {
        let config = SocketConfig::default().with_broadcast(true);
        let socket = create_udp_socket("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        assert!(socket.broadcast().unwrap());
        let local = socket.local_addr().unwrap().as_socket().unwrap();
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn test_bind_conflict_reports_address() {
        let config = SocketConfig::default();
        let first = create_udp_socket("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let taken = first.local_addr().unwrap().as_socket().unwrap();

        match create_udp_socket(taken, &config) {
            Err(crate::Error::Transport(TransportError::BindFailed { addr, .. })) => {
                assert_eq!(addr, taken);
            }
            other => panic!("expected bind failure, got {other:?}"),
        }
    }
}
