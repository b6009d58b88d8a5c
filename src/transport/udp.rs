//! UDP transport on top of tokio.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket as TokioUdpSocket;

use super::{SocketConfig, Transport, TransportConfig};
use crate::error::{Result, TransportError};

/// UDP transport owning one socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: TokioUdpSocket,
}

impl UdpTransport {
    /// Bind a listening socket, broadcast disabled.
    pub fn bind(addr: SocketAddr, config: &TransportConfig) -> Result<Self> {
        Self::bind_with(addr, &SocketConfig::from_transport_config(config))
    }

    /// Bind a socket allowed to send broadcasts.
    pub fn bind_broadcast(addr: SocketAddr, config: &TransportConfig) -> Result<Self> {
        Self::bind_with(
            addr,
            &SocketConfig::from_transport_config(config).with_broadcast(true),
        )
    }

    fn bind_with(addr: SocketAddr, socket_config: &SocketConfig) -> Result<Self> {
        let std_socket = super::socket::create_udp_socket(addr, socket_config)?;

        let socket = TokioUdpSocket::from_std(std_socket.into()).map_err(|e| {
            TransportError::BindFailed {
                addr,
                reason: e.to_string(),
            }
        })?;

        Ok(Self { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| TransportError::SocketError(e.to_string()).into())
    }

    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize> {
        self.socket
            .send_to(data, addr)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()).into())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket
            .recv_from(buf)
            .await
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{recv_timeout, RecvOutcome};
    use std::time::Duration;

    #[tokio::test]
    async fn test_loopback_exchange() {
        let config = TransportConfig::default();
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap();

        a.send_to(b"ping", b.local_addr().unwrap()).await.unwrap();

        let mut buf = [0u8; 16];
        match recv_timeout(&b, &mut buf, Duration::from_secs(2)).await.unwrap() {
            RecvOutcome::Datagram { len, from } => {
                assert_eq!(&buf[..len], b"ping");
                assert_eq!(from, a.local_addr().unwrap());
            }
            RecvOutcome::TimedOut => panic!("datagram lost on loopback"),
        }
    }

    #[tokio::test]
    async fn test_recv_timeout_expires() {
        let config = TransportConfig::default();
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let mut buf = [0u8; 16];
        let outcome = recv_timeout(&a, &mut buf, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(matches!(outcome, RecvOutcome::TimedOut));
    }
}
