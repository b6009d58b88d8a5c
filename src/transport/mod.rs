//! Datagram transport.
//!
//! Discovery and the session each own one socket. Both go through the
//! [`Transport`] trait so tests can stand in for the unit without a network.

mod socket;
mod udp;

pub use socket::{create_udp_socket, SocketConfig};
pub use udp::UdpTransport;

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Socket options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Receive buffer size in bytes (0 = system default).
    #[serde(default)]
    pub recv_buffer_size: usize,

    /// Enable SO_REUSEADDR.
    #[serde(default = "default_reuse_addr")]
    pub reuse_addr: bool,

    /// Enable SO_REUSEPORT (where available).
    #[serde(default = "default_reuse_port")]
    pub reuse_port: bool,
}

fn default_reuse_addr() -> bool {
    true
}
fn default_reuse_port() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: 0,
            reuse_addr: default_reuse_addr(),
            reuse_port: default_reuse_port(),
        }
    }
}

/// A datagram endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the local address.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Send data to a specific address.
    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize>;

    /// Receive data with source address.
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;
}

/// Outcome of a receive bounded by a timeout.
#[derive(Debug)]
pub enum RecvOutcome {
    Datagram { len: usize, from: SocketAddr },
    TimedOut,
}

/// Receive one datagram, giving up after `wait`.
pub async fn recv_timeout<T: Transport + ?Sized>(
    transport: &T,
    buf: &mut [u8],
    wait: Duration,
) -> Result<RecvOutcome> {
    match tokio::time::timeout(wait, transport.recv_from(buf)).await {
        Ok(Ok((len, from))) => Ok(RecvOutcome::Datagram { len, from }),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(RecvOutcome::TimedOut),
    }
}
