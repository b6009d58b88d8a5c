//! Shared test infrastructure: an in-memory transport and frame builders.

#![allow(dead_code)]

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use systa_probe::error::{Result, TransportError};
use systa_probe::transport::Transport;

/// Device id bytes 4..6 used by the simulated unit.
pub const DEVICE_ID: [u8; 2] = [0x01, 0x02];

/// One end of an in-memory datagram link.
pub struct ChannelTransport {
    local: SocketAddr,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

/// Two connected ends; whatever one sends, the other receives.
pub fn channel_pair(a: SocketAddr, b: SocketAddr) -> (ChannelTransport, ChannelTransport) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            local: a,
            peer: b,
            tx: a_tx,
            rx: Mutex::new(a_rx),
        },
        ChannelTransport {
            local: b,
            peer: a,
            tx: b_tx,
            rx: Mutex::new(b_rx),
        },
    )
}

impl ChannelTransport {
    /// Send to the other end.
    pub async fn send(&self, data: &[u8]) -> Result<usize> {
        self.send_to(data, self.peer).await
    }

    /// Receive the next datagram from the other end.
    pub async fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; 2048];
        let (len, _) = self.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local)
    }

    async fn send_to(&self, data: &[u8], _addr: SocketAddr) -> Result<usize> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| TransportError::Closed)?;
        Ok(data.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let data = self
            .rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok((len, self.peer))
    }
}

/// A 16-byte telemetry frame from the simulated unit.
pub fn telemetry_frame(counter: u16, packet_type: u8) -> Vec<u8> {
    let mut data = vec![0u8; 16];
    data[..4].copy_from_slice(&[0x09, 0x09, 0x0C, 0x00]);
    data[4..6].copy_from_slice(&DEVICE_ID);
    data[6..8].copy_from_slice(&counter.to_le_bytes());
    data[8] = packet_type;
    data[9..12].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
    data
}

/// An extended frame carrying subtype and parameter bytes.
pub fn parameter_frame(counter: u16, subtype: u8, parameter: u8) -> Vec<u8> {
    let mut data = telemetry_frame(counter, 0x02);
    data.resize(28, 0);
    data[16] = subtype;
    data[20] = parameter;
    data
}

pub fn le16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

pub fn device_id() -> u16 {
    u16::from_le_bytes(DEVICE_ID)
}
