//! Telemetry session with the unit.
//!
//! The unit pushes a burst of three or four frames per update to the
//! session port and sends the next frame of a burst only after the previous
//! one was acknowledged. [`SessionListener`] owns the socket and answers
//! every frame with an acknowledgment computed from that frame's own header.

pub mod probe;

use std::net::{SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{self, ChecksumEngine, Frame, FrameKind, OffsetPair};
use crate::transport::{recv_timeout, RecvOutcome, Transport, TransportConfig, UdpTransport};
use crate::types::DeviceIdentity;
use crate::util::format_duration;

pub use probe::{OffsetProber, OffsetSearch, ProbeConfig, ProbeResult, ProbeTrial, TrialOutcome};

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Local port the unit sends telemetry to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Silence longer than this means the unit stopped talking.
    /// The unit sends every 60 seconds.
    #[serde(default = "default_receive_timeout", with = "humantime_serde")]
    pub receive_timeout: Duration,

    /// Frames acknowledged before a parameter announcement.
    #[serde(default = "default_skip_count")]
    pub skip_count: usize,
}

fn default_port() -> u16 {
    protocol::SESSION_PORT
}
fn default_receive_timeout() -> Duration {
    Duration::from_secs(61)
}
fn default_skip_count() -> usize {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            receive_timeout: default_receive_timeout(),
            skip_count: default_skip_count(),
        }
    }
}

/// A frame together with where and when it arrived.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub frame: Frame,
    pub from: SocketAddr,
    pub received_at: Instant,
}

/// What the session loop does with a frame after the callback saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// Send the standard acknowledgment.
    Acknowledge,
    /// The callback answered the frame itself; send nothing.
    Handled,
    /// Acknowledge, then leave the loop.
    Stop,
}

/// Counters of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub frames_received: u64,
    pub acks_sent: u64,
    pub announcements_sent: u64,
    /// Datagrams too short to be frames.
    pub malformed: u64,
    pub last_received: Option<Instant>,
    pub last_remote: Option<SocketAddr>,
}

/// Result of [`SessionListener::await_burst_then_announce`].
#[derive(Debug, Clone)]
pub struct Announced {
    /// The frame the announcement answered.
    pub trigger: ReceivedFrame,
    pub announcement: Frame,
    /// The unit's next frame after the announcement.
    pub response: ReceivedFrame,
}

/// Receives telemetry and keeps the unit's stream flowing.
pub struct SessionListener<T = UdpTransport> {
    transport: T,
    config: SessionConfig,
    engine: ChecksumEngine,
    stats: SessionStats,
    buf: Vec<u8>,
}

impl SessionListener<UdpTransport> {
    /// Bind the session port on the interface the unit was found on.
    pub fn bind(
        identity: &DeviceIdentity,
        config: SessionConfig,
        transport_config: &TransportConfig,
        engine: ChecksumEngine,
    ) -> Result<Self> {
        let addr = SocketAddr::V4(SocketAddrV4::new(identity.local_addr(), config.port));
        let transport = UdpTransport::bind(addr, transport_config)?;
        info!(%addr, unit = %identity.unit.ip, "Session socket bound");
        Ok(Self::with_transport(transport, config, engine))
    }
}

impl<T: Transport> SessionListener<T> {
    pub fn with_transport(transport: T, config: SessionConfig, engine: ChecksumEngine) -> Self {
        Self {
            transport,
            config,
            engine,
            stats: SessionStats::default(),
            buf: vec![0u8; protocol::MAX_DATAGRAM],
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &ChecksumEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ChecksumEngine {
        &mut self.engine
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Wait for the next frame, failing with [`Error::DeviceSilent`] after
    /// the configured receive timeout.
    pub async fn recv_frame(&mut self) -> Result<ReceivedFrame> {
        let waited = self.config.receive_timeout;
        match self.recv_frame_within(waited).await? {
            Some(received) => Ok(received),
            None => {
                warn!(waited = %format_duration(waited), "Unit not communicating");
                Err(Error::DeviceSilent { waited })
            }
        }
    }

    /// Wait up to `wait` for the next frame. `None` on timeout.
    ///
    /// Datagrams too short to be frames are counted and skipped; they do
    /// not extend the wait.
    pub async fn recv_frame_within(&mut self, wait: Duration) -> Result<Option<ReceivedFrame>> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let (len, from) = match recv_timeout(&self.transport, &mut self.buf, remaining).await? {
                RecvOutcome::Datagram { len, from } => (len, from),
                RecvOutcome::TimedOut => return Ok(None),
            };

            match Frame::parse(&self.buf[..len]) {
                Ok(frame) => {
                    let received_at = Instant::now();
                    self.stats.frames_received += 1;
                    self.stats.last_received = Some(received_at);
                    self.stats.last_remote = Some(from);
                    debug!(
                        %from,
                        counter = frame.header().counter,
                        packet_type = frame.header().packet_type,
                        bytes = %frame.hex(),
                        "Received frame"
                    );
                    return Ok(Some(ReceivedFrame {
                        frame,
                        from,
                        received_at,
                    }));
                }
                Err(e) => {
                    self.stats.malformed += 1;
                    warn!(%from, len, error = %e, "Discarding datagram");
                }
            }
        }
    }

    /// Acknowledge `received` to its sender.
    pub async fn acknowledge(&mut self, received: &ReceivedFrame) -> Result<Frame> {
        let ack = protocol::build_acknowledgment(&received.frame);
        self.transport.send_to(ack.as_bytes(), received.from).await?;
        self.stats.acks_sent += 1;
        debug!(to = %received.from, bytes = %ack.hex(), "Sent acknowledgment");
        Ok(ack)
    }

    /// Answer `received` with a parameter announcement using `offsets`.
    pub async fn announce(&mut self, received: &ReceivedFrame, offsets: OffsetPair) -> Result<Frame> {
        let announcement = protocol::build_parameter_announcement(&received.frame, offsets);
        self.transport
            .send_to(announcement.as_bytes(), received.from)
            .await?;
        self.stats.announcements_sent += 1;
        debug!(
            to = %received.from,
            mac_offset = format_args!("{:#06X}", offsets.mac),
            bytes = %announcement.hex(),
            "Sent announcement"
        );
        Ok(announcement)
    }

    /// Receive and answer frames until the callback says stop or the unit
    /// goes silent.
    ///
    /// `on_frame` sees every frame before anything is sent.
    pub async fn run<F>(&mut self, mut on_frame: F) -> Result<SessionStats>
    where
        F: FnMut(&ReceivedFrame) -> FrameAction,
    {
        loop {
            let received = self.recv_frame().await?;
            match on_frame(&received) {
                FrameAction::Acknowledge => {
                    self.acknowledge(&received).await?;
                }
                FrameAction::Handled => {
                    trace!(counter = received.frame.header().counter, "Frame handled by caller");
                }
                FrameAction::Stop => {
                    self.acknowledge(&received).await?;
                    break;
                }
            }
        }

        info!(
            frames = self.stats.frames_received,
            acks = self.stats.acks_sent,
            "Session finished"
        );
        Ok(self.stats.clone())
    }

    /// Let `skip_count` frames pass with acknowledgments, then answer the
    /// next frame with a parameter announcement and wait for the unit's
    /// reaction.
    pub async fn await_burst_then_announce(&mut self, skip_count: usize) -> Result<Announced> {
        let mut current = self.recv_frame().await?;
        for _ in 0..skip_count {
            self.acknowledge(&current).await?;
            current = self.recv_frame().await?;
        }

        let offsets = self
            .engine
            .offsets(FrameKind::Announcement, current.frame.header());
        let announcement = self.announce(&current, offsets).await?;
        let response = self.recv_frame().await?;
        info!(
            counter = response.frame.header().counter,
            "Unit answered announcement"
        );

        Ok(Announced {
            trigger: current,
            announcement,
            response,
        })
    }
}
