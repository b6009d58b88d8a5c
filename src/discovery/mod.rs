//! Unit discovery over the broadcast text protocol.
//!
//! A search query is broadcast on every candidate interface in turn. The
//! first reply carrying the protocol marker identifies the unit; two
//! follow-up queries addressed by its MAC then fetch the S-Touch display
//! port and the UDP password.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, ProtocolError, QueryStage, Result};
use crate::protocol::{
    self, contains_marker, decode_discovery_reply, decode_password_reply, decode_port_reply,
    password_query, port_query, SEARCH_QUERY,
};
use crate::transport::{recv_timeout, RecvOutcome, Transport, TransportConfig, UdpTransport};
use crate::types::{DeviceIdentity, InterfaceCandidate, UnitInfo};

/// Source of `(local address, broadcast address)` pairs to search on.
pub trait InterfaceLister: Send + Sync {
    /// Candidates in the order they should be tried.
    fn candidates(&self) -> Result<Vec<InterfaceCandidate>>;
}

/// A fixed, caller-supplied candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticInterfaces(pub Vec<InterfaceCandidate>);

impl StaticInterfaces {
    pub fn new(candidates: Vec<InterfaceCandidate>) -> Self {
        Self(candidates)
    }
}

impl InterfaceLister for StaticInterfaces {
    fn candidates(&self) -> Result<Vec<InterfaceCandidate>> {
        Ok(self.0.clone())
    }
}

/// Discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Port the unit listens on for queries.
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long to wait for each reply.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Case-insensitive marker a search reply must contain.
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Receive buffer size for one reply.
    #[serde(default = "default_max_datagram")]
    pub max_datagram: usize,
}

fn default_port() -> u16 {
    protocol::DISCOVERY_PORT
}
fn default_timeout() -> Duration {
    Duration::from_secs(2)
}
fn default_marker() -> String {
    protocol::PROTOCOL_MARKER.to_string()
}
fn default_max_datagram() -> usize {
    protocol::MAX_DATAGRAM
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout: default_timeout(),
            marker: default_marker(),
            max_datagram: default_max_datagram(),
        }
    }
}

/// Finds a unit and reads its identity.
///
/// Holds no socket between calls; each [`discover`](Self::discover) opens
/// one and drops it on return.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryClient {
    config: DiscoveryConfig,
    transport: TransportConfig,
}

impl DiscoveryClient {
    pub fn new(config: DiscoveryConfig, transport: TransportConfig) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Search all candidates of `lister`. `Ok(None)` means no unit answered.
    pub async fn discover(&self, lister: &dyn InterfaceLister) -> Result<Option<DeviceIdentity>> {
        let bind = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        let transport = UdpTransport::bind_broadcast(bind, &self.transport)?;
        self.discover_with(&transport, lister).await
    }

    /// Search using an already bound transport.
    pub async fn discover_with<T: Transport + ?Sized>(
        &self,
        transport: &T,
        lister: &dyn InterfaceLister,
    ) -> Result<Option<DeviceIdentity>> {
        let candidates = lister.candidates()?;
        if candidates.is_empty() {
            warn!("No interfaces to search on");
            return Ok(None);
        }

        for candidate in candidates {
            debug!(interface = %candidate, "Searching for unit");
            let Some(unit) = self.search_on(transport, candidate).await? else {
                continue;
            };

            info!(
                interface = %candidate,
                ip = %unit.ip,
                mac = %unit.mac,
                name = %unit.name,
                "Found unit"
            );
            let identity = self.query_details(transport, candidate, unit).await?;
            return Ok(Some(identity));
        }

        info!("No unit answered on any interface");
        Ok(None)
    }

    async fn search_on<T: Transport + ?Sized>(
        &self,
        transport: &T,
        candidate: InterfaceCandidate,
    ) -> Result<Option<UnitInfo>> {
        let target = self.target(candidate);
        if let Err(e) = transport.send_to(SEARCH_QUERY, target).await {
            // One unreachable interface must not end the search.
            warn!(interface = %candidate, error = %e, "Search query not sent");
            return Ok(None);
        }

        let deadline = Instant::now() + self.config.timeout;
        let mut buf = vec![0u8; self.config.max_datagram];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(interface = %candidate, "No reply before timeout");
                return Ok(None);
            }

            let (len, from) = match recv_timeout(transport, &mut buf, remaining).await? {
                RecvOutcome::Datagram { len, from } => (len, from),
                RecvOutcome::TimedOut => {
                    debug!(interface = %candidate, "No reply before timeout");
                    return Ok(None);
                }
            };

            let reply = &buf[..len];
            if !contains_marker(reply, &self.config.marker) {
                debug!(%from, len, "Ignoring datagram without marker");
                continue;
            }
            if !from_candidate(candidate, from) {
                debug!(%from, interface = %candidate, "Ignoring reply from another network");
                continue;
            }

            match decode_discovery_reply(reply) {
                Ok(unit) => return Ok(Some(unit)),
                Err(e) => warn!(%from, error = %e, "Malformed search reply"),
            }
        }
    }

    async fn query_details<T: Transport + ?Sized>(
        &self,
        transport: &T,
        candidate: InterfaceCandidate,
        unit: UnitInfo,
    ) -> Result<DeviceIdentity> {
        let target = self.target(candidate);

        let stouch_port = self
            .exchange(
                transport,
                target,
                &port_query(&unit.mac),
                QueryStage::Port,
                decode_port_reply,
            )
            .await?;

        let password = match stouch_port {
            Some(port) => {
                debug!(port, "Unit supports S-Touch");
                let password = self
                    .exchange(
                        transport,
                        target,
                        &password_query(&unit.mac),
                        QueryStage::Password,
                        decode_password_reply,
                    )
                    .await?;
                Some(password)
            }
            None => {
                info!(mac = %unit.mac, "Unit does not support S-Touch");
                None
            }
        };

        Ok(DeviceIdentity {
            unit,
            interface: candidate,
            discovery_port: self.config.port,
            stouch_port,
            password,
        })
    }

    /// Send a follow-up query and wait for a reply that decodes.
    ///
    /// Repeated search replies and replies that fail to decode are skipped
    /// until the timeout. If only undecodable replies arrived, the last
    /// decode error is returned instead of a timeout.
    async fn exchange<T, V, F>(
        &self,
        transport: &T,
        target: SocketAddr,
        query: &[u8],
        stage: QueryStage,
        decode: F,
    ) -> Result<V>
    where
        T: Transport + ?Sized,
        F: Fn(&[u8]) -> std::result::Result<V, ProtocolError>,
    {
        transport.send_to(query, target).await?;

        let deadline = Instant::now() + self.config.timeout;
        let mut buf = vec![0u8; self.config.max_datagram];
        let mut last_error = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = if remaining.is_zero() {
                RecvOutcome::TimedOut
            } else {
                recv_timeout(transport, &mut buf, remaining).await?
            };

            let (len, from) = match outcome {
                RecvOutcome::Datagram { len, from } => (len, from),
                RecvOutcome::TimedOut => {
                    return Err(match last_error {
                        Some(e) => Error::Protocol(e),
                        None => Error::DiscoveryTimeout {
                            stage,
                            waited: self.config.timeout,
                        },
                    });
                }
            };

            let reply = &buf[..len];
            if contains_marker(reply, &self.config.marker) {
                debug!(%from, %stage, "Ignoring repeated search reply");
                continue;
            }

            match decode(reply) {
                Ok(value) => {
                    debug!(%from, %stage, reply = %protocol::decode_latin1(reply).trim_end(), "Query answered");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(%from, %stage, error = %e, "Undecodable reply");
                    last_error = Some(e);
                }
            }
        }
    }

    fn target(&self, candidate: InterfaceCandidate) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(candidate.broadcast, self.config.port))
    }
}

fn from_candidate(candidate: InterfaceCandidate, from: SocketAddr) -> bool {
    match from {
        SocketAddr::V4(addr) => candidate.covers(*addr.ip()),
        SocketAddr::V6(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.port, 8001);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.marker, "systa");
        assert_eq!(config.max_datagram, 1048);
    }

    #[test]
    fn test_static_interfaces_keep_order() {
        let a = InterfaceCandidate::new(Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 255));
        let b = InterfaceCandidate::new(
            Ipv4Addr::new(192, 168, 1, 2),
            Ipv4Addr::new(192, 168, 1, 255),
        );
        let lister = StaticInterfaces::new(vec![b, a]);
        assert_eq!(lister.candidates().unwrap(), vec![b, a]);
    }

    #[tokio::test]
    async fn test_no_candidates_is_not_found() {
        let client = DiscoveryClient::default();
        let transport = UdpTransport::bind(
            "127.0.0.1:0".parse().unwrap(),
            &TransportConfig::default(),
        )
        .unwrap();
        let found = client
            .discover_with(&transport, &StaticInterfaces::default())
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
