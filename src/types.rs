//! Core types used throughout systa-probe.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Number of hex digits in a unit identifier.
pub const UNIT_ID_DIGITS: usize = 10;

/// Platform code reported by Paradigma controllers.
pub const PLATFORM_PARADIGMA: u8 = 9;

/// Decomposed unit identifier (`AAPPvvVVmm` on the wire).
///
/// The version is transmitted low byte first, so digits 4..6 hold the low
/// byte and digits 6..8 the high byte of `major`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub app: u8,
    pub platform: u8,
    pub major: u16,
    pub minor: u8,
}

impl UnitId {
    /// Parse a unit identifier token.
    ///
    /// Tokens shorter than ten digits are treated as numbers and padded
    /// with leading zeros.
    pub fn parse(token: &str) -> Result<Self, ProtocolError> {
        if token.is_empty() || token.len() > UNIT_ID_DIGITS {
            return Err(ProtocolError::InvalidIdentifier(token.to_string()));
        }
        if !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidHex(token.to_string()));
        }

        let padded = format!("{token:0>UNIT_ID_DIGITS$}");
        let byte = |start: usize| {
            u8::from_str_radix(&padded[start..start + 2], 16)
                .map_err(|_| ProtocolError::InvalidHex(token.to_string()))
        };

        Ok(Self {
            app: byte(0)?,
            platform: byte(2)?,
            major: u16::from_le_bytes([byte(4)?, byte(6)?]),
            minor: byte(8)?,
        })
    }

    /// Recombine the fields into the ten-digit wire form.
    pub fn to_hex(&self) -> String {
        let [lo, hi] = self.major.to_le_bytes();
        format!(
            "{:02X}{:02X}{lo:02X}{hi:02X}{:02X}",
            self.app, self.platform, self.minor
        )
    }

    /// Firmware version as shown by the vendor tools, e.g. `1.14.1`.
    pub fn version_string(&self) -> String {
        format!("{}.{:02}.{}", self.major / 100, self.major % 100, self.minor)
    }

    /// Human-readable platform name when known.
    pub fn platform_name(&self) -> Option<&'static str> {
        match self.platform {
            PLATFORM_PARADIGMA => Some("Paradigma"),
            _ => None,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for UnitId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identity fields parsed from a discovery reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// The reply as received, whitespace-trimmed.
    pub raw: String,
    /// Address the unit reports for itself.
    pub ip: Ipv4Addr,
    pub name: String,
    pub id: UnitId,
    pub base_version: String,
    /// MAC as printed by the unit; used verbatim in follow-up queries.
    pub mac: String,
}

/// A host interface to search on: local address plus its broadcast address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceCandidate {
    pub local: Ipv4Addr,
    pub broadcast: Ipv4Addr,
}

impl InterfaceCandidate {
    pub fn new(local: Ipv4Addr, broadcast: Ipv4Addr) -> Self {
        Self { local, broadcast }
    }

    /// Whether `addr` can be on this interface's network.
    ///
    /// The host part is taken as the run of trailing one bits in the
    /// broadcast address, which never undercounts the real host part.
    pub fn covers(&self, addr: Ipv4Addr) -> bool {
        let host_bits = u32::from(self.broadcast).trailing_ones();
        let mask = u32::MAX.checked_shl(host_bits).unwrap_or(0);
        (u32::from(addr) ^ u32::from(self.local)) & mask == 0
    }
}

impl fmt::Display for InterfaceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (bcast {})", self.local, self.broadcast)
    }
}

impl FromStr for InterfaceCandidate {
    type Err = String;

    /// Parse `local=broadcast`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, broadcast) = s
            .split_once('=')
            .ok_or_else(|| format!("expected LOCAL=BROADCAST, got {s:?}"))?;
        let local = local
            .trim()
            .parse()
            .map_err(|e| format!("bad local address {local:?}: {e}"))?;
        let broadcast = broadcast
            .trim()
            .parse()
            .map_err(|e| format!("bad broadcast address {broadcast:?}: {e}"))?;
        Ok(Self { local, broadcast })
    }
}

/// Everything known about a discovered unit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub unit: UnitInfo,
    /// Interface the unit answered on; sessions bind to its local address.
    pub interface: InterfaceCandidate,
    pub discovery_port: u16,
    /// S-Touch display port, absent if the unit does not support S-Touch.
    pub stouch_port: Option<u16>,
    /// UDP session password, absent if the unit does not support S-Touch.
    pub password: Option<String>,
}

impl DeviceIdentity {
    pub fn local_addr(&self) -> Ipv4Addr {
        self.interface.local
    }

    pub fn stouch_supported(&self) -> bool {
        self.stouch_port.is_some()
    }
}
