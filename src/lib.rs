//! # systa-probe
//!
//! Tooling for the UDP protocol of Paradigma SystaComfort heating
//! controllers: find a unit on the LAN, keep its telemetry stream alive,
//! and search for checksum offsets of undocumented command channels.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        DiscoveryClient  ──DeviceIdentity──▶  SessionListener     │
//! │      (broadcast, 8001)                     (bound, 22460)       │
//! │                                                  ▲              │
//! │                                            OffsetProber         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   protocol: replies, frames, ChecksumEngine + OffsetTable       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                Transport (tokio UDP / in-memory)                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One unit and one session at a time. Every receive is bounded by a
//! timeout; there is no other cancellation.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::unreadable_literal)]        // Offsets read as in captures
#![allow(clippy::cast_possible_truncation)]  // Byte fields of wire frames
#![allow(clippy::cast_possible_wrap)]        // ifa_flags conversions
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::future_not_send)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::discovery::{DiscoveryClient, DiscoveryConfig, InterfaceLister, StaticInterfaces};
    pub use crate::error::{Error, Result};
    pub use crate::protocol::{ChecksumEngine, Frame, FrameHeader, OffsetPair, OffsetTable};
    pub use crate::session::{
        FrameAction, OffsetProber, OffsetSearch, ProbeConfig, SessionConfig, SessionListener,
    };
    pub use crate::transport::{Transport, TransportConfig, UdpTransport};
    pub use crate::types::*;
    pub use crate::util::SystemInterfaces;
}
