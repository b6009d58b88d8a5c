//! Error types for systa-probe.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for systa-probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for systa-probe.
#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // Protocol errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Timeouts
    #[error("device not communicating: no frame within {waited:?}")]
    DeviceSilent { waited: Duration },

    #[error("no reply to {stage} query within {waited:?}")]
    DiscoveryTimeout { stage: QueryStage, waited: Duration },

    #[error("offset search gave up after {trials} trials")]
    ProbeExhausted { trials: u64 },

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Transport layer errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed on {addr}: {reason}")]
    BindFailed { addr: SocketAddr, reason: String },

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("transport closed")]
    Closed,
}

/// Reply and frame parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("too few tokens in reply: expected at least {expected}, got {got}")]
    TooFewTokens { expected: usize, got: usize },

    #[error("invalid hex in unit identifier: {0:?}")]
    InvalidHex(String),

    #[error("unit identifier must be 1 to 10 hex digits, got {0:?}")]
    InvalidIdentifier(String),

    #[error("invalid device address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid port in reply: {0:?}")]
    InvalidPort(String),

    #[error("empty {0} in reply")]
    EmptyField(&'static str),

    #[error("frame too short: need {expected} bytes, got {got}")]
    FrameTooShort { expected: usize, got: usize },
}

/// Which discovery exchange a timeout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Port,
    Password,
}

impl std::fmt::Display for QueryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Port => write!(f, "display port"),
            Self::Password => write!(f, "UDP password"),
        }
    }
}

impl Error {
    /// Check if the error is a receive timeout of any kind.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::DeviceSilent { .. } | Error::DiscoveryTimeout { .. }
        )
    }

    /// Check if the error is a malformed reply or frame.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Check if error is a configuration problem that retrying won't fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InvalidConfig(_)
                | Error::Transport(TransportError::BindFailed { .. })
        )
    }
}
