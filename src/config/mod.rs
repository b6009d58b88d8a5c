//! Configuration management for systa-probe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryConfig;
use crate::error::{Error, Result};
use crate::protocol::{ChecksumEngine, OffsetEntry, OffsetTable, MIN_FRAME_LEN};
use crate::session::{ProbeConfig, SessionConfig};
use crate::transport::TransportConfig;
use crate::types::InterfaceCandidate;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Discovery configuration.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Offset search configuration.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Interfaces to search instead of the host's own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<InterfaceCandidate>,

    /// Known announcement offsets per channel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offsets: Vec<OffsetEntry>,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        check_port("discovery.port", self.discovery.port)?;
        check_port("session.port", self.session.port)?;
        check_timeout("discovery.timeout", self.discovery.timeout)?;
        check_timeout("session.receive_timeout", self.session.receive_timeout)?;
        check_timeout("probe.response_timeout", self.probe.response_timeout)?;

        if self.discovery.marker.trim().is_empty() {
            return Err(Error::InvalidConfig("discovery.marker must not be empty".into()));
        }

        if self.discovery.max_datagram < MIN_FRAME_LEN {
            return Err(Error::InvalidConfig(format!(
                "discovery.max_datagram must be at least {MIN_FRAME_LEN}"
            )));
        }

        if self.probe.max_trials == Some(0) {
            return Err(Error::InvalidConfig("probe.max_trials must be positive".into()));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::InvalidConfig(format!(
                "logging.format must be \"text\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Checksum engine seeded with the configured offsets.
    pub fn checksum_engine(&self) -> ChecksumEngine {
        ChecksumEngine::new(OffsetTable::from_entries(&self.offsets))
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("de", "systa", "systa-probe").map_or_else(
            || PathBuf::from("systa-probe.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            probe: ProbeConfig {
                seed: Some(1),
                max_trials: Some(1024),
                ..Default::default()
            },
            offsets: vec![OffsetEntry {
                packet_type: 0x02,
                subtype: 0x0B,
                mac: 0xBFB5,
                counter: 0x10F9,
            }],
            ..Default::default()
        }
    }
}

fn check_port(name: &str, port: u16) -> Result<()> {
    if port == 0 {
        return Err(Error::InvalidConfig(format!("{name} must not be 0")));
    }
    Ok(())
}

fn check_timeout(name: &str, timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(Error::InvalidConfig(format!("{name} must be positive")));
    }
    Ok(())
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
