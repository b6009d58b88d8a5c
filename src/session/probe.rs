//! Brute-force search for unknown announcement offsets.
//!
//! For a channel without a known offset, each telemetry burst is used for
//! one guess: the first two frames are acknowledged normally, the third is
//! answered with an announcement carrying the guessed MAC offset. The unit
//! answers an announcement it accepts and ignores one it rejects, so a
//! frame within the response window confirms the guess.
//!
//! Only the high byte of an offset differs between commands, so guesses
//! move in steps of `0x100`.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SessionListener;
use crate::error::{Error, Result};
use crate::protocol::{FrameHeader, ANNOUNCE_OFFSETS};
use crate::transport::Transport;

/// Offset search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// How long the unit gets to react to a guess.
    #[serde(default = "default_response_timeout", with = "humantime_serde")]
    pub response_timeout: Duration,

    /// First offset tried.
    #[serde(default = "default_initial_offset")]
    pub initial_offset: u16,

    /// Seed for reproducible searches. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Give up after this many trials. Unbounded when absent.
    #[serde(default)]
    pub max_trials: Option<u64>,
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(1)
}
fn default_initial_offset() -> u16 {
    ANNOUNCE_OFFSETS.mac
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            response_timeout: default_response_timeout(),
            initial_offset: default_initial_offset(),
            seed: None,
            max_trials: None,
        }
    }
}

impl ProbeConfig {
    /// Candidate generator for this configuration.
    pub fn search(&self) -> OffsetSearch<StdRng> {
        match self.seed {
            Some(seed) => OffsetSearch::seeded(self.initial_offset, seed),
            None => OffsetSearch::from_entropy(self.initial_offset),
        }
    }
}

/// Endless generator of offset candidates.
///
/// Yields the initial offset first, then adds `0x100 * r` for a random
/// byte `r` at each step, wrapping at 2^16. Values may repeat.
#[derive(Debug, Clone)]
pub struct OffsetSearch<R = StdRng> {
    initial: u16,
    current: u16,
    started: bool,
    rng: R,
}

impl OffsetSearch<StdRng> {
    pub fn seeded(initial: u16, seed: u64) -> Self {
        Self::with_rng(initial, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(initial: u16) -> Self {
        Self::with_rng(initial, StdRng::from_entropy())
    }
}

impl<R: Rng> OffsetSearch<R> {
    pub fn with_rng(initial: u16, rng: R) -> Self {
        Self {
            initial,
            current: initial,
            started: false,
            rng,
        }
    }

    /// The candidate most recently yielded (or the initial one).
    pub fn current(&self) -> u16 {
        self.current
    }

    /// Start over from the initial offset. The random stream continues.
    pub fn restart(&mut self) {
        self.current = self.initial;
        self.started = false;
    }
}

impl<R: Rng> Iterator for OffsetSearch<R> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.started {
            let step = 0x0100u16.wrapping_mul(u16::from(self.rng.gen::<u8>()));
            self.current = self.current.wrapping_add(step);
        } else {
            self.started = true;
        }
        Some(self.current)
    }
}

/// How the unit reacted to one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialOutcome {
    Accepted,
    Rejected,
}

/// One guess and its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeTrial {
    /// 1-based.
    pub attempt: u64,
    pub offset: u16,
    /// `(type, subtype)` of the frame the guess answered.
    pub channel: (u8, Option<u8>),
    pub outcome: TrialOutcome,
}

/// A confirmed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub offset: u16,
    pub trials: u64,
    /// Header of the frame the accepted guess answered.
    pub header: FrameHeader,
}

/// Runs the offset search on a session.
pub struct OffsetProber<'a, T> {
    session: &'a mut SessionListener<T>,
    config: ProbeConfig,
}

impl<'a, T: Transport> OffsetProber<'a, T> {
    pub fn new(session: &'a mut SessionListener<T>, config: ProbeConfig) -> Self {
        Self { session, config }
    }

    /// Try candidates from `search` until the unit accepts one.
    ///
    /// `observer` is called after every trial. The accepted offset is also
    /// recorded in the session's offset table when the frame carries a
    /// subtype.
    pub async fn search_offset<R, F>(
        &mut self,
        search: &mut OffsetSearch<R>,
        mut observer: F,
    ) -> Result<ProbeResult>
    where
        R: Rng,
        F: FnMut(&ProbeTrial),
    {
        let mut attempt = 0u64;

        for offset in search.by_ref() {
            if let Some(max) = self.config.max_trials {
                if attempt >= max {
                    return Err(Error::ProbeExhausted { trials: attempt });
                }
            }
            attempt += 1;

            let first = self.session.recv_frame().await?;
            self.session.acknowledge(&first).await?;
            let second = self.session.recv_frame().await?;
            self.session.acknowledge(&second).await?;
            let third = self.session.recv_frame().await?;

            let header = *third.frame.header();
            debug!(
                attempt,
                offset = format_args!("{offset:#06X}"),
                packet_type = header.packet_type,
                subtype = ?header.subtype,
                "Trying offset"
            );

            self.session
                .announce(&third, ANNOUNCE_OFFSETS.with_mac(offset))
                .await?;

            let outcome = match self
                .session
                .recv_frame_within(self.config.response_timeout)
                .await?
            {
                Some(_) => TrialOutcome::Accepted,
                None => TrialOutcome::Rejected,
            };

            let trial = ProbeTrial {
                attempt,
                offset,
                channel: header.channel(),
                outcome,
            };
            info!(
                attempt,
                offset = format_args!("{offset:#06X}"),
                outcome = ?outcome,
                "Probe trial"
            );
            observer(&trial);

            if outcome == TrialOutcome::Accepted {
                if header.subtype.is_some() {
                    self.session.engine_mut().table_mut().record(
                        &header,
                        offset,
                        ANNOUNCE_OFFSETS.counter,
                    );
                    debug!(channel = ?header.channel(), "Offset recorded");
                }
                return Ok(ProbeResult {
                    offset,
                    trials: attempt,
                    header,
                });
            }
        }

        // OffsetSearch never ends.
        Err(Error::ProbeExhausted { trials: attempt })
    }
}
