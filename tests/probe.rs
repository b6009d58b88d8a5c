//! Offset search against a simulated unit.
//!
//! The unit accepts exactly one announcement offset. Time is paused, so
//! the one-second response windows and the pauses between bursts cost
//! nothing.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use proptest::prelude::*;

use common::{channel_pair, device_id, le16, parameter_frame, telemetry_frame, ChannelTransport};
use systa_probe::error::Error;
use systa_probe::protocol::{ChecksumEngine, ACK_OFFSETS, ANNOUNCE_OFFSETS};
use systa_probe::session::{
    OffsetProber, OffsetSearch, ProbeConfig, ProbeTrial, SessionConfig, SessionListener,
    TrialOutcome,
};

const SUBTYPE: u8 = 0x0B;

// ============================================================================
// Test Infrastructure
// ============================================================================

fn addrs() -> (SocketAddr, SocketAddr) {
    (
        "192.168.11.2:22460".parse().unwrap(),
        "192.168.11.23:3477".parse().unwrap(),
    )
}

/// Simulated unit: sends three-frame bursts five seconds apart and answers
/// an announcement only when its MAC checksum uses `secret`.
async fn run_unit(unit: ChannelTransport, secret: Option<u16>) -> u64 {
    let mut counter = 100u16;
    let mut bursts = 0u64;

    loop {
        bursts += 1;
        for packet_type in [0x01, 0x01] {
            unit.send(&telemetry_frame(counter, packet_type)).await.unwrap();
            let ack = unit.recv().await.unwrap();
            assert_eq!(ack.len(), 16);
            assert_eq!(le16(&ack, 14), counter.wrapping_add(ACK_OFFSETS.counter));
            counter = counter.wrapping_add(1);
        }

        unit.send(&parameter_frame(counter, SUBTYPE, 0)).await.unwrap();
        let announcement = unit.recv().await.unwrap();
        assert_eq!(announcement.len(), 28);
        assert_eq!(
            le16(&announcement, 26),
            counter.wrapping_add(ANNOUNCE_OFFSETS.counter)
        );
        counter = counter.wrapping_add(1);

        let accepted = secret.is_some_and(|s| le16(&announcement, 24) == device_id().wrapping_add(s));
        if accepted {
            unit.send(&telemetry_frame(counter, 0x01)).await.unwrap();
            return bursts;
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

fn listener(transport: ChannelTransport) -> SessionListener<ChannelTransport> {
    SessionListener::with_transport(transport, SessionConfig::default(), ChecksumEngine::default())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_search_finds_secret_offset() {
    let secret = 0x4AB5; // same low byte as the initial guess
    let (local, remote) = addrs();
    let (ours, theirs) = channel_pair(local, remote);
    let unit = tokio::spawn(run_unit(theirs, Some(secret)));

    let mut session = listener(ours);
    let config = ProbeConfig {
        max_trials: Some(4096),
        ..ProbeConfig::default()
    };
    let mut search = OffsetSearch::seeded(config.initial_offset, 2024);
    let mut trials = Vec::new();

    let result = OffsetProber::new(&mut session, config)
        .search_offset(&mut search, |trial| trials.push(*trial))
        .await
        .unwrap();

    assert_eq!(result.offset, secret);
    assert_eq!(result.trials, trials.len() as u64);
    assert_eq!(unit.await.unwrap(), result.trials);

    let (last, rejected) = trials.split_last().unwrap();
    assert_eq!(last.outcome, TrialOutcome::Accepted);
    assert_eq!(last.offset, secret);
    assert_eq!(last.channel, (0x02, Some(SUBTYPE)));
    assert!(rejected.iter().all(|t| t.outcome == TrialOutcome::Rejected));
    assert!(rejected.iter().all(|t| t.offset != secret));
    assert!(trials.iter().all(|t| t.offset & 0xFF == 0xB5));
    assert_eq!(trials[0].offset, 0xBFB5);

    // The confirmed offset is now known for this channel.
    let recorded = session.engine().table().lookup(&result.header).unwrap();
    assert_eq!(recorded.mac, secret);
    assert_eq!(recorded.counter, ANNOUNCE_OFFSETS.counter);
}

/// Run one search against a unit accepting `secret`, returning the
/// confirmed offset and every trial seen.
fn search_with_seed(secret: u16, seed: u64) -> (u16, Vec<ProbeTrial>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async move {
        let (local, remote) = addrs();
        let (ours, theirs) = channel_pair(local, remote);
        let unit = tokio::spawn(run_unit(theirs, Some(secret)));

        let mut session = listener(ours);
        let config = ProbeConfig {
            max_trials: Some(8192),
            ..ProbeConfig::default()
        };
        let mut search = OffsetSearch::seeded(config.initial_offset, seed);
        let mut trials = Vec::new();

        let result = OffsetProber::new(&mut session, config)
            .search_offset(&mut search, |trial| trials.push(*trial))
            .await
            .unwrap();
        assert_eq!(unit.await.unwrap(), result.trials);
        (result.offset, trials)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_search_returns_accepted_offset(high in any::<u8>(), seed in any::<u64>()) {
        let secret = u16::from_le_bytes([0xB5, high]);
        let (offset, trials) = search_with_seed(secret, seed);

        prop_assert_eq!(offset, secret);
        let (last, rejected) = trials.split_last().unwrap();
        prop_assert_eq!(last.outcome, TrialOutcome::Accepted);
        prop_assert_eq!(last.offset, secret);
        prop_assert!(rejected.iter().all(|t| t.outcome == TrialOutcome::Rejected));
        prop_assert!(rejected.iter().all(|t| t.offset != secret));
    }
}

#[tokio::test(start_paused = true)]
async fn test_initial_guess_accepted_on_first_trial() {
    let (local, remote) = addrs();
    let (ours, theirs) = channel_pair(local, remote);
    let unit = tokio::spawn(run_unit(theirs, Some(ANNOUNCE_OFFSETS.mac)));

    let mut session = listener(ours);
    let mut search = OffsetSearch::seeded(ANNOUNCE_OFFSETS.mac, 1);
    let result = OffsetProber::new(&mut session, ProbeConfig::default())
        .search_offset(&mut search, |_| {})
        .await
        .unwrap();

    assert_eq!(result.offset, ANNOUNCE_OFFSETS.mac);
    assert_eq!(result.trials, 1);
    assert_eq!(unit.await.unwrap(), 1);
    assert_eq!(session.stats().acks_sent, 2);
    assert_eq!(session.stats().announcements_sent, 1);
}

#[tokio::test(start_paused = true)]
async fn test_trial_cap_gives_up() {
    let (local, remote) = addrs();
    let (ours, theirs) = channel_pair(local, remote);
    let unit = tokio::spawn(run_unit(theirs, None));

    let mut session = listener(ours);
    let config = ProbeConfig {
        max_trials: Some(3),
        ..ProbeConfig::default()
    };
    let mut search = config.search();
    let mut seen = 0;
    let err = OffsetProber::new(&mut session, config)
        .search_offset(&mut search, |_| seen += 1)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProbeExhausted { trials: 3 }));
    assert_eq!(seen, 3);
    unit.abort();
}

#[tokio::test(start_paused = true)]
async fn test_silent_unit_is_not_a_rejection() {
    let (local, remote) = addrs();
    let (ours, _theirs) = channel_pair(local, remote);

    let mut session = listener(ours);
    let mut search = OffsetSearch::seeded(0xBFB5, 5);
    let mut seen = 0;
    let err = OffsetProber::new(&mut session, ProbeConfig::default())
        .search_offset(&mut search, |_| seen += 1)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DeviceSilent { .. }));
    assert_eq!(seen, 0);
}
