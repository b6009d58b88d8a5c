//! Reply checksums and the per-packet-type offset table.
//!
//! Every frame sent to the unit carries two 16-bit checksums. Both are a
//! header field read little-endian plus a constant offset, wrapping at
//! 2^16: one over the MAC-derived device id (bytes 4..6), one over the
//! frame counter (bytes 6..8). Only the offsets differ between frame kinds.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::frame::FrameHeader;

/// Packet type of frames that carry a writable parameter.
pub const PARAMETER_PACKET_TYPE: u8 = 0x02;

/// Offsets for the 16-byte acknowledgment.
pub const ACK_OFFSETS: OffsetPair = OffsetPair::new(0x8E82, 0x3FBF);

/// Offsets for the 28-byte parameter announcement.
pub const ANNOUNCE_OFFSETS: OffsetPair = OffsetPair::new(0xBFB5, 0x10F9);

/// `(LE u16 of mac_bytes + offset) mod 2^16`.
pub fn compute_checksum(mac_bytes: [u8; 2], offset: u16) -> u16 {
    LittleEndian::read_u16(&mac_bytes).wrapping_add(offset)
}

/// Same formula as [`compute_checksum`], applied to the counter field.
pub fn compute_counter_checksum(counter_bytes: [u8; 2], offset: u16) -> u16 {
    LittleEndian::read_u16(&counter_bytes).wrapping_add(offset)
}

/// The two offset constants used for one frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetPair {
    pub mac: u16,
    pub counter: u16,
}

impl OffsetPair {
    pub const fn new(mac: u16, counter: u16) -> Self {
        Self { mac, counter }
    }

    /// Replace the MAC-side offset, keeping the counter offset.
    pub const fn with_mac(self, mac: u16) -> Self {
        Self {
            mac,
            counter: self.counter,
        }
    }
}

/// The two checksums written into an outgoing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumPair {
    pub mac: u16,
    pub counter: u16,
}

impl ChecksumPair {
    /// Compute both checksums from a received header.
    pub fn compute(header: &FrameHeader, offsets: OffsetPair) -> Self {
        Self {
            mac: compute_checksum(header.device_id.to_le_bytes(), offsets.mac),
            counter: compute_counter_checksum(header.counter.to_le_bytes(), offsets.counter),
        }
    }

    /// Write both values little-endian at `at` and `at + 2`.
    pub fn write(&self, buf: &mut [u8], at: usize) {
        LittleEndian::write_u16(&mut buf[at..at + 2], self.mac);
        LittleEndian::write_u16(&mut buf[at + 2..at + 4], self.counter);
    }
}

/// Which outgoing frame the offsets are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Standard keep-alive acknowledgment.
    Acknowledgment,
    /// Parameter announcement; table entries override the fixed constants.
    Announcement,
    /// Parameter write; unknown channels fall back to the acknowledgment offsets.
    ParameterWrite,
}

/// One known `(type, subtype)` channel and its base offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetEntry {
    pub packet_type: u8,
    pub subtype: u8,
    pub mac: u16,
    pub counter: u16,
}

/// Open mapping from `(packet type, subtype)` to base offsets.
///
/// Coverage is empirical. The offset applied to a frame is the base plus
/// the frame's parameter byte; the counter offset is used as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    entries: HashMap<(u8, u8), OffsetPair>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from configured entries. Later entries win.
    pub fn from_entries(entries: &[OffsetEntry]) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(
                entry.packet_type,
                entry.subtype,
                OffsetPair::new(entry.mac, entry.counter),
            );
        }
        table
    }

    pub fn insert(&mut self, packet_type: u8, subtype: u8, base: OffsetPair) -> Option<OffsetPair> {
        self.entries.insert((packet_type, subtype), base)
    }

    /// Store a probe-confirmed MAC offset for the channel of `header`.
    ///
    /// The parameter byte is subtracted so that [`lookup`](Self::lookup)
    /// reproduces `confirmed` for the same header.
    pub fn record(&mut self, header: &FrameHeader, confirmed: u16, counter: u16) -> Option<OffsetPair> {
        let subtype = header.subtype?;
        let base = confirmed.wrapping_sub(u16::from(header.parameter.unwrap_or(0)));
        self.insert(header.packet_type, subtype, OffsetPair::new(base, counter))
    }

    /// Offsets for a parameter frame, if its channel is known.
    pub fn lookup(&self, header: &FrameHeader) -> Option<OffsetPair> {
        if header.packet_type != PARAMETER_PACKET_TYPE {
            return None;
        }
        let subtype = header.subtype?;
        let base = self.entries.get(&(header.packet_type, subtype))?;
        let parameter = u16::from(header.parameter.unwrap_or(0));
        Some(base.with_mac(base.mac.wrapping_add(parameter)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by channel, for reporting.
    pub fn entries(&self) -> Vec<OffsetEntry> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|(&(packet_type, subtype), pair)| OffsetEntry {
                packet_type,
                subtype,
                mac: pair.mac,
                counter: pair.counter,
            })
            .collect();
        out.sort_by_key(|e| (e.packet_type, e.subtype));
        out
    }
}

/// Selects offsets for outgoing frames.
#[derive(Debug, Clone, Default)]
pub struct ChecksumEngine {
    table: OffsetTable,
}

impl ChecksumEngine {
    pub fn new(table: OffsetTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &OffsetTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut OffsetTable {
        &mut self.table
    }

    /// Offsets to use when answering `header` with a frame of `kind`.
    pub fn offsets(&self, kind: FrameKind, header: &FrameHeader) -> OffsetPair {
        match kind {
            FrameKind::Acknowledgment => ACK_OFFSETS,
            FrameKind::Announcement => self.table.lookup(header).unwrap_or(ANNOUNCE_OFFSETS),
            FrameKind::ParameterWrite => self.table.lookup(header).unwrap_or(ACK_OFFSETS),
        }
    }

    /// Checksums for answering `header` with a frame of `kind`.
    pub fn checksums(&self, kind: FrameKind, header: &FrameHeader) -> ChecksumPair {
        ChecksumPair::compute(header, self.offsets(kind, header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header(packet_type: u8, subtype: Option<u8>, parameter: Option<u8>) -> FrameHeader {
        FrameHeader {
            device_id: 0x0201,
            counter: 100,
            packet_type,
            subtype,
            parameter,
        }
    }

    #[test]
    fn test_known_checksum() {
        assert_eq!(compute_checksum([0x01, 0x02], 0x8E82), 0x9083);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(compute_checksum([0xFF, 0xFF], 0x0002), 0x0001);
        assert_eq!(compute_counter_checksum([0x00, 0xF0], 0x3FBF), 0x2FBF);
    }

    #[test]
    fn test_fixed_offsets() {
        let engine = ChecksumEngine::default();
        let h = header(0x01, None, None);
        assert_eq!(engine.offsets(FrameKind::Acknowledgment, &h), ACK_OFFSETS);
        assert_eq!(engine.offsets(FrameKind::Announcement, &h), ANNOUNCE_OFFSETS);
        assert_eq!(engine.offsets(FrameKind::ParameterWrite, &h), ACK_OFFSETS);
    }

    #[test]
    fn test_table_adds_parameter() {
        let mut table = OffsetTable::new();
        table.insert(0x02, 0x11, OffsetPair::new(0x4000, 0x1234));
        let engine = ChecksumEngine::new(table);

        let h = header(0x02, Some(0x11), Some(3));
        let offsets = engine.offsets(FrameKind::ParameterWrite, &h);
        assert_eq!(offsets, OffsetPair::new(0x4003, 0x1234));
        assert_eq!(engine.offsets(FrameKind::Announcement, &h), offsets);
        // Acknowledgments never consult the table.
        assert_eq!(engine.offsets(FrameKind::Acknowledgment, &h), ACK_OFFSETS);
    }

    #[test]
    fn test_unknown_channel_falls_back() {
        let mut table = OffsetTable::new();
        table.insert(0x02, 0x11, OffsetPair::new(0x4000, 0x1234));
        let engine = ChecksumEngine::new(table);

        let other_subtype = header(0x02, Some(0x12), Some(0));
        assert_eq!(engine.offsets(FrameKind::ParameterWrite, &other_subtype), ACK_OFFSETS);

        let other_type = header(0x03, Some(0x11), Some(0));
        assert_eq!(engine.offsets(FrameKind::ParameterWrite, &other_type), ACK_OFFSETS);
        assert_eq!(engine.offsets(FrameKind::Announcement, &other_type), ANNOUNCE_OFFSETS);

        let short = header(0x02, None, None);
        assert_eq!(engine.offsets(FrameKind::ParameterWrite, &short), ACK_OFFSETS);
    }

    #[test]
    fn test_record_round_trips_through_lookup() {
        let mut table = OffsetTable::new();
        let h = header(0x02, Some(0x20), Some(0x05));
        assert!(table.record(&h, 0xBFB5, 0x10F9).is_none());
        assert_eq!(table.lookup(&h), Some(OffsetPair::new(0xBFB5, 0x10F9)));
        assert_eq!(table.entries()[0].mac, 0xBFB0);
    }

    #[test]
    fn test_checksum_pair_layout() {
        let h = header(0x00, None, None);
        let pair = ChecksumPair::compute(&h, ACK_OFFSETS);
        let mut buf = [0u8; 16];
        pair.write(&mut buf, 12);
        assert_eq!(&buf[12..14], &0x9083u16.to_le_bytes());
        assert_eq!(&buf[14..16], &(100u16 + 0x3FBF).to_le_bytes());
    }

    proptest! {
        #[test]
        fn prop_distinct_offsets_give_distinct_checksums(
            mac in any::<[u8; 2]>(),
            o1 in any::<u16>(),
            o2 in any::<u16>(),
        ) {
            prop_assume!(o1 != o2);
            prop_assert_ne!(compute_checksum(mac, o1), compute_checksum(mac, o2));
        }

        #[test]
        fn prop_matches_modular_sum(mac in any::<[u8; 2]>(), offset in any::<u16>()) {
            let expected = (u32::from(u16::from_le_bytes(mac)) + u32::from(offset)) % 0x1_0000;
            prop_assert_eq!(u32::from(compute_checksum(mac, offset)), expected);
        }
    }
}
