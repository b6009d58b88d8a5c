//! Binary telemetry frames and the frames sent back to the unit.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use super::checksum::{ChecksumPair, OffsetPair, ACK_OFFSETS};
use super::{
    ACK_LEN, ANNOUNCE_LEN, ANNOUNCE_MARKER, ANNOUNCE_PAYLOAD, COPIED_HEADER_LEN, MIN_FRAME_LEN,
    OFFSET_COUNTER, OFFSET_DEVICE_ID, OFFSET_PACKET_TYPE, OFFSET_PARAMETER, OFFSET_SUBTYPE,
};
use crate::error::ProtocolError;

/// Header fields of a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    /// MAC-derived device id, bytes 4..6 little-endian.
    pub device_id: u16,
    /// Per-frame counter, bytes 6..8 little-endian.
    pub counter: u16,
    pub packet_type: u8,
    /// Byte 16, extended frames only.
    pub subtype: Option<u8>,
    /// Byte 20, extended frames only.
    pub parameter: Option<u8>,
}

impl FrameHeader {
    /// Parse the header out of a raw datagram.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::FrameTooShort {
                expected: MIN_FRAME_LEN,
                got: data.len(),
            });
        }

        Ok(Self::read(data))
    }

    // Caller guarantees at least MIN_FRAME_LEN bytes.
    fn read(data: &[u8]) -> Self {
        Self {
            device_id: LittleEndian::read_u16(&data[OFFSET_DEVICE_ID..OFFSET_DEVICE_ID + 2]),
            counter: LittleEndian::read_u16(&data[OFFSET_COUNTER..OFFSET_COUNTER + 2]),
            packet_type: data[OFFSET_PACKET_TYPE],
            subtype: data.get(OFFSET_SUBTYPE).copied(),
            parameter: data.get(OFFSET_PARAMETER).copied(),
        }
    }

    /// `(type, subtype)` channel of this frame.
    pub fn channel(&self) -> (u8, Option<u8>) {
        (self.packet_type, self.subtype)
    }
}

/// A received or constructed frame. Never mutated after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
    header: FrameHeader,
}

impl Frame {
    /// Wrap a received datagram.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let header = FrameHeader::parse(data)?;
        Ok(Self {
            bytes: data.to_vec(),
            header,
        })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the frame is long enough to carry subtype and parameter.
    pub fn is_extended(&self) -> bool {
        self.header.parameter.is_some()
    }

    /// Build the 16-byte acknowledgment for this frame.
    ///
    /// Bytes 0..8 are echoed, 8..16 cleared, then the MAC checksum goes to
    /// 12..14 and the counter checksum to 14..16.
    pub fn acknowledgment(&self) -> Frame {
        let mut out = vec![0u8; ACK_LEN];
        out[..COPIED_HEADER_LEN].copy_from_slice(&self.bytes[..COPIED_HEADER_LEN]);
        ChecksumPair::compute(&self.header, ACK_OFFSETS).write(&mut out, 12);
        Self::constructed(out)
    }

    /// Build the 28-byte parameter announcement for this frame.
    pub fn parameter_announcement(&self, offsets: OffsetPair) -> Frame {
        let mut out = vec![0u8; ANNOUNCE_LEN];
        out[..COPIED_HEADER_LEN].copy_from_slice(&self.bytes[..COPIED_HEADER_LEN]);
        for &(at, value) in ANNOUNCE_MARKER {
            out[at] = value;
        }
        out[19..19 + ANNOUNCE_PAYLOAD.len()].copy_from_slice(&ANNOUNCE_PAYLOAD);
        ChecksumPair::compute(&self.header, offsets).write(&mut out, 24);
        Self::constructed(out)
    }

    fn constructed(bytes: Vec<u8>) -> Frame {
        let header = FrameHeader::read(&bytes);
        Self { bytes, header }
    }

    /// Hex dump, for logs.
    pub fn hex(&self) -> String {
        crate::util::to_hex(&self.bytes)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("header", &self.header)
            .field("bytes", &self.hex())
            .finish()
    }
}
