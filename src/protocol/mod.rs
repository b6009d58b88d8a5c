//! Wire protocol of the SystaComfort controller.
//!
//! Two channels are involved: a text protocol on the discovery port, used
//! to find a unit and read its identity, and a binary protocol on the
//! session port, where the unit pushes telemetry frames and expects each
//! one acknowledged.
//!
//! ## Frame Header
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ 0..4 unit bytes │ 4..6 device id (LE) │ 6..8 counter (LE) │ 8 type │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ ... │ 16 subtype │ ... │ 20 parameter │ ...    (extended frames)   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Acknowledgment (16 bytes)
//!
//! Bytes 0..8 echoed, 8..12 zero, 12..14 device-id checksum, 14..16
//! counter checksum.
//!
//! ## Parameter Announcement (28 bytes)
//!
//! Bytes 0..8 echoed, 8 = 0x01, 12 = 0x02, 14 = 0x08, 19..23 = "1212",
//! 24..26 device-id checksum, 26..28 counter checksum, everything else zero.

mod checksum;
mod frame;
mod reply;

pub use checksum::{
    compute_checksum, compute_counter_checksum, ChecksumEngine, ChecksumPair, FrameKind,
    OffsetEntry, OffsetPair, OffsetTable, ACK_OFFSETS, ANNOUNCE_OFFSETS, PARAMETER_PACKET_TYPE,
};
pub use frame::{Frame, FrameHeader};
pub use reply::{
    contains_marker, decode_discovery_reply, decode_latin1, decode_password_reply,
    decode_port_reply, password_query, port_query, SEARCH_QUERY, SEARCH_REPLY_TOKENS,
    UNKNOWN_VALUE,
};

/// Well-known port the unit answers discovery queries on.
pub const DISCOVERY_PORT: u16 = 8001;

/// Local port the unit is configured to push telemetry to.
pub const SESSION_PORT: u16 = 22460;

/// Marker identifying a SystaComfort search reply.
pub const PROTOCOL_MARKER: &str = "systa";

/// Largest datagram either channel is expected to carry.
pub const MAX_DATAGRAM: usize = 1048;

/// Shortest frame accepted on the session port.
pub const MIN_FRAME_LEN: usize = 16;

/// Header bytes echoed back in every reply.
pub const COPIED_HEADER_LEN: usize = 8;

pub const ACK_LEN: usize = 16;
pub const ANNOUNCE_LEN: usize = 28;

pub const OFFSET_DEVICE_ID: usize = 4;
pub const OFFSET_COUNTER: usize = 6;
pub const OFFSET_PACKET_TYPE: usize = 8;
pub const OFFSET_SUBTYPE: usize = 16;
pub const OFFSET_PARAMETER: usize = 20;

/// Fixed `(position, value)` markers of the parameter announcement.
pub const ANNOUNCE_MARKER: &[(usize, u8)] = &[(8, 0x01), (12, 0x02), (14, 0x08)];

/// Fixed payload at bytes 19..23 of the parameter announcement.
pub const ANNOUNCE_PAYLOAD: [u8; 4] = *b"1212";

/// Build the acknowledgment for a received frame.
pub fn build_acknowledgment(received: &Frame) -> Frame {
    received.acknowledgment()
}

/// Build a parameter announcement for a received frame.
pub fn build_parameter_announcement(received: &Frame, offsets: OffsetPair) -> Frame {
    received.parameter_announcement(offsets)
}
