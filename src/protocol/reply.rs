//! Text replies on the discovery port.
//!
//! Replies are ISO-8859-1, single-space separated. A search reply looks like
//!
//! ```text
//! SC2 1 192.168.11.23 255.255.255.0 192.168.11.1 SystaComfort-II0 0809720001 0 V0.34 V1.00 2CBE9700BEE9
//! ```
//!
//! and the port/password replies like `0 7 3477\0`.

use crate::error::ProtocolError;
use crate::types::{UnitId, UnitInfo};

/// Minimum token count of a search reply.
pub const SEARCH_REPLY_TOKENS: usize = 11;

/// Substring marking an unsupported capability in a port reply.
pub const UNKNOWN_VALUE: &str = "unknown value";

const TOKEN_IP: usize = 2;
const TOKEN_NAME: usize = 5;
const TOKEN_ID: usize = 6;
const TOKEN_BASE_VERSION: usize = 8;
const TOKEN_MAC: usize = 10;
const TOKEN_VALUE: usize = 2;

/// Broadcast payload asking every unit to identify itself.
pub const SEARCH_QUERY: &[u8] = b"0 1 A";

/// Query for the S-Touch display port of the unit with `mac`.
pub fn port_query(mac: &str) -> Vec<u8> {
    encode_latin1(&format!("{mac} 6 A R DISP Port"))
}

/// Query for the UDP session password of the unit with `mac`.
pub fn password_query(mac: &str) -> Vec<u8> {
    encode_latin1(&format!("{mac} 6 R UDP Pass"))
}

/// Decode an ISO-8859-1 payload.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn encode_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Case-insensitive check for the protocol marker in a reply.
pub fn contains_marker(bytes: &[u8], marker: &str) -> bool {
    decode_latin1(bytes)
        .to_lowercase()
        .contains(&marker.to_lowercase())
}

/// Drop the terminator the unit appends to port and password values.
///
/// The terminator is either a run of NUL bytes or one trailing punctuation
/// character.
fn strip_terminator(token: &str) -> &str {
    let token = token.trim_end_matches(|c: char| c.is_whitespace() && c != '\0');
    if token.ends_with('\0') {
        return token.trim_end_matches('\0');
    }
    match token.chars().last() {
        Some(c) if c.is_ascii_punctuation() => &token[..token.len() - c.len_utf8()],
        _ => token,
    }
}

/// Drop the terminator byte of the name token, whatever it is.
///
/// Units send `SystaComfort-II0` or `SystaComfort-II\0`; any NULs left
/// after the terminator are padding.
fn strip_name_terminator(token: &str) -> &str {
    let token = token.trim_end_matches(|c: char| c.is_whitespace() && c != '\0');
    let token = match token.char_indices().last() {
        Some((at, _)) => &token[..at],
        None => token,
    };
    token.trim_end_matches('\0')
}

fn tokens(text: &str) -> Vec<&str> {
    text.split(' ').collect()
}

fn token<'a>(tokens: &[&'a str], index: usize) -> Result<&'a str, ProtocolError> {
    tokens.get(index).copied().ok_or(ProtocolError::TooFewTokens {
        expected: index + 1,
        got: tokens.len(),
    })
}

/// Decode a search reply into the unit's identity fields.
pub fn decode_discovery_reply(bytes: &[u8]) -> Result<UnitInfo, ProtocolError> {
    let text = decode_latin1(bytes);
    let raw = text.trim().to_string();
    let parts = tokens(&raw);
    if parts.len() < SEARCH_REPLY_TOKENS {
        return Err(ProtocolError::TooFewTokens {
            expected: SEARCH_REPLY_TOKENS,
            got: parts.len(),
        });
    }

    let ip_token = parts[TOKEN_IP];
    let ip = ip_token
        .parse()
        .map_err(|_| ProtocolError::InvalidAddress(ip_token.to_string()))?;
    let name = strip_name_terminator(parts[TOKEN_NAME]).to_string();
    let id = UnitId::parse(parts[TOKEN_ID])?;
    let base_version = parts[TOKEN_BASE_VERSION].to_string();
    let mac = parts[TOKEN_MAC].trim_end_matches('\0').to_string();
    if mac.is_empty() {
        return Err(ProtocolError::EmptyField("MAC"));
    }

    Ok(UnitInfo {
        raw,
        ip,
        name,
        id,
        base_version,
        mac,
    })
}

/// Decode a display-port reply. `None` means the unit lacks S-Touch.
pub fn decode_port_reply(bytes: &[u8]) -> Result<Option<u16>, ProtocolError> {
    let text = decode_latin1(bytes);
    if text.to_lowercase().contains(UNKNOWN_VALUE) {
        return Ok(None);
    }

    let parts = tokens(text.trim_start());
    let value = strip_terminator(token(&parts, TOKEN_VALUE)?);
    value
        .parse()
        .map(Some)
        .map_err(|_| ProtocolError::InvalidPort(value.to_string()))
}

/// Decode a password reply.
pub fn decode_password_reply(bytes: &[u8]) -> Result<String, ProtocolError> {
    let text = decode_latin1(bytes);
    let parts = tokens(text.trim_start());
    let value = strip_terminator(token(&parts, TOKEN_VALUE)?);
    if value.is_empty() {
        return Err(ProtocolError::EmptyField("password"));
    }
    Ok(value.to_string())
}
