//! Utility functions and helpers.

mod interface;

pub use interface::*;

/// Format bytes as space-separated uppercase hex, as used in frame dumps.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02X}"));
    }
    out
}

/// Parse a 16-bit value written as `0x1234`, `1234h` or plain decimal.
pub fn parse_u16(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else if let Some(hex) = s.strip_suffix('h').or_else(|| s.strip_suffix('H')) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid 16-bit value {s:?}: {e}"))
}

/// Format duration as human-readable.
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    let ms = duration.subsec_millis();

    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{secs}.{ms:03}s")
    } else {
        format!("{ms}ms")
    }
}

/// Check if running with elevated privileges.
#[cfg(unix)]
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[0x0a]), "0A");
        assert_eq!(to_hex(&[0x2c, 0xbe, 0x00]), "2C BE 00");
    }

    #[test]
    fn test_parse_u16() {
        assert_eq!(parse_u16("0xBFB5"), Ok(0xBFB5));
        assert_eq!(parse_u16("bfb5h"), Ok(0xBFB5));
        assert_eq!(parse_u16("22460"), Ok(22460));
        assert!(parse_u16("0x10000").is_err());
        assert!(parse_u16("zz").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m 1s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.500s");
    }
}
