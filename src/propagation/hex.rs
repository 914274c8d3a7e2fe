//! Lower-hex codec for trace and span identifiers.
//!
//! Identifiers render as fixed-width lower-case hex: 16 characters per 64-bit
//! id, 32 for a trace id whose high bits are set. Parsing is lenient about
//! width (leading zeros may be dropped) but strict about the alphabet.

/// Renders a 64-bit id as 16 lower-hex characters.
#[inline]
pub fn to_lower_hex(v: u64) -> String {
    ::hex::encode(v.to_be_bytes())
}

/// Renders a trace id, using 32 characters only when the high bits are set.
pub fn trace_id_string(trace_id_high: u64, trace_id: u64) -> String {
    if trace_id_high != 0 {
        let mut result = String::with_capacity(32);
        result.push_str(&to_lower_hex(trace_id_high));
        result.push_str(&to_lower_hex(trace_id));
        return result;
    }
    to_lower_hex(trace_id)
}

/// Decodes `s[begin..end]` as lower-hex, returning zero on any invalid character.
///
/// Zero is ambiguous: callers tell a parse failure from a literal all-zero id
/// with [`is_all_zeros`].
pub fn lenient_lower_hex_to_u64(s: &[u8], begin: usize, end: usize) -> u64 {
    let mut result = 0u64;
    for &c in &s[begin..end] {
        let nibble = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            _ => return 0,
        };
        result = (result << 4) | u64::from(nibble);
    }
    result
}

/// True when every character in `s[begin..end]` is `'0'`.
pub fn is_all_zeros(s: &[u8], begin: usize, end: usize) -> bool {
    s[begin..end].iter().all(|&c| c == b'0')
}

/// Parses a 1-32 character trace id into `(high, low)`.
///
/// Returns `None` for malformed or all-zero input.
pub fn parse_trace_id(s: &str) -> Option<(u64, u64)> {
    let bytes = s.as_bytes();
    let length = bytes.len();
    if length == 0 || length > 32 {
        return None;
    }
    let split = length.saturating_sub(16);
    let high = if split > 0 {
        let high = lenient_lower_hex_to_u64(bytes, 0, split);
        if high == 0 && !is_all_zeros(bytes, 0, split) {
            return None;
        }
        high
    } else {
        0
    };
    let low = lenient_lower_hex_to_u64(bytes, split, length);
    if low == 0 && !is_all_zeros(bytes, split, length) {
        return None;
    }
    if high == 0 && low == 0 {
        return None;
    }
    Some((high, low))
}

/// Parses a 1-16 character span or parent id. Returns `None` for malformed or zero input.
pub fn parse_span_id(s: &str) -> Option<u64> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }
    match lenient_lower_hex_to_u64(bytes, 0, bytes.len()) {
        0 => None,
        id => Some(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower_hex_is_fixed_width() {
        assert_eq!(to_lower_hex(1), "0000000000000001");
        assert_eq!(to_lower_hex(u64::MAX), "ffffffffffffffff");
    }

    #[test]
    fn test_trace_id_string_width() {
        assert_eq!(trace_id_string(0, 0xa), "000000000000000a");
        assert_eq!(trace_id_string(1, 2), "00000000000000010000000000000002");
    }

    #[test]
    fn test_lenient_rejects_upper_case() {
        let s = b"ABC";
        assert_eq!(lenient_lower_hex_to_u64(s, 0, 3), 0);
        assert!(!is_all_zeros(s, 0, 3));
    }

    #[test]
    fn test_parse_short_ids() {
        assert_eq!(parse_trace_id("a"), Some((0, 0xa)));
        assert_eq!(parse_span_id("ff"), Some(0xff));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(parse_trace_id(""), None);
        assert_eq!(parse_trace_id(&"1".repeat(33)), None);
        assert_eq!(parse_trace_id("0000"), None);
        assert_eq!(parse_trace_id("xyz"), None);
        assert_eq!(parse_span_id("00000000000000001"), None);
        assert_eq!(parse_span_id("0"), None);
    }

    #[test]
    fn test_parse_128_bit() {
        let (high, low) = parse_trace_id("463ac35c9f6413ad48485a3953bb6124").unwrap();
        assert_eq!(high, 0x463ac35c9f6413ad);
        assert_eq!(low, 0x48485a3953bb6124);
    }

    #[test]
    fn test_parse_high_bits_zero_padded() {
        assert_eq!(parse_trace_id("00000000000000000000000000000001"), Some((0, 1)));
        assert_eq!(parse_trace_id("0000000000000000g000000000000001"), None);
    }
}
