//! C-style integer parsing.
//!
//! Rule text follows `strtol` conventions: base 0 recognises `0x` hex
//! and leading-zero octal, and the whole string must be consumed.

/// Parse `text` as an integer in `base` (0, 8, 10 or 16).
///
/// Returns `None` when no digits were found, trailing garbage remains,
/// or the value overflows an `i64`.
pub fn parse_c_integer(text: &str, base: u32) -> Option<i64> {
    let s = text.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let has_hex_prefix =
        |s: &str| s.len() > 2 && (s.starts_with("0x") || s.starts_with("0X"));

    let (radix, digits) = match base {
        0 if has_hex_prefix(s) => (16, &s[2..]),
        0 if s.len() > 1 && s.starts_with('0') => (8, &s[1..]),
        0 => (10, s),
        16 if has_hex_prefix(s) => (16, &s[2..]),
        b => (b, s),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -value } else { value })
}

/// Parse `text` with base-0 rules and check it lies in `min..=max`.
pub fn string_to_number(text: &str, min: u64, max: u64) -> Option<u64> {
    parse_in_range(text, 0, min, max)
}

/// Parse `text` in `base` and check it lies in `min..=max`.
pub fn parse_in_range(text: &str, base: u32, min: u64, max: u64) -> Option<u64> {
    let value = parse_c_integer(text, base)?;
    let value = u64::try_from(value).ok()?;
    (min..=max).contains(&value).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_zero_prefixes() {
        assert_eq!(parse_c_integer("42", 0), Some(42));
        assert_eq!(parse_c_integer("0x2a", 0), Some(42));
        assert_eq!(parse_c_integer("052", 0), Some(42));
        assert_eq!(parse_c_integer("0", 0), Some(0));
    }

    #[test]
    fn test_fixed_bases() {
        assert_eq!(parse_c_integer("800", 16), Some(0x800));
        assert_eq!(parse_c_integer("0x800", 16), Some(0x800));
        assert_eq!(parse_c_integer("010", 10), Some(10));
        assert_eq!(parse_c_integer("1f", 10), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_c_integer("", 0), None);
        assert_eq!(parse_c_integer("12abc", 0), None);
        assert_eq!(parse_c_integer("0x", 0), None);
        assert_eq!(parse_c_integer("089", 0), None);
    }

    #[test]
    fn test_range_checks() {
        assert_eq!(string_to_number("32", 0, 32), Some(32));
        assert_eq!(string_to_number("33", 0, 32), None);
        assert_eq!(string_to_number("-1", 0, 32), None);
        assert_eq!(parse_in_range("65535", 10, 0, 65535), Some(65535));
        assert_eq!(parse_in_range("65536", 10, 0, 65535), None);
    }
}
