//! Numeric ARP header fields with optional masks.
//!
//! Every field is written as `value[/mask]`. Without a mask the whole
//! field is compared.

use super::number::parse_in_range;
use crate::error::{Error, Result};

/// ARP opcode names, indexed by `opcode - 1`.
pub const OPCODE_NAMES: [&str; 9] = [
    "Request",
    "Reply",
    "Request_Reverse",
    "Reply_Reverse",
    "DRARP_Request",
    "DRARP_Reply",
    "DRARP_Error",
    "InARP_Request",
    "ARP_NAK",
];

/// Hardware type number of Ethernet.
pub const HW_TYPE_ETHERNET: u16 = 1;

/// Protocol type number of IPv4.
pub const PROTO_TYPE_IPV4: u16 = 0x800;

/// Symbolic name for an opcode, if it has one.
pub fn opcode_name(opcode: u16) -> Option<&'static str> {
    (opcode as usize)
        .checked_sub(1)
        .and_then(|i| OPCODE_NAMES.get(i))
        .copied()
}

fn split_mask(text: &str) -> (&str, Option<&str>) {
    match text.rfind('/') {
        Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
        None => (text, None),
    }
}

/// Parse a hardware length (`0..=255`, decimal) and its mask.
pub fn parse_length(text: &str) -> Result<(u8, u8)> {
    let err = || Error::param(format!("Problem with specified hardware length `{}'", text));
    let (value, mask) = split_mask(text);
    let mask = match mask {
        Some(m) => parse_in_range(m, 10, 0, 255).ok_or_else(err)? as u8,
        None => u8::MAX,
    };
    let value = parse_in_range(value, 10, 0, 255).ok_or_else(err)? as u8;
    Ok((value, mask))
}

/// Parse a 16-bit field in `base`, falling back to `by_name` for the
/// value part when it is not a number.
///
/// The mask is always numeric; an unparsable mask is an error even when
/// the value is a known name.
fn parse_u16_field(
    text: &str,
    base: u32,
    what: &str,
    by_name: impl Fn(&str) -> Option<u16>,
) -> Result<(u16, u16)> {
    let err = || Error::param(format!("Problem with specified {}", what));
    let (value, mask) = split_mask(text);
    let mask = match mask {
        Some(m) => parse_in_range(m, base, 0, 0xffff).ok_or_else(err)? as u16,
        None => u16::MAX,
    };
    let value = match parse_in_range(value, base, 0, 0xffff) {
        Some(v) => v as u16,
        None => by_name(value).ok_or_else(err)?,
    };
    Ok((value, mask))
}

/// Parse an opcode: decimal, or one of [`OPCODE_NAMES`].
pub fn parse_opcode(text: &str) -> Result<(u16, u16)> {
    parse_u16_field(text, 10, "opcode", |name| {
        OPCODE_NAMES
            .iter()
            .position(|op| op.eq_ignore_ascii_case(name))
            .map(|i| i as u16 + 1)
    })
}

/// Parse a hardware type: hexadecimal, or `Ethernet`.
pub fn parse_hw_type(text: &str) -> Result<(u16, u16)> {
    parse_u16_field(text, 16, "hardware type", |name| {
        name.eq_ignore_ascii_case("Ethernet").then_some(HW_TYPE_ETHERNET)
    })
}

/// Parse a protocol type: C integer syntax, or `IPv4`.
pub fn parse_proto_type(text: &str) -> Result<(u16, u16)> {
    parse_u16_field(text, 0, "protocol type", |name| {
        name.eq_ignore_ascii_case("IPv4").then_some(PROTO_TYPE_IPV4)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length() {
        assert_eq!(parse_length("6").unwrap(), (6, 255));
        assert_eq!(parse_length("6/254").unwrap(), (6, 254));
        assert!(parse_length("256").is_err());
        assert!(parse_length("6/x").is_err());
        assert!(parse_length("").is_err());
    }

    #[test]
    fn test_opcode_numbers_and_names() {
        assert_eq!(parse_opcode("2").unwrap(), (2, 0xffff));
        assert_eq!(parse_opcode("request").unwrap(), (1, 0xffff));
        assert_eq!(parse_opcode("ARP_NAK").unwrap(), (9, 0xffff));
        assert_eq!(parse_opcode("Reply/255").unwrap(), (2, 255));
        let err = parse_opcode("Bogus").unwrap_err();
        assert_eq!(err.to_string(), "Problem with specified opcode");
    }

    #[test]
    fn test_name_with_bad_mask_rejected() {
        assert!(parse_opcode("Request/0xff").is_err());
        assert!(parse_opcode("1/65536").is_err());
    }

    #[test]
    fn test_hw_type_is_hex() {
        assert_eq!(parse_hw_type("1").unwrap(), (1, 0xffff));
        assert_eq!(parse_hw_type("10").unwrap(), (0x10, 0xffff));
        assert_eq!(parse_hw_type("ethernet").unwrap(), (1, 0xffff));
        assert!(parse_hw_type("token-ring").is_err());
    }

    #[test]
    fn test_proto_type_base_zero() {
        assert_eq!(parse_proto_type("0x800").unwrap(), (0x800, 0xffff));
        assert_eq!(parse_proto_type("2048").unwrap(), (0x800, 0xffff));
        assert_eq!(parse_proto_type("IPv4/0xff00").unwrap(), (0x800, 0xff00));
        assert!(parse_proto_type("ipv6").is_err());
    }

    #[test]
    fn test_opcode_name_lookup() {
        assert_eq!(opcode_name(1), Some("Request"));
        assert_eq!(opcode_name(9), Some("ARP_NAK"));
        assert_eq!(opcode_name(0), None);
        assert_eq!(opcode_name(10), None);
    }
}
