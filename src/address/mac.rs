//! Hardware (Ethernet) address parsing.

use std::fmt;

use crate::error::{Error, Result};

/// Ethernet address length in bytes.
pub const ETH_ALEN: usize = 6;

/// A 6-byte Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; ETH_ALEN]);

impl MacAddr {
    /// The all-zero address.
    pub const ZERO: MacAddr = MacAddr([0; ETH_ALEN]);
    /// The all-ones address (broadcast, or an exact-match mask).
    pub const BROADCAST: MacAddr = MacAddr([0xff; ETH_ALEN]);
    /// Only the group (multicast) bit set.
    pub const GROUP_BIT: MacAddr = MacAddr([1, 0, 0, 0, 0, 0]);

    /// Raw bytes.
    pub fn octets(&self) -> [u8; ETH_ALEN] {
        self.0
    }

    /// Bitwise AND with a mask.
    pub fn masked(&self, mask: &MacAddr) -> MacAddr {
        let mut out = self.0;
        for (byte, m) in out.iter_mut().zip(mask.0.iter()) {
            *byte &= m;
        }
        MacAddr(out)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Parse colon-separated hex bytes (`0:1:a:bb:cc:dd` style, 1-2 digits
/// per byte).
pub fn ether_aton(text: &str) -> Option<MacAddr> {
    let mut out = [0u8; ETH_ALEN];
    let mut parts = text.split(':');
    for byte in out.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(MacAddr(out))
}

/// Parse `address[/mask]` or one of the aliases `Unicast`, `Multicast`
/// and `Broadcast` (case-insensitive).
///
/// The stored address is already ANDed with the mask.
pub fn getmac_and_mask(text: &str) -> Option<(MacAddr, MacAddr)> {
    if text.eq_ignore_ascii_case("Unicast") {
        return Some((MacAddr::ZERO, MacAddr::GROUP_BIT));
    }
    if text.eq_ignore_ascii_case("Multicast") {
        return Some((MacAddr::GROUP_BIT, MacAddr::GROUP_BIT));
    }
    if text.eq_ignore_ascii_case("Broadcast") {
        return Some((MacAddr::BROADCAST, MacAddr::BROADCAST));
    }

    let (addr, mask) = match text.rfind('/') {
        Some(idx) => (&text[..idx], ether_aton(&text[idx + 1..])?),
        None => (text, MacAddr::BROADCAST),
    };
    let addr = ether_aton(addr)?;
    Some((addr.masked(&mask), mask))
}

/// Like [`getmac_and_mask`], reporting failure as a parameter problem
/// naming `what` ("source mac", "destination mac").
pub fn parse_mac_option(text: &str, what: &str) -> Result<(MacAddr, MacAddr)> {
    getmac_and_mask(text).ok_or_else(|| Error::param(format!("Problem with specified {}", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(
            getmac_and_mask("Broadcast"),
            Some((MacAddr::BROADCAST, MacAddr::BROADCAST))
        );
        assert_eq!(
            getmac_and_mask("unicast"),
            Some((MacAddr([0; 6]), MacAddr([1, 0, 0, 0, 0, 0])))
        );
        assert_eq!(
            getmac_and_mask("MULTICAST"),
            Some((MacAddr([1, 0, 0, 0, 0, 0]), MacAddr([1, 0, 0, 0, 0, 0])))
        );
    }

    #[test]
    fn test_plain_address_default_mask() {
        let (addr, mask) = getmac_and_mask("00:11:22:aa:BB:cc").unwrap();
        assert_eq!(addr, MacAddr([0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]));
        assert_eq!(mask, MacAddr::BROADCAST);
    }

    #[test]
    fn test_address_masked() {
        let (addr, mask) = getmac_and_mask("de:ad:be:ef:12:34/ff:ff:ff:0:0:0").unwrap();
        assert_eq!(addr, MacAddr([0xde, 0xad, 0xbe, 0, 0, 0]));
        assert_eq!(mask, MacAddr([0xff, 0xff, 0xff, 0, 0, 0]));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(getmac_and_mask("00:11:22:33:44").is_none());
        assert!(getmac_and_mask("00:11:22:33:44:55:66").is_none());
        assert!(getmac_and_mask("00:11:22:33:44:zz").is_none());
        assert!(getmac_and_mask("00:11:22:33:44:55/ff").is_none());
        assert!(getmac_and_mask("001:1:2:3:4:5").is_none());
        let err = parse_mac_option("bogus", "source mac").unwrap_err();
        assert_eq!(err.to_string(), "Problem with specified source mac");
    }

    #[test]
    fn test_display() {
        assert_eq!(MacAddr([0, 1, 0xab, 0, 0, 0xff]).to_string(), "00:01:ab:00:00:ff");
    }
}
