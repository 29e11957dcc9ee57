//! The rule specification accumulated while parsing.

use std::net::Ipv4Addr;

use crate::address::{Interface, MacAddr, ETH_ALEN};
use crate::options::InvFlags;

/// Maximum hardware address length carried by a rule.
pub const DEV_ADDR_LEN_MAX: usize = 16;

/// Hardware address and mask as stored in a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DevAddr {
    pub addr: [u8; DEV_ADDR_LEN_MAX],
    pub mask: [u8; DEV_ADDR_LEN_MAX],
}

impl DevAddr {
    /// Store an Ethernet address and mask in the leading bytes.
    pub fn from_mac(addr: MacAddr, mask: MacAddr) -> Self {
        let mut out = DevAddr::default();
        out.addr[..ETH_ALEN].copy_from_slice(&addr.octets());
        out.mask[..ETH_ALEN].copy_from_slice(&mask.octets());
        out
    }

    /// Whether any mask bit is set.
    pub fn is_set(&self) -> bool {
        self.mask.iter().any(|&b| b != 0)
    }

    /// The Ethernet-sized address prefix.
    pub fn mac(&self) -> MacAddr {
        let mut out = [0u8; ETH_ALEN];
        out.copy_from_slice(&self.addr[..ETH_ALEN]);
        MacAddr(out)
    }

    /// The Ethernet-sized mask prefix.
    pub fn mac_mask(&self) -> MacAddr {
        let mut out = [0u8; ETH_ALEN];
        out.copy_from_slice(&self.mask[..ETH_ALEN]);
        MacAddr(out)
    }
}

/// ARP header match fields.
///
/// 16-bit fields are kept in host order; the record encoder writes them
/// big-endian. A zero mask means the field is not matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpSpec {
    pub src: Ipv4Addr,
    pub tgt: Ipv4Addr,
    pub smsk: Ipv4Addr,
    pub tmsk: Ipv4Addr,
    pub arhln: u8,
    pub arhln_mask: u8,
    pub src_devaddr: DevAddr,
    pub tgt_devaddr: DevAddr,
    pub arpop: u16,
    pub arpop_mask: u16,
    pub arhrd: u16,
    pub arhrd_mask: u16,
    pub arpro: u16,
    pub arpro_mask: u16,
    pub iniface: Interface,
    pub outiface: Interface,
    pub flags: u8,
    pub invflags: InvFlags,
}

impl Default for ArpSpec {
    fn default() -> Self {
        Self {
            src: Ipv4Addr::UNSPECIFIED,
            tgt: Ipv4Addr::UNSPECIFIED,
            smsk: Ipv4Addr::UNSPECIFIED,
            tmsk: Ipv4Addr::UNSPECIFIED,
            arhln: 0,
            arhln_mask: 0,
            src_devaddr: DevAddr::default(),
            tgt_devaddr: DevAddr::default(),
            arpop: 0,
            arpop_mask: 0,
            arhrd: 0,
            arhrd_mask: 0,
            arpro: 0,
            arpro_mask: 0,
            iniface: Interface::default(),
            outiface: Interface::default(),
            flags: 0,
            invflags: InvFlags::empty(),
        }
    }
}

/// Packet and byte counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub pcnt: u64,
    pub bcnt: u64,
}

/// A rule specification: match fields plus initial counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleSpec {
    pub arp: ArpSpec,
    pub counters: Counters,
}

impl RuleSpec {
    /// An empty specification that matches every packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the hardware length is pinned to exactly `len`.
    pub fn has_exact_hw_length(&self, len: u8) -> bool {
        self.arp.arhln_mask == u8::MAX
            && self.arp.arhln == len
            && !self.arp.invflags.contains(InvFlags::ARPHLN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devaddr_from_mac() {
        let dev = DevAddr::from_mac(MacAddr([1, 2, 3, 4, 5, 6]), MacAddr::BROADCAST);
        assert_eq!(&dev.addr[..6], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&dev.addr[6..], &[0; 10]);
        assert!(dev.is_set());
        assert_eq!(dev.mac(), MacAddr([1, 2, 3, 4, 5, 6]));
        assert!(!DevAddr::default().is_set());
    }

    #[test]
    fn test_exact_hw_length() {
        let mut spec = RuleSpec::new();
        assert!(!spec.has_exact_hw_length(6));
        spec.arp.arhln = 6;
        spec.arp.arhln_mask = 255;
        assert!(spec.has_exact_hw_length(6));
        spec.arp.invflags |= InvFlags::ARPHLN;
        assert!(!spec.has_exact_hw_length(6));
    }
}
