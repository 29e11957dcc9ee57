//! The `mangle` target: rewrite ARP addresses.

use std::net::Ipv4Addr;

use super::{ExtOption, Extension, ExtensionData, OptionCall};
use crate::address::{ether_aton, parse_hostnetwork, ETH_ALEN};
use crate::options::InvFlags;
use crate::rule_spec::{ArpSpec, RuleSpec, DEV_ADDR_LEN_MAX};
use crate::{Error, Result};

const MANGLE_IPS: u32 = b'1' as u32;
const MANGLE_IPT: u32 = b'2' as u32;
const MANGLE_DEVS: u32 = b'3' as u32;
const MANGLE_DEVT: u32 = b'4' as u32;
const MANGLE_TARGET: u32 = b'5' as u32;

/// Flag bits stored in the data block.
pub const MANGLE_SDEV: u8 = 0x01;
pub const MANGLE_TDEV: u8 = 0x02;
pub const MANGLE_SIP: u8 = 0x04;
pub const MANGLE_TIP: u8 = 0x08;

/// Verdicts after mangling.
pub const MANGLE_DROP: i32 = 0;
pub const MANGLE_ACCEPT: i32 = 1;
pub const MANGLE_CONTINUE: i32 = -1;

// src devaddr, tgt devaddr, src ip, tgt ip, flags, pad, target
const OFF_SRC_IP: usize = 2 * DEV_ADDR_LEN_MAX;
const OFF_TGT_IP: usize = OFF_SRC_IP + 4;
const OFF_FLAGS: usize = OFF_TGT_IP + 4;
const OFF_TARGET: usize = OFF_FLAGS + 4;
const MANGLE_SIZE: usize = OFF_TARGET + 4;

static OPTIONS: [ExtOption; 5] = [
    ExtOption::with_arg("mangle-ip-s", MANGLE_IPS),
    ExtOption::with_arg("mangle-ip-d", MANGLE_IPT),
    ExtOption::with_arg("mangle-mac-s", MANGLE_DEVS),
    ExtOption::with_arg("mangle-mac-d", MANGLE_DEVT),
    ExtOption::with_arg("mangle-target", MANGLE_TARGET),
];

/// The `mangle` target extension.
#[derive(Debug, Default)]
pub struct MangleTarget;

impl Extension for MangleTarget {
    fn name(&self) -> &str {
        "mangle"
    }

    fn size(&self) -> usize {
        MANGLE_SIZE
    }

    fn options(&self) -> &[ExtOption] {
        &OPTIONS
    }

    fn init(&self, _label: &str) -> Box<dyn ExtensionData> {
        Box::new(MangleData::default())
    }

    fn print(&self, data: &[u8], _arp: &ArpSpec, _numeric: bool) -> String {
        match MangleData::decode(data) {
            Some(mangle) => mangle.to_options(),
            None => format!("[{} bytes of unreadable mangle data] ", data.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MangleData {
    src_devaddr: [u8; DEV_ADDR_LEN_MAX],
    tgt_devaddr: [u8; DEV_ADDR_LEN_MAX],
    src_ip: Ipv4Addr,
    tgt_ip: Ipv4Addr,
    flags: u8,
    target: i32,
}

impl Default for MangleData {
    fn default() -> Self {
        Self {
            src_devaddr: [0; DEV_ADDR_LEN_MAX],
            tgt_devaddr: [0; DEV_ADDR_LEN_MAX],
            src_ip: Ipv4Addr::UNSPECIFIED,
            tgt_ip: Ipv4Addr::UNSPECIFIED,
            flags: 0,
            target: MANGLE_ACCEPT,
        }
    }
}

impl MangleData {
    fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < MANGLE_SIZE {
            return None;
        }
        let mut src_devaddr = [0u8; DEV_ADDR_LEN_MAX];
        src_devaddr.copy_from_slice(&data[..DEV_ADDR_LEN_MAX]);
        let mut tgt_devaddr = [0u8; DEV_ADDR_LEN_MAX];
        tgt_devaddr.copy_from_slice(&data[DEV_ADDR_LEN_MAX..OFF_SRC_IP]);
        let ip_at = |off: usize| Ipv4Addr::new(data[off], data[off + 1], data[off + 2], data[off + 3]);
        let target = i32::from_be_bytes(data[OFF_TARGET..MANGLE_SIZE].try_into().ok()?);
        Some(Self {
            src_devaddr,
            tgt_devaddr,
            src_ip: ip_at(OFF_SRC_IP),
            tgt_ip: ip_at(OFF_TGT_IP),
            flags: data[OFF_FLAGS],
            target,
        })
    }

    fn to_options(&self) -> String {
        let mac = |addr: &[u8; DEV_ADDR_LEN_MAX]| {
            addr[..ETH_ALEN]
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":")
        };

        let mut out = String::new();
        if self.flags & MANGLE_SIP != 0 {
            out.push_str(&format!("--mangle-ip-s {} ", self.src_ip));
        }
        if self.flags & MANGLE_SDEV != 0 {
            out.push_str(&format!("--mangle-mac-s {} ", mac(&self.src_devaddr)));
        }
        if self.flags & MANGLE_TIP != 0 {
            out.push_str(&format!("--mangle-ip-d {} ", self.tgt_ip));
        }
        if self.flags & MANGLE_TDEV != 0 {
            out.push_str(&format!("--mangle-mac-d {} ", mac(&self.tgt_devaddr)));
        }
        match self.target {
            MANGLE_ACCEPT => {}
            MANGLE_DROP => out.push_str("--mangle-target DROP "),
            MANGLE_CONTINUE => out.push_str("--mangle-target CONTINUE "),
            other => out.push_str(&format!("--mangle-target {} ", other)),
        }
        out
    }
}

fn single_address(call: &OptionCall<'_>, option: &str) -> Result<Ipv4Addr> {
    let addrs = parse_hostnetwork(call.arg(), call.resolver)?;
    match addrs.as_slice() {
        [addr] => Ok(*addr),
        _ => Err(Error::param(format!(
            "--{} requires a unique address, `{}' resolves to {}",
            option,
            call.arg(),
            addrs.len()
        ))),
    }
}

fn mangled_mac(call: &OptionCall<'_>, spec: &RuleSpec, option: &str) -> Result<[u8; DEV_ADDR_LEN_MAX]> {
    if spec.arp.arhln_mask == 0 {
        return Err(Error::param(format!("no --h-length defined for --{}", option)));
    }
    if spec.arp.invflags.contains(InvFlags::ARPHLN) {
        return Err(Error::param(format!("! --h-length not allowed for --{}", option)));
    }
    if !spec.has_exact_hw_length(ETH_ALEN as u8) {
        return Err(Error::param("only --h-length 6 supported"));
    }
    let mac = ether_aton(call.arg())
        .ok_or_else(|| Error::param(format!("invalid MAC address `{}' for --{}", call.arg(), option)))?;
    let mut out = [0u8; DEV_ADDR_LEN_MAX];
    out[..ETH_ALEN].copy_from_slice(&mac.octets());
    Ok(out)
}

impl ExtensionData for MangleData {
    fn parse(&mut self, call: &OptionCall<'_>, flags: &mut u32, spec: &mut RuleSpec) -> Result<bool> {
        if call.invert {
            if OPTIONS.iter().any(|o| o.code == call.code) {
                return Err(Error::param("mangle: unexpected ! flag"));
            }
            return Ok(false);
        }

        match call.code {
            MANGLE_IPS => {
                self.src_ip = single_address(call, "mangle-ip-s")?;
                self.flags |= MANGLE_SIP;
            }
            MANGLE_IPT => {
                self.tgt_ip = single_address(call, "mangle-ip-d")?;
                self.flags |= MANGLE_TIP;
            }
            MANGLE_DEVS => {
                self.src_devaddr = mangled_mac(call, spec, "mangle-mac-s")?;
                self.flags |= MANGLE_SDEV;
            }
            MANGLE_DEVT => {
                self.tgt_devaddr = mangled_mac(call, spec, "mangle-mac-d")?;
                self.flags |= MANGLE_TDEV;
            }
            MANGLE_TARGET => {
                self.target = match call.arg() {
                    "DROP" => MANGLE_DROP,
                    "ACCEPT" => MANGLE_ACCEPT,
                    "CONTINUE" => MANGLE_CONTINUE,
                    other => {
                        return Err(Error::param(format!(
                            "bad target `{}' for --mangle-target",
                            other
                        )))
                    }
                };
            }
            _ => return Ok(false),
        }
        *flags |= 1 << (call.code - MANGLE_IPS);
        Ok(true)
    }

    fn encode(&self, out: &mut [u8]) {
        out[..DEV_ADDR_LEN_MAX].copy_from_slice(&self.src_devaddr);
        out[DEV_ADDR_LEN_MAX..OFF_SRC_IP].copy_from_slice(&self.tgt_devaddr);
        out[OFF_SRC_IP..OFF_TGT_IP].copy_from_slice(&self.src_ip.octets());
        out[OFF_TGT_IP..OFF_FLAGS].copy_from_slice(&self.tgt_ip.octets());
        out[OFF_FLAGS] = self.flags;
        out[OFF_TARGET..MANGLE_SIZE].copy_from_slice(&self.target.to_be_bytes());
    }
}
