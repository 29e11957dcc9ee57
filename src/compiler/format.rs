//! Compiled rule record layout.
//!
//! A record is a fixed 192-byte entry header followed by zero or more
//! match blocks and exactly one target block. Every block starts with a
//! 32-byte block header and is padded to [`ALIGN`].
//!
//! Entry header layout:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0x00 | src, tgt, smsk, tmsk (4 bytes each, network order) |
//! | 0x10 | arhln, arhln_mask |
//! | 0x12 | src devaddr + mask (16 + 16) |
//! | 0x32 | tgt devaddr + mask (16 + 16) |
//! | 0x52 | arpop, arpop_mask, arhrd, arhrd_mask, arpro, arpro_mask (u16 BE) |
//! | 0x5e | iniface, outiface, iniface_mask, outiface_mask (16 each) |
//! | 0x9e | flags (u8) |
//! | 0xa0 | invflags (u16 LE) |
//! | 0xa4 | target_offset, next_offset (u16 LE) |
//! | 0xa8 | comefrom (u32 LE) |
//! | 0xb0 | pcnt, bcnt (u64 LE) |

use std::net::Ipv4Addr;

use crate::address::{Interface, IFNAMSIZ};
use crate::error::{Error, Result};
use crate::options::InvFlags;
use crate::rule_spec::{ArpSpec, Counters, DevAddr, DEV_ADDR_LEN_MAX};

/// Block alignment in bytes.
pub const ALIGN: usize = 8;

/// Entry header size in bytes.
pub const ENTRY_SIZE: usize = 192;

/// Match/target block header size in bytes.
pub const BLOCK_HEADER_SIZE: usize = 32;

/// Longest name that fits a block header (the field is NUL terminated).
pub const BLOCK_NAME_MAX: usize = 28;

/// Round `len` up to the block alignment.
pub const fn align(len: usize) -> usize {
    (len + ALIGN - 1) & !(ALIGN - 1)
}

const OFF_SRC: usize = 0x00;
const OFF_TGT: usize = 0x04;
const OFF_SMSK: usize = 0x08;
const OFF_TMSK: usize = 0x0c;
const OFF_ARHLN: usize = 0x10;
const OFF_ARHLN_MASK: usize = 0x11;
const OFF_SRC_DEVADDR: usize = 0x12;
const OFF_TGT_DEVADDR: usize = OFF_SRC_DEVADDR + 2 * DEV_ADDR_LEN_MAX;
const OFF_ARPOP: usize = 0x52;
const OFF_IFACES: usize = 0x5e;
const OFF_FLAGS: usize = 0x9e;
const OFF_INVFLAGS: usize = 0xa0;
pub(crate) const OFF_TARGET_OFFSET: usize = 0xa4;
pub(crate) const OFF_NEXT_OFFSET: usize = 0xa6;
pub(crate) const OFF_COMEFROM: usize = 0xa8;
pub(crate) const OFF_PCNT: usize = 0xb0;
pub(crate) const OFF_BCNT: usize = 0xb8;

/// Decoded entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryHeader {
    pub arp: ArpSpec,
    pub target_offset: u16,
    pub next_offset: u16,
    pub comefrom: u32,
    pub counters: Counters,
}

fn read_u16_be(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn read_u16_le(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn read_u32_le(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_u64_le(buf: &[u8], off: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(bytes)
}

fn read_ip(buf: &[u8], off: usize) -> Ipv4Addr {
    Ipv4Addr::new(buf[off], buf[off + 1], buf[off + 2], buf[off + 3])
}

fn read_array<const N: usize>(buf: &[u8], off: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[off..off + N]);
    out
}

impl EntryHeader {
    /// Write the header into the first [`ENTRY_SIZE`] bytes of `out`.
    pub fn encode(&self, out: &mut [u8]) {
        let arp = &self.arp;
        out[OFF_SRC..OFF_SRC + 4].copy_from_slice(&arp.src.octets());
        out[OFF_TGT..OFF_TGT + 4].copy_from_slice(&arp.tgt.octets());
        out[OFF_SMSK..OFF_SMSK + 4].copy_from_slice(&arp.smsk.octets());
        out[OFF_TMSK..OFF_TMSK + 4].copy_from_slice(&arp.tmsk.octets());
        out[OFF_ARHLN] = arp.arhln;
        out[OFF_ARHLN_MASK] = arp.arhln_mask;

        for (off, dev) in [(OFF_SRC_DEVADDR, &arp.src_devaddr), (OFF_TGT_DEVADDR, &arp.tgt_devaddr)] {
            out[off..off + DEV_ADDR_LEN_MAX].copy_from_slice(&dev.addr);
            out[off + DEV_ADDR_LEN_MAX..off + 2 * DEV_ADDR_LEN_MAX].copy_from_slice(&dev.mask);
        }

        let words = [
            arp.arpop,
            arp.arpop_mask,
            arp.arhrd,
            arp.arhrd_mask,
            arp.arpro,
            arp.arpro_mask,
        ];
        for (i, word) in words.iter().enumerate() {
            let off = OFF_ARPOP + 2 * i;
            out[off..off + 2].copy_from_slice(&word.to_be_bytes());
        }

        let ifaces = [
            &arp.iniface.name,
            &arp.outiface.name,
            &arp.iniface.mask,
            &arp.outiface.mask,
        ];
        for (i, bytes) in ifaces.iter().enumerate() {
            let off = OFF_IFACES + IFNAMSIZ * i;
            out[off..off + IFNAMSIZ].copy_from_slice(&bytes[..]);
        }

        out[OFF_FLAGS] = arp.flags;
        out[OFF_INVFLAGS..OFF_INVFLAGS + 2].copy_from_slice(&arp.invflags.bits().to_le_bytes());
        out[OFF_TARGET_OFFSET..OFF_TARGET_OFFSET + 2].copy_from_slice(&self.target_offset.to_le_bytes());
        out[OFF_NEXT_OFFSET..OFF_NEXT_OFFSET + 2].copy_from_slice(&self.next_offset.to_le_bytes());
        out[OFF_COMEFROM..OFF_COMEFROM + 4].copy_from_slice(&self.comefrom.to_le_bytes());
        out[OFF_PCNT..OFF_PCNT + 8].copy_from_slice(&self.counters.pcnt.to_le_bytes());
        out[OFF_BCNT..OFF_BCNT + 8].copy_from_slice(&self.counters.bcnt.to_le_bytes());
    }

    /// Read a header from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ENTRY_SIZE {
            return Err(Error::Truncated {
                offset: 0,
                needed: ENTRY_SIZE,
            });
        }

        let devaddr = |off: usize| DevAddr {
            addr: read_array(buf, off),
            mask: read_array(buf, off + DEV_ADDR_LEN_MAX),
        };
        let iface = |i: usize| Interface {
            name: read_array(buf, OFF_IFACES + IFNAMSIZ * i),
            mask: read_array(buf, OFF_IFACES + IFNAMSIZ * (i + 2)),
        };

        let arp = ArpSpec {
            src: read_ip(buf, OFF_SRC),
            tgt: read_ip(buf, OFF_TGT),
            smsk: read_ip(buf, OFF_SMSK),
            tmsk: read_ip(buf, OFF_TMSK),
            arhln: buf[OFF_ARHLN],
            arhln_mask: buf[OFF_ARHLN_MASK],
            src_devaddr: devaddr(OFF_SRC_DEVADDR),
            tgt_devaddr: devaddr(OFF_TGT_DEVADDR),
            arpop: read_u16_be(buf, OFF_ARPOP),
            arpop_mask: read_u16_be(buf, OFF_ARPOP + 2),
            arhrd: read_u16_be(buf, OFF_ARPOP + 4),
            arhrd_mask: read_u16_be(buf, OFF_ARPOP + 6),
            arpro: read_u16_be(buf, OFF_ARPOP + 8),
            arpro_mask: read_u16_be(buf, OFF_ARPOP + 10),
            iniface: iface(0),
            outiface: iface(1),
            flags: buf[OFF_FLAGS],
            invflags: InvFlags::from_bits_truncate(read_u16_le(buf, OFF_INVFLAGS)),
        };

        Ok(Self {
            arp,
            target_offset: read_u16_le(buf, OFF_TARGET_OFFSET),
            next_offset: read_u16_le(buf, OFF_NEXT_OFFSET),
            comefrom: read_u32_le(buf, OFF_COMEFROM),
            counters: Counters {
                pcnt: read_u64_le(buf, OFF_PCNT),
                bcnt: read_u64_le(buf, OFF_BCNT),
            },
        })
    }
}

/// Header of a match or target block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Total block size including this header
    pub size: u16,
    pub name: String,
    pub revision: u8,
}

impl BlockHeader {
    /// Write the header into the first [`BLOCK_HEADER_SIZE`] bytes of `out`.
    pub fn encode(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.size.to_le_bytes());
        let name = self.name.as_bytes();
        let len = name.len().min(BLOCK_NAME_MAX);
        out[2..2 + len].copy_from_slice(&name[..len]);
        out[2 + len..BLOCK_HEADER_SIZE - 1].fill(0);
        out[BLOCK_HEADER_SIZE - 1] = self.revision;
    }

    /// Read a block header from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < BLOCK_HEADER_SIZE {
            return Err(Error::Truncated {
                offset: 0,
                needed: BLOCK_HEADER_SIZE,
            });
        }
        let field = &buf[2..BLOCK_HEADER_SIZE - 1];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok(Self {
            size: read_u16_le(buf, 0),
            name: String::from_utf8_lossy(&field[..end]).into_owned(),
            revision: buf[BLOCK_HEADER_SIZE - 1],
        })
    }
}
