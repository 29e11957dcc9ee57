//! On-disk table snapshot.
//!
//! File layout:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0x00 | magic `ARPRULE\0` |
//! | 0x08 | version (u32 LE) |
//! | 0x0c | flags (u32 LE) |
//! | 0x10 | timestamp (i64 LE, Unix seconds) |
//! | 0x18 | SHA-256 of the file with this field zeroed |
//! | 0x38 | chain count, rule count, payload size (u32 LE) |
//! | 0x44 | table name (32 bytes, NUL padded) |
//!
//! The payload holds one section per chain: a 64-byte section header
//! followed by that chain's rule records laid end to end.

use std::fs;
use std::io::Write;
use std::path::Path;

use bitflags::bitflags;
use sha2::{Digest, Sha256};

use super::memory::Chain;
use crate::compiler::{records, CompiledRule};
use crate::error::{Error, Result};
use crate::extension::standard::{LABEL_ACCEPT, LABEL_DROP};
use crate::rule_spec::Counters;

/// Magic bytes identifying a snapshot file.
pub const MAGIC: [u8; 8] = *b"ARPRULE\0";

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 128;

/// Chain section header size in bytes.
pub const SECTION_SIZE: usize = 64;

const NAME_LEN: usize = 32;
const CHECKSUM_RANGE: std::ops::Range<usize> = 0x18..0x38;

bitflags! {
    /// Snapshot flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SnapshotFlags: u32 {
        /// At least one user-defined chain is stored.
        const USER_CHAINS = 0b0000_0001;
    }
}

/// Decoded snapshot header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u32,
    pub flags: SnapshotFlags,
    pub timestamp: i64,
    pub checksum: [u8; 32],
    pub chain_count: u32,
    pub rule_count: u32,
    pub payload_size: u32,
    pub table: String,
}

impl SnapshotHeader {
    /// Parse and validate the fixed header at the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Truncated {
                offset: 0,
                needed: HEADER_SIZE,
            });
        }
        if buf[0..8] != MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = read_u32(buf, 0x08);
        if version > FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&buf[CHECKSUM_RANGE]);

        Ok(Self {
            version,
            flags: SnapshotFlags::from_bits_truncate(read_u32(buf, 0x0c)),
            timestamp: i64::from_le_bytes(read_array(buf, 0x10)),
            checksum,
            chain_count: read_u32(buf, 0x38),
            rule_count: read_u32(buf, 0x3c),
            payload_size: read_u32(buf, 0x40),
            table: read_name(&buf[0x44..0x44 + NAME_LEN]),
        })
    }

    fn encode(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&MAGIC);
        out[0x08..0x0c].copy_from_slice(&self.version.to_le_bytes());
        out[0x0c..0x10].copy_from_slice(&self.flags.bits().to_le_bytes());
        out[0x10..0x18].copy_from_slice(&self.timestamp.to_le_bytes());
        out[CHECKSUM_RANGE].copy_from_slice(&self.checksum);
        out[0x38..0x3c].copy_from_slice(&self.chain_count.to_le_bytes());
        out[0x3c..0x40].copy_from_slice(&self.rule_count.to_le_bytes());
        out[0x40..0x44].copy_from_slice(&self.payload_size.to_le_bytes());
        write_name(&mut out[0x44..0x44 + NAME_LEN], &self.table);
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(read_array(buf, off))
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(read_array(buf, off))
}

fn read_array<const N: usize>(buf: &[u8], off: usize) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&buf[off..off + N]);
    bytes
}

fn read_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn write_name(field: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(field.len() - 1);
    field[..len].copy_from_slice(&bytes[..len]);
}

fn checksum(buf: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(&buf[..CHECKSUM_RANGE.start]);
    hasher.update([0u8; 32]);
    hasher.update(&buf[CHECKSUM_RANGE.end..]);
    hasher.finalize().into()
}

fn policy_code(policy: Option<&str>) -> u8 {
    match policy {
        None => 0,
        Some(LABEL_DROP) => 2,
        Some(_) => 1,
    }
}

fn policy_label(code: u8) -> Option<String> {
    match code {
        0 => None,
        2 => Some(LABEL_DROP.to_string()),
        _ => Some(LABEL_ACCEPT.to_string()),
    }
}

/// Serialize a table into snapshot bytes.
pub(crate) fn encode(table: &str, chains: &[Chain]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; HEADER_SIZE];
    let mut rule_count = 0u32;

    for chain in chains {
        if chain.name.len() >= NAME_LEN {
            return Err(Error::param(format!(
                "chain name `{}' too long to store",
                chain.name
            )));
        }
        let section = buf.len();
        buf.resize(section + SECTION_SIZE, 0);
        write_name(&mut buf[section..section + NAME_LEN], &chain.name);
        buf[section + 32] = u8::from(chain.policy.is_some());
        buf[section + 33] = policy_code(chain.policy.as_deref());

        let rules_start = buf.len();
        for rule in &chain.rules {
            buf.extend_from_slice(rule.as_bytes());
        }
        let rules_size = (buf.len() - rules_start) as u32;

        let header = &mut buf[section..section + SECTION_SIZE];
        header[36..40].copy_from_slice(&(chain.rules.len() as u32).to_le_bytes());
        header[40..44].copy_from_slice(&rules_size.to_le_bytes());
        header[48..56].copy_from_slice(&chain.counters.pcnt.to_le_bytes());
        header[56..64].copy_from_slice(&chain.counters.bcnt.to_le_bytes());
        rule_count += chain.rules.len() as u32;
    }

    let mut flags = SnapshotFlags::empty();
    if chains.iter().any(|c| c.policy.is_none()) {
        flags |= SnapshotFlags::USER_CHAINS;
    }

    let header = SnapshotHeader {
        version: FORMAT_VERSION,
        flags,
        timestamp: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64,
        checksum: [0; 32],
        chain_count: chains.len() as u32,
        rule_count,
        payload_size: (buf.len() - HEADER_SIZE) as u32,
        table: table.to_string(),
    };
    header.encode(&mut buf[..HEADER_SIZE]);

    let sum = checksum(&buf);
    buf[CHECKSUM_RANGE].copy_from_slice(&sum);
    Ok(buf)
}

/// Parse snapshot bytes back into a table name and its chains.
pub(crate) fn decode(buf: &[u8]) -> Result<(String, Vec<Chain>)> {
    let header = SnapshotHeader::decode(buf)?;
    let end = HEADER_SIZE + header.payload_size as usize;
    if buf.len() < end {
        return Err(Error::Truncated {
            offset: HEADER_SIZE,
            needed: header.payload_size as usize,
        });
    }
    if checksum(buf) != header.checksum {
        return Err(Error::ChecksumMismatch);
    }

    let mut chains = Vec::with_capacity(header.chain_count as usize);
    let mut offset = HEADER_SIZE;
    for _ in 0..header.chain_count {
        if offset + SECTION_SIZE > end {
            return Err(Error::Truncated {
                offset,
                needed: SECTION_SIZE,
            });
        }
        let section = &buf[offset..offset + SECTION_SIZE];
        let rule_count = read_u32(section, 36) as usize;
        let rules_size = read_u32(section, 40) as usize;
        let counters = Counters {
            pcnt: read_u64(section, 48),
            bcnt: read_u64(section, 56),
        };
        let policy = if section[32] != 0 {
            policy_label(section[33]).or_else(|| Some(LABEL_ACCEPT.to_string()))
        } else {
            None
        };

        let rules_start = offset + SECTION_SIZE;
        if rules_start + rules_size > end {
            return Err(Error::Truncated {
                offset: rules_start,
                needed: rules_size,
            });
        }
        let rules = records(&buf[rules_start..rules_start + rules_size])
            .map(|record| CompiledRule::from_bytes(record?.to_vec()))
            .collect::<Result<Vec<_>>>()?;
        if rules.len() != rule_count {
            return Err(Error::Truncated {
                offset: rules_start,
                needed: rules_size,
            });
        }

        chains.push(Chain {
            name: read_name(&section[..NAME_LEN]),
            policy,
            counters,
            rules,
        });
        offset = rules_start + rules_size;
    }

    Ok((header.table, chains))
}

/// Read a snapshot file.
pub(crate) fn load(path: &Path) -> Result<(String, Vec<Chain>)> {
    let data = fs::read(path)?;
    decode(&data)
}

/// Write a snapshot file atomically.
pub(crate) fn save(path: &Path, table: &str, chains: &[Chain]) -> Result<()> {
    let data = encode(table, chains)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(&data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Read only the header of a snapshot file.
pub fn read_header(path: &Path) -> Result<SnapshotHeader> {
    let data = fs::read(path)?;
    SnapshotHeader::decode(&data)
}
