//! Rule record builder.

use std::fmt;
use std::net::Ipv4Addr;

use super::format::*;
use super::reader::RuleView;
use crate::error::{Error, Result};
use crate::rule_spec::{Counters, RuleSpec};

/// Offsets of a finished record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOffsets {
    /// Start of the target block
    pub target_offset: usize,
    /// Total record length
    pub next_offset: usize,
}

/// Appends typed blocks after an entry header.
///
/// The header is written when the target block is appended, so the
/// offsets it carries always describe the finished record.
pub struct RuleBuilder {
    spec: RuleSpec,
    buffer: Vec<u8>,
    mask: Vec<u8>,
}

impl RuleBuilder {
    /// Start a record for `spec`.
    pub fn new(spec: &RuleSpec) -> Self {
        let mut buffer = Vec::with_capacity(ENTRY_SIZE + 2 * (BLOCK_HEADER_SIZE + 64));
        buffer.resize(ENTRY_SIZE, 0);
        Self {
            spec: *spec,
            buffer,
            mask: vec![0xff; ENTRY_SIZE],
        }
    }

    fn push_block(&mut self, name: &str, revision: u8, data: &[u8], userspace_size: usize) -> Result<usize> {
        // Extension sizes are aligned at registration
        debug_assert_eq!(data.len() % ALIGN, 0, "unaligned block data for `{}'", name);
        if name.len() > BLOCK_NAME_MAX {
            return Err(Error::param(format!(
                "name `{}' too long for a rule block ({} chars max)",
                name, BLOCK_NAME_MAX
            )));
        }

        let offset = self.buffer.len();
        let size = align(BLOCK_HEADER_SIZE + data.len());
        let header = BlockHeader {
            size: u16::try_from(size).map_err(|_| Error::param("rule block too large"))?,
            name: name.to_string(),
            revision,
        };

        self.buffer.resize(offset + size, 0);
        header.encode(&mut self.buffer[offset..offset + BLOCK_HEADER_SIZE]);
        self.buffer[offset + BLOCK_HEADER_SIZE..offset + BLOCK_HEADER_SIZE + data.len()]
            .copy_from_slice(data);

        let significant = BLOCK_HEADER_SIZE + userspace_size.min(data.len());
        self.mask.resize(offset + size, 0);
        self.mask[offset..offset + significant].fill(0xff);

        Ok(offset)
    }

    /// Append a match block.
    ///
    /// # Returns
    /// Byte offset where the block starts.
    pub fn push_match(&mut self, name: &str, revision: u8, data: &[u8], userspace_size: usize) -> Result<usize> {
        self.push_block(name, revision, data, userspace_size)
    }

    /// Append the target block and finish the record.
    pub fn finish(mut self, label: &str, revision: u8, data: &[u8], userspace_size: usize) -> Result<(CompiledRule, RecordOffsets)> {
        let target_offset = self.push_block(label, revision, data, userspace_size)?;
        let next_offset = self.buffer.len();

        let header = EntryHeader {
            arp: self.spec.arp,
            target_offset: u16::try_from(target_offset).map_err(|_| Error::param("rule record too large"))?,
            next_offset: u16::try_from(next_offset).map_err(|_| Error::param("rule record too large"))?,
            comefrom: 0,
            counters: self.spec.counters,
        };
        header.encode(&mut self.buffer[..ENTRY_SIZE]);

        let offsets = RecordOffsets {
            target_offset,
            next_offset,
        };
        let rule = CompiledRule {
            bytes: self.buffer,
            mask: self.mask,
            offsets,
        };
        Ok((rule, offsets))
    }
}

/// One compiled rule record and its delete mask.
#[derive(Clone, PartialEq, Eq)]
pub struct CompiledRule {
    bytes: Vec<u8>,
    mask: Vec<u8>,
    offsets: RecordOffsets,
}

impl CompiledRule {
    /// Adopt record bytes, validating their structure.
    ///
    /// The delete mask covers the whole record since extension
    /// userspace sizes are not known here.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let view = RuleView::decode(&bytes)?;
        let offsets = RecordOffsets {
            target_offset: view.header.target_offset as usize,
            next_offset: view.header.next_offset as usize,
        };
        let mask = vec![0xff; bytes.len()];
        Ok(Self { bytes, mask, offsets })
    }

    /// Raw record bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Record length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Records are never empty; they always hold a header.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Start of the target block.
    pub fn target_offset(&self) -> usize {
        self.offsets.target_offset
    }

    /// Total record length as stored in the header.
    pub fn next_offset(&self) -> usize {
        self.offsets.next_offset
    }

    /// Bytes significant when deleting by content.
    pub fn delete_mask(&self) -> &[u8] {
        &self.mask
    }

    /// Name stored in the target block header.
    pub fn target_label(&self) -> String {
        BlockHeader::decode(&self.bytes[self.offsets.target_offset..])
            .map(|h| h.name)
            .unwrap_or_default()
    }

    /// Rewrite the name in the target block header.
    pub fn set_target_label(&mut self, label: &str) {
        let off = self.offsets.target_offset;
        if let Ok(mut header) = BlockHeader::decode(&self.bytes[off..]) {
            header.name = label.to_string();
            header.encode(&mut self.bytes[off..off + BLOCK_HEADER_SIZE]);
        }
    }

    /// Data bytes of the target block.
    pub fn target_data(&self) -> &[u8] {
        &self.bytes[self.offsets.target_offset + BLOCK_HEADER_SIZE..self.offsets.next_offset]
    }

    /// Copy of this record with other source and target addresses.
    pub fn with_addresses(&self, src: Ipv4Addr, tgt: Ipv4Addr) -> CompiledRule {
        let mut out = self.clone();
        out.bytes[0..4].copy_from_slice(&src.octets());
        out.bytes[4..8].copy_from_slice(&tgt.octets());
        out
    }

    /// Source and target addresses from the header.
    pub fn addresses(&self) -> (Ipv4Addr, Ipv4Addr) {
        let b = &self.bytes;
        (
            Ipv4Addr::new(b[0], b[1], b[2], b[3]),
            Ipv4Addr::new(b[4], b[5], b[6], b[7]),
        )
    }

    /// Packet and byte counters from the header.
    pub fn counters(&self) -> Counters {
        let read = |off: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&self.bytes[off..off + 8]);
            u64::from_le_bytes(bytes)
        };
        Counters {
            pcnt: read(OFF_PCNT),
            bcnt: read(OFF_BCNT),
        }
    }

    /// Overwrite the header counters.
    pub fn set_counters(&mut self, counters: Counters) {
        self.bytes[OFF_PCNT..OFF_PCNT + 8].copy_from_slice(&counters.pcnt.to_le_bytes());
        self.bytes[OFF_BCNT..OFF_BCNT + 8].copy_from_slice(&counters.bcnt.to_le_bytes());
    }

    /// Decode the record into its parts.
    pub fn view(&self) -> Result<RuleView> {
        RuleView::decode(&self.bytes)
    }

    /// Compare with `other` under `mask`, ignoring counters and the
    /// engine-owned `comefrom` field.
    pub fn matches_masked(&self, other: &CompiledRule, mask: &[u8]) -> bool {
        if self.bytes.len() != other.bytes.len() {
            return false;
        }
        let ignored = |i: usize| (OFF_COMEFROM..OFF_COMEFROM + 4).contains(&i) || (OFF_PCNT..ENTRY_SIZE).contains(&i);
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .enumerate()
            .all(|(i, (a, b))| {
                let m = if ignored(i) { 0 } else { mask.get(i).copied().unwrap_or(0) };
                (a & m) == (b & m)
            })
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("len", &self.bytes.len())
            .field("target_offset", &self.offsets.target_offset)
            .field("next_offset", &self.offsets.next_offset)
            .field("target", &self.target_label())
            .finish()
    }
}
