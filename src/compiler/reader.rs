//! Decoding of compiled rule records.

use super::format::*;
use crate::error::{EngineError, Error, Result};

/// A decoded match or target block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockView {
    pub name: String,
    pub revision: u8,
    /// Block data after the header, including padding
    pub data: Vec<u8>,
}

/// A decoded rule record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleView {
    pub header: EntryHeader,
    pub matches: Vec<BlockView>,
    pub target: BlockView,
}

fn bad(msg: String) -> Error {
    Error::Engine(EngineError::BadRecord(msg))
}

fn read_block(buf: &[u8], offset: usize) -> Result<(BlockView, usize)> {
    let header = BlockHeader::decode(&buf[offset..]).map_err(|_| Error::Truncated {
        offset,
        needed: BLOCK_HEADER_SIZE,
    })?;
    let size = header.size as usize;
    if size < BLOCK_HEADER_SIZE || size % ALIGN != 0 {
        return Err(bad(format!("block `{}' at {} has size {}", header.name, offset, size)));
    }
    if offset + size > buf.len() {
        return Err(Error::Truncated { offset, needed: size });
    }
    let view = BlockView {
        name: header.name,
        revision: header.revision,
        data: buf[offset + BLOCK_HEADER_SIZE..offset + size].to_vec(),
    };
    Ok((view, size))
}

impl RuleView {
    /// Decode exactly one record.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = EntryHeader::decode(buf)?;
        let target_offset = header.target_offset as usize;
        let next_offset = header.next_offset as usize;

        if next_offset != buf.len() {
            return Err(bad(format!(
                "next_offset {} does not match record length {}",
                next_offset,
                buf.len()
            )));
        }
        if target_offset < ENTRY_SIZE || target_offset + BLOCK_HEADER_SIZE > next_offset {
            return Err(bad(format!("target_offset {} out of range", target_offset)));
        }

        let mut matches = Vec::new();
        let mut offset = ENTRY_SIZE;
        while offset < target_offset {
            let (block, size) = read_block(&buf[..target_offset], offset)?;
            matches.push(block);
            offset += size;
        }
        if offset != target_offset {
            return Err(bad(format!("match blocks overrun target at {}", target_offset)));
        }

        let (target, size) = read_block(buf, target_offset)?;
        if target_offset + size != next_offset {
            return Err(bad(format!("target block size {} does not end the record", size)));
        }

        Ok(Self {
            header,
            matches,
            target,
        })
    }
}

/// Iterate over a sequence of records laid end to end, following each
/// header's `next_offset`.
pub fn records(buf: &[u8]) -> Records<'_> {
    Records { buf, offset: 0 }
}

/// Iterator returned by [`records`].
pub struct Records<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buf.len() {
            return None;
        }
        let rest = &self.buf[self.offset..];
        let header = match EntryHeader::decode(rest) {
            Ok(h) => h,
            Err(_) => {
                let offset = self.offset;
                self.offset = self.buf.len();
                return Some(Err(Error::Truncated {
                    offset,
                    needed: ENTRY_SIZE,
                }));
            }
        };
        let len = header.next_offset as usize;
        if len < ENTRY_SIZE || len > rest.len() {
            let offset = self.offset;
            self.offset = self.buf.len();
            return Some(Err(Error::Truncated { offset, needed: len }));
        }
        self.offset += len;
        Some(Ok(&rest[..len]))
    }
}
