// SPDX-License-Identifier: MIT

use hdfio::types::ADDR_UNDEF;

use crate::codec::{Decoder, Encoder};
use crate::errors::*;

/// Size of the scratch-pad area of a symbol table entry.
pub const SCRATCH_SIZE: usize = 16;

/// Cache type: nothing cached in the scratch pad.
pub const CACHE_NOTHING: u32 = 0;

/// Name, object header and cached data of one object in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolTableEntry {
    /// Offset of the name in the parent's local heap.
    pub name_off: u64,
    /// File-relative address of the object header.
    pub header: u64,
    pub cache_type: u32,
    pub scratch: [u8; SCRATCH_SIZE],
}

impl Default for SymbolTableEntry {
    fn default() -> Self {
        Self {
            name_off: 0,
            header: ADDR_UNDEF,
            cache_type: CACHE_NOTHING,
            scratch: [0; SCRATCH_SIZE],
        }
    }
}

impl SymbolTableEntry {
    /// Entry for an object whose header lives at `header`.
    pub fn for_object(header: u64) -> Self {
        Self { header, ..Self::default() }
    }

    pub fn encoded_size(sizeof_addr: usize, sizeof_size: usize) -> usize {
        sizeof_size + sizeof_addr + 4 + 4 + SCRATCH_SIZE
    }

    pub fn encode(&self, enc: &mut Encoder<'_>, sizeof_addr: usize, sizeof_size: usize) -> FormatResult {
        enc.put_length(sizeof_size, self.name_off)?;
        enc.put_addr(sizeof_addr, self.header)?;
        enc.put_u32(self.cache_type)?;
        enc.put_u32(0)?;
        enc.put_bytes(&self.scratch)
    }

    pub fn decode(dec: &mut Decoder<'_>, sizeof_addr: usize, sizeof_size: usize) -> FormatResult<Self> {
        let name_off = dec.get_length(sizeof_size)?;
        let header = dec.get_addr(sizeof_addr)?;
        let cache_type = dec.get_u32()?;
        let _reserved = dec.get_u32()?;
        let mut scratch = [0u8; SCRATCH_SIZE];
        scratch.copy_from_slice(dec.take(SCRATCH_SIZE)?);
        Ok(Self { name_off, header, cache_type, scratch })
    }
}
