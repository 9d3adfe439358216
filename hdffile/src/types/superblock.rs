// SPDX-License-Identifier: MIT
//! Version 0 superblock and driver-info block

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use hdfio::DriverInfoName;
use hdfio::types::ADDR_UNDEF;

use crate::codec::{Decoder, Encoder, is_valid_width};
use crate::errors::*;
use crate::types::symbol::SymbolTableEntry;

pub const SIGNATURE: [u8; 8] = *b"\x89HDF\r\n\x1a\n";
pub const SIGNATURE_LEN: usize = SIGNATURE.len();

pub const BOOT_VERSION: u8 = 0;
pub const FREESPACE_VERSION: u8 = 0;
pub const OBJECTDIR_VERSION: u8 = 0;
pub const SHAREDHEADER_VERSION: u8 = 0;
pub const DRIVERINFO_VERSION: u8 = 0;

/// Consistency flags written by a creating process.
pub const CONSIST_FLAGS_NEW: u32 = 0x03;

/// Fixed part of the superblock (24 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SuperblockPrefix {
    // 0x00
    pub signature: [u8; 8],
    // 0x08
    pub boot_version: u8,
    pub freespace_version: u8,
    pub objdir_version: u8,
    pub reserved1: u8,
    // 0x0C
    pub sharedheader_version: u8,
    pub sizeof_addr: u8,
    pub sizeof_size: u8,
    pub reserved2: u8,
    // 0x10
    /// Symbol table leaf half-rank
    pub sym_leaf_k: U16,
    /// Symbol table internal half-rank
    pub btree_k: U16,
    // 0x14
    pub consist_flags: U32,
}

pub const SUPERBLOCK_FIXED_SIZE: usize = core::mem::size_of::<SuperblockPrefix>();

impl SuperblockPrefix {
    pub fn has_signature(&self) -> bool {
        self.signature == SIGNATURE
    }

    /// Checks versions, widths and half-ranks, in that order.
    pub fn validate(&self) -> FormatResult {
        if !self.has_signature() {
            return Err(FormatError::NoSignature);
        }
        for (field, found, expected) in [
            ("boot block version", self.boot_version, BOOT_VERSION),
            ("free-space version", self.freespace_version, FREESPACE_VERSION),
            ("object directory version", self.objdir_version, OBJECTDIR_VERSION),
            ("shared header version", self.sharedheader_version, SHAREDHEADER_VERSION),
        ] {
            if found != expected {
                return Err(FormatError::BadVersion { field, found });
            }
        }
        if !is_valid_width(self.sizeof_addr) {
            return Err(FormatError::BadWidth { field: "sizeof_addr", found: self.sizeof_addr });
        }
        if !is_valid_width(self.sizeof_size) {
            return Err(FormatError::BadWidth { field: "sizeof_size", found: self.sizeof_size });
        }
        if self.sym_leaf_k.get() == 0 {
            return Err(FormatError::BadRank { field: "sym_leaf_k" });
        }
        if self.btree_k.get() == 0 {
            return Err(FormatError::BadRank { field: "btree_k" });
        }
        Ok(())
    }
}

/// Header of the driver-info block (16 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DriverInfoHeader {
    pub version: u8,
    pub reserved: [u8; 3],
    pub info_size: U32,
    pub name: DriverInfoName,
}

pub const DRIVER_INFO_HEADER_SIZE: usize = core::mem::size_of::<DriverInfoHeader>();

impl DriverInfoHeader {
    pub fn new(info_size: u32, name: DriverInfoName) -> Self {
        Self {
            version: DRIVERINFO_VERSION,
            reserved: [0; 3],
            info_size: U32::new(info_size),
            name,
        }
    }

    pub fn validate(&self) -> FormatResult {
        if self.version != DRIVERINFO_VERSION {
            return Err(FormatError::BadVersion { field: "driver info version", found: self.version });
        }
        Ok(())
    }
}

/// Decoded superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub boot_version: u8,
    pub freespace_version: u8,
    pub objdir_version: u8,
    pub sharedheader_version: u8,
    pub sizeof_addr: u8,
    pub sizeof_size: u8,
    pub sym_leaf_k: u16,
    pub sym_internal_k: u16,
    pub consist_flags: u32,
    /// Absolute address every other address is relative to.
    pub base_addr: u64,
    pub freespace_addr: u64,
    /// Absolute end of allocated space.
    pub eoa: u64,
    /// Driver-info block, relative to `base_addr`.
    pub driver_addr: u64,
    pub root: SymbolTableEntry,
}

impl Default for Superblock {
    fn default() -> Self {
        Self {
            boot_version: BOOT_VERSION,
            freespace_version: FREESPACE_VERSION,
            objdir_version: OBJECTDIR_VERSION,
            sharedheader_version: SHAREDHEADER_VERSION,
            sizeof_addr: 8,
            sizeof_size: 8,
            sym_leaf_k: 4,
            sym_internal_k: 16,
            consist_flags: 0,
            base_addr: 0,
            freespace_addr: ADDR_UNDEF,
            eoa: 0,
            driver_addr: ADDR_UNDEF,
            root: SymbolTableEntry::default(),
        }
    }
}

impl Superblock {
    /// Bytes following the fixed prefix.
    pub fn variable_size(sizeof_addr: u8, sizeof_size: u8) -> usize {
        let (a, s) = (sizeof_addr as usize, sizeof_size as usize);
        4 * a + SymbolTableEntry::encoded_size(a, s)
    }

    pub fn encoded_size(&self) -> usize {
        SUPERBLOCK_FIXED_SIZE + Self::variable_size(self.sizeof_addr, self.sizeof_size)
    }

    pub fn prefix(&self) -> SuperblockPrefix {
        SuperblockPrefix {
            signature: SIGNATURE,
            boot_version: self.boot_version,
            freespace_version: self.freespace_version,
            objdir_version: self.objdir_version,
            reserved1: 0,
            sharedheader_version: self.sharedheader_version,
            sizeof_addr: self.sizeof_addr,
            sizeof_size: self.sizeof_size,
            reserved2: 0,
            sym_leaf_k: U16::new(self.sym_leaf_k),
            btree_k: U16::new(self.sym_internal_k),
            consist_flags: U32::new(self.consist_flags),
        }
    }

    /// Encodes into `buf`, which must hold [`encoded_size`](Self::encoded_size) bytes.
    pub fn encode(&self, buf: &mut [u8]) -> FormatResult<usize> {
        let prefix = self.prefix();
        prefix.validate()?;
        let (a, s) = (self.sizeof_addr as usize, self.sizeof_size as usize);
        let mut enc = Encoder::new(buf);
        enc.put_bytes(prefix.as_bytes())?;
        enc.put_addr(a, self.base_addr)?;
        enc.put_addr(a, self.freespace_addr)?;
        enc.put_addr(a, self.eoa)?;
        enc.put_addr(a, self.driver_addr)?;
        self.root.encode(&mut enc, a, s)?;
        Ok(enc.position())
    }

    /// Builds a superblock from a validated prefix and the variable part that follows it.
    pub fn decode(prefix: &SuperblockPrefix, var: &[u8]) -> FormatResult<Self> {
        prefix.validate()?;
        let (a, s) = (prefix.sizeof_addr as usize, prefix.sizeof_size as usize);
        let mut dec = Decoder::new(var);
        let base_addr = dec.get_addr(a)?;
        let freespace_addr = dec.get_addr(a)?;
        let eoa = dec.get_addr(a)?;
        let driver_addr = dec.get_addr(a)?;
        let root = SymbolTableEntry::decode(&mut dec, a, s)?;
        Ok(Self {
            boot_version: prefix.boot_version,
            freespace_version: prefix.freespace_version,
            objdir_version: prefix.objdir_version,
            sharedheader_version: prefix.sharedheader_version,
            sizeof_addr: prefix.sizeof_addr,
            sizeof_size: prefix.sizeof_size,
            sym_leaf_k: prefix.sym_leaf_k.get(),
            sym_internal_k: prefix.btree_k.get(),
            consist_flags: prefix.consist_flags.get(),
            base_addr,
            freespace_addr,
            eoa,
            driver_addr,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_layout() {
        assert_eq!(SUPERBLOCK_FIXED_SIZE, 24);
        assert_eq!(DRIVER_INFO_HEADER_SIZE, 16);

        let sb = Superblock { sizeof_addr: 4, consist_flags: CONSIST_FLAGS_NEW, ..Superblock::default() };
        let bytes = sb.prefix();
        let raw = bytes.as_bytes();
        assert_eq!(&raw[..8], &SIGNATURE);
        assert_eq!(raw[13], 4);
        assert_eq!(raw[14], 8);
        assert_eq!(&raw[16..18], &[4, 0]);
        assert_eq!(&raw[18..20], &[16, 0]);
        assert_eq!(&raw[20..24], &[3, 0, 0, 0]);
    }

    #[test]
    fn test_encode_decode() {
        let sb = Superblock {
            sizeof_addr: 2,
            sizeof_size: 16,
            base_addr: 512,
            eoa: 1000,
            root: SymbolTableEntry::for_object(96),
            ..Superblock::default()
        };
        let mut buf = vec![0u8; sb.encoded_size()];
        assert_eq!(sb.encode(&mut buf).unwrap(), buf.len());

        let prefix = SuperblockPrefix::read_from_bytes(&buf[..SUPERBLOCK_FIXED_SIZE]).unwrap();
        let back = Superblock::decode(&prefix, &buf[SUPERBLOCK_FIXED_SIZE..]).unwrap();
        assert_eq!(back, sb);
        // free-space and driver-info addresses are undefined
        assert_eq!(&buf[26..28], &[0xff, 0xff]);
    }

    #[test]
    fn test_validate_rejects() {
        let good = Superblock::default().prefix();
        assert!(good.validate().is_ok());

        let mut p = good;
        p.signature[0] = 0;
        assert_eq!(p.validate(), Err(FormatError::NoSignature));

        let mut p = good;
        p.objdir_version = 1;
        assert!(matches!(p.validate(), Err(FormatError::BadVersion { .. })));

        let mut p = good;
        p.sizeof_size = 3;
        assert!(matches!(p.validate(), Err(FormatError::BadWidth { field: "sizeof_size", .. })));

        let mut p = good;
        p.btree_k = U16::new(0);
        assert_eq!(p.validate(), Err(FormatError::BadRank { field: "btree_k" }));
    }
}
