// SPDX-License-Identifier: MIT

use crate::errors::*;

/// Widths accepted for file addresses and lengths.
pub const VALID_WIDTHS: [u8; 5] = [2, 4, 8, 16, 32];

/// Smallest non-empty user block.
pub const MIN_USERBLOCK: u64 = 512;

/// Layout choices fixed when a file is created.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct FileCreateProps {
    userblock_size: u64,
    sym_leaf_k: u32,
    sym_internal_k: u32,
    istore_k: u32,
    sizeof_addr: u8,
    sizeof_size: u8,
    pub boot_version: u8,
    pub freespace_version: u8,
    pub objdir_version: u8,
    pub sharedheader_version: u8,
}

impl Default for FileCreateProps {
    fn default() -> Self {
        Self {
            userblock_size: 0,
            sym_leaf_k: 4,
            sym_internal_k: 16,
            istore_k: 32,
            sizeof_addr: 8,
            sizeof_size: 8,
            boot_version: 0,
            freespace_version: 0,
            objdir_version: 0,
            sharedheader_version: 0,
        }
    }
}

impl FileCreateProps {
    pub fn userblock(&self) -> u64 {
        self.userblock_size
    }

    /// Zero or a power of two of at least 512.
    pub fn set_userblock(&mut self, size: u64) -> PropResult {
        if size != 0 && (size < MIN_USERBLOCK || !size.is_power_of_two()) {
            return Err(PropError::InvalidArgument(
                "user block size must be 0 or a power of two >= 512",
            ));
        }
        self.userblock_size = size;
        Ok(())
    }

    /// `(sizeof_addr, sizeof_size)` in bytes.
    pub fn sizes(&self) -> (u8, u8) {
        (self.sizeof_addr, self.sizeof_size)
    }

    /// Zero keeps the current width.
    pub fn set_sizes(&mut self, sizeof_addr: u8, sizeof_size: u8) -> PropResult {
        for w in [sizeof_addr, sizeof_size] {
            if w != 0 && !VALID_WIDTHS.contains(&w) {
                return Err(PropError::InvalidArgument("width must be 2, 4, 8, 16 or 32"));
            }
        }
        if sizeof_addr != 0 {
            self.sizeof_addr = sizeof_addr;
        }
        if sizeof_size != 0 {
            self.sizeof_size = sizeof_size;
        }
        Ok(())
    }

    /// `(internal, leaf)` half-ranks of the symbol table trees.
    pub fn sym_k(&self) -> (u32, u32) {
        (self.sym_internal_k, self.sym_leaf_k)
    }

    /// Zero keeps the current value.
    pub fn set_sym_k(&mut self, internal: u32, leaf: u32) {
        if internal != 0 {
            self.sym_internal_k = internal;
        }
        if leaf != 0 {
            self.sym_leaf_k = leaf;
        }
    }

    pub fn istore_k(&self) -> u32 {
        self.istore_k
    }

    pub fn set_istore_k(&mut self, k: u32) -> PropResult {
        if k == 0 {
            return Err(PropError::InvalidArgument("istore half-rank must be positive"));
        }
        self.istore_k = k;
        Ok(())
    }

    /// Boot, free-space, object-directory and shared-header versions.
    pub fn versions(&self) -> [u8; 4] {
        [
            self.boot_version,
            self.freespace_version,
            self.objdir_version,
            self.sharedheader_version,
        ]
    }
}
