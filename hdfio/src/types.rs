// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::errors::*;

/// Address value meaning "no address".
pub const ADDR_UNDEF: u64 = u64::MAX;

/// Class of storage a request belongs to.
///
/// Drivers that partition the address space (see [`crate::drivers::MultiDriver`])
/// route each kind to its own member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemKind {
    Super,
    BTree,
    Draw,
    GHeap,
    LHeap,
    OHdr,
}

impl MemKind {
    pub const COUNT: usize = 6;
    pub const ALL: [MemKind; Self::COUNT] = [
        MemKind::Super,
        MemKind::BTree,
        MemKind::Draw,
        MemKind::GHeap,
        MemKind::LHeap,
        MemKind::OHdr,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_raw(self) -> bool {
        self == MemKind::Draw
    }
}

bitflags! {
    /// File open intent. An empty set means read-only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct AccessFlags: u32 {
        const RDWR  = 0x0001;
        const TRUNC = 0x0002;
        const EXCL  = 0x0004;
        const DEBUG = 0x0008;
        const CREAT = 0x0010;
    }
}

impl AccessFlags {
    pub const RDONLY: AccessFlags = AccessFlags::empty();

    /// Flags that only matter when the file is first touched.
    pub const CREATION: AccessFlags = AccessFlags::CREAT
        .union(AccessFlags::TRUNC)
        .union(AccessFlags::EXCL);

    #[inline]
    pub fn is_writable(self) -> bool {
        self.contains(AccessFlags::RDWR)
    }
}

bitflags! {
    /// Capabilities reported by an open driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DriverFeatures: u32 {
        /// Several processes write through this driver: per-process caches must stay off.
        const NO_CACHE = 0x0001;
    }
}

/// Identity of the physical file behind a driver, used to detect a second
/// open of a file that is already open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey(PathBuf);

impl FileKey {
    /// Canonical path when the file exists, absolute path otherwise.
    pub fn for_path(path: &Path) -> Self {
        let key = path.canonicalize().unwrap_or_else(|_| {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        });
        FileKey(key)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Fails unless `[addr, addr + len)` lies below `eoa`.
#[inline]
pub fn check_range(addr: u64, len: u64, eoa: u64) -> DriverResult {
    match addr.checked_add(len) {
        Some(end) if addr != ADDR_UNDEF && end <= eoa => Ok(()),
        _ => Err(DriverError::OutOfBounds { addr, len, eoa }),
    }
}

/// Rounds `addr` up to a multiple of `align` (`align <= 1` is a no-op).
#[inline]
pub fn align_up(addr: u64, align: u64) -> DriverResult<u64> {
    if align <= 1 {
        return Ok(addr);
    }
    match addr % align {
        0 => Ok(addr),
        rem => addr
            .checked_add(align - rem)
            .ok_or(DriverError::OutOfBounds { addr, len: align, eoa: ADDR_UNDEF }),
    }
}
