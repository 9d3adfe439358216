// SPDX-License-Identifier: MIT

//! Opaque, reference-counted handles.
//!
//! Each [`Registry`] owns the objects of one [`AtomGroup`] and hands out
//! [`Hid`]s for them. A handle encodes its group, a slot index and the slot's
//! generation, so handles to freed slots are rejected instead of aliasing a
//! newer object.

pub mod errors;
mod registry;

pub use errors::*;
pub use registry::Registry;

use core::fmt;

/// Kind of object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum AtomGroup {
    /// Open file handle.
    File = 1,
    /// File whose last handle closed while objects inside it remain open.
    FileClosing = 2,
    /// Per-open file record (internal).
    FileHandle = 3,
    /// State shared by every handle on one physical file (internal).
    SharedFile = 4,
    Group = 5,
    PropertyClass = 6,
    PropertyList = 7,
    /// Class storage, reachable with or without a public class handle (internal).
    ClassRecord = 8,
}

impl AtomGroup {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => AtomGroup::File,
            2 => AtomGroup::FileClosing,
            3 => AtomGroup::FileHandle,
            4 => AtomGroup::SharedFile,
            5 => AtomGroup::Group,
            6 => AtomGroup::PropertyClass,
            7 => AtomGroup::PropertyList,
            8 => AtomGroup::ClassRecord,
            _ => return None,
        })
    }
}

const GROUP_SHIFT: u32 = 56;
const GEN_SHIFT: u32 = 32;
const GEN_MASK: u64 = 0x00FF_FFFF;
const INDEX_MASK: u64 = 0xFFFF_FFFF;

/// Opaque handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hid(u64);

impl Hid {
    /// A value no registry ever issues.
    pub const INVALID: Hid = Hid(0);

    pub(crate) fn new(group: AtomGroup, generation: u32, index: u32) -> Self {
        Hid(((group as u64) << GROUP_SHIFT)
            | ((generation as u64 & GEN_MASK) << GEN_SHIFT)
            | index as u64)
    }

    pub fn group(self) -> Option<AtomGroup> {
        AtomGroup::from_u8((self.0 >> GROUP_SHIFT) as u8)
    }

    pub(crate) fn generation(self) -> u32 {
        ((self.0 >> GEN_SHIFT) & GEN_MASK) as u32
    }

    pub(crate) fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Hid(raw)
    }

    pub fn is(self, group: AtomGroup) -> bool {
        self.group() == Some(group)
    }
}

impl fmt::Display for Hid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.group() {
            Some(g) => write!(f, "{g:?}#{}.{}", self.index(), self.generation()),
            None => write!(f, "hid:{:#x}", self.0),
        }
    }
}

impl fmt::Debug for Hid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
