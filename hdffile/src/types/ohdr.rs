// SPDX-License-Identifier: MIT

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const OHDR_VERSION: u8 = 1;

/// Object header prefix written for each group the manager creates.
/// The group layer owns the messages that would follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ObjectHeaderStub {
    pub version: u8,
    pub reserved: u8,
    pub nmesgs: U16,
    pub link_count: U32,
    pub chunk_size: U32,
    pub padding: [u8; 4],
}

pub const OHDR_STUB_SIZE: u64 = core::mem::size_of::<ObjectHeaderStub>() as u64;

impl ObjectHeaderStub {
    /// Header of an empty group with one link to it.
    pub fn group() -> Self {
        Self {
            version: OHDR_VERSION,
            reserved: 0,
            nmesgs: U16::new(0),
            link_count: U32::new(1),
            chunk_size: U32::new(0),
            padding: [0; 4],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.version == OHDR_VERSION
    }
}
