// SPDX-License-Identifier: MIT

pub mod ohdr;
pub mod superblock;
pub mod symbol;

pub use ohdr::*;
pub use superblock::*;
pub use symbol::*;
