// SPDX-License-Identifier: MIT

use core::fmt;

use crate::{AtomGroup, Hid};

pub type AtomResult<T = ()> = core::result::Result<T, AtomError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomError {
    /// The handle belongs to another group.
    WrongGroup { expected: AtomGroup, found: Hid },
    /// The handle is stale or was never issued.
    BadId(Hid),
    /// The group ran out of slots.
    Exhausted(AtomGroup),
}

impl AtomError {
    pub fn msg(&self) -> &'static str {
        match self {
            AtomError::WrongGroup { .. } => "Handle belongs to another group",
            AtomError::BadId(_) => "Invalid or closed handle",
            AtomError::Exhausted(_) => "No more handles available",
        }
    }
}

impl fmt::Display for AtomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            AtomError::WrongGroup { expected, found } => {
                write!(f, " (expected {expected:?}, got {found})")
            }
            AtomError::BadId(id) => write!(f, " ({id})"),
            AtomError::Exhausted(group) => write!(f, " ({group:?})"),
        }
    }
}

impl std::error::Error for AtomError {}
