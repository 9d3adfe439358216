// SPDX-License-Identifier: MIT

use core::fmt;
use std::io;
use std::path::Path;

/// Result type for driver operations.
pub type DriverResult<T = ()> = core::result::Result<T, DriverError>;

/// Error type for driver operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    Io(String),
    NotFound(String),
    Exists(String),
    OutOfBounds { addr: u64, len: u64, eoa: u64 },
    Unsupported,
    BadDriverInfo(&'static str),
    Invalid(&'static str),
    Other(&'static str),
}

impl DriverError {
    pub fn msg(&self) -> &'static str {
        match self {
            DriverError::Io(_) => "I/O error",
            DriverError::NotFound(_) => "File not found",
            DriverError::Exists(_) => "File exists",
            DriverError::OutOfBounds { .. } => "Address is beyond the end of the allocated space",
            DriverError::Unsupported => "Unsupported operation",
            DriverError::BadDriverInfo(msg) => msg,
            DriverError::Invalid(msg) => msg,
            DriverError::Other(msg) => msg,
        }
    }

    /// Maps an [`io::Error`] raised while opening `path`.
    #[cold]
    pub fn from_io(e: io::Error, path: &Path) -> Self {
        let what = format!("{}: {e}", path.display());
        match e.kind() {
            io::ErrorKind::NotFound => DriverError::NotFound(what),
            io::ErrorKind::AlreadyExists => DriverError::Exists(what),
            _ => DriverError::Io(what),
        }
    }
}

impl From<&'static str> for DriverError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        DriverError::Other(msg)
    }
}

impl From<io::Error> for DriverError {
    #[cold]
    #[inline(never)]
    fn from(e: io::Error) -> Self {
        DriverError::Io(e.to_string())
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            DriverError::Io(what) | DriverError::NotFound(what) | DriverError::Exists(what) => {
                write!(f, " ({what})")?
            }
            DriverError::OutOfBounds { addr, len, eoa } => {
                write!(f, " (addr: {addr:#x}, len: {len}, eoa: {eoa:#x})")?
            }
            _ => {}
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}
