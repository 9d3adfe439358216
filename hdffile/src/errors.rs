// SPDX-License-Identifier: MIT

use core::fmt;

pub use hdfatom::AtomError;
pub use hdfio::errors::DriverError;
pub use hdfprop::PropError;

pub type FormatResult<T = ()> = core::result::Result<T, FormatError>;
pub type FileResult<T = ()> = core::result::Result<T, FileError>;

/// On-disk structure could not be decoded or encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// No signature at any probed offset.
    NoSignature,
    BadVersion { field: &'static str, found: u8 },
    BadWidth { field: &'static str, found: u8 },
    /// A B-tree half-rank of zero.
    BadRank { field: &'static str },
    /// Stored address does not fit in 64 bits.
    AddressOverflow,
    /// Address does not fit in the configured width.
    AddressTooWide { width: usize },
    /// Physical end of file lies before the stored end of allocation.
    Truncated { eof: u64, eoa: u64 },
    /// Buffer too short for the structure being decoded.
    ShortBuffer { needed: usize, found: usize },
    Invalid(&'static str),
}

impl FormatError {
    pub fn msg(&self) -> &'static str {
        match self {
            FormatError::NoSignature => "Unable to locate file signature",
            FormatError::BadVersion { .. } => "Unsupported format version",
            FormatError::BadWidth { .. } => "Invalid address or size width",
            FormatError::BadRank { .. } => "Invalid B-tree half-rank",
            FormatError::AddressOverflow => "Address does not fit in 64 bits",
            FormatError::AddressTooWide { .. } => "Address does not fit in the address width",
            FormatError::Truncated { .. } => "Truncated file",
            FormatError::ShortBuffer { .. } => "Buffer too short",
            FormatError::Invalid(msg) => msg,
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            FormatError::BadVersion { field, found } => write!(f, " ({field} = {found})"),
            FormatError::BadWidth { field, found } => write!(f, " ({field} = {found})"),
            FormatError::BadRank { field } => write!(f, " ({field} = 0)"),
            FormatError::AddressTooWide { width } => write!(f, " (width {width})"),
            FormatError::Truncated { eof, eoa } => write!(f, " (eof = {eof}, stored eoa = {eoa})"),
            FormatError::ShortBuffer { needed, found } => {
                write!(f, " (needed {needed}, got {found})")
            }
            _ => Ok(()),
        }
    }
}

impl std::error::Error for FormatError {}

#[derive(Debug, Clone, PartialEq)]
pub enum FileError {
    Driver(DriverError),
    Prop(PropError),
    Atom(AtomError),
    Format(FormatError),
    InvalidArgument(&'static str),
    /// Operation not allowed in the current state (already mounted, open, ...).
    State(&'static str),
    NotFound(String),
    Exists(String),
    Other(&'static str),
}

impl FileError {
    pub fn msg(&self) -> &'static str {
        match self {
            FileError::Driver(_) => "Driver error",
            FileError::Prop(_) => "Property list error",
            FileError::Atom(_) => "Handle error",
            FileError::Format(_) => "Format error",
            FileError::InvalidArgument(msg) => msg,
            FileError::State(msg) => msg,
            FileError::NotFound(_) => "Object not found",
            FileError::Exists(_) => "Object already exists",
            FileError::Other(msg) => msg,
        }
    }

    /// Whether the error comes from decoding the file itself.
    pub fn is_format(&self) -> bool {
        matches!(self, FileError::Format(_))
    }
}

impl From<DriverError> for FileError {
    fn from(e: DriverError) -> Self {
        FileError::Driver(e)
    }
}

impl From<PropError> for FileError {
    fn from(e: PropError) -> Self {
        FileError::Prop(e)
    }
}

impl From<AtomError> for FileError {
    fn from(e: AtomError) -> Self {
        FileError::Atom(e)
    }
}

impl From<FormatError> for FileError {
    fn from(e: FormatError) -> Self {
        FileError::Format(e)
    }
}

impl From<&'static str> for FileError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        FileError::Other(msg)
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            FileError::NotFound(name) | FileError::Exists(name) => write!(f, " ('{name}')")?,
            FileError::Driver(e) => write!(f, "\n  caused by: {e}")?,
            FileError::Prop(e) => write!(f, "\n  caused by: {e}")?,
            FileError::Atom(e) => write!(f, "\n  caused by: {e}")?,
            FileError::Format(e) => write!(f, "\n  caused by: {e}")?,
            _ => {}
        }
        Ok(())
    }
}

impl std::error::Error for FileError {}

/// Keeps the first error of a best-effort sequence.
pub fn keep_first(slot: &mut Option<FileError>, result: FileResult) {
    if let Err(e) = result {
        if slot.is_none() {
            *slot = Some(e);
        } else {
            log::warn!("suppressed error: {e}");
        }
    }
}
