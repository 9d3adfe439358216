// SPDX-License-Identifier: MIT

use core::fmt;

pub use hdfatom::AtomError;
pub use hdfio::errors::DriverError;

pub type PropResult<T = ()> = core::result::Result<T, PropError>;

#[derive(Debug, Clone, PartialEq)]
pub enum PropError {
    Atom(AtomError),
    Driver(DriverError),
    InvalidArgument(&'static str),
    Exists(String),
    NotFound(String),
    ZeroSized(String),
    SizeMismatch { name: String, expected: usize, found: usize },
    /// A user callback reported failure.
    Callback { op: &'static str, name: String, source: Box<PropError> },
    /// The list was not created from the expected standard class.
    WrongClass { expected: &'static str },
    /// An iteration callback returned a negative value.
    IterationFailed { value: i32, index: usize },
    Other(&'static str),
}

impl PropError {
    pub fn msg(&self) -> &'static str {
        match self {
            PropError::Atom(_) => "Handle error",
            PropError::Driver(_) => "Driver error",
            PropError::InvalidArgument(msg) => msg,
            PropError::Exists(_) => "Property already exists",
            PropError::NotFound(_) => "Property not found",
            PropError::ZeroSized(_) => "Property has no value",
            PropError::SizeMismatch { .. } => "Value size does not match the property size",
            PropError::Callback { .. } => "Property callback failed",
            PropError::WrongClass { .. } => "Property list is of the wrong class",
            PropError::IterationFailed { .. } => "Iteration callback failed",
            PropError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<PropError> {
        match self {
            PropError::Callback { source, .. } => Some((**source).clone()),
            _ => None,
        }
    }
}

impl From<AtomError> for PropError {
    fn from(e: AtomError) -> Self {
        PropError::Atom(e)
    }
}

impl From<DriverError> for PropError {
    fn from(e: DriverError) -> Self {
        PropError::Driver(e)
    }
}

impl From<&'static str> for PropError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        PropError::Other(msg)
    }
}

impl fmt::Display for PropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            PropError::Atom(e) => write!(f, ": {e}")?,
            PropError::Driver(e) => write!(f, ": {e}")?,
            PropError::Exists(name) | PropError::NotFound(name) | PropError::ZeroSized(name) => {
                write!(f, " (name: '{name}')")?
            }
            PropError::SizeMismatch { name, expected, found } => {
                write!(f, " (name: '{name}', expected {expected}, got {found})")?
            }
            PropError::Callback { op, name, .. } => write!(f, " ({op} on '{name}')")?,
            PropError::WrongClass { expected } => write!(f, " (expected {expected})")?,
            PropError::IterationFailed { value, index } => {
                write!(f, " (returned {value} at index {index})")?
            }
            _ => {}
        }
        let mut current = self.source();
        while let Some(src) = current {
            write!(f, "\n  caused by: {}", src.msg())?;
            current = src.source();
        }
        Ok(())
    }
}

impl std::error::Error for PropError {}
