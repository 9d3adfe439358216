// SPDX-License-Identifier: MIT

//! File manager for the container format.
//!
//! A [`FileManager`] opens and creates files through a virtual file driver,
//! reads and writes their superblock, shares one state between every open
//! of the same physical file, and mounts files on groups of other files to
//! form one namespace. Creation and access properties come from
//! [`hdfprop`] property lists.

// Core modules
pub mod cache;
pub mod codec;
pub mod errors;
pub mod superblock;
pub mod types;

// Manager
mod group;
mod handle;
mod io;
mod manager;
mod mount;
mod shared;

pub use manager::{FileManager, FlushScope};

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::errors::*;
    pub use super::manager::{FileManager, FlushScope};
    pub use super::types::*;
    pub use hdfatom::Hid;
    pub use hdfio::prelude::*;
    pub use hdfprop::prelude::*;
}
