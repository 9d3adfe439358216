// SPDX-License-Identifier: MIT

//! Property classes and property lists.
//!
//! Classes form a tree under a root class. A list is an instance of a class:
//! it copies every property found along the class chain and can then be
//! modified on its own. Lists of the standard classes (file create, file
//! access, dataset create, dataset transfer, mount) also carry a typed
//! template that the file layer reads directly.

mod class;
pub mod engine;
pub mod errors;
pub mod property;
pub mod templates;

pub use engine::{IterOutcome, PropertyEngine, StandardClasses};
pub use errors::*;
pub use property::{ClassHooks, PropertyCallbacks};
pub use templates::*;

use hdfatom::Hid;

// Shorthands for the standard templates
impl PropertyEngine {
    pub fn file_create(&self, list: Hid) -> PropResult<&FileCreateProps> {
        self.props(list)
    }

    pub fn file_access(&self, list: Hid) -> PropResult<&FileAccessProps> {
        self.props(list)
    }

    pub fn dataset_create(&self, list: Hid) -> PropResult<&DatasetCreateProps> {
        self.props(list)
    }

    pub fn dataset_transfer(&self, list: Hid) -> PropResult<&DatasetTransferProps> {
        self.props(list)
    }

    pub fn mount_props(&self, list: Hid) -> PropResult<&MountProps> {
        self.props(list)
    }
}

pub mod prelude {
    pub use super::engine::*;
    pub use super::errors::*;
    pub use super::property::*;
    pub use super::templates::*;
    pub use hdfatom::{AtomGroup, Hid};
}
