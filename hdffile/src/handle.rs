// SPDX-License-Identifier: MIT

use hdfatom::Hid;
use hdfio::types::AccessFlags;

use crate::types::SymbolTableEntry;

/// One open of a file. Several handles may share one physical file.
#[derive(Debug)]
pub(crate) struct FileHandle {
    pub name: String,
    pub intent: AccessFlags,
    /// Key into the shared-file registry.
    pub shared: Hid,
    /// Handle this one is mounted under.
    pub parent: Option<Hid>,
    /// Sorted by mount point header address.
    pub mounts: Vec<MountEntry>,
    /// Groups open through this handle.
    pub nopen_objs: usize,
    /// Set while the handle waits for its open objects to close.
    pub closing: Option<Hid>,
}

impl FileHandle {
    pub fn new(name: &str, intent: AccessFlags, shared: Hid) -> Self {
        Self {
            name: name.to_string(),
            intent,
            shared,
            parent: None,
            mounts: Vec::new(),
            nopen_objs: 0,
            closing: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MountEntry {
    /// Open group at the mount point, in the parent's namespace.
    pub group: Hid,
    /// Object header address of the mount point.
    pub header: u64,
    /// Handle of the mounted file.
    pub child: Hid,
    pub local: bool,
}

/// An open group.
#[derive(Debug, Clone)]
pub(crate) struct GroupObject {
    /// Handle whose namespace `path` belongs to.
    pub file: Hid,
    pub path: String,
    pub entry: SymbolTableEntry,
}
