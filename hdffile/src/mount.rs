// SPDX-License-Identifier: MIT

use hdfatom::Hid;
use hdfprop::{MountProps, PropertyEngine};

use crate::errors::*;
use crate::handle::MountEntry;
use crate::manager::FileManager;
use crate::types::SymbolTableEntry;

impl FileManager {
    /// Mounts `child` on the group `name` relative to `loc`.
    ///
    /// The mount point group stays open and the child gains a reference
    /// until it is unmounted or its parent closes.
    pub fn mount(
        &mut self,
        plists: &PropertyEngine,
        loc: Hid,
        name: &str,
        child: Hid,
        mount_plist: Option<Hid>,
    ) -> FileResult {
        let local = match mount_plist {
            Some(id) => plists.mount_props(id)?.local,
            None => MountProps::default().local,
        };
        let child = self.handle_of(child)?;
        if self.handles.get(child)?.parent.is_some() {
            return Err(FileError::State("file is already mounted"));
        }

        let group = self.open_group(loc, name)?;
        if let Err(e) = self.attach(group, child, local) {
            if let Err(ce) = self.close_group(group) {
                log::warn!("closing mount point '{name}': {ce}");
            }
            return Err(e);
        }
        Ok(())
    }

    fn attach(&mut self, group: Hid, child: Hid, local: bool) -> FileResult {
        let g = self.groups.get(group)?;
        let (parent, header) = (g.file, g.entry.header);

        let child_shared = self.handles.get(child)?.shared;
        let mut ancestor = Some(parent);
        while let Some(a) = ancestor {
            let h = self.handles.get(a)?;
            if a == child || h.shared == child_shared {
                return Err(FileError::State("mount would introduce a cycle"));
            }
            ancestor = h.parent;
        }

        let mounts = &mut self.handles.get_mut(parent)?.mounts;
        let at = match mounts.binary_search_by_key(&header, |m| m.header) {
            Ok(_) => return Err(FileError::State("mount point is already in use")),
            Err(at) => at,
        };
        mounts.insert(at, MountEntry { group, header, child, local });
        self.handles.get_mut(child)?.parent = Some(parent);
        self.handles.inc_ref(child)?;
        log::debug!(
            "mounted '{}' at {header:#x} of '{}'",
            self.handles.get(child)?.name,
            self.handles.get(parent)?.name
        );
        Ok(())
    }

    /// Unmounts the file mounted at `name` relative to `loc`. `name` may
    /// also name the root group of the mounted file itself.
    pub fn unmount(&mut self, loc: Hid, name: &str) -> FileResult {
        let (hk, base) = self.resolve_loc(loc)?;
        let (target, path, entry) = self.traverse(hk, &base, name)?;

        let parent = self.handles.get(target)?.parent.filter(|_| path.is_empty());
        let (parent, index) = match parent {
            Some(parent) => {
                let index = self
                    .handles
                    .get(parent)?
                    .mounts
                    .iter()
                    .position(|m| m.child == target)
                    .ok_or(FileError::State("not a mount point"))?;
                (parent, index)
            }
            None => {
                let index = self
                    .handles
                    .get(target)?
                    .mounts
                    .binary_search_by_key(&entry.header, |m| m.header)
                    .map_err(|_| FileError::State("not a mount point"))?;
                (target, index)
            }
        };

        let m = self.handles.get_mut(parent)?.mounts.remove(index);
        self.handles.get_mut(m.child)?.parent = None;
        log::debug!("unmounted '{}'", self.handles.get(m.child)?.name);

        let mut first = None;
        keep_first(&mut first, self.close_group(m.group));
        keep_first(&mut first, self.close_handle(m.child));
        first.map_or(Ok(()), Err)
    }

    /// Follows mounts stacked on `entry` within `hk`. Returns the handle and
    /// root entry of the topmost mounted file, or `None` if nothing is
    /// mounted there.
    pub(crate) fn resolve_mount(
        &self,
        mut hk: Hid,
        mut entry: SymbolTableEntry,
    ) -> FileResult<Option<(Hid, SymbolTableEntry)>> {
        let mut crossed = false;
        loop {
            let h = self.handles.get(hk)?;
            match h.mounts.binary_search_by_key(&entry.header, |m| m.header) {
                Ok(i) => {
                    hk = h.mounts[i].child;
                    entry = self.shared_of(hk)?.root;
                    crossed = true;
                }
                Err(_) => return Ok(crossed.then_some((hk, entry))),
            }
        }
    }

    /// Entry reached through any mount at `entry`, which belongs to the
    /// file or group `loc`. Unchanged when nothing is mounted there.
    pub fn mountpoint(&self, loc: Hid, entry: &SymbolTableEntry) -> FileResult<SymbolTableEntry> {
        let (hk, _) = self.resolve_loc(loc)?;
        Ok(self.resolve_mount(hk, *entry)?.map_or(*entry, |(_, root)| root))
    }

    /// Number of files mounted directly on `file`.
    pub fn mount_count(&self, file: Hid) -> FileResult<usize> {
        Ok(self.handles.get(self.handle_of(file)?)?.mounts.len())
    }

    /// Mount point header addresses of `file`, in table order.
    pub fn mount_points(&self, file: Hid) -> FileResult<Vec<u64>> {
        let h = self.handles.get(self.handle_of(file)?)?;
        Ok(h.mounts.iter().map(|m| m.header).collect())
    }

    /// Whether `file` is mounted in another file.
    pub fn is_mounted(&self, file: Hid) -> FileResult<bool> {
        Ok(self.handles.get(self.handle_of(file)?)?.parent.is_some())
    }
}
