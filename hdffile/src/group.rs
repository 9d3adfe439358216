// SPDX-License-Identifier: MIT

//! Minimal group namespace: enough to name mount points.
//!
//! Paths are `/`-separated. A leading `/` starts at the root of the mount
//! tree; empty components and `.` are skipped. Crossing a mount point
//! continues in the root group of the mounted file.

use zerocopy::{FromBytes, IntoBytes};

use hdfatom::Hid;
use hdfio::types::MemKind;

use crate::errors::*;
use crate::handle::GroupObject;
use crate::manager::FileManager;
use crate::types::*;

fn join(dir: &str, leaf: &str) -> String {
    if dir.is_empty() { leaf.to_string() } else { format!("{dir}/{leaf}") }
}

impl FileManager {
    /// Resolves `name` from `(hk, base)`. Returns the handle whose namespace
    /// holds the result, its path there, and its entry.
    pub(crate) fn traverse(
        &self,
        hk: Hid,
        base: &str,
        name: &str,
    ) -> FileResult<(Hid, String, SymbolTableEntry)> {
        if name.is_empty() {
            return Err(FileError::InvalidArgument("empty path"));
        }
        let (mut hk, mut path) = if name.starts_with('/') {
            (self.top(hk)?, String::new())
        } else {
            (hk, base.to_string())
        };
        let mut entry = self
            .shared_of(hk)?
            .entry(&path)
            .ok_or_else(|| FileError::NotFound(path.clone()))?;
        if let Some((child, root)) = self.resolve_mount(hk, entry)? {
            (hk, path, entry) = (child, String::new(), root);
        }

        for comp in name.split('/').filter(|c| !c.is_empty() && *c != ".") {
            path = join(&path, comp);
            entry = self
                .shared_of(hk)?
                .entry(&path)
                .ok_or_else(|| FileError::NotFound(path.clone()))?;
            if let Some((child, root)) = self.resolve_mount(hk, entry)? {
                (hk, path, entry) = (child, String::new(), root);
            }
        }
        Ok((hk, path, entry))
    }

    /// Creates a group at `name` relative to `loc` and returns it open.
    /// The parent must exist.
    pub fn create_group(&mut self, loc: Hid, name: &str) -> FileResult<Hid> {
        let (hk, base) = self.resolve_loc(loc)?;
        let trimmed = name.trim_end_matches('/');
        let (dir, leaf) = match trimmed.rfind('/') {
            Some(0) => ("/", &trimmed[1..]),
            Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
            None => (".", trimmed),
        };
        if leaf.is_empty() || leaf == "." {
            return Err(FileError::InvalidArgument("group name is empty"));
        }
        let (hk, dir, _) = self.traverse(hk, &base, dir)?;
        if !self.handles.get(hk)?.intent.is_writable() {
            return Err(FileError::State("no write intent on file"));
        }

        let path = join(&dir, leaf);
        let shared = self.shared_of_mut(hk)?;
        if shared.groups.contains_key(&path) {
            return Err(FileError::Exists(path));
        }
        let header = shared.alloc(MemKind::OHdr, OHDR_STUB_SIZE)?;
        shared.write_block(MemKind::OHdr, header, ObjectHeaderStub::group().as_bytes())?;
        let entry = SymbolTableEntry::for_object(header);
        shared.groups.insert(path.clone(), entry);
        log::debug!("created group '{path}' at {header:#x}");

        self.register_group(GroupObject { file: hk, path, entry })
    }

    /// Opens the group `name` relative to `loc`.
    pub fn open_group(&mut self, loc: Hid, name: &str) -> FileResult<Hid> {
        let (hk, base) = self.resolve_loc(loc)?;
        let (hk, path, entry) = self.traverse(hk, &base, name)?;
        self.register_group(GroupObject { file: hk, path, entry })
    }

    fn register_group(&mut self, group: GroupObject) -> FileResult<Hid> {
        let hk = group.file;
        let gid = self.groups.register(group)?;
        self.handles.get_mut(hk)?.nopen_objs += 1;
        Ok(gid)
    }

    /// Closes a group. The last group of a file whose close was deferred
    /// completes that close.
    pub fn close_group(&mut self, group: Hid) -> FileResult {
        let Some(g) = self.groups.dec_ref(group)? else {
            return Ok(());
        };
        let h = self.handles.get_mut(g.file)?;
        h.nopen_objs = h.nopen_objs.saturating_sub(1);
        if h.nopen_objs == 0 && h.closing.is_some() {
            return self.close_handle(g.file);
        }
        Ok(())
    }

    /// Path of an open group within its file, `/`-rooted.
    pub fn group_path(&self, group: Hid) -> FileResult<String> {
        Ok(format!("/{}", self.groups.get(group)?.path))
    }

    pub fn group_entry(&self, group: Hid) -> FileResult<SymbolTableEntry> {
        Ok(self.groups.get(group)?.entry)
    }

    /// Reads the object header stub of an open group.
    pub fn object_header(&mut self, group: Hid) -> FileResult<ObjectHeaderStub> {
        let g = self.groups.get(group)?;
        let (hk, header) = (g.file, g.entry.header);
        let mut raw = [0u8; OHDR_STUB_SIZE as usize];
        self.shared_of_mut(hk)?.read_block(MemKind::OHdr, header, &mut raw)?;
        let stub = ObjectHeaderStub::read_from_bytes(&raw)
            .map_err(|_| FormatError::Invalid("object header"))?;
        if !stub.is_valid() {
            return Err(FormatError::BadVersion { field: "object header", found: stub.version }.into());
        }
        Ok(stub)
    }

    /// Group paths known in the namespace of `file`, root first.
    pub fn list_groups(&self, file: Hid) -> FileResult<Vec<String>> {
        let shared = self.shared_of(self.handle_of(file)?)?;
        let mut paths = vec!["/".to_string()];
        paths.extend(shared.groups.keys().map(|p| format!("/{p}")));
        Ok(paths)
    }
}
