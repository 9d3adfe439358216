// SPDX-License-Identifier: MIT

use hdfatom::{AtomGroup, Hid, Registry};
use hdfio::prelude::*;
use hdfprop::{FileAccessProps, FileCreateProps, PropertyEngine};

use crate::errors::*;
use crate::handle::*;
use crate::shared::SharedFile;
use crate::superblock::locate_signature;

/// How far a flush reaches through the mount tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushScope {
    /// Only the file itself.
    Local,
    /// Every file of the mount tree the file belongs to.
    Global,
    /// The file and everything mounted below it.
    Down,
}

/// Open files, the handles on them, and the mount tree.
///
/// File ids returned by [`create`](Self::create) and [`open`](Self::open)
/// each hold one reference on an internal handle; mounting holds another.
/// Handles opened on the same physical file share one state, found by
/// comparing driver keys.
pub struct FileManager {
    pub(crate) files: Registry<Hid>,
    pub(crate) closing: Registry<Hid>,
    pub(crate) handles: Registry<FileHandle>,
    pub(crate) shared: Registry<SharedFile>,
    pub(crate) groups: Registry<GroupObject>,
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileManager {
    pub fn new() -> Self {
        Self {
            files: Registry::new(AtomGroup::File),
            closing: Registry::new(AtomGroup::FileClosing),
            handles: Registry::new(AtomGroup::FileHandle),
            shared: Registry::new(AtomGroup::SharedFile),
            groups: Registry::new(AtomGroup::Group),
        }
    }

    /// Creates `name`. `flags` must hold exactly one of TRUNC and EXCL and
    /// may add DEBUG; write intent is implied.
    pub fn create(
        &mut self,
        plists: &PropertyEngine,
        name: &str,
        flags: AccessFlags,
        fcpl: Option<Hid>,
        fapl: Option<Hid>,
    ) -> FileResult<Hid> {
        if name.is_empty() {
            return Err(FileError::InvalidArgument("no file name specified"));
        }
        if !(AccessFlags::TRUNC | AccessFlags::EXCL | AccessFlags::DEBUG).contains(flags) {
            return Err(FileError::InvalidArgument("invalid flags"));
        }
        if flags.contains(AccessFlags::TRUNC) == flags.contains(AccessFlags::EXCL) {
            return Err(FileError::InvalidArgument("exactly one of TRUNC or EXCL is required"));
        }
        let fcpl = match fcpl {
            Some(id) => plists.file_create(id)?.clone(),
            None => FileCreateProps::default(),
        };
        let fapl = Self::access_props(plists, fapl)?;
        self.open_file(name, flags | AccessFlags::RDWR | AccessFlags::CREAT, fcpl, fapl)
    }

    /// Opens an existing file, read-only or with RDWR.
    pub fn open(
        &mut self,
        plists: &PropertyEngine,
        name: &str,
        flags: AccessFlags,
        fapl: Option<Hid>,
    ) -> FileResult<Hid> {
        if name.is_empty() {
            return Err(FileError::InvalidArgument("no file name specified"));
        }
        if !(AccessFlags::RDWR | AccessFlags::DEBUG).contains(flags) {
            return Err(FileError::InvalidArgument("invalid flags"));
        }
        let fapl = Self::access_props(plists, fapl)?;
        self.open_file(name, flags, FileCreateProps::default(), fapl)
    }

    /// New id on the same file, sharing its state and intent but outside
    /// any mount tree.
    pub fn reopen(&mut self, file: Hid) -> FileResult<Hid> {
        let hk = *self.files.get(file)?;
        let h = self.handles.get(hk)?;
        let handle = FileHandle::new(&h.name, h.intent, h.shared);
        let sk = h.shared;
        self.shared.inc_ref(sk)?;
        self.register_handle(handle)
    }

    /// Whether `name` carries a superblock signature at any probed offset.
    pub fn is_hdf5(plists: &PropertyEngine, name: &str, fapl: Option<Hid>) -> FileResult<bool> {
        let fapl = Self::access_props(plists, fapl)?;
        let mut driver = fapl.driver().open(name, AccessFlags::RDONLY)?;
        let found = locate_signature(&mut *driver);
        let closed = driver.close();
        let found = found?;
        closed?;
        Ok(found.is_some())
    }

    fn access_props(plists: &PropertyEngine, fapl: Option<Hid>) -> FileResult<FileAccessProps> {
        Ok(match fapl {
            Some(id) => plists.file_access(id)?.clone(),
            None => FileAccessProps::default(),
        })
    }

    /// Opens or creates a file and returns a new file id.
    pub(crate) fn open_file(
        &mut self,
        name: &str,
        flags: AccessFlags,
        fcpl: FileCreateProps,
        fapl: FileAccessProps,
    ) -> FileResult<Hid> {
        let cfg = fapl.driver().clone();

        // Probe without the creation flags so an open file is not truncated
        // before it can be recognized.
        let mut tentative = if cfg.has_compare() { flags - AccessFlags::CREATION } else { flags };
        let mut driver = match cfg.open(name, tentative) {
            Ok(d) => d,
            Err(e) if tentative == flags => return Err(e.into()),
            Err(e) => {
                log::trace!("tentative open of '{name}' failed ({e}), retrying with {flags:?}");
                tentative = flags;
                cfg.open(name, flags)?
            }
        };

        let existing = driver
            .key()
            .and_then(|key| self.shared.search(|_, s| s.driver.key().as_ref() == Some(&key)));

        let sk = match existing {
            Some(sk) => {
                if let Err(e) = driver.close() {
                    log::warn!("closing probe driver of '{name}': {e}");
                }
                self.check_reuse(sk, flags)?;
                self.shared.inc_ref(sk)?;
                log::debug!("'{name}' is already open, sharing its state");
                sk
            }
            None => {
                if flags != tentative {
                    driver.close()?;
                    driver = cfg.open(name, flags)?;
                }
                self.new_shared(name, flags, driver, fcpl, fapl)?
            }
        };

        match self.register_handle(FileHandle::new(name, flags, sk)) {
            Ok(id) => {
                log::debug!("opened '{name}' as {id} ({flags:?})");
                Ok(id)
            }
            Err(e) => {
                if let Ok(Some(mut s)) = self.shared.dec_ref(sk) {
                    if let Err(ce) = s.close() {
                        log::warn!("closing '{name}' after a failed open: {ce}");
                    }
                }
                Err(e)
            }
        }
    }

    fn check_reuse(&self, sk: Hid, flags: AccessFlags) -> FileResult {
        let s = self.shared.get(sk)?;
        if flags.contains(AccessFlags::TRUNC) {
            return Err(FileError::State("unable to truncate a file which is already open"));
        }
        if flags.contains(AccessFlags::EXCL) {
            return Err(FileError::Exists(s.name.clone()));
        }
        if flags.is_writable() && !s.flags.is_writable() {
            return Err(FileError::State("file is already open for read-only"));
        }
        Ok(())
    }

    fn new_shared(
        &mut self,
        name: &str,
        flags: AccessFlags,
        driver: Box<dyn FileDriver>,
        fcpl: FileCreateProps,
        fapl: FileAccessProps,
    ) -> FileResult<Hid> {
        let mut shared = SharedFile::new(name, flags, driver, fcpl, fapl);
        let init = if shared.driver.get_eof() == 0 && flags.is_writable() {
            shared.write_init()
        } else {
            shared.read_init()
        };
        if let Err(e) = init {
            if let Err(ce) = shared.close() {
                log::warn!("closing '{name}' after a failed open: {ce}");
            }
            return Err(e);
        }
        Ok(self.shared.register(shared)?)
    }

    fn register_handle(&mut self, handle: FileHandle) -> FileResult<Hid> {
        let hk = self.handles.register(handle)?;
        match self.files.register(hk) {
            Ok(id) => Ok(id),
            Err(e) => {
                self.handles.remove(hk)?;
                Err(e.into())
            }
        }
    }

    /// Flushes the file `loc` belongs to (a file or group id).
    pub fn flush(&mut self, loc: Hid, scope: FlushScope, invalidate: bool) -> FileResult {
        let (hk, _) = self.resolve_loc(loc)?;
        self.flush_handle(hk, scope, invalidate, false)
    }

    /// No-op unless the shared state was opened for writing.
    pub(crate) fn flush_handle(
        &mut self,
        hk: Hid,
        scope: FlushScope,
        invalidate: bool,
        alloc_only: bool,
    ) -> FileResult {
        let sk = self.handles.get(hk)?.shared;
        if !self.shared.get(sk)?.flags.is_writable() {
            return Ok(());
        }
        match scope {
            FlushScope::Local => self.shared.get_mut(sk)?.flush(invalidate, alloc_only),
            FlushScope::Global => {
                let top = self.top(hk)?;
                self.flush_handle(top, FlushScope::Down, invalidate, alloc_only)
            }
            FlushScope::Down => {
                let children: Vec<Hid> =
                    self.handles.get(hk)?.mounts.iter().map(|m| m.child).collect();
                let mut first = None;
                for child in children {
                    keep_first(
                        &mut first,
                        self.flush_handle(child, FlushScope::Down, invalidate, alloc_only),
                    );
                }
                keep_first(&mut first, self.shared.get_mut(sk)?.flush(invalidate, alloc_only));
                first.map_or(Ok(()), Err)
            }
        }
    }

    /// Root of the mount tree containing `hk`.
    pub(crate) fn top(&self, mut hk: Hid) -> FileResult<Hid> {
        while let Some(parent) = self.handles.get(hk)?.parent {
            hk = parent;
        }
        Ok(hk)
    }

    /// Releases a file id. The file itself stays open while other ids,
    /// a parent mount, or open groups still use it.
    pub fn close(&mut self, file: Hid) -> FileResult {
        match self.files.dec_ref(file)? {
            Some(hk) => self.close_handle(hk),
            None => Ok(()),
        }
    }

    /// Drops one reference on a handle and tears it down on the last one.
    /// Every step runs; the first error is returned.
    pub(crate) fn close_handle(&mut self, hk: Hid) -> FileResult {
        if self.handles.ref_count(hk)? > 1 {
            let flushed = self.flush_handle(hk, FlushScope::Local, false, false);
            self.handles.dec_ref(hk)?;
            return flushed;
        }

        let mut first = None;
        let h = self.handles.get_mut(hk)?;
        let mounts = std::mem::take(&mut h.mounts);
        let closing = h.closing.take();
        for m in mounts {
            if let Ok(child) = self.handles.get_mut(m.child) {
                child.parent = None;
            }
            keep_first(&mut first, self.close_group(m.group));
            keep_first(&mut first, self.close_handle(m.child));
        }

        let h = self.handles.get(hk)?;
        let (sk, nopen) = (h.shared, h.nopen_objs);
        if nopen > 0 {
            let name = h.name.clone();
            keep_first(&mut first, self.flush_handle(hk, FlushScope::Local, false, false));
            let cid = match closing {
                Some(cid) => cid,
                None => self.closing.register(hk)?,
            };
            self.handles.get_mut(hk)?.closing = Some(cid);
            log::debug!("close of '{name}' deferred until {nopen} open object(s) close");
            return first.map_or(Ok(()), Err);
        }
        if let Some(cid) = closing {
            keep_first(&mut first, self.closing.remove(cid).map(drop).map_err(Into::into));
        }

        let invalidate = self.shared.ref_count(sk)? == 1;
        keep_first(&mut first, self.flush_handle(hk, FlushScope::Local, invalidate, false));
        self.handles.remove(hk)?;
        if let Some(mut shared) = self.shared.dec_ref(sk)? {
            keep_first(&mut first, shared.close());
            log::debug!("closed '{}'", shared.name);
        }
        first.map_or(Ok(()), Err)
    }

    /// Closes every file id still open. Deferred files close once their
    /// groups are gone, so open groups are closed as well.
    pub fn close_all(&mut self) -> FileResult {
        let mut first = None;
        for id in self.files.ids() {
            while self.files.contains(id) {
                if let Err(e) = self.close(id) {
                    keep_first(&mut first, Err(e));
                    break;
                }
            }
        }
        for gid in self.groups.ids() {
            while self.groups.contains(gid) {
                if let Err(e) = self.close_group(gid) {
                    keep_first(&mut first, Err(e));
                    break;
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    pub(crate) fn shared_of(&self, hk: Hid) -> FileResult<&SharedFile> {
        let sk = self.handles.get(hk)?.shared;
        Ok(self.shared.get(sk)?)
    }

    pub(crate) fn shared_of_mut(&mut self, hk: Hid) -> FileResult<&mut SharedFile> {
        let sk = self.handles.get(hk)?.shared;
        Ok(self.shared.get_mut(sk)?)
    }

    /// Handle and group path named by a file or group id.
    pub(crate) fn resolve_loc(&self, loc: Hid) -> FileResult<(Hid, String)> {
        match loc.group() {
            Some(AtomGroup::File) => Ok((*self.files.get(loc)?, String::new())),
            Some(AtomGroup::Group) => {
                let g = self.groups.get(loc)?;
                Ok((g.file, g.path.clone()))
            }
            _ => Err(FileError::InvalidArgument("not a file or group id")),
        }
    }

    /// Handle behind a file id.
    pub(crate) fn handle_of(&self, file: Hid) -> FileResult<Hid> {
        Ok(*self.files.get(file)?)
    }
}

impl Drop for FileManager {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            log::warn!("closing files on shutdown: {e}");
        }
    }
}
