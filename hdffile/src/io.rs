// SPDX-License-Identifier: MIT

//! Block I/O, allocation and per-file queries by file id.

use hdfatom::Hid;
use hdfio::prelude::*;
use hdfprop::PropertyEngine;

use crate::codec;
use crate::errors::*;
use crate::manager::FileManager;
use crate::shared::SharedFile;
use crate::types::Superblock;

impl FileManager {
    fn writable(&mut self, file: Hid) -> FileResult<&mut SharedFile> {
        let hk = self.handle_of(file)?;
        if !self.handles.get(hk)?.intent.is_writable() {
            return Err(FileError::State("no write intent on file"));
        }
        self.shared_of_mut(hk)
    }

    fn readable(&mut self, file: Hid) -> FileResult<&mut SharedFile> {
        let hk = self.handle_of(file)?;
        self.shared_of_mut(hk)
    }

    /// Reserves `size` bytes of `kind` storage; returns a file-relative address.
    pub fn alloc(&mut self, file: Hid, kind: MemKind, size: u64) -> FileResult<u64> {
        self.writable(file)?.alloc(kind, size)
    }

    /// Reads at a file-relative address. Raw data is staged in the sieve
    /// buffer, everything else in the metadata cache.
    pub fn read_block(&mut self, file: Hid, kind: MemKind, addr: u64, buf: &mut [u8]) -> FileResult {
        self.readable(file)?.read_block(kind, addr, buf)
    }

    pub fn write_block(&mut self, file: Hid, kind: MemKind, addr: u64, data: &[u8]) -> FileResult {
        self.writable(file)?.write_block(kind, addr, data)
    }

    /// Reads a raw-data chunk through the chunk cache.
    pub fn read_chunk(&mut self, file: Hid, addr: u64, buf: &mut [u8]) -> FileResult {
        self.readable(file)?.read_chunk(addr, buf)
    }

    pub fn write_chunk(&mut self, file: Hid, addr: u64, data: &[u8]) -> FileResult {
        self.writable(file)?.write_chunk(addr, data)
    }

    /// Intent of this file id (not of other ids on the same file).
    pub fn intent(&self, file: Hid) -> FileResult<AccessFlags> {
        Ok(self.handles.get(self.handle_of(file)?)?.intent)
    }

    pub fn name(&self, file: Hid) -> FileResult<&str> {
        Ok(&self.handles.get(self.handle_of(file)?)?.name)
    }

    pub fn sizeof_addr(&self, file: Hid) -> FileResult<u8> {
        Ok(self.shared_of(self.handle_of(file)?)?.fcpl.sizes().0)
    }

    pub fn sizeof_size(&self, file: Hid) -> FileResult<u8> {
        Ok(self.shared_of(self.handle_of(file)?)?.fcpl.sizes().1)
    }

    /// Name of the driver the file was opened with.
    pub fn driver_id(&self, file: Hid) -> FileResult<&'static str> {
        Ok(self.shared_of(self.handle_of(file)?)?.driver.name())
    }

    /// New file-create list holding the file's creation properties.
    pub fn get_create_plist(&self, plists: &mut PropertyEngine, file: Hid) -> FileResult<Hid> {
        let props = self.shared_of(self.handle_of(file)?)?.fcpl.clone();
        Ok(plists.create_with(props)?)
    }

    /// New file-access list holding the properties the file was opened with.
    pub fn get_access_plist(&self, plists: &mut PropertyEngine, file: Hid) -> FileResult<Hid> {
        let props = self.shared_of(self.handle_of(file)?)?.fapl.clone();
        Ok(plists.create_with(props)?)
    }

    /// Number of open file ids.
    pub fn open_count(&self) -> usize {
        self.files.len()
    }

    /// Number of physical files open, deferred closes included.
    pub fn shared_count(&self) -> usize {
        self.shared.len()
    }

    /// Number of files whose close waits on open groups.
    pub fn closing_count(&self) -> usize {
        self.closing.len()
    }

    /// Number of handles sharing the state of `file`.
    pub fn shared_refs(&self, file: Hid) -> FileResult<u32> {
        let sk = self.handles.get(self.handle_of(file)?)?.shared;
        Ok(self.shared.ref_count(sk)?)
    }

    /// Superblock as it would be written by a flush now.
    pub fn superblock(&self, file: Hid) -> FileResult<Superblock> {
        self.shared_of(self.handle_of(file)?)?.superblock()
    }

    /// Absolute end of allocated space.
    pub fn eoa(&self, file: Hid) -> FileResult<u64> {
        Ok(self.shared_of(self.handle_of(file)?)?.driver.get_eoa())
    }

    /// Encodes `addr` with the file's address width; returns the bytes used.
    pub fn addr_encode(&self, file: Hid, buf: &mut [u8], addr: u64) -> FileResult<usize> {
        let width = self.sizeof_addr(file)? as usize;
        codec::encode_addr(buf, width, addr)?;
        Ok(width)
    }

    pub fn addr_decode(&self, file: Hid, buf: &[u8]) -> FileResult<u64> {
        let width = self.sizeof_addr(file)? as usize;
        Ok(codec::decode_addr(buf, width)?)
    }
}
