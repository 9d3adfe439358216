// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use zerocopy::IntoBytes;

use hdfio::prelude::*;
use hdfprop::{FileAccessProps, FileCreateProps};

use crate::cache::*;
use crate::errors::*;
use crate::superblock::*;
use crate::types::*;

/// State shared by every handle open on one physical file.
pub(crate) struct SharedFile {
    pub name: String,
    /// Flags of the open that created this state.
    pub flags: AccessFlags,
    /// Absolute address of the superblock.
    pub boot_addr: u64,
    /// Absolute address all file addresses are relative to.
    pub base_addr: u64,
    pub freespace_addr: u64,
    pub driver_addr: u64,
    pub consist_flags: u32,
    pub fcpl: FileCreateProps,
    pub fapl: FileAccessProps,
    pub driver: Box<dyn FileDriver>,
    pub root: SymbolTableEntry,
    /// Named groups by path from the root, without a leading '/'.
    pub groups: BTreeMap<String, SymbolTableEntry>,
    /// Raw-data blocks allocated through this state, absolute start to end.
    raw_extents: BTreeMap<u64, u64>,
    meta: MetaCache,
    chunks: ChunkCache,
    sieve: SieveBuffer,
}

impl SharedFile {
    pub fn new(
        name: &str,
        flags: AccessFlags,
        driver: Box<dyn FileDriver>,
        fcpl: FileCreateProps,
        mut fapl: FileAccessProps,
    ) -> Self {
        if driver.features().contains(DriverFeatures::NO_CACHE) {
            log::debug!("'{name}': driver forbids caching");
            fapl.mdc_nelmts = 0;
            fapl.rdcc_nelmts = 0;
            fapl.rdcc_nbytes = 0;
            fapl.sieve_buf_size = 0;
        }
        let (mdc, rdcc_nelmts, rdcc_nbytes, w0) = fapl.cache();
        Self {
            name: name.to_string(),
            flags,
            boot_addr: 0,
            base_addr: 0,
            freespace_addr: ADDR_UNDEF,
            driver_addr: ADDR_UNDEF,
            consist_flags: 0,
            meta: MetaCache::new(mdc),
            chunks: ChunkCache::new(rdcc_nelmts, rdcc_nbytes, w0),
            sieve: SieveBuffer::new(fapl.sieve_buf_size),
            fcpl,
            fapl,
            driver,
            root: SymbolTableEntry::default(),
            groups: BTreeMap::new(),
            raw_extents: BTreeMap::new(),
        }
    }

    /// Lays out a brand new file: user block, superblock, driver info and
    /// the root group's object header.
    pub fn write_init(&mut self) -> FileResult {
        let userblock = self.fcpl.userblock();
        self.boot_addr = userblock;
        self.base_addr = userblock;
        self.consist_flags = CONSIST_FLAGS_NEW;
        self.flush(false, true)?;

        let header = self.alloc(MemKind::OHdr, OHDR_STUB_SIZE)?;
        self.write_block(MemKind::OHdr, header, ObjectHeaderStub::group().as_bytes())?;
        self.root = SymbolTableEntry::for_object(header);
        log::debug!("'{}': new file, root group at {header:#x}", self.name);
        Ok(())
    }

    /// Loads an existing file's superblock and adopts its layout.
    pub fn read_init(&mut self) -> FileResult {
        let boot = locate_signature(&mut *self.driver)?.ok_or(FormatError::NoSignature)?;
        let sb = read_superblock(&mut *self.driver, boot)?;

        let eof = self.driver.get_eof();
        if eof < sb.eoa {
            return Err(FormatError::Truncated { eof, eoa: sb.eoa }.into());
        }
        self.driver.set_eoa(sb.eoa)?;

        self.fcpl
            .set_userblock(sb.base_addr)
            .map_err(|_| FormatError::Invalid("base address is not a valid user block size"))?;
        self.fcpl.set_sizes(sb.sizeof_addr, sb.sizeof_size)?;
        self.fcpl.set_sym_k(sb.sym_internal_k.into(), sb.sym_leaf_k.into());
        self.fcpl.boot_version = sb.boot_version;
        self.fcpl.freespace_version = sb.freespace_version;
        self.fcpl.objdir_version = sb.objdir_version;
        self.fcpl.sharedheader_version = sb.sharedheader_version;

        self.boot_addr = boot;
        self.base_addr = sb.base_addr;
        self.freespace_addr = sb.freespace_addr;
        self.driver_addr = sb.driver_addr;
        self.consist_flags = sb.consist_flags;
        self.root = sb.root;
        log::debug!(
            "'{}': superblock at {boot:#x}, eoa {:#x}, widths {}/{}",
            self.name,
            sb.eoa,
            sb.sizeof_addr,
            sb.sizeof_size
        );
        Ok(())
    }

    /// In-memory superblock as it would be written now.
    pub fn superblock(&self) -> FileResult<Superblock> {
        let [boot_version, freespace_version, objdir_version, sharedheader_version] =
            self.fcpl.versions();
        let (sizeof_addr, sizeof_size) = self.fcpl.sizes();
        let (internal, leaf) = self.fcpl.sym_k();
        let half_rank =
            |k: u32| u16::try_from(k).map_err(|_| FormatError::Invalid("half-rank exceeds 16 bits"));
        Ok(Superblock {
            boot_version,
            freespace_version,
            objdir_version,
            sharedheader_version,
            sizeof_addr,
            sizeof_size,
            sym_leaf_k: half_rank(leaf)?,
            sym_internal_k: half_rank(internal)?,
            consist_flags: self.consist_flags,
            base_addr: self.base_addr,
            freespace_addr: self.freespace_addr,
            eoa: self.driver.get_eoa(),
            driver_addr: self.driver_addr,
            root: self.root,
        })
    }

    /// With `alloc_only`, reserves the user block, superblock and driver
    /// info block at the start of an empty file. Otherwise drains the caches
    /// and writes the superblock.
    pub fn flush(&mut self, invalidate: bool, alloc_only: bool) -> FileResult {
        if alloc_only {
            let sb_size = self.superblock()?.encoded_size() as u64;
            let drv_size = driver_block_size(&*self.driver);
            let addr = self.driver.alloc(MemKind::Super, self.base_addr + sb_size + drv_size, 1)?;
            if addr != 0 {
                return Err(FileError::Other(
                    "file driver failed to allocate userblock and/or superblock",
                ));
            }
            self.driver_addr = if drv_size > 0 { sb_size } else { ADDR_UNDEF };
            return Ok(());
        }

        self.sieve.flush(&mut *self.driver, invalidate)?;
        let mut drv = SieveGuard::new(&mut *self.driver, &mut self.sieve);
        self.chunks.flush(&mut drv, invalidate)?;
        self.meta.flush(&mut drv, invalidate)?;

        let buf = encode_superblock(&self.superblock()?, &*self.driver)?;
        self.driver.write_at(MemKind::Super, self.boot_addr, &buf)?;
        self.driver.truncate()?;
        self.driver.flush()?;
        log::trace!("'{}': flushed (invalidate: {invalidate})", self.name);
        Ok(())
    }

    /// Allocates `size` bytes and returns their file-relative address.
    pub fn alloc(&mut self, kind: MemKind, size: u64) -> FileResult<u64> {
        let (threshold, alignment) = self.fapl.alignment();
        let align = if size >= threshold { alignment } else { 1 };
        let addr = self.driver.alloc(kind, size, align)?;
        if kind == MemKind::Draw {
            self.raw_extents.insert(addr, addr.saturating_add(size));
        }
        addr.checked_sub(self.base_addr)
            .ok_or(FileError::Other("allocation below the base address"))
    }

    /// Absolute address of `[addr, addr + len)`, which must not wrap.
    fn absolute(&self, addr: u64, len: usize) -> FileResult<u64> {
        let abs = self.base_addr.checked_add(addr).ok_or(FormatError::AddressOverflow)?;
        abs.checked_add(len as u64).ok_or(FormatError::AddressOverflow)?;
        Ok(abs)
    }

    /// End of the raw-data block holding `[abs, abs + len)`. Unknown blocks
    /// end with the access itself.
    fn raw_limit(&self, abs: u64, len: usize) -> u64 {
        let end = abs.saturating_add(len as u64);
        self.raw_extents
            .range(..=abs)
            .next_back()
            .map(|(_, &extent_end)| extent_end)
            .filter(|&extent_end| extent_end >= end)
            .unwrap_or(end)
    }

    /// Raw data goes through the sieve buffer, metadata through the metadata cache.
    pub fn read_block(&mut self, kind: MemKind, addr: u64, buf: &mut [u8]) -> FileResult {
        let abs = self.absolute(addr, buf.len())?;
        match kind {
            MemKind::Draw => {
                self.settle_raw(abs, buf.len())?;
                let limit = self.raw_limit(abs, buf.len());
                self.sieve.read(&mut *self.driver, abs, buf, limit)?;
            }
            _ => {
                let mut drv = SieveGuard::new(&mut *self.driver, &mut self.sieve);
                self.meta.read(&mut drv, kind, abs, buf)?;
            }
        }
        Ok(())
    }

    pub fn write_block(&mut self, kind: MemKind, addr: u64, data: &[u8]) -> FileResult {
        let abs = self.absolute(addr, data.len())?;
        match kind {
            MemKind::Draw => {
                self.settle_raw(abs, data.len())?;
                let limit = self.raw_limit(abs, data.len());
                self.sieve.write(&mut *self.driver, abs, data, limit)?;
            }
            _ => {
                let mut drv = SieveGuard::new(&mut *self.driver, &mut self.sieve);
                self.meta.write(&mut drv, kind, abs, data)?;
            }
        }
        Ok(())
    }

    /// Moves cached chunks and metadata blocks covering a raw access to the
    /// driver, so the sieve window is loaded from current bytes.
    fn settle_raw(&mut self, abs: u64, len: usize) -> FileResult {
        let mut drv = SieveGuard::new(&mut *self.driver, &mut self.sieve);
        self.chunks.evict_overlapping(&mut drv, abs, len as u64)?;
        self.meta.evict_overlapping(&mut drv, abs, len as u64)?;
        Ok(())
    }

    pub fn read_chunk(&mut self, addr: u64, buf: &mut [u8]) -> FileResult {
        let abs = self.absolute(addr, buf.len())?;
        let mut drv = SieveGuard::new(&mut *self.driver, &mut self.sieve);
        self.chunks.read(&mut drv, abs, buf)?;
        Ok(())
    }

    pub fn write_chunk(&mut self, addr: u64, data: &[u8]) -> FileResult {
        let abs = self.absolute(addr, data.len())?;
        let mut drv = SieveGuard::new(&mut *self.driver, &mut self.sieve);
        self.chunks.write(&mut drv, abs, data)?;
        Ok(())
    }

    /// Entry for `path`; the empty path is the root group.
    pub fn entry(&self, path: &str) -> Option<SymbolTableEntry> {
        match path {
            "" => Some(self.root),
            _ => self.groups.get(path).copied(),
        }
    }

    pub fn close(&mut self) -> FileResult {
        self.driver.close()?;
        Ok(())
    }
}
