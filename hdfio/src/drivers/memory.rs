// SPDX-License-Identifier: MIT

use std::fs;
use std::path::{Path, PathBuf};

use super::{copy_with_zero_fill, open_options};
use crate::FileDriver;
use crate::errors::*;
use crate::types::*;

/// In-memory driver.
///
/// An existing file of the same name is loaded on open (unless truncating).
/// With a backing store the buffer is written back on flush and close.
#[derive(Debug)]
pub struct CoreDriver {
    name: String,
    mem: Vec<u8>,
    increment: usize,
    eoa: u64,
    backing: Option<PathBuf>,
    dirty: bool,
}

impl CoreDriver {
    pub fn open(
        name: &str,
        flags: AccessFlags,
        increment: usize,
        backing_store: bool,
    ) -> DriverResult<Self> {
        if increment == 0 {
            return Err(DriverError::Invalid("core increment must be positive"));
        }
        let path = Path::new(name);
        let exists = path.is_file();

        if exists && flags.contains(AccessFlags::CREAT | AccessFlags::EXCL) {
            return Err(DriverError::Exists(name.to_string()));
        }
        if !exists && !flags.contains(AccessFlags::CREAT) {
            return Err(DriverError::NotFound(name.to_string()));
        }

        let mem = if exists && !flags.contains(AccessFlags::TRUNC) {
            fs::read(path).map_err(|e| DriverError::from_io(e, path))?
        } else {
            Vec::new()
        };

        if backing_store && flags.is_writable() {
            // Claim the name now so a later open can find it.
            open_options(flags)?
                .open(path)
                .map_err(|e| DriverError::from_io(e, path))?;
        }

        Ok(Self {
            name: name.to_string(),
            mem,
            increment,
            eoa: 0,
            backing: backing_store.then(|| path.to_path_buf()),
            dirty: false,
        })
    }

    /// Current contents, up to the physical end.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mem
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }
}

impl FileDriver for CoreDriver {
    fn name(&self) -> &'static str {
        "core"
    }

    fn key(&self) -> Option<FileKey> {
        self.backing.as_deref().map(FileKey::for_path)
    }

    fn get_eoa(&self) -> u64 {
        self.eoa
    }

    fn set_eoa(&mut self, addr: u64) -> DriverResult {
        if addr == ADDR_UNDEF {
            return Err(DriverError::Invalid("end of address space is undefined"));
        }
        self.eoa = addr;
        Ok(())
    }

    fn get_eof(&self) -> u64 {
        self.mem.len() as u64
    }

    fn read_at(&mut self, _kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        check_range(addr, buf.len() as u64, self.eoa)?;
        copy_with_zero_fill(&self.mem, addr, buf);
        Ok(())
    }

    fn write_at(&mut self, _kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        check_range(addr, data.len() as u64, self.eoa)?;
        let start = addr as usize;
        let end = start + data.len();
        if end > self.mem.len() {
            let grown = end.div_ceil(self.increment) * self.increment;
            self.mem.resize(grown, 0);
        }
        self.mem[start..end].copy_from_slice(data);
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> DriverResult {
        if let (Some(path), true) = (&self.backing, self.dirty) {
            fs::write(path, &self.mem)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn truncate(&mut self) -> DriverResult {
        let eoa = self.eoa as usize;
        if self.mem.len() != eoa {
            self.mem.resize(eoa, 0);
            self.dirty = true;
        }
        Ok(())
    }
}
