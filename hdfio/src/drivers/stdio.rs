// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::open_options;
use crate::FileDriver;
use crate::errors::*;
use crate::types::*;

/// Buffered driver: sequential writes coalesce in a [`BufWriter`].
#[derive(Debug)]
pub struct StdioDriver {
    inner: BufWriter<File>,
    key: FileKey,
    eoa: u64,
    eof: u64,
    /// Logical cursor of `inner`, if known.
    pos: Option<u64>,
}

impl StdioDriver {
    pub fn open(path: impl AsRef<Path>, flags: AccessFlags) -> DriverResult<Self> {
        let path = path.as_ref();
        let file = open_options(flags)?
            .open(path)
            .map_err(|e| DriverError::from_io(e, path))?;
        let eof = file.metadata()?.len();
        Ok(Self {
            inner: BufWriter::new(file),
            key: FileKey::for_path(path),
            eoa: 0,
            eof,
            pos: None,
        })
    }
}

impl FileDriver for StdioDriver {
    fn name(&self) -> &'static str {
        "stdio"
    }

    fn key(&self) -> Option<FileKey> {
        Some(self.key.clone())
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
        self.eof
    }

    fn read_at(&mut self, _kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        check_range(addr, buf.len() as u64, self.eoa)?;
        let avail = self.eof.saturating_sub(addr).min(buf.len() as u64) as usize;
        if avail > 0 {
            self.inner.flush()?;
            self.pos = None;
            let file = self.inner.get_mut();
            file.seek(SeekFrom::Start(addr))?;
            file.read_exact(&mut buf[..avail])?;
            self.pos = Some(addr + avail as u64);
        }
        buf[avail..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, _kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        check_range(addr, data.len() as u64, self.eoa)?;
        if self.pos != Some(addr) {
            self.pos = None;
            self.inner.seek(SeekFrom::Start(addr))?;
        }
        self.inner.write_all(data)?;
        let end = addr + data.len() as u64;
        self.pos = Some(end);
        self.eof = self.eof.max(end);
        Ok(())
    }

    fn flush(&mut self) -> DriverResult {
        self.inner.flush()?;
        Ok(())
    }

    fn truncate(&mut self) -> DriverResult {
        if self.eof != self.eoa {
            self.inner.flush()?;
            self.inner.get_ref().set_len(self.eoa)?;
            self.eof = self.eoa;
        }
        Ok(())
    }
}
