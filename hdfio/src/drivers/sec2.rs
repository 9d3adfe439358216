// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::open_options;
use crate::FileDriver;
use crate::errors::*;
use crate::types::*;

/// Unbuffered driver over a single [`File`].
#[derive(Debug)]
pub struct Sec2Driver {
    file: File,
    path: PathBuf,
    key: FileKey,
    eoa: u64,
    eof: u64,
}

impl Sec2Driver {
    pub fn open(path: impl AsRef<Path>, flags: AccessFlags) -> DriverResult<Self> {
        let path = path.as_ref();
        let file = open_options(flags)?
            .open(path)
            .map_err(|e| DriverError::from_io(e, path))?;
        let eof = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            key: FileKey::for_path(path),
            eoa: 0,
            eof,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileDriver for Sec2Driver {
    fn name(&self) -> &'static str {
        "sec2"
    }

    fn key(&self) -> Option<FileKey> {
        Some(self.key.clone())
    }

    #[inline]
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

    #[inline]
    fn get_eof(&self) -> u64 {
        self.eof
    }

    fn read_at(&mut self, _kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        check_range(addr, buf.len() as u64, self.eoa)?;
        let avail = self.eof.saturating_sub(addr).min(buf.len() as u64) as usize;
        if avail > 0 {
            self.file.seek(SeekFrom::Start(addr))?;
            self.file.read_exact(&mut buf[..avail])?;
        }
        buf[avail..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, _kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        check_range(addr, data.len() as u64, self.eoa)?;
        self.file.seek(SeekFrom::Start(addr))?;
        self.file.write_all(data)?;
        self.eof = self.eof.max(addr + data.len() as u64);
        Ok(())
    }

    fn flush(&mut self) -> DriverResult {
        self.file.flush()?;
        Ok(())
    }

    fn truncate(&mut self) -> DriverResult {
        if self.eof != self.eoa {
            self.file.set_len(self.eoa)?;
            self.eof = self.eoa;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use tempfile::tempdir;

    fn create(dir: &Path) -> Sec2Driver {
        Sec2Driver::open(dir.join("f.h5"), AccessFlags::RDWR | AccessFlags::CREAT).unwrap()
    }

    #[test]
    fn test_rw() {
        let dir = tempdir().unwrap();
        let mut io = create(dir.path());
        io.set_eoa(64).unwrap();
        io.write_at(MemKind::OHdr, 10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(MemKind::OHdr, 10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
        assert_eq!(io.get_eof(), 14);
    }

    #[test]
    fn test_access_past_eoa() {
        let dir = tempdir().unwrap();
        let mut io = create(dir.path());
        io.set_eoa(8).unwrap();
        assert!(io.write_at(MemKind::Super, 4, &[0; 8]).is_err());
        let mut buf = [0u8; 9];
        let err = io.read_at(MemKind::Super, 0, &mut buf).unwrap_err();
        assert!(matches!(err, DriverError::OutOfBounds { eoa: 8, .. }));
    }

    #[test]
    fn test_read_past_eof_zero_fills() {
        let dir = tempdir().unwrap();
        let mut io = create(dir.path());
        io.set_eoa(32).unwrap();
        io.write_at(MemKind::Draw, 0, &[0xAA; 4]).unwrap();

        let mut buf = [0xFFu8; 8];
        io.read_at(MemKind::Draw, 2, &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xAA, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_truncate_to_eoa() {
        let dir = tempdir().unwrap();
        let mut io = create(dir.path());
        io.set_eoa(100).unwrap();
        io.write_at(MemKind::Draw, 0, &[1; 10]).unwrap();
        io.truncate().unwrap();
        assert_eq!(io.get_eof(), 100);
        assert_eq!(std::fs::metadata(io.path()).unwrap().len(), 100);
    }

    #[test]
    fn test_alloc_aligned() {
        let dir = tempdir().unwrap();
        let mut io = create(dir.path());
        assert_eq!(io.alloc(MemKind::Super, 10, 1).unwrap(), 0);
        assert_eq!(io.alloc(MemKind::Draw, 10, 16).unwrap(), 16);
        assert_eq!(io.get_eoa(), 26);
    }

    #[test]
    fn test_primitive_rw() {
        let dir = tempdir().unwrap();
        let mut io = create(dir.path());
        io.set_eoa(16).unwrap();
        io.write_u32_at(MemKind::LHeap, 4, 0xDEADBEEF).unwrap();
        assert_eq!(io.read_u32_at(MemKind::LHeap, 4).unwrap(), 0xDEADBEEF);
        io.zero_fill(MemKind::LHeap, 4, 4).unwrap();
        assert_eq!(io.read_u32_at(MemKind::LHeap, 4).unwrap(), 0);
    }

    #[test]
    fn test_excl_on_existing() {
        let dir = tempdir().unwrap();
        drop(create(dir.path()));
        let err = Sec2Driver::open(
            dir.path().join("f.h5"),
            AccessFlags::RDWR | AccessFlags::CREAT | AccessFlags::EXCL,
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Exists(_)));
    }

    #[test]
    fn test_same_file_same_key() {
        let dir = tempdir().unwrap();
        let a = create(dir.path());
        let b = Sec2Driver::open(dir.path().join("f.h5"), AccessFlags::RDONLY).unwrap();
        assert_eq!(a.key(), b.key());
    }
}
