// SPDX-License-Identifier: MIT

use hdfio::prelude::*;

/// Single staging window for raw data.
///
/// Small accesses are served from the window, which is reloaded around the
/// access when it misses. The window never reaches past the end of the object
/// holding the access, nor past the EOA. Accesses at least as large as the
/// buffer go to the driver after any overlapping dirty window is written back.
#[derive(Debug)]
pub struct SieveBuffer {
    capacity: usize,
    addr: u64,
    data: Vec<u8>,
    dirty: bool,
}

impl SieveBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, addr: 0, data: Vec::new(), dirty: false }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current window as `(addr, len)`, if loaded.
    pub fn window(&self) -> Option<(u64, usize)> {
        (!self.data.is_empty()).then_some((self.addr, self.data.len()))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // A loaded window always lies below the EOA, so this cannot overflow.
    fn end(&self) -> u64 {
        self.addr + self.data.len() as u64
    }

    fn contains(&self, addr: u64, len: usize) -> bool {
        !self.data.is_empty()
            && addr >= self.addr
            && addr.checked_add(len as u64).is_some_and(|end| end <= self.end())
    }

    /// Common part of the window and `[addr, addr + len)` as
    /// `(window offset, access offset, len)`.
    fn intersect(&self, addr: u64, len: usize) -> Option<(usize, usize, usize)> {
        if self.data.is_empty() {
            return None;
        }
        let start = addr.max(self.addr);
        let end = addr.saturating_add(len as u64).min(self.end());
        (start < end).then(|| {
            ((start - self.addr) as usize, (start - addr) as usize, (end - start) as usize)
        })
    }

    fn overlaps(&self, addr: u64, len: usize) -> bool {
        self.intersect(addr, len).is_some()
    }

    /// Reads `buf` at `addr`. `limit` is the end of the object holding the
    /// access.
    pub fn read(
        &mut self,
        driver: &mut dyn FileDriver,
        addr: u64,
        buf: &mut [u8],
        limit: u64,
    ) -> DriverResult {
        if self.contains(addr, buf.len()) {
            let off = (addr - self.addr) as usize;
            buf.copy_from_slice(&self.data[off..off + buf.len()]);
            return Ok(());
        }
        if buf.len() >= self.capacity {
            if self.overlaps(addr, buf.len()) {
                self.flush(driver, true)?;
            }
            return driver.read_at(MemKind::Draw, addr, buf);
        }
        if !self.load(driver, addr, buf.len(), limit)? {
            return driver.read_at(MemKind::Draw, addr, buf);
        }
        buf.copy_from_slice(&self.data[..buf.len()]);
        Ok(())
    }

    /// Writes `data` at `addr`. `limit` is the end of the object holding the
    /// access.
    pub fn write(
        &mut self,
        driver: &mut dyn FileDriver,
        addr: u64,
        data: &[u8],
        limit: u64,
    ) -> DriverResult {
        check_range(addr, data.len() as u64, driver.get_eoa())?;
        if !self.contains(addr, data.len()) {
            if data.len() >= self.capacity {
                if self.overlaps(addr, data.len()) {
                    self.flush(driver, true)?;
                }
                return driver.write_at(MemKind::Draw, addr, data);
            }
            if !self.load(driver, addr, data.len(), limit)? {
                return driver.write_at(MemKind::Draw, addr, data);
            }
        }
        let off = (addr - self.addr) as usize;
        self.data[off..off + data.len()].copy_from_slice(data);
        self.dirty = true;
        Ok(())
    }

    /// Copies bytes written to the driver behind the window's back into the
    /// window, so a later write-back does not undo them.
    pub fn patch(&mut self, addr: u64, data: &[u8]) {
        if let Some((w, d, n)) = self.intersect(addr, data.len()) {
            self.data[w..w + n].copy_from_slice(&data[d..d + n]);
        }
    }

    /// Replaces the bytes of `buf` (read from the driver at `addr`) that the
    /// window holds with the window's copy.
    pub fn overlay(&self, addr: u64, buf: &mut [u8]) {
        if let Some((w, d, n)) = self.intersect(addr, buf.len()) {
            buf[d..d + n].copy_from_slice(&self.data[w..w + n]);
        }
    }

    /// Writes the window back if dirty; `invalidate` also drops it.
    pub fn flush(&mut self, driver: &mut dyn FileDriver, invalidate: bool) -> DriverResult {
        if self.dirty {
            driver.write_at(MemKind::Draw, self.addr, &self.data)?;
            self.dirty = false;
        }
        if invalidate {
            self.data.clear();
        }
        Ok(())
    }

    /// Replaces the window with one starting at `addr`, clipped to `limit`
    /// and the EOA. Returns false when the window could not cover `len` bytes.
    fn load(
        &mut self,
        driver: &mut dyn FileDriver,
        addr: u64,
        len: usize,
        limit: u64,
    ) -> DriverResult<bool> {
        self.flush(driver, true)?;
        let end = driver
            .get_eoa()
            .min(limit)
            .min(addr.saturating_add(self.capacity as u64));
        let size = end.saturating_sub(addr) as usize;
        if size < len {
            return Ok(false);
        }
        self.data.resize(size, 0);
        if let Err(e) = driver.read_at(MemKind::Draw, addr, &mut self.data) {
            self.data.clear();
            return Err(e);
        }
        self.addr = addr;
        Ok(true)
    }
}

/// Driver view handed to the chunk and metadata caches: their writes are
/// mirrored into the sieve window and their reads see its pending bytes.
pub struct SieveGuard<'a> {
    driver: &'a mut dyn FileDriver,
    sieve: &'a mut SieveBuffer,
}

impl<'a> SieveGuard<'a> {
    pub fn new(driver: &'a mut dyn FileDriver, sieve: &'a mut SieveBuffer) -> Self {
        Self { driver, sieve }
    }
}

impl FileDriver for SieveGuard<'_> {
    fn name(&self) -> &'static str {
        self.driver.name()
    }
    fn features(&self) -> DriverFeatures {
        self.driver.features()
    }
    fn key(&self) -> Option<FileKey> {
        self.driver.key()
    }
    fn get_eoa(&self) -> u64 {
        self.driver.get_eoa()
    }
    fn set_eoa(&mut self, addr: u64) -> DriverResult {
        self.driver.set_eoa(addr)
    }
    fn get_eof(&self) -> u64 {
        self.driver.get_eof()
    }
    fn read_at(&mut self, kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        self.driver.read_at(kind, addr, buf)?;
        self.sieve.overlay(addr, buf);
        Ok(())
    }
    fn write_at(&mut self, kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        self.driver.write_at(kind, addr, data)?;
        self.sieve.patch(addr, data);
        Ok(())
    }
    fn flush(&mut self) -> DriverResult {
        self.driver.flush()
    }
    fn truncate(&mut self) -> DriverResult {
        self.driver.truncate()
    }
}
