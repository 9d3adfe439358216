// SPDX-License-Identifier: MIT

use std::sync::{Arc, Mutex};

use crate::config::{DriverConfig, DriverFactory};
use crate::errors::*;
use crate::types::*;
use crate::{DriverInfoName, FileDriver};

/// Per-driver I/O counters.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct DriverStats {
    pub reads: u64,
    pub read_bytes: u64,
    pub writes: u64,
    pub write_bytes: u64,
    pub flushes: u64,
    pub truncates: u64,
    pub allocs: u64,
    pub opens: u64,
    pub closes: u64,

    /// Writes per [`MemKind`], by `MemKind::index`.
    pub writes_by_kind: [u64; MemKind::COUNT],

    pub max_read: u64,
    pub max_write: u64,
}

impl DriverStats {
    #[inline]
    pub fn reset(&mut self) {
        *self = DriverStats::default();
    }
}

/// Counters shared between a [`CountingDriver`] and whoever watches it.
pub type SharedStats = Arc<Mutex<DriverStats>>;

/// Transparent instrumentation wrapper.
#[derive(Debug)]
pub struct CountingDriver<D: FileDriver> {
    inner: D,
    stats: SharedStats,
}

impl<D: FileDriver> CountingDriver<D> {
    pub fn new(inner: D) -> Self {
        Self::with_stats(inner, SharedStats::default())
    }

    pub fn with_stats(inner: D, stats: SharedStats) -> Self {
        Self { inner, stats }
    }

    pub fn snapshot(&self) -> DriverStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stats_handle(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn record(&self, f: impl FnOnce(&mut DriverStats)) {
        f(&mut self.stats.lock().unwrap_or_else(|e| e.into_inner()));
    }
}

impl<D: FileDriver> FileDriver for CountingDriver<D> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }
    fn features(&self) -> DriverFeatures {
        self.inner.features()
    }
    fn key(&self) -> Option<FileKey> {
        self.inner.key()
    }
    fn get_eoa(&self) -> u64 {
        self.inner.get_eoa()
    }
    fn set_eoa(&mut self, addr: u64) -> DriverResult {
        self.inner.set_eoa(addr)
    }
    fn get_eof(&self) -> u64 {
        self.inner.get_eof()
    }

    fn read_at(&mut self, kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        let len = buf.len() as u64;
        self.record(|s| {
            s.reads += 1;
            s.read_bytes += len;
            s.max_read = s.max_read.max(len);
        });
        self.inner.read_at(kind, addr, buf)
    }

    fn write_at(&mut self, kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        let len = data.len() as u64;
        self.record(|s| {
            s.writes += 1;
            s.write_bytes += len;
            s.writes_by_kind[kind.index()] += 1;
            s.max_write = s.max_write.max(len);
        });
        self.inner.write_at(kind, addr, data)
    }

    fn alloc(&mut self, kind: MemKind, size: u64, align: u64) -> DriverResult<u64> {
        self.record(|s| s.allocs += 1);
        self.inner.alloc(kind, size, align)
    }

    fn flush(&mut self) -> DriverResult {
        self.record(|s| s.flushes += 1);
        self.inner.flush()
    }

    fn truncate(&mut self) -> DriverResult {
        self.record(|s| s.truncates += 1);
        self.inner.truncate()
    }

    fn close(&mut self) -> DriverResult {
        self.record(|s| s.closes += 1);
        self.inner.close()
    }

    fn sb_size(&self) -> u64 {
        self.inner.sb_size()
    }
    fn sb_encode(&self, buf: &mut [u8]) -> DriverResult<DriverInfoName> {
        self.inner.sb_encode(buf)
    }
    fn sb_decode(&mut self, name: &DriverInfoName, buf: &[u8]) -> DriverResult {
        self.inner.sb_decode(name, buf)
    }
}

/// Factory wrapping every driver opened by `inner` in a [`CountingDriver`]
/// that reports into one shared set of counters.
#[derive(Debug)]
pub struct CountingFactory {
    inner: DriverConfig,
    stats: SharedStats,
}

impl CountingFactory {
    pub fn new(inner: DriverConfig) -> Self {
        Self { inner, stats: SharedStats::default() }
    }

    pub fn stats_handle(&self) -> SharedStats {
        self.stats.clone()
    }
}

impl DriverFactory for CountingFactory {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn has_compare(&self) -> bool {
        self.inner.has_compare()
    }

    fn open(&self, name: &str, flags: AccessFlags) -> DriverResult<Box<dyn FileDriver>> {
        let driver = self.inner.open(name, flags)?;
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).opens += 1;
        Ok(Box::new(CountingDriver::with_stats(driver, self.stats.clone())))
    }
}
