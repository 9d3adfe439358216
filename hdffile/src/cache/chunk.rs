// SPDX-License-Identifier: MIT

use std::num::NonZeroUsize;

use lru::LruCache;

use hdfio::prelude::*;

#[derive(Debug)]
struct Chunk {
    data: Vec<u8>,
    dirty: bool,
}

/// LRU cache of raw-data chunks keyed by absolute address, bounded by
/// entry count and total bytes.
#[derive(Debug)]
pub struct ChunkCache {
    chunks: Option<LruCache<u64, Chunk>>,
    max_bytes: usize,
    nbytes: usize,
    w0: f64,
}

impl ChunkCache {
    /// Disabled when either bound is 0.
    pub fn new(nelmts: usize, nbytes: usize, w0: f64) -> Self {
        let chunks = NonZeroUsize::new(nelmts)
            .filter(|_| nbytes > 0)
            .map(LruCache::new);
        Self { chunks, max_bytes: nbytes, nbytes: 0, w0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.chunks.is_some()
    }

    pub fn len(&self) -> usize {
        self.chunks.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently held.
    pub fn nbytes(&self) -> usize {
        self.nbytes
    }

    /// Preemption weight for fully read or written chunks.
    pub fn w0(&self) -> f64 {
        self.w0
    }

    pub fn read(&mut self, driver: &mut dyn FileDriver, addr: u64, buf: &mut [u8]) -> DriverResult {
        if let Some(c) = self
            .chunks
            .as_mut()
            .and_then(|cache| cache.get(&addr))
            .filter(|c| c.data.len() == buf.len())
        {
            buf.copy_from_slice(&c.data);
            return Ok(());
        }
        self.discard(driver, addr)?;
        driver.read_at(MemKind::Draw, addr, buf)?;
        self.insert(driver, addr, Chunk { data: buf.to_vec(), dirty: false })
    }

    pub fn write(&mut self, driver: &mut dyn FileDriver, addr: u64, data: &[u8]) -> DriverResult {
        check_range(addr, data.len() as u64, driver.get_eoa())?;
        if !self.is_enabled() || data.len() > self.max_bytes {
            self.discard(driver, addr)?;
            return driver.write_at(MemKind::Draw, addr, data);
        }
        self.insert(driver, addr, Chunk { data: data.to_vec(), dirty: true })
    }

    /// Writes dirty chunks back; `invalidate` empties the cache.
    pub fn flush(&mut self, driver: &mut dyn FileDriver, invalidate: bool) -> DriverResult {
        let Some(cache) = self.chunks.as_mut() else {
            return Ok(());
        };
        let mut first_err = None;
        for (addr, c) in cache.iter_mut().filter(|(_, c)| c.dirty) {
            match driver.write_at(MemKind::Draw, *addr, &c.data) {
                Ok(()) => c.dirty = false,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        if invalidate {
            cache.clear();
            self.nbytes = 0;
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Writes back and drops every chunk intersecting `[addr, addr + len)`.
    pub fn evict_overlapping(&mut self, driver: &mut dyn FileDriver, addr: u64, len: u64) -> DriverResult {
        let end = addr.saturating_add(len);
        let hits: Vec<u64> = match self.chunks.as_ref() {
            Some(cache) => cache
                .iter()
                .filter(|(a, c)| **a < end && a.saturating_add(c.data.len() as u64) > addr)
                .map(|(a, _)| *a)
                .collect(),
            None => return Ok(()),
        };
        for a in hits {
            self.discard(driver, a)?;
        }
        Ok(())
    }

    /// Drops the chunk at `addr`, writing it back first if dirty.
    fn discard(&mut self, driver: &mut dyn FileDriver, addr: u64) -> DriverResult {
        let Some(old) = self.chunks.as_mut().and_then(|cache| cache.pop(&addr)) else {
            return Ok(());
        };
        self.nbytes -= old.data.len();
        if old.dirty {
            driver.write_at(MemKind::Draw, addr, &old.data)?;
        }
        Ok(())
    }

    fn insert(&mut self, driver: &mut dyn FileDriver, addr: u64, chunk: Chunk) -> DriverResult {
        let Some(cache) = self.chunks.as_mut() else {
            return Ok(());
        };
        if chunk.data.len() > self.max_bytes {
            return Ok(());
        }
        self.nbytes += chunk.data.len();
        if let Some((old_addr, old)) = cache.push(addr, chunk) {
            self.nbytes -= old.data.len();
            if old_addr != addr && old.dirty {
                driver.write_at(MemKind::Draw, old_addr, &old.data)?;
            }
        }
        while self.nbytes > self.max_bytes {
            let Some((victim, old)) = cache.pop_lru() else {
                break;
            };
            self.nbytes -= old.data.len();
            if old.dirty {
                driver.write_at(MemKind::Draw, victim, &old.data)?;
            }
        }
        Ok(())
    }
}
