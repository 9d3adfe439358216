// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use hdfio::prelude::*;

#[derive(Debug)]
struct MetaEntry {
    kind: MemKind,
    data: Vec<u8>,
    dirty: bool,
}

/// Write-back cache of metadata blocks keyed by absolute address.
///
/// Each block is cached as written or read; an access that overlaps a cached
/// block without matching it exactly writes that block back and drops it.
#[derive(Debug)]
pub struct MetaCache {
    capacity: usize,
    entries: BTreeMap<u64, MetaEntry>,
    max_len: u64,
}

impl MetaCache {
    /// A capacity of 0 passes every access straight to the driver.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: BTreeMap::new(), max_len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.entries.values().filter(|e| e.dirty).count()
    }

    pub fn read(
        &mut self,
        driver: &mut dyn FileDriver,
        kind: MemKind,
        addr: u64,
        buf: &mut [u8],
    ) -> DriverResult {
        if let Some(e) = self.entries.get(&addr).filter(|e| e.data.len() == buf.len()) {
            buf.copy_from_slice(&e.data);
            return Ok(());
        }
        self.evict_overlapping(driver, addr, buf.len() as u64)?;
        driver.read_at(kind, addr, buf)?;
        if self.capacity > 0 {
            self.insert(driver, addr, MetaEntry { kind, data: buf.to_vec(), dirty: false })?;
        }
        Ok(())
    }

    pub fn write(
        &mut self,
        driver: &mut dyn FileDriver,
        kind: MemKind,
        addr: u64,
        data: &[u8],
    ) -> DriverResult {
        check_range(addr, data.len() as u64, driver.get_eoa())?;
        if let Some(e) = self.entries.get_mut(&addr).filter(|e| e.data.len() == data.len()) {
            e.data.copy_from_slice(data);
            e.kind = kind;
            e.dirty = true;
            return Ok(());
        }
        self.evict_overlapping(driver, addr, data.len() as u64)?;
        if self.capacity == 0 {
            return driver.write_at(kind, addr, data);
        }
        self.insert(driver, addr, MetaEntry { kind, data: data.to_vec(), dirty: true })
    }

    /// Writes dirty blocks back in address order. With `invalidate` the
    /// cache is emptied. Every block is attempted; the first error is returned.
    pub fn flush(&mut self, driver: &mut dyn FileDriver, invalidate: bool) -> DriverResult {
        let mut first_err = None;
        for (addr, e) in self.entries.iter_mut().filter(|(_, e)| e.dirty) {
            match driver.write_at(e.kind, *addr, &e.data) {
                Ok(()) => e.dirty = false,
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        if invalidate {
            self.entries.clear();
            self.max_len = 0;
        }
        first_err.map_or(Ok(()), Err)
    }

    fn insert(&mut self, driver: &mut dyn FileDriver, addr: u64, entry: MetaEntry) -> DriverResult {
        self.max_len = self.max_len.max(entry.data.len() as u64);
        self.entries.insert(addr, entry);
        while self.entries.len() > self.capacity {
            let Some((victim, e)) = self.entries.pop_first() else {
                break;
            };
            if e.dirty {
                driver.write_at(e.kind, victim, &e.data)?;
            }
        }
        Ok(())
    }

    /// Writes back and drops every block intersecting `[addr, addr + len)`.
    pub fn evict_overlapping(&mut self, driver: &mut dyn FileDriver, addr: u64, len: u64) -> DriverResult {
        let end = addr.saturating_add(len);
        let start = addr.saturating_sub(self.max_len);
        let hits: Vec<u64> = self
            .entries
            .range(start..end)
            .filter(|(a, e)| **a + e.data.len() as u64 > addr)
            .map(|(a, _)| *a)
            .collect();
        for a in hits {
            match self.entries.remove(&a) {
                Some(e) if e.dirty => driver.write_at(e.kind, a, &e.data)?,
                _ => {}
            }
        }
        Ok(())
    }
}
