// SPDX-License-Identifier: MIT

use std::path::Path;

use super::Sec2Driver;
use crate::errors::*;
use crate::types::*;
use crate::{DriverInfoName, FileDriver};

const MULTI_INFO_NAME: &DriverInfoName = b"NCSAmult";

/// Start of the raw-data member in a split layout.
pub const SPLIT_RAW_BASE: u64 = u64::MAX / 2;

/// One file of a multi layout, holding addresses from `base` up to the next member's base.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MultiMember {
    pub suffix: String,
    pub base: u64,
}

/// Routing of storage kinds to member files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MultiLayout {
    /// Member index for each [`MemKind`], by `MemKind::index`.
    pub map: [u8; MemKind::COUNT],
    pub members: Vec<MultiMember>,
}

impl MultiLayout {
    /// Metadata in one file, raw data in another.
    pub fn split(meta_suffix: &str, raw_suffix: &str) -> Self {
        let mut map = [0u8; MemKind::COUNT];
        map[MemKind::Draw.index()] = 1;
        Self {
            map,
            members: vec![
                MultiMember { suffix: meta_suffix.to_string(), base: 0 },
                MultiMember { suffix: raw_suffix.to_string(), base: SPLIT_RAW_BASE },
            ],
        }
    }

    pub fn validate(&self) -> DriverResult {
        if self.members.is_empty() {
            return Err(DriverError::Invalid("multi layout has no members"));
        }
        if self.members[0].base != 0 {
            return Err(DriverError::Invalid("first multi member must start at address 0"));
        }
        if self.members.windows(2).any(|w| w[0].base >= w[1].base) {
            return Err(DriverError::Invalid("multi member bases must increase"));
        }
        if self.map.iter().any(|&m| m as usize >= self.members.len()) {
            return Err(DriverError::Invalid("multi map refers to a missing member"));
        }
        if self.map[MemKind::Super.index()] != 0 {
            return Err(DriverError::Invalid("superblock must live in the first multi member"));
        }
        Ok(())
    }

    /// Upper bound (exclusive) of member `index`'s address range.
    fn limit(&self, index: usize) -> u64 {
        self.members.get(index + 1).map(|m| m.base).unwrap_or(ADDR_UNDEF)
    }

    /// Member holding `addr`.
    fn member_of(&self, addr: u64) -> usize {
        self.members
            .iter()
            .rposition(|m| m.base <= addr)
            .unwrap_or(0)
    }

    fn info_size(&self) -> usize {
        let names: usize = self
            .members
            .iter()
            .map(|m| (m.suffix.len() + 1).next_multiple_of(8))
            .sum();
        8 + 16 * self.members.len() + names
    }
}

/// Address-partitioned driver over several [`Sec2Driver`] members.
#[derive(Debug)]
pub struct MultiDriver {
    name: String,
    layout: MultiLayout,
    members: Vec<Option<Sec2Driver>>,
    /// Per-member EOA, relative to the member base.
    eoa: Vec<u64>,
    flags: AccessFlags,
}

impl MultiDriver {
    pub fn open(name: &str, flags: AccessFlags, layout: MultiLayout) -> DriverResult<Self> {
        layout.validate()?;
        let mut members = Vec::with_capacity(layout.members.len());
        for (i, m) in layout.members.iter().enumerate() {
            let path = format!("{name}{}", m.suffix);
            if i > 0 && !flags.contains(AccessFlags::CREAT) && !Path::new(&path).is_file() {
                members.push(None);
                continue;
            }
            members.push(Some(Sec2Driver::open(&path, flags)?));
        }
        let eoa = vec![0; layout.members.len()];
        Ok(Self { name: name.to_string(), layout, members, eoa, flags })
    }

    fn member_mut(&mut self, index: usize) -> DriverResult<&mut Sec2Driver> {
        if self.members[index].is_none() {
            if !self.flags.is_writable() {
                return Err(DriverError::NotFound(format!(
                    "{}{}",
                    self.name, self.layout.members[index].suffix
                )));
            }
            let path = format!("{}{}", self.name, self.layout.members[index].suffix);
            self.members[index] = Some(Sec2Driver::open(&path, AccessFlags::RDWR | AccessFlags::CREAT)?);
        }
        let eoa = self.eoa[index];
        match self.members[index].as_mut() {
            Some(m) => {
                m.set_eoa(eoa)?;
                Ok(m)
            }
            None => Err(DriverError::Other("multi member is not open")),
        }
    }

    fn set_member_eoa(&mut self, index: usize, eoa: u64) -> DriverResult {
        let base = self.layout.members[index].base;
        if eoa > self.layout.limit(index) - base {
            return Err(DriverError::OutOfBounds { addr: base, len: eoa, eoa: self.layout.limit(index) });
        }
        self.eoa[index] = eoa;
        Ok(())
    }
}

impl FileDriver for MultiDriver {
    fn name(&self) -> &'static str {
        "multi"
    }

    fn key(&self) -> Option<FileKey> {
        self.members.first().and_then(|m| m.as_ref()).and_then(|m| m.key())
    }

    fn get_eoa(&self) -> u64 {
        self.layout
            .members
            .iter()
            .zip(&self.eoa)
            .filter(|(_, eoa)| **eoa > 0)
            .map(|(m, eoa)| m.base + eoa)
            .max()
            .unwrap_or(0)
    }

    fn set_eoa(&mut self, addr: u64) -> DriverResult {
        if addr == ADDR_UNDEF {
            return Err(DriverError::Invalid("end of address space is undefined"));
        }
        let index = if addr == 0 { 0 } else { self.layout.member_of(addr - 1) };
        let base = self.layout.members[index].base;
        self.set_member_eoa(index, addr - base)
    }

    fn get_eof(&self) -> u64 {
        self.layout
            .members
            .iter()
            .zip(&self.members)
            .filter_map(|(m, d)| d.as_ref().map(|d| (m.base, d.get_eof())))
            .filter(|(_, eof)| *eof > 0)
            .map(|(base, eof)| base + eof)
            .max()
            .unwrap_or(0)
    }

    fn read_at(&mut self, kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        let index = self.layout.member_of(addr);
        let local = addr - self.layout.members[index].base;
        check_range(local, buf.len() as u64, self.eoa[index])?;
        self.member_mut(index)?.read_at(kind, local, buf)
    }

    fn write_at(&mut self, kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        let index = self.layout.member_of(addr);
        let local = addr - self.layout.members[index].base;
        check_range(local, data.len() as u64, self.eoa[index])?;
        self.member_mut(index)?.write_at(kind, local, data)
    }

    fn alloc(&mut self, kind: MemKind, size: u64, align: u64) -> DriverResult<u64> {
        let index = self.layout.map[kind.index()] as usize;
        let base = self.layout.members[index].base;
        let local = align_up(self.eoa[index], align)?;
        let end = local
            .checked_add(size)
            .ok_or(DriverError::OutOfBounds { addr: base + local, len: size, eoa: ADDR_UNDEF })?;
        self.set_member_eoa(index, end)?;
        Ok(base + local)
    }

    fn flush(&mut self) -> DriverResult {
        self.members
            .iter_mut()
            .flatten()
            .try_for_each(|m| m.flush())
    }

    fn truncate(&mut self) -> DriverResult {
        for index in 0..self.members.len() {
            if self.eoa[index] == 0 && self.members[index].is_none() {
                continue;
            }
            self.member_mut(index)?.truncate()?;
        }
        Ok(())
    }

    fn sb_size(&self) -> u64 {
        self.layout.info_size() as u64
    }

    fn sb_encode(&self, buf: &mut [u8]) -> DriverResult<DriverInfoName> {
        let size = self.layout.info_size();
        let out = buf
            .get_mut(..size)
            .ok_or(DriverError::BadDriverInfo("multi driver info buffer too small"))?;
        out.fill(0);
        out[..MemKind::COUNT].copy_from_slice(&self.layout.map);
        let mut p = 8;
        for (m, eoa) in self.layout.members.iter().zip(&self.eoa) {
            out[p..p + 8].copy_from_slice(&m.base.to_le_bytes());
            out[p + 8..p + 16].copy_from_slice(&eoa.to_le_bytes());
            p += 16;
        }
        for m in &self.layout.members {
            out[p..p + m.suffix.len()].copy_from_slice(m.suffix.as_bytes());
            p += (m.suffix.len() + 1).next_multiple_of(8);
        }
        Ok(*MULTI_INFO_NAME)
    }

    fn sb_decode(&mut self, name: &DriverInfoName, buf: &[u8]) -> DriverResult {
        if name != MULTI_INFO_NAME {
            return Err(DriverError::BadDriverInfo(
                "driver info block was not written by the multi driver",
            ));
        }
        if buf.len() < self.layout.info_size() {
            return Err(DriverError::BadDriverInfo("multi driver info is truncated"));
        }
        if buf[..MemKind::COUNT] != self.layout.map {
            return Err(DriverError::BadDriverInfo("multi member map mismatch"));
        }
        let mut eoas = Vec::with_capacity(self.layout.members.len());
        let mut p = 8;
        for m in &self.layout.members {
            let field = |at: usize| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[at..at + 8]);
                u64::from_le_bytes(raw)
            };
            if field(p) != m.base {
                return Err(DriverError::BadDriverInfo("multi member address mismatch"));
            }
            eoas.push(field(p + 8));
            p += 16;
        }
        for m in &self.layout.members {
            let stored = &buf[p..p + m.suffix.len()];
            if stored != m.suffix.as_bytes() || buf[p + m.suffix.len()] != 0 {
                return Err(DriverError::BadDriverInfo("multi member name mismatch"));
            }
            p += (m.suffix.len() + 1).next_multiple_of(8);
        }
        for (index, eoa) in eoas.into_iter().enumerate() {
            self.set_member_eoa(index, eoa)?;
        }
        Ok(())
    }
}
