// SPDX-License-Identifier: MIT

use std::path::Path;

use super::Sec2Driver;
use crate::errors::*;
use crate::types::*;
use crate::{DriverInfoName, FileDriver};

const FAMILY_INFO_NAME: &DriverInfoName = b"NCSAfami";

/// File striped over fixed-size members.
///
/// Member `n` is named by replacing the first `%d` of the template with `n`.
#[derive(Debug)]
pub struct FamilyDriver {
    template: String,
    member_size: u64,
    members: Vec<Sec2Driver>,
    flags: AccessFlags,
    eoa: u64,
}

fn member_name(template: &str, index: usize) -> String {
    template.replacen("%d", &index.to_string(), 1)
}

impl FamilyDriver {
    pub fn open(template: &str, flags: AccessFlags, member_size: u64) -> DriverResult<Self> {
        if member_size == 0 {
            return Err(DriverError::Invalid("family member size must be positive"));
        }
        if !template.contains("%d") {
            return Err(DriverError::Invalid("family name template must contain %d"));
        }

        let mut members = vec![Sec2Driver::open(member_name(template, 0), flags)?];
        let follow = flags - AccessFlags::CREAT - AccessFlags::EXCL;
        loop {
            let name = member_name(template, members.len());
            if !Path::new(&name).is_file() {
                break;
            }
            members.push(Sec2Driver::open(&name, follow)?);
        }
        for m in &mut members {
            if m.get_eof() > member_size {
                return Err(DriverError::Invalid("family member is larger than the member size"));
            }
            m.set_eoa(member_size)?;
        }
        log::debug!("family '{template}': {} member(s) of {member_size} bytes", members.len());

        Ok(Self {
            template: template.to_string(),
            member_size,
            members,
            flags,
            eoa: 0,
        })
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Opens (creating as needed) members up to and including `index`.
    fn ensure_member(&mut self, index: usize) -> DriverResult<&mut Sec2Driver> {
        while self.members.len() <= index {
            let name = member_name(&self.template, self.members.len());
            let mut m = Sec2Driver::open(&name, AccessFlags::RDWR | AccessFlags::CREAT)?;
            m.set_eoa(self.member_size)?;
            self.members.push(m);
        }
        Ok(&mut self.members[index])
    }

    /// Splits `[addr, addr + len)` into `(member, offset, buffer_pos, n)` pieces.
    fn pieces(&self, addr: u64, len: usize) -> Vec<(usize, u64, usize, usize)> {
        let mut out = Vec::new();
        let mut pos = 0usize;
        while pos < len {
            let a = addr + pos as u64;
            let index = (a / self.member_size) as usize;
            let offset = a % self.member_size;
            let n = ((self.member_size - offset) as usize).min(len - pos);
            out.push((index, offset, pos, n));
            pos += n;
        }
        out
    }
}

impl FileDriver for FamilyDriver {
    fn name(&self) -> &'static str {
        "family"
    }

    fn key(&self) -> Option<FileKey> {
        self.members.first().and_then(|m| m.key())
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
        self.members
            .iter()
            .enumerate()
            .rev()
            .find(|(_, m)| m.get_eof() > 0)
            .map(|(i, m)| i as u64 * self.member_size + m.get_eof())
            .unwrap_or(0)
    }

    fn read_at(&mut self, kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        check_range(addr, buf.len() as u64, self.eoa)?;
        for (index, offset, pos, n) in self.pieces(addr, buf.len()) {
            match self.members.get_mut(index) {
                Some(m) => m.read_at(kind, offset, &mut buf[pos..pos + n])?,
                None => buf[pos..pos + n].fill(0),
            }
        }
        Ok(())
    }

    fn write_at(&mut self, kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        check_range(addr, data.len() as u64, self.eoa)?;
        if !self.flags.is_writable() {
            return Err(DriverError::Invalid("family opened read-only"));
        }
        for (index, offset, pos, n) in self.pieces(addr, data.len()) {
            self.ensure_member(index)?
                .write_at(kind, offset, &data[pos..pos + n])?;
        }
        Ok(())
    }

    fn flush(&mut self) -> DriverResult {
        self.members.iter_mut().try_for_each(|m| m.flush())
    }

    fn truncate(&mut self) -> DriverResult {
        let last = if self.eoa == 0 {
            0
        } else {
            ((self.eoa - 1) / self.member_size) as usize
        };
        self.ensure_member(last)?;

        for (i, m) in self.members.iter_mut().enumerate().take(last + 1) {
            let end = if i < last {
                self.member_size
            } else {
                self.eoa - last as u64 * self.member_size
            };
            m.set_eoa(end)?;
            m.truncate()?;
            m.set_eoa(self.member_size)?;
        }
        for m in self.members.drain(last + 1..) {
            log::debug!("family: removing unused member {}", m.path().display());
            std::fs::remove_file(m.path())?;
        }
        Ok(())
    }

    fn sb_size(&self) -> u64 {
        8
    }

    fn sb_encode(&self, buf: &mut [u8]) -> DriverResult<DriverInfoName> {
        let out = buf
            .get_mut(..8)
            .ok_or(DriverError::BadDriverInfo("family driver info buffer too small"))?;
        out.copy_from_slice(&self.member_size.to_le_bytes());
        Ok(*FAMILY_INFO_NAME)
    }

    fn sb_decode(&mut self, name: &DriverInfoName, buf: &[u8]) -> DriverResult {
        if name != FAMILY_INFO_NAME {
            return Err(DriverError::BadDriverInfo(
                "driver info block was not written by the family driver",
            ));
        }
        let raw: [u8; 8] = buf
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or(DriverError::BadDriverInfo("family driver info is truncated"))?;
        if u64::from_le_bytes(raw) != self.member_size {
            return Err(DriverError::BadDriverInfo("family member size mismatch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_spans_members() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("fam-%d.h5");
        let template = template.to_str().unwrap();
        let mut io =
            FamilyDriver::open(template, AccessFlags::RDWR | AccessFlags::CREAT, 16).unwrap();
        io.set_eoa(40).unwrap();

        let data: Vec<u8> = (0..40).collect();
        io.write_at(MemKind::Draw, 0, &data).unwrap();
        assert_eq!(io.member_count(), 3);
        assert_eq!(io.get_eof(), 40);

        let mut back = vec![0u8; 20];
        io.read_at(MemKind::Draw, 10, &mut back).unwrap();
        assert_eq!(back, (10..30).collect::<Vec<u8>>());

        let second = std::fs::read(dir.path().join("fam-1.h5")).unwrap();
        assert_eq!(second, (16..32).collect::<Vec<u8>>());
    }

    #[test]
    fn test_reopen_finds_members_and_truncates() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("fam-%d.h5");
        let template = template.to_str().unwrap();
        {
            let mut io =
                FamilyDriver::open(template, AccessFlags::RDWR | AccessFlags::CREAT, 16).unwrap();
            io.set_eoa(48).unwrap();
            io.write_at(MemKind::Draw, 0, &[1; 48]).unwrap();
            io.set_eoa(20).unwrap();
            io.truncate().unwrap();
        }
        assert!(!dir.path().join("fam-2.h5").exists());

        let io = FamilyDriver::open(template, AccessFlags::RDONLY, 16).unwrap();
        assert_eq!(io.member_count(), 2);
        assert_eq!(io.get_eof(), 20);
    }

    #[test]
    fn test_driver_info() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("fam-%d.h5");
        let template = template.to_str().unwrap();
        let mut io =
            FamilyDriver::open(template, AccessFlags::RDWR | AccessFlags::CREAT, 1024).unwrap();

        let mut buf = [0u8; 8];
        let name = io.sb_encode(&mut buf).unwrap();
        assert_eq!(&name, b"NCSAfami");
        io.sb_decode(&name, &buf).unwrap();

        buf.copy_from_slice(&2048u64.to_le_bytes());
        assert!(io.sb_decode(&name, &buf).is_err());
        assert!(io.sb_decode(b"NCSAmult", &buf).is_err());
    }

    #[test]
    fn test_template_needs_placeholder() {
        let err = FamilyDriver::open("plain.h5", AccessFlags::RDONLY, 16).unwrap_err();
        assert!(matches!(err, DriverError::Invalid(_)));
    }
}
