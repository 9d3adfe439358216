// SPDX-License-Identifier: MIT

use anyhow::{Context, anyhow};
use colored::Colorize;
use std::path::Path;

use hdffile::prelude::*;

use crate::size::Bytes;
use crate::template::Template;

/// What `info` reports about an open file.
#[derive(Debug)]
pub struct FileInfo {
    pub name: String,
    pub driver: &'static str,
    pub superblock: Superblock,
    pub create: FileCreateProps,
    pub eoa: u64,
}

impl FileInfo {
    pub fn print(&self) {
        let sb = &self.superblock;
        println!("[hdfinspect] {}", self.name.bold());
        println!("  driver          : {}", self.driver);
        println!(
            "  versions        : boot {} / free-space {} / object dir {} / shared header {}",
            sb.boot_version, sb.freespace_version, sb.objdir_version, sb.sharedheader_version
        );
        println!("  address width   : {} bytes", sb.sizeof_addr);
        println!("  size width      : {} bytes", sb.sizeof_size);
        println!("  user block      : {}", Bytes(self.create.userblock()));
        println!("  sym half-ranks  : internal {} / leaf {}", sb.sym_internal_k, sb.sym_leaf_k);
        println!("  consistency     : {:#x}", sb.consist_flags);
        println!("  base address    : {:#x}", sb.base_addr);
        println!("  end of alloc.   : {:#x}", self.eoa);
        println!("  free space      : {}", fmt_addr(sb.freespace_addr));
        println!("  driver info     : {}", fmt_addr(sb.driver_addr));
        println!("  root header     : {:#x}", sb.root.header);
    }
}

fn fmt_addr(addr: u64) -> String {
    if addr == ADDR_UNDEF { "undefined".to_string() } else { format!("{addr:#x}") }
}

fn path_str(path: &Path) -> anyhow::Result<&str> {
    path.to_str().ok_or_else(|| anyhow!("Path '{}' is not valid UTF-8", path.display()))
}

fn describe(fm: &FileManager, plists: &mut PropertyEngine, file: Hid) -> anyhow::Result<FileInfo> {
    let fcpl = fm.get_create_plist(plists, file)?;
    let create = plists.file_create(fcpl)?.clone();
    plists.close_list(fcpl)?;
    Ok(FileInfo {
        name: fm.name(file)?.to_string(),
        driver: fm.driver_id(file)?,
        superblock: fm.superblock(file)?,
        create,
        eoa: fm.eoa(file)?,
    })
}

/// Creates `path` from `template`. Without `force` an existing file is an error.
pub fn create(path: &Path, template: &Template, force: bool) -> anyhow::Result<FileInfo> {
    let name = path_str(path)?;
    let mut plists = PropertyEngine::new()?;
    let (fcpl, fapl) = template.register(&mut plists)?;
    let flags = if force { AccessFlags::TRUNC } else { AccessFlags::EXCL };

    let mut fm = FileManager::new();
    let file = fm
        .create(&plists, name, flags, Some(fcpl), Some(fapl))
        .with_context(|| format!("Failed to create '{name}'"))?;
    fm.flush(file, FlushScope::Local, false)?;
    let info = describe(&fm, &mut plists, file)?;
    fm.close(file)?;
    log::info!("created '{name}' with the {} driver", info.driver);
    Ok(info)
}

/// Opens `path` read-only and reports its superblock.
pub fn info(path: &Path, template: &Template) -> anyhow::Result<FileInfo> {
    let name = path_str(path)?;
    let mut plists = PropertyEngine::new()?;
    let (_, fapl) = template.register(&mut plists)?;

    let mut fm = FileManager::new();
    let file = fm
        .open(&plists, name, AccessFlags::RDONLY, Some(fapl))
        .with_context(|| format!("Failed to open '{name}'"))?;
    let info = describe(&fm, &mut plists, file)?;
    fm.close(file)?;
    Ok(info)
}

/// One step of `check`.
#[derive(Debug)]
pub struct Check {
    pub step: &'static str,
    pub outcome: Result<String, String>,
}

impl Check {
    fn new(step: &'static str, outcome: anyhow::Result<String>) -> Self {
        Self { step, outcome: outcome.map_err(|e| format!("{e:#}")) }
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn print(&self) {
        match &self.outcome {
            Ok(detail) => println!("  {} {:<12} {detail}", "ok".green(), self.step),
            Err(err) => println!("  {} {:<12} {}", "FAIL".red().bold(), self.step, err.red()),
        }
    }
}

/// Runs the checks in order and stops at the first failure.
pub fn check(path: &Path, template: &Template) -> anyhow::Result<Vec<Check>> {
    let name = path_str(path)?;
    let mut plists = PropertyEngine::new()?;
    let (_, fapl) = template.register(&mut plists)?;
    let mut checks = Vec::new();

    let signature = FileManager::is_hdf5(&plists, name, Some(fapl))
        .map_err(anyhow::Error::from)
        .and_then(|found| {
            if found {
                Ok("superblock signature found".to_string())
            } else {
                Err(anyhow!("no superblock signature"))
            }
        });
    checks.push(Check::new("signature", signature));
    if !checks.iter().all(Check::passed) {
        return Ok(checks);
    }

    let mut fm = FileManager::new();
    let file = match fm.open(&plists, name, AccessFlags::RDONLY, Some(fapl)) {
        Ok(file) => file,
        Err(e) => {
            checks.push(Check::new("superblock", Err(e.into())));
            return Ok(checks);
        }
    };
    let sb = fm.superblock(file)?;
    checks.push(Check::new(
        "superblock",
        Ok(format!("version {}, {}-byte addresses", sb.boot_version, sb.sizeof_addr)),
    ));

    let root = fm.open_group(file, "/").and_then(|g| {
        let stub = fm.object_header(g);
        let closed = fm.close_group(g);
        let stub = stub?;
        closed?;
        Ok(stub)
    });
    checks.push(Check::new(
        "root group",
        root.map(|stub| format!("object header version {} at {:#x}", stub.version, sb.root.header))
            .map_err(Into::into),
    ));

    let mut first = None;
    keep_first(&mut first, fm.close(file));
    checks.push(Check::new(
        "close",
        first.map_or(Ok("released".to_string()), |e| Err(e.into())),
    ));
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_then_info() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.h5");
        let template = Template::parse("[create]\nuserblock = 512\nsizeof_addr = 4\n").unwrap();

        let created = create(&path, &template, false).unwrap();
        assert_eq!(created.superblock.base_addr, 512);
        assert!(create(&path, &template, false).is_err());
        create(&path, &template, true).unwrap();

        let read = info(&path, &Template::default()).unwrap();
        assert_eq!(read.driver, "sec2");
        assert_eq!(read.create.userblock(), 512);
        assert_eq!(read.superblock.sizeof_addr, 4);
        assert_eq!(read.superblock.root, created.superblock.root);
    }

    #[test]
    fn test_check_passes_on_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.h5");
        create(&path, &Template::default(), false).unwrap();

        let checks = check(&path, &Template::default()).unwrap();
        assert_eq!(checks.len(), 4);
        assert!(checks.iter().all(Check::passed), "{checks:?}");
    }

    #[test]
    fn test_check_stops_without_signature() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.bin");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let checks = check(&path, &Template::default()).unwrap();
        assert_eq!(checks.len(), 1);
        assert!(!checks[0].passed());
    }

    #[test]
    fn test_check_reports_bad_superblock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.h5");
        create(&path, &Template::default(), false).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[13] = 3;
        std::fs::write(&path, bytes).unwrap();

        let checks = check(&path, &Template::default()).unwrap();
        assert_eq!(checks.len(), 2);
        assert!(checks[0].passed());
        assert!(!checks[1].passed());
    }
}
