// SPDX-License-Identifier: MIT

use std::fs;
use std::sync::Arc;

use hdffile::prelude::*;
use tempfile::{TempDir, tempdir};

fn path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

fn engine() -> PropertyEngine {
    PropertyEngine::new().unwrap()
}

fn create_simple(fm: &mut FileManager, plists: &PropertyEngine, name: &str) {
    let f = fm.create(plists, name, AccessFlags::TRUNC, None, None).unwrap();
    fm.close(f).unwrap();
}

#[test]
fn test_creation_template_round_trip() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "rt.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let mut props = FileCreateProps::default();
    props.set_userblock(1024).unwrap();
    props.set_sizes(4, 16).unwrap();
    props.set_sym_k(8, 2);
    let fcpl = plists.create_with(props.clone()).unwrap();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, Some(fcpl), None).unwrap();
    assert_eq!(fm.sizeof_addr(f).unwrap(), 4);
    assert_eq!(fm.sizeof_size(f).unwrap(), 16);
    fm.close(f).unwrap();

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap();
    let copy = fm.get_create_plist(&mut plists, f).unwrap();
    let back = plists.file_create(copy).unwrap();
    assert_eq!(back.userblock(), 1024);
    assert_eq!(back.sizes(), (4, 16));
    assert_eq!(back.sym_k(), (8, 2));
    assert_eq!(back, &props);
    assert!(plists.equal(fcpl, copy).unwrap());

    let sb = fm.superblock(f).unwrap();
    assert_eq!(sb.base_addr, 1024);
    assert_eq!(sb.consist_flags, CONSIST_FLAGS_NEW);
    assert_eq!(sb.driver_addr, ADDR_UNDEF);
    fm.close(f).unwrap();
}

#[test]
fn test_signature_after_user_block() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "ub.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let mut props = FileCreateProps::default();
    props.set_userblock(1024).unwrap();
    let fcpl = plists.create_with(props).unwrap();
    let f = fm.create(&plists, &name, AccessFlags::TRUNC, Some(fcpl), None).unwrap();
    fm.close(f).unwrap();

    let bytes = fs::read(&name).unwrap();
    assert_eq!(&bytes[1024..1032], &SIGNATURE);
    assert!(bytes[..1024].iter().all(|&b| b == 0));
    assert!(FileManager::is_hdf5(&plists, &name, None).unwrap());

    let mut corrupt = bytes.clone();
    corrupt[1025] = b'X';
    fs::write(&name, &corrupt).unwrap();
    assert!(!FileManager::is_hdf5(&plists, &name, None).unwrap());
    let err = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap_err();
    assert_eq!(err, FileError::Format(FormatError::NoSignature));
    assert_eq!(fm.open_count(), 0);
}

#[test]
fn test_flush_is_idempotent() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "flush.h5");
    let plists = engine();
    let mut fm = FileManager::new();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap();
    let g = fm.create_group(f, "/data").unwrap();
    fm.flush(f, FlushScope::Local, false).unwrap();
    let first = fs::read(&name).unwrap();
    fm.flush(f, FlushScope::Local, false).unwrap();
    fm.flush(f, FlushScope::Global, true).unwrap();
    assert_eq!(fs::read(&name).unwrap(), first);
    assert_eq!(first.len() as u64, fm.eoa(f).unwrap());

    fm.close_group(g).unwrap();
    fm.close(f).unwrap();
}

#[test]
fn test_reopen_shares_state() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "share.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let factory = CountingFactory::new(DriverConfig::Sec2);
    let stats = factory.stats_handle();
    let mut props = FileAccessProps::default();
    props.set_driver(DriverConfig::Custom(Arc::new(factory))).unwrap();
    let fapl = plists.create_with(props).unwrap();

    let a = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    let b = fm.reopen(a).unwrap();
    assert_eq!(stats.lock().unwrap().opens, 1);
    assert_eq!(fm.shared_refs(a).unwrap(), 2);

    // A second open probes the file, finds it open and drops the probe.
    let c = fm.open(&plists, &name, AccessFlags::RDWR, Some(fapl)).unwrap();
    let s = *stats.lock().unwrap();
    assert_eq!((s.opens, s.closes), (2, 1));
    assert_eq!(fm.shared_count(), 1);
    assert_eq!(fm.shared_refs(c).unwrap(), 3);
    assert_eq!(fm.intent(b).unwrap(), fm.intent(a).unwrap());

    fm.close(a).unwrap();
    fm.close(c).unwrap();
    assert_eq!(stats.lock().unwrap().closes, 1);
    assert_eq!(fm.shared_count(), 1);
    fm.close(b).unwrap();
    assert_eq!(stats.lock().unwrap().closes, 2);
    assert_eq!(fm.shared_count(), 0);
    assert_eq!(fm.open_count(), 0);
}

#[test]
fn test_conflicting_opens_rejected() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "busy.h5");
    let plists = engine();
    let mut fm = FileManager::new();
    create_simple(&mut fm, &plists, &name);

    let ro = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap();
    let err = fm.open(&plists, &name, AccessFlags::RDWR, None).unwrap_err();
    assert_eq!(err, FileError::State("file is already open for read-only"));
    let err = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap_err();
    assert_eq!(err, FileError::State("unable to truncate a file which is already open"));
    let err = fm.create(&plists, &name, AccessFlags::EXCL, None, None).unwrap_err();
    assert!(matches!(err, FileError::Exists(_)), "got {err}");
    assert_eq!(fm.open_count(), 1);
    fm.close(ro).unwrap();

    // Closed again: exclusive create still fails on an existing file.
    let err = fm.create(&plists, &name, AccessFlags::EXCL, None, None).unwrap_err();
    assert!(matches!(err, FileError::Driver(DriverError::Exists(_))), "got {err}");
}

#[test]
fn test_invalid_flags() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "flags.h5");
    let plists = engine();
    let mut fm = FileManager::new();

    let both = AccessFlags::TRUNC | AccessFlags::EXCL;
    assert!(fm.create(&plists, &name, both, None, None).is_err());
    assert!(fm.create(&plists, &name, AccessFlags::empty(), None, None).is_err());
    assert!(fm.create(&plists, &name, AccessFlags::RDWR | AccessFlags::TRUNC, None, None).is_err());
    assert!(fm.open(&plists, &name, AccessFlags::TRUNC, None).is_err());
    assert!(fm.open(&plists, "", AccessFlags::RDONLY, None).is_err());
    assert!(!std::path::Path::new(&name).exists());
}

fn corrupt_and_open(offset: usize, value: u8) -> FileError {
    let dir = tempdir().unwrap();
    let name = path(&dir, "bad.h5");
    let plists = engine();
    let mut fm = FileManager::new();
    create_simple(&mut fm, &plists, &name);

    let mut bytes = fs::read(&name).unwrap();
    bytes[offset] = value;
    fs::write(&name, &bytes).unwrap();

    let err = fm.open(&plists, &name, AccessFlags::RDWR, None).unwrap_err();
    assert_eq!(fs::read(&name).unwrap(), bytes);
    assert_eq!(fm.open_count(), 0);
    assert_eq!(fm.shared_count(), 0);
    err
}

#[test]
fn test_bad_address_width() {
    let err = corrupt_and_open(13, 3);
    assert_eq!(
        err,
        FileError::Format(FormatError::BadWidth { field: "sizeof_addr", found: 3 })
    );
}

#[test]
fn test_bad_half_rank() {
    let err = corrupt_and_open(16, 0);
    assert!(matches!(err, FileError::Format(FormatError::BadRank { .. })), "got {err}");
}

#[test]
fn test_bad_boot_version() {
    let err = corrupt_and_open(8, 1);
    assert!(matches!(err, FileError::Format(FormatError::BadVersion { .. })), "got {err}");
}

#[test]
fn test_truncated_file() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "short.h5");
    let plists = engine();
    let mut fm = FileManager::new();
    create_simple(&mut fm, &plists, &name);

    let len = fs::metadata(&name).unwrap().len();
    fs::OpenOptions::new().write(true).open(&name).unwrap().set_len(len - 8).unwrap();
    let err = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap_err();
    assert_eq!(err, FileError::Format(FormatError::Truncated { eof: len - 8, eoa: len }));
}

#[test]
fn test_deferred_close() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "defer.h5");
    let plists = engine();
    let mut fm = FileManager::new();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap();
    let g = fm.create_group(f, "a").unwrap();
    let addr = fm.alloc(f, MemKind::LHeap, 8).unwrap();
    fm.write_block(f, MemKind::LHeap, addr, b"deferred").unwrap();
    fm.close(f).unwrap();

    assert_eq!(fm.open_count(), 0);
    assert_eq!(fm.closing_count(), 1);
    assert_eq!(fm.shared_count(), 1);
    assert_eq!(fm.group_path(g).unwrap(), "/a");
    assert!(fm.object_header(g).unwrap().is_valid());

    fm.close_group(g).unwrap();
    assert_eq!(fm.closing_count(), 0);
    assert_eq!(fm.shared_count(), 0);

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap();
    let mut buf = [0u8; 8];
    fm.read_block(f, MemKind::LHeap, addr, &mut buf).unwrap();
    assert_eq!(&buf, b"deferred");
    fm.close(f).unwrap();
}

#[test]
fn test_groups() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "groups.h5");
    let plists = engine();
    let mut fm = FileManager::new();
    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap();

    assert!(matches!(fm.create_group(f, "a/b"), Err(FileError::NotFound(_))));
    let a = fm.create_group(f, "a").unwrap();
    let b = fm.create_group(a, "b/").unwrap();
    assert_eq!(fm.group_path(b).unwrap(), "/a/b");
    assert!(matches!(fm.create_group(f, "/a"), Err(FileError::Exists(_))));
    assert!(fm.create_group(f, "").is_err());

    let again = fm.open_group(f, "/a/./b").unwrap();
    assert_eq!(fm.group_entry(again).unwrap(), fm.group_entry(b).unwrap());
    assert_eq!(fm.list_groups(f).unwrap(), ["/", "/a", "/a/b"]);

    for g in [a, b, again] {
        fm.close_group(g).unwrap();
    }
    fm.close(f).unwrap();
}

#[test]
fn test_read_only_rejects_writes() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "ro.h5");
    let plists = engine();
    let mut fm = FileManager::new();
    create_simple(&mut fm, &plists, &name);

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap();
    assert_eq!(fm.intent(f).unwrap(), AccessFlags::RDONLY);
    assert!(fm.alloc(f, MemKind::Draw, 16).is_err());
    assert!(fm.write_block(f, MemKind::Draw, 0, &[0; 4]).is_err());
    assert!(fm.create_group(f, "x").is_err());
    let before = fs::read(&name).unwrap();
    fm.flush(f, FlushScope::Global, true).unwrap();
    fm.close(f).unwrap();
    assert_eq!(fs::read(&name).unwrap(), before);
}

#[test]
fn test_raw_data_round_trip() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "raw.h5");
    let plists = engine();
    let mut fm = FileManager::new();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap();
    let block = fm.alloc(f, MemKind::Draw, 100).unwrap();
    let chunk = fm.alloc(f, MemKind::Draw, 4096).unwrap();
    fm.write_block(f, MemKind::Draw, block, &[0xab; 100]).unwrap();
    fm.write_chunk(f, chunk, &[0xcd; 4096]).unwrap();
    fm.close(f).unwrap();

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap();
    let mut small = [0u8; 10];
    fm.read_block(f, MemKind::Draw, block + 90, &mut small).unwrap();
    assert_eq!(small, [0xab; 10]);
    let mut big = vec![0u8; 4096];
    fm.read_chunk(f, chunk, &mut big).unwrap();
    assert!(big.iter().all(|&b| b == 0xcd));
    fm.close(f).unwrap();
}

#[test]
fn test_raw_block_does_not_clobber_neighbours() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "neighbours.h5");
    let plists = engine();
    let mut fm = FileManager::new();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap();
    let small = fm.alloc(f, MemKind::Draw, 100).unwrap();
    let large = fm.alloc(f, MemKind::Draw, 2 << 20).unwrap();
    fm.write_block(f, MemKind::Draw, small, &[1; 100]).unwrap();
    fm.write_chunk(f, large, &vec![7; 2 << 20]).unwrap();
    fm.close(f).unwrap();

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap();
    let mut big = vec![0u8; 2 << 20];
    fm.read_chunk(f, large, &mut big).unwrap();
    assert!(big.iter().all(|&b| b == 7));
    let mut head = [0u8; 100];
    fm.read_block(f, MemKind::Draw, small, &mut head).unwrap();
    assert_eq!(head, [1; 100]);
    fm.close(f).unwrap();
}

#[test]
fn test_chunk_over_staged_raw_bytes() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "overlap.h5");
    let plists = engine();
    let mut fm = FileManager::new();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap();
    let addr = fm.alloc(f, MemKind::Draw, 2 << 20).unwrap();
    // Staged in the sieve window, then overwritten behind its back.
    fm.write_block(f, MemKind::Draw, addr + 16, &[1; 16]).unwrap();
    fm.write_chunk(f, addr, &vec![7; 2 << 20]).unwrap();

    let mut buf = [0u8; 16];
    fm.read_block(f, MemKind::Draw, addr + 16, &mut buf).unwrap();
    assert_eq!(buf, [7; 16]);

    // And the other way round: a cached chunk under a later raw write.
    let chunk = fm.alloc(f, MemKind::Draw, 256).unwrap();
    fm.write_chunk(f, chunk, &[3; 256]).unwrap();
    fm.write_block(f, MemKind::Draw, chunk + 8, &[4; 8]).unwrap();
    let mut back = [0u8; 256];
    fm.read_chunk(f, chunk, &mut back).unwrap();
    assert_eq!(back[..8], [3; 8]);
    assert_eq!(back[8..16], [4; 8]);
    fm.close(f).unwrap();

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, None).unwrap();
    let mut big = vec![0u8; 2 << 20];
    fm.read_chunk(f, addr, &mut big).unwrap();
    assert!(big.iter().all(|&b| b == 7));
    fm.read_chunk(f, chunk, &mut back).unwrap();
    assert_eq!(back[8..16], [4; 8]);
    assert!(back[16..].iter().all(|&b| b == 3));
    fm.close(f).unwrap();
}

#[test]
fn test_uncached_metadata_survives_raw_flush() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "meta.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let mut props = FileAccessProps::default();
    let (_, rdcc_nelmts, rdcc_nbytes, w0) = props.cache();
    props.set_cache(0, rdcc_nelmts, rdcc_nbytes, w0).unwrap();
    let fapl = plists.create_with(props).unwrap();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    let raw = fm.alloc(f, MemKind::Draw, 8).unwrap();
    let btree = fm.alloc(f, MemKind::BTree, 8).unwrap();
    fm.write_block(f, MemKind::Draw, raw, &[5; 8]).unwrap();
    fm.write_block(f, MemKind::BTree, btree, b"METADATA").unwrap();

    // Metadata written inside a staged raw window.
    let region = fm.alloc(f, MemKind::Draw, 64).unwrap();
    fm.write_block(f, MemKind::Draw, region, &[6; 8]).unwrap();
    fm.write_block(f, MemKind::BTree, region + 32, b"INWINDOW").unwrap();
    fm.close(f).unwrap();

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, Some(fapl)).unwrap();
    let mut buf = [0u8; 8];
    fm.read_block(f, MemKind::BTree, btree, &mut buf).unwrap();
    assert_eq!(&buf, b"METADATA");
    fm.read_block(f, MemKind::BTree, region + 32, &mut buf).unwrap();
    assert_eq!(&buf, b"INWINDOW");
    fm.read_block(f, MemKind::Draw, region, &mut buf).unwrap();
    assert_eq!(buf, [6; 8]);
    fm.read_block(f, MemKind::Draw, raw, &mut buf).unwrap();
    assert_eq!(buf, [5; 8]);
    fm.close(f).unwrap();
}

#[test]
fn test_out_of_range_block_access() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "range.h5");
    let plists = engine();
    let mut fm = FileManager::new();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap();
    let addr = fm.alloc(f, MemKind::Draw, 8).unwrap();
    fm.write_block(f, MemKind::Draw, addr, &[1; 8]).unwrap();

    let overflow = Err(FileError::Format(FormatError::AddressOverflow));
    let mut buf = [0u8; 8];
    assert_eq!(fm.read_block(f, MemKind::Draw, u64::MAX - 4, &mut buf), overflow);
    assert_eq!(fm.write_block(f, MemKind::Draw, u64::MAX - 4, &buf), overflow);
    assert_eq!(fm.read_block(f, MemKind::BTree, u64::MAX - 4, &mut buf), overflow);
    assert_eq!(fm.read_chunk(f, u64::MAX - 4, &mut buf), overflow);
    assert!(matches!(
        fm.read_block(f, MemKind::Draw, addr + (1 << 20), &mut buf),
        Err(FileError::Driver(DriverError::OutOfBounds { .. }))
    ));

    fm.read_block(f, MemKind::Draw, addr, &mut buf).unwrap();
    assert_eq!(buf, [1; 8]);
    fm.close(f).unwrap();
}

#[test]
fn test_alignment() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "align.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let mut props = FileAccessProps::default();
    props.set_alignment(256, 512).unwrap();
    let fapl = plists.create_with(props).unwrap();
    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    let small = fm.alloc(f, MemKind::Draw, 10).unwrap();
    let large = fm.alloc(f, MemKind::Draw, 1000).unwrap();
    assert_ne!(small % 512, 0);
    assert_eq!(large % 512, 0);

    let access = fm.get_access_plist(&mut plists, f).unwrap();
    assert_eq!(plists.file_access(access).unwrap().alignment(), (256, 512));
    fm.close(f).unwrap();
}

#[test]
fn test_address_codec_follows_file_width() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "width.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let mut props = FileCreateProps::default();
    props.set_sizes(2, 0).unwrap();
    let fcpl = plists.create_with(props).unwrap();
    let f = fm.create(&plists, &name, AccessFlags::TRUNC, Some(fcpl), None).unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(fm.addr_encode(f, &mut buf, 0x1234).unwrap(), 2);
    assert_eq!(&buf[..2], &[0x34, 0x12]);
    assert_eq!(fm.addr_decode(f, &buf).unwrap(), 0x1234);
    assert!(fm.addr_encode(f, &mut buf, 0x1_0000).is_err());
    fm.close(f).unwrap();
}

#[test]
fn test_core_driver_without_backing_store() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "mem.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let mut props = FileAccessProps::default();
    props.set_core(0, false);
    let fapl = plists.create_with(props).unwrap();

    let a = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    let b = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    assert_eq!(fm.driver_id(a).unwrap(), "core");
    // Nothing identifies the two, so they do not share.
    assert_eq!(fm.shared_count(), 2);
    fm.close(a).unwrap();
    fm.close(b).unwrap();
    assert!(!std::path::Path::new(&name).exists());
}

#[test]
fn test_family_driver() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "fam%d.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let mut props = FileAccessProps::default();
    props.set_family(4096);
    let fapl = plists.create_with(props).unwrap();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    let raw = fm.alloc(f, MemKind::Draw, 6000).unwrap();
    fm.write_block(f, MemKind::Draw, raw, &vec![7u8; 6000]).unwrap();
    let sb = fm.superblock(f).unwrap();
    assert_eq!(sb.driver_addr, sb.encoded_size() as u64);
    fm.close(f).unwrap();
    assert!(dir.path().join("fam1.h5").exists());

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, Some(fapl)).unwrap();
    assert_eq!(fm.driver_id(f).unwrap(), "family");
    let mut buf = vec![0u8; 6000];
    fm.read_block(f, MemKind::Draw, raw, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 7));
    fm.close(f).unwrap();
}

#[test]
fn test_split_driver() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "split");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let mut props = FileAccessProps::default();
    props.set_split(".meta", ".raw").unwrap();
    let fapl = plists.create_with(props).unwrap();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    let raw = fm.alloc(f, MemKind::Draw, 64).unwrap();
    fm.write_block(f, MemKind::Draw, raw, &[5; 64]).unwrap();
    fm.close(f).unwrap();
    assert!(dir.path().join("split.meta").exists());
    assert_eq!(fs::metadata(dir.path().join("split.raw")).unwrap().len(), 64);

    let f = fm.open(&plists, &name, AccessFlags::RDONLY, Some(fapl)).unwrap();
    let mut buf = [0u8; 64];
    fm.read_block(f, MemKind::Draw, raw, &mut buf).unwrap();
    assert_eq!(buf, [5; 64]);
    fm.close(f).unwrap();
}

/// Sec2 storage that forbids per-process caching.
#[derive(Debug)]
struct Uncached(Sec2Driver);

impl FileDriver for Uncached {
    fn name(&self) -> &'static str {
        "uncached"
    }
    fn features(&self) -> DriverFeatures {
        DriverFeatures::NO_CACHE
    }
    fn key(&self) -> Option<FileKey> {
        self.0.key()
    }
    fn get_eoa(&self) -> u64 {
        self.0.get_eoa()
    }
    fn set_eoa(&mut self, addr: u64) -> DriverResult {
        self.0.set_eoa(addr)
    }
    fn get_eof(&self) -> u64 {
        self.0.get_eof()
    }
    fn read_at(&mut self, kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        self.0.read_at(kind, addr, buf)
    }
    fn write_at(&mut self, kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        self.0.write_at(kind, addr, data)
    }
    fn flush(&mut self) -> DriverResult {
        self.0.flush()
    }
    fn truncate(&mut self) -> DriverResult {
        self.0.truncate()
    }
}

#[derive(Debug)]
struct UncachedFactory(SharedStats);

impl DriverFactory for UncachedFactory {
    fn name(&self) -> &'static str {
        "uncached"
    }
    fn open(&self, name: &str, flags: AccessFlags) -> DriverResult<Box<dyn FileDriver>> {
        let inner = Uncached(Sec2Driver::open(name, flags)?);
        Ok(Box::new(CountingDriver::with_stats(inner, self.0.clone())))
    }
}

#[test]
fn test_no_cache_driver_disables_caches() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "nocache.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let stats = SharedStats::default();
    let mut props = FileAccessProps::default();
    props.set_driver(DriverConfig::Custom(Arc::new(UncachedFactory(stats.clone())))).unwrap();
    let fapl = plists.create_with(props).unwrap();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    let addr = fm.alloc(f, MemKind::BTree, 32).unwrap();
    let before = stats.lock().unwrap().writes;
    fm.write_block(f, MemKind::BTree, addr, &[1; 32]).unwrap();
    assert_eq!(stats.lock().unwrap().writes, before + 1);

    let access = fm.get_access_plist(&mut plists, f).unwrap();
    let p = plists.file_access(access).unwrap();
    assert_eq!((p.mdc_nelmts, p.rdcc_nelmts, p.rdcc_nbytes, p.sieve_buf_size), (0, 0, 0, 0));
    fm.close(f).unwrap();
}

#[test]
fn test_metadata_is_cached_until_flush() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "cached.h5");
    let mut plists = engine();
    let mut fm = FileManager::new();

    let factory = CountingFactory::new(DriverConfig::Sec2);
    let stats = factory.stats_handle();
    let mut props = FileAccessProps::default();
    props.set_driver(DriverConfig::Custom(Arc::new(factory))).unwrap();
    let fapl = plists.create_with(props).unwrap();

    let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, Some(fapl)).unwrap();
    let addr = fm.alloc(f, MemKind::BTree, 32).unwrap();
    let before = stats.lock().unwrap().writes;
    fm.write_block(f, MemKind::BTree, addr, &[1; 32]).unwrap();
    assert_eq!(stats.lock().unwrap().writes, before);
    fm.flush(f, FlushScope::Local, false).unwrap();
    assert!(stats.lock().unwrap().writes > before);
    fm.close(f).unwrap();
}

#[test]
fn test_close_all_on_drop() {
    let dir = tempdir().unwrap();
    let name = path(&dir, "drop.h5");
    let plists = engine();
    {
        let mut fm = FileManager::new();
        let f = fm.create(&plists, &name, AccessFlags::TRUNC, None, None).unwrap();
        fm.create_group(f, "left-open").unwrap();
    }
    assert!(FileManager::is_hdf5(&plists, &name, None).unwrap());
}
