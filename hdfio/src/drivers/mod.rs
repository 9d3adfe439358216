// SPDX-License-Identifier: MIT

mod family;
mod memory;
mod multi;
mod sec2;
mod stdio;

pub use family::FamilyDriver;
pub use memory::CoreDriver;
pub use multi::{MultiDriver, MultiLayout, MultiMember};
pub use sec2::Sec2Driver;
pub use stdio::StdioDriver;

use std::fs::OpenOptions;

use crate::errors::*;
use crate::types::*;

/// Translates open intent into [`OpenOptions`].
pub(crate) fn open_options(flags: AccessFlags) -> DriverResult<OpenOptions> {
    if flags.intersects(AccessFlags::CREAT | AccessFlags::TRUNC) && !flags.is_writable() {
        return Err(DriverError::Invalid("create or truncate requires write intent"));
    }
    let mut opts = OpenOptions::new();
    opts.read(true)
        .write(flags.is_writable())
        .truncate(flags.contains(AccessFlags::TRUNC));
    if flags.contains(AccessFlags::CREAT) {
        if flags.contains(AccessFlags::EXCL) {
            opts.create_new(true);
        } else {
            opts.create(true);
        }
    }
    Ok(opts)
}

/// Copies what is available of `[addr, addr + buf.len())` from `src`, zero-filling the rest.
pub(crate) fn copy_with_zero_fill(src: &[u8], addr: u64, buf: &mut [u8]) {
    let start = (addr as usize).min(src.len());
    let avail = (src.len() - start).min(buf.len());
    buf[..avail].copy_from_slice(&src[start..start + avail]);
    buf[avail..].fill(0);
}
