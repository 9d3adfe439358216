// SPDX-License-Identifier: MIT

//! Virtual file drivers.
//!
//! A driver maps a flat, byte-addressed space onto some storage medium and
//! tracks two marks: the end of allocated space (EOA), which the file layer
//! moves as it allocates, and the physical end of file (EOF).

// Core modules
pub mod config;
pub mod errors;
mod macros;
pub mod stats;
pub mod types;

// Backend modules
pub mod drivers;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::FileDriver;
    pub use super::FileDriverExt;
    pub use super::FileDriverStructExt;
    pub use super::config::*;
    pub use super::drivers::*;
    pub use super::errors::*;
    pub use super::stats::*;
    pub use super::types::*;
}

// Internal use
use errors::*;
use types::*;

/// Largest fixed-layout struct `read_struct` will stage on the stack.
pub const STRUCT_BUF_SIZE: usize = 512;

/// Name tag and payload a driver stores in the file's driver-info block.
pub type DriverInfoName = [u8; 8];

/// Low-level storage abstraction.
///
/// Accesses at or past the EOA fail. Reads between EOF and EOA succeed and
/// yield zeroes.
pub trait FileDriver {
    /// Short driver name ("sec2", "core", ...).
    fn name(&self) -> &'static str;

    fn features(&self) -> DriverFeatures {
        DriverFeatures::empty()
    }

    /// Identity of the underlying physical file; `None` when the driver
    /// cannot tell two opens apart.
    fn key(&self) -> Option<FileKey>;

    fn get_eoa(&self) -> u64;
    fn set_eoa(&mut self, addr: u64) -> DriverResult;
    fn get_eof(&self) -> u64;

    fn read_at(&mut self, kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult;
    fn write_at(&mut self, kind: MemKind, addr: u64, data: &[u8]) -> DriverResult;

    /// Reserves `size` bytes and returns their address.
    ///
    /// The default bumps the EOA, first rounding it up to `align`.
    fn alloc(&mut self, _kind: MemKind, size: u64, align: u64) -> DriverResult<u64> {
        let addr = align_up(self.get_eoa(), align)?;
        let end = addr
            .checked_add(size)
            .ok_or(DriverError::OutOfBounds { addr, len: size, eoa: ADDR_UNDEF })?;
        self.set_eoa(end)?;
        Ok(addr)
    }

    /// Flushes buffered data (may be a no-op).
    fn flush(&mut self) -> DriverResult;

    /// Makes the physical size match the EOA.
    fn truncate(&mut self) -> DriverResult;

    /// Releases the medium. The driver is not used afterwards.
    fn close(&mut self) -> DriverResult {
        self.flush()
    }

    /// Size of the payload this driver keeps in the driver-info block.
    fn sb_size(&self) -> u64 {
        0
    }

    /// Encodes the driver-info payload into `buf` (`sb_size()` bytes).
    fn sb_encode(&self, _buf: &mut [u8]) -> DriverResult<DriverInfoName> {
        Err(DriverError::Unsupported)
    }

    /// Consumes a driver-info payload read back from a file.
    fn sb_decode(&mut self, _name: &DriverInfoName, _buf: &[u8]) -> DriverResult {
        Ok(())
    }
}

impl<D: FileDriver + ?Sized> FileDriver for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn features(&self) -> DriverFeatures {
        (**self).features()
    }
    fn key(&self) -> Option<FileKey> {
        (**self).key()
    }
    fn get_eoa(&self) -> u64 {
        (**self).get_eoa()
    }
    fn set_eoa(&mut self, addr: u64) -> DriverResult {
        (**self).set_eoa(addr)
    }
    fn get_eof(&self) -> u64 {
        (**self).get_eof()
    }
    fn read_at(&mut self, kind: MemKind, addr: u64, buf: &mut [u8]) -> DriverResult {
        (**self).read_at(kind, addr, buf)
    }
    fn write_at(&mut self, kind: MemKind, addr: u64, data: &[u8]) -> DriverResult {
        (**self).write_at(kind, addr, data)
    }
    fn alloc(&mut self, kind: MemKind, size: u64, align: u64) -> DriverResult<u64> {
        (**self).alloc(kind, size, align)
    }
    fn flush(&mut self) -> DriverResult {
        (**self).flush()
    }
    fn truncate(&mut self) -> DriverResult {
        (**self).truncate()
    }
    fn close(&mut self) -> DriverResult {
        (**self).close()
    }
    fn sb_size(&self) -> u64 {
        (**self).sb_size()
    }
    fn sb_encode(&self, buf: &mut [u8]) -> DriverResult<DriverInfoName> {
        (**self).sb_encode(buf)
    }
    fn sb_decode(&mut self, name: &DriverInfoName, buf: &[u8]) -> DriverResult {
        (**self).sb_decode(name, buf)
    }
}

/// Convenience helpers on top of [`FileDriver`].
pub trait FileDriverExt: FileDriver {
    /// Fills a region with zeroes.
    fn zero_fill(&mut self, kind: MemKind, addr: u64, len: usize) -> DriverResult {
        const ZERO_BUF: [u8; 4096] = [0u8; 4096];
        let mut remaining = len;
        let mut off = addr;
        while remaining > 0 {
            let chunk = remaining.min(ZERO_BUF.len());
            self.write_at(kind, off, &ZERO_BUF[..chunk])?;
            off += chunk as u64;
            remaining -= chunk;
        }
        Ok(())
    }

    crate::driver_impl_primitive_rw!(u16, u32, u64);
}

impl<T: FileDriver + ?Sized> FileDriverExt for T {}

/// Fixed-layout struct access through zerocopy.
pub trait FileDriverStructExt: FileDriver {
    /// Reads a struct of type `T` at `addr`.
    fn read_struct<T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        kind: MemKind,
        addr: u64,
    ) -> DriverResult<T> {
        let size = core::mem::size_of::<T>();
        if size > STRUCT_BUF_SIZE {
            return Err(DriverError::Invalid("read_struct: type too large"));
        }
        let mut buf = [0u8; STRUCT_BUF_SIZE];
        self.read_at(kind, addr, &mut buf[..size])?;
        T::read_from_bytes(&buf[..size]).map_err(|_| DriverError::Other("read_struct failed"))
    }

    /// Writes a struct of type `T` at `addr`.
    fn write_struct<T: zerocopy::IntoBytes + zerocopy::Immutable>(
        &mut self,
        kind: MemKind,
        addr: u64,
        val: &T,
    ) -> DriverResult {
        self.write_at(kind, addr, val.as_bytes())
    }
}

impl<T: FileDriver + ?Sized> FileDriverStructExt for T {}
