// SPDX-License-Identifier: MIT

/// Implements little-endian read/write helpers for primitive types on a `FileDriver`.
#[macro_export]
macro_rules! driver_impl_primitive_rw {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[inline(always)]
                fn [<write_ $ty _at>](&mut self, kind: MemKind, addr: u64, value: $ty) -> DriverResult {
                    let buf = value.to_le_bytes();
                    self.write_at(kind, addr, &buf)
                }

                #[inline(always)]
                fn [<read_ $ty _at>](&mut self, kind: MemKind, addr: u64) -> DriverResult<$ty> {
                    let mut buf = [0u8; core::mem::size_of::<$ty>()];
                    self.read_at(kind, addr, &mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )+
    };
}
