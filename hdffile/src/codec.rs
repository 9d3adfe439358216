// SPDX-License-Identifier: MIT

//! Little-endian field codec with run-time address and length widths.

use hdfio::types::ADDR_UNDEF;

use crate::errors::*;

/// Widths accepted for addresses and lengths.
pub const VALID_WIDTHS: [u8; 5] = [2, 4, 8, 16, 32];

pub fn is_valid_width(width: u8) -> bool {
    VALID_WIDTHS.contains(&width)
}

/// Writes `addr` into `buf[..width]`. [`ADDR_UNDEF`] becomes all ones.
pub fn encode_addr(buf: &mut [u8], width: usize, addr: u64) -> FormatResult {
    if buf.len() < width {
        return Err(FormatError::ShortBuffer { needed: width, found: buf.len() });
    }
    let out = &mut buf[..width];
    if addr == ADDR_UNDEF {
        out.fill(0xff);
        return Ok(());
    }
    if width < 8 && addr >= (1u64 << (8 * width)) - 1 {
        return Err(FormatError::AddressTooWide { width });
    }
    let bytes = addr.to_le_bytes();
    let n = width.min(8);
    out[..n].copy_from_slice(&bytes[..n]);
    out[n..].fill(0);
    Ok(())
}

/// Reads an address from `buf[..width]`. All ones decodes as [`ADDR_UNDEF`].
pub fn decode_addr(buf: &[u8], width: usize) -> FormatResult<u64> {
    if buf.len() < width {
        return Err(FormatError::ShortBuffer { needed: width, found: buf.len() });
    }
    let raw = &buf[..width];
    if raw.iter().all(|&b| b == 0xff) {
        return Ok(ADDR_UNDEF);
    }
    let n = width.min(8);
    if raw[n..].iter().any(|&b| b != 0) {
        return Err(FormatError::AddressOverflow);
    }
    let mut bytes = [0u8; 8];
    bytes[..n].copy_from_slice(&raw[..n]);
    Ok(u64::from_le_bytes(bytes))
}

macro_rules! codec_impl_primitive {
    ($($ty:ty),+ $(,)?) => {
        paste::paste! {
            impl Encoder<'_> {
                $(
                    #[inline(always)]
                    pub fn [<put_ $ty>](&mut self, value: $ty) -> FormatResult {
                        self.put_bytes(&value.to_le_bytes())
                    }
                )+
            }

            impl Decoder<'_> {
                $(
                    #[inline(always)]
                    pub fn [<get_ $ty>](&mut self) -> FormatResult<$ty> {
                        const N: usize = core::mem::size_of::<$ty>();
                        let mut buf = [0u8; N];
                        buf.copy_from_slice(self.take(N)?);
                        Ok(<$ty>::from_le_bytes(buf))
                    }
                )+
            }
        }
    };
}

/// Sequential writer over a byte buffer.
#[derive(Debug)]
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn put_bytes(&mut self, data: &[u8]) -> FormatResult {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            return Err(FormatError::ShortBuffer { needed: end, found: self.buf.len() });
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    pub fn put_addr(&mut self, width: usize, addr: u64) -> FormatResult {
        encode_addr(&mut self.buf[self.pos..], width, addr)?;
        self.pos += width;
        Ok(())
    }

    /// Lengths use the same encoding as addresses, at the size width.
    pub fn put_length(&mut self, width: usize, len: u64) -> FormatResult {
        self.put_addr(width, len)
    }
}

/// Sequential reader over a byte buffer.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn take(&mut self, len: usize) -> FormatResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(FormatError::ShortBuffer { needed: end, found: self.buf.len() });
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn get_addr(&mut self, width: usize) -> FormatResult<u64> {
        decode_addr(self.take(width)?, width)
    }

    pub fn get_length(&mut self, width: usize) -> FormatResult<u64> {
        self.get_addr(width)
    }
}

codec_impl_primitive!(u8, u16, u32, u64);
