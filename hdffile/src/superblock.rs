// SPDX-License-Identifier: MIT

//! Superblock I/O against a driver.

use zerocopy::IntoBytes;

use hdfio::DriverInfoName;
use hdfio::prelude::*;

use crate::errors::*;
use crate::types::*;

/// Smallest non-zero offset probed for the signature.
const MIN_PROBE_POW: u32 = 9;

/// Finds the signature at 0, 512, 1024, ... below the next power of two
/// above the end of file. The driver's EOA is restored afterwards.
pub fn locate_signature(driver: &mut dyn FileDriver) -> FileResult<Option<u64>> {
    let eof = driver.get_eof();
    let eoa = driver.get_eoa();
    let maxpow = (u64::BITS - eof.leading_zeros()).max(MIN_PROBE_POW);

    let found = probe(driver, maxpow);
    driver.set_eoa(eoa)?;
    found
}

fn probe(driver: &mut dyn FileDriver, maxpow: u32) -> FileResult<Option<u64>> {
    let mut buf = [0u8; SIGNATURE_LEN];
    for n in (MIN_PROBE_POW - 1)..maxpow {
        let addr = if n == MIN_PROBE_POW - 1 { 0 } else { 1u64 << n };
        driver.set_eoa(addr + SIGNATURE_LEN as u64)?;
        driver.read_at(MemKind::Super, addr, &mut buf)?;
        if buf == SIGNATURE {
            log::trace!("signature found at {addr}");
            return Ok(Some(addr));
        }
    }
    Ok(None)
}

/// Reads and validates the superblock at `boot_addr`, then hands the
/// driver-info payload (if any) to the driver. Moves the EOA as needed.
pub fn read_superblock(driver: &mut dyn FileDriver, boot_addr: u64) -> FileResult<Superblock> {
    let fixed_end = boot_addr + SUPERBLOCK_FIXED_SIZE as u64;
    driver.set_eoa(fixed_end)?;
    let prefix: SuperblockPrefix = driver.read_struct(MemKind::Super, boot_addr)?;
    prefix.validate()?;

    let var_size = Superblock::variable_size(prefix.sizeof_addr, prefix.sizeof_size);
    driver.set_eoa(fixed_end + var_size as u64)?;
    let mut var = vec![0u8; var_size];
    driver.read_at(MemKind::Super, fixed_end, &mut var)?;
    let sb = Superblock::decode(&prefix, &var)?;

    if sb.driver_addr != ADDR_UNDEF {
        let addr = sb
            .base_addr
            .checked_add(sb.driver_addr)
            .ok_or(FormatError::AddressOverflow)?;
        read_driver_info(driver, addr)?;
    }
    Ok(sb)
}

fn read_driver_info(driver: &mut dyn FileDriver, addr: u64) -> FileResult {
    let payload_addr = addr + DRIVER_INFO_HEADER_SIZE as u64;
    driver.set_eoa(payload_addr)?;
    let header: DriverInfoHeader = driver.read_struct(MemKind::Super, addr)?;
    header.validate()?;

    let size = header.info_size.get() as usize;
    driver.set_eoa(payload_addr + size as u64)?;
    let mut payload = vec![0u8; size];
    driver.read_at(MemKind::Super, payload_addr, &mut payload)?;
    driver.sb_decode(&header.name, &payload)?;
    log::debug!(
        "decoded {} bytes of '{}' driver info",
        size,
        String::from_utf8_lossy(&header.name)
    );
    Ok(())
}

/// Size of the driver-info block the driver needs, header included; 0 if none.
pub fn driver_block_size(driver: &dyn FileDriver) -> u64 {
    match driver.sb_size() {
        0 => 0,
        n => DRIVER_INFO_HEADER_SIZE as u64 + n,
    }
}

/// Encodes the superblock followed by the driver-info block.
pub fn encode_superblock(sb: &Superblock, driver: &dyn FileDriver) -> FileResult<Vec<u8>> {
    let mut buf = vec![0u8; sb.encoded_size()];
    sb.encode(&mut buf)?;

    let size = driver.sb_size() as usize;
    if size > 0 {
        let mut payload = vec![0u8; size];
        let name: DriverInfoName = driver.sb_encode(&mut payload)?;
        let info_size = u32::try_from(size).map_err(|_| FormatError::Invalid("driver info too large"))?;
        buf.extend_from_slice(DriverInfoHeader::new(info_size, name).as_bytes());
        buf.extend_from_slice(&payload);
    }
    Ok(buf)
}
