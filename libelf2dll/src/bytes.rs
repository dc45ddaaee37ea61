//! Big-endian primitives over byte slices. All output fields in the module
//! format are big-endian regardless of host, and every access is checked
//! against the slice it lands in.

use crate::error::Result;
use anyhow::bail;

pub(crate) fn read_u32(data: &[u8], offset: u32) -> Result<u32> {
    let Some(bytes) = data
        .get(offset as usize..)
        .and_then(|d| d.first_chunk::<4>())
    else {
        bail!(
            "read of 4 bytes at 0x{offset:x} is out of bounds (region size 0x{:x})",
            data.len()
        );
    };
    Ok(u32::from_be_bytes(*bytes))
}

pub(crate) fn write_u32(data: &mut [u8], offset: u32, value: u32) -> Result {
    let len = data.len();
    let Some(bytes) = data
        .get_mut(offset as usize..)
        .and_then(|d| d.first_chunk_mut::<4>())
    else {
        bail!("write of 4 bytes at 0x{offset:x} is out of bounds (region size 0x{len:x})");
    };
    *bytes = value.to_be_bytes();
    Ok(())
}

pub(crate) fn write_u16(data: &mut [u8], offset: u32, value: u16) -> Result {
    let len = data.len();
    let Some(bytes) = data
        .get_mut(offset as usize..)
        .and_then(|d| d.first_chunk_mut::<2>())
    else {
        bail!("write of 2 bytes at 0x{offset:x} is out of bounds (region size 0x{len:x})");
    };
    *bytes = value.to_be_bytes();
    Ok(())
}

/// Rounds `value` up to the next multiple of `alignment`, which must be a
/// power of two.
#[must_use]
pub(crate) fn align_up(value: u32, alignment: u32) -> u32 {
    debug_assert!(alignment.is_power_of_two());
    value.next_multiple_of(alignment)
}
