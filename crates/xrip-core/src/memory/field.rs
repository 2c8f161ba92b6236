//! Field extraction from raw record buffers.
//!
//! Per-build record layouts are plain offset tables; these helpers pull
//! little-endian fields out of a buffer read from remote memory without
//! any unsafe reinterpretation.

use crate::error::{Error, Result};

fn slice(buf: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    buf.get(offset..offset + len).ok_or_else(|| {
        Error::MalformedAsset(format!(
            "field at {offset}..{} outside {}-byte record",
            offset + len,
            buf.len()
        ))
    })
}

pub fn u8_at(buf: &[u8], offset: usize) -> Result<u8> {
    Ok(slice(buf, offset, 1)?[0])
}

pub fn u16_at(buf: &[u8], offset: usize) -> Result<u16> {
    Ok(u16::from_le_bytes(slice(buf, offset, 2)?.try_into().unwrap()))
}

pub fn u32_at(buf: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_le_bytes(slice(buf, offset, 4)?.try_into().unwrap()))
}

pub fn u64_at(buf: &[u8], offset: usize) -> Result<u64> {
    Ok(u64::from_le_bytes(slice(buf, offset, 8)?.try_into().unwrap()))
}

pub fn i32_at(buf: &[u8], offset: usize) -> Result<i32> {
    Ok(i32::from_le_bytes(slice(buf, offset, 4)?.try_into().unwrap()))
}

pub fn f32_at(buf: &[u8], offset: usize) -> Result<f32> {
    Ok(f32::from_bits(u32_at(buf, offset)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_extraction() {
        let mut buf = vec![0u8; 16];
        buf[4..8].copy_from_slice(&0x11223344u32.to_le_bytes());
        buf[8..16].copy_from_slice(&0xAABBCCDDEEFF0011u64.to_le_bytes());
        assert_eq!(u32_at(&buf, 4).unwrap(), 0x11223344);
        assert_eq!(u64_at(&buf, 8).unwrap(), 0xAABBCCDDEEFF0011);
        assert_eq!(u8_at(&buf, 4).unwrap(), 0x44);
        assert!(u32_at(&buf, 14).is_err());
    }
}
