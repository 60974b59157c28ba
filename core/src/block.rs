// Block - a fixed-size, read-only window onto one logical block of a volume

use crate::error::{RelicError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::borrow::Cow;

/// One logical block read from a [`Volume`](crate::Volume).
///
/// Blocks read from a plain image borrow the image bytes; blocks synthesized by
/// a transform view (clustering, padding) own their content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    offset: u64,
    data: Cow<'a, [u8]>,
}

impl<'a> Block<'a> {
    pub fn borrowed(offset: u64, data: &'a [u8]) -> Self {
        Self { offset, data: Cow::Borrowed(data) }
    }

    pub fn owned(offset: u64, data: Vec<u8>) -> Self {
        Self { offset, data: Cow::Owned(data) }
    }

    /// Zero-filled block of `size` bytes.
    pub fn zeroed(offset: u64, size: usize) -> Self {
        Self::owned(offset, vec![0u8; size])
    }

    /// Same content, re-addressed to `offset` (used by remapping views).
    pub fn at(self, offset: u64) -> Self {
        Self { offset, data: self.data }
    }

    /// Position of this block within its owning volume.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_owned(self) -> Block<'static> {
        Block {
            offset: self.offset,
            data: Cow::Owned(self.data.into_owned()),
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.into_owned()
    }

    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Borrow `len` bytes starting at `off`.
    pub fn bytes(&self, off: usize, len: usize) -> Result<&[u8]> {
        let end = off
            .checked_add(len)
            .ok_or_else(|| RelicError::out_of_range(off, self.size()))?;
        if end > self.size() {
            return Err(RelicError::out_of_range(end.saturating_sub(1), self.size()));
        }
        Ok(&self.data[off..end])
    }

    pub fn byte(&self, off: usize) -> Result<u8> {
        Ok(self.bytes(off, 1)?[0])
    }

    pub fn u16_le(&self, off: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.bytes(off, 2)?))
    }

    pub fn u16_be(&self, off: usize) -> Result<u16> {
        Ok(BigEndian::read_u16(self.bytes(off, 2)?))
    }

    pub fn u32_le(&self, off: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(off, 4)?))
    }

    pub fn u32_be(&self, off: usize) -> Result<u32> {
        Ok(BigEndian::read_u32(self.bytes(off, 4)?))
    }

    /// Fixed-width text field.
    ///
    /// Trailing NUL, space and shifted-space (0xA0) padding is trimmed and
    /// non-printable bytes are shown as `.`.
    pub fn string(&self, off: usize, len: usize) -> Result<String> {
        let raw = self.bytes(off, len)?;
        let end = raw
            .iter()
            .rposition(|&b| !matches!(b, 0x00 | 0x20 | 0xA0))
            .map_or(0, |p| p + 1);
        Ok(raw[..end]
            .iter()
            .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
            .collect())
    }
}

impl AsRef<[u8]> for Block<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
