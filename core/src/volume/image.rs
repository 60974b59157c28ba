// Volumes backed directly by loaded image bytes

use super::Volume;
use crate::block::Block;
use crate::error::{RelicError, Result};
use crate::geometry::Geometry;
use std::sync::Arc;

/// Slice out block `index`, zero-filling whatever lies past the end of `data`.
fn slice_block(data: &[u8], index: u64, block_size: usize) -> Block<'_> {
    let start = (index as usize).saturating_mul(block_size);
    let end = start.saturating_add(block_size);
    if end <= data.len() {
        Block::borrowed(index, &data[start..end])
    } else {
        let mut buf = vec![0u8; block_size];
        if start < data.len() {
            let available = data.len() - start;
            buf[..available].copy_from_slice(&data[start..]);
        }
        Block::owned(index, buf)
    }
}

/// Linear volume over raw image bytes.
#[derive(Debug, Clone)]
pub struct ImageVolume {
    source: String,
    data: Arc<[u8]>,
    block_size: usize,
    block_count: u64,
}

impl ImageVolume {
    /// A trailing partial block is represented as a full block, zero-filled.
    pub fn new(
        source: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        block_size: usize,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(RelicError::InvalidInput("block size must be positive".to_string()));
        }
        let data = data.into();
        let block_count = data.len().div_ceil(block_size) as u64;
        Ok(Self {
            source: source.into(),
            data,
            block_size,
            block_count,
        })
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }
}

impl Volume for ImageVolume {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn info(&self) -> String {
        let mut info = format!(
            "{} bytes as {} blocks of {}",
            self.data.len(),
            self.block_count,
            self.block_size
        );
        if self.data.len() % self.block_size != 0 {
            info.push_str(", last block zero-filled");
        }
        info
    }

    fn read_block(&self, index: u64) -> Result<Block<'_>> {
        if index >= self.block_count {
            return Err(RelicError::out_of_range(index, self.block_count));
        }
        Ok(slice_block(&self.data, index, self.block_size))
    }
}

/// Track-oriented volume: image bytes laid out in CHS order of `geometry`.
///
/// Sectors missing from a short image read as zeros; bytes beyond the
/// geometry are ignored.
#[derive(Debug, Clone)]
pub struct ChsVolume {
    source: String,
    data: Arc<[u8]>,
    sector_size: usize,
    geometry: Geometry,
}

impl ChsVolume {
    pub fn new(
        source: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        geometry: Geometry,
        sector_size: usize,
    ) -> Result<Self> {
        if sector_size == 0 {
            return Err(RelicError::InvalidInput("sector size must be positive".to_string()));
        }
        geometry.validate()?;
        Ok(Self {
            source: source.into(),
            data: data.into(),
            sector_size,
            geometry,
        })
    }
}

impl Volume for ChsVolume {
    fn block_size(&self) -> usize {
        self.sector_size
    }

    fn block_count(&self) -> u64 {
        self.geometry.block_count()
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn info(&self) -> String {
        let g = &self.geometry;
        let mut info = format!(
            "CHS {} cylinders x {} heads, {} sectors of {}",
            g.cylinders(),
            g.heads(),
            g.block_count(),
            self.sector_size
        );
        if g.is_zoned() {
            info.push_str(&format!(", {} zones", g.zones.len()));
        }
        let expected = self.byte_extent();
        let actual = self.data.len() as u64;
        if actual < expected {
            info.push_str(&format!(", image short by {} bytes", expected - actual));
        } else if actual > expected {
            info.push_str(&format!(", {} trailing bytes ignored", actual - expected));
        }
        info
    }

    fn read_block(&self, index: u64) -> Result<Block<'_>> {
        let count = self.block_count();
        if index >= count {
            return Err(RelicError::out_of_range(index, count));
        }
        Ok(slice_block(&self.data, index, self.sector_size))
    }

    fn geometry(&self) -> Option<&Geometry> {
        Some(&self.geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Chs;
    use crate::volume::VolumeVariant;

    #[test]
    fn test_partial_tail_is_zero_filled() {
        let volume = ImageVolume::new("img", vec![0xFFu8; 10], 4).unwrap();
        assert_eq!(volume.block_count(), 3);

        let tail = volume.read_block(2).unwrap();
        assert_eq!(tail.as_slice(), &[0xFF, 0xFF, 0, 0]);
        assert!(volume.info().contains("zero-filled"));
    }

    #[test]
    fn test_out_of_range_block() {
        let volume = ImageVolume::new("img", vec![0u8; 8], 4).unwrap();
        assert!(matches!(
            volume.read_block(2),
            Err(RelicError::OutOfRange { index: 2, limit: 2 })
        ));
        assert!(ImageVolume::new("img", vec![0u8; 8], 0).is_err());
    }

    #[test]
    fn test_chs_addressing_matches_linear() {
        let geometry = Geometry::uniform(2, 2, 3, 1).unwrap();
        let data: Vec<u8> = (0..12u8).flat_map(|i| [i, i]).collect();
        let volume = ChsVolume::new("chs", data, geometry, 2).unwrap();

        assert_eq!(volume.variant(), VolumeVariant::Chs);
        assert_eq!(volume.block_count(), 12);
        let sector = volume.read_sector(Chs::new(1, 0, 2)).unwrap();
        assert_eq!(sector.offset(), 7);
        assert_eq!(sector.as_slice(), &[7, 7]);
        assert!(matches!(
            volume.read_sector(Chs::new(2, 0, 1)),
            Err(RelicError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_short_chs_image_reads_zeros() {
        let geometry = Geometry::uniform(1, 1, 4, 0).unwrap();
        let volume = ChsVolume::new("short", vec![1u8; 5], geometry, 2).unwrap();

        assert_eq!(volume.read_block(2).unwrap().as_slice(), &[1, 0]);
        assert!(volume.read_block(3).unwrap().is_zeroed());
        assert!(volume.info().contains("short by 3"));
    }
}
