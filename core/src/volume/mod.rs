// Volume abstraction and the non-destructive views built on top of it

pub mod clustered;
pub mod image;
pub mod interleaved;
pub mod padded;

pub use clustered::ClusteredVolume;
pub use image::{ChsVolume, ImageVolume};
pub use interleaved::InterleavedVolume;
pub use padded::PaddedVolume;

use crate::block::Block;
use crate::error::{RelicError, Result};
use crate::geometry::{Chs, Geometry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Addressing mode of a volume, used to key file-system constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VolumeVariant {
    /// Track-oriented, addressable by cylinder/head/sector.
    Chs,
    /// Plain sequence of blocks.
    Linear,
}

impl fmt::Display for VolumeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeVariant::Chs => write!(f, "CHS"),
            VolumeVariant::Linear => write!(f, "linear"),
        }
    }
}

/// An ordered sequence of equally sized blocks.
///
/// Every index in `0..block_count()` yields exactly one block of
/// `block_size()` bytes; any other index is `RelicError::OutOfRange`.
pub trait Volume: Send + Sync + fmt::Debug {
    fn block_size(&self) -> usize;

    fn block_count(&self) -> u64;

    /// Where the bytes came from (usually a file path).
    fn source(&self) -> &str;

    /// Free-form description of the view.
    fn info(&self) -> String;

    fn read_block(&self, index: u64) -> Result<Block<'_>>;

    /// CHS facet, if the volume is track-oriented.
    fn geometry(&self) -> Option<&Geometry> {
        None
    }

    fn variant(&self) -> VolumeVariant {
        if self.geometry().is_some() {
            VolumeVariant::Chs
        } else {
            VolumeVariant::Linear
        }
    }

    fn read_sector(&self, chs: Chs) -> Result<Block<'_>> {
        let geometry = self.geometry().ok_or_else(|| {
            RelicError::NotSupported(format!("{} has no CHS addressing", self.source()))
        })?;
        self.read_block(geometry.to_linear(chs)?)
    }

    /// Total bytes represented by the volume.
    fn byte_extent(&self) -> u64 {
        self.block_size() as u64 * self.block_count()
    }
}

/// Extend `volume` with zero blocks so it holds at least `blocks` blocks.
///
/// Returns the volume unchanged when it is already large enough.
pub fn pad_to(volume: Arc<dyn Volume>, blocks: u64) -> Arc<dyn Volume> {
    let current = volume.block_count();
    if blocks > current {
        Arc::new(PaddedVolume::new(volume, blocks - current))
    } else {
        volume
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Linear image whose block `i` is filled with the byte `i as u8`.
    pub fn numbered_image(blocks: usize, block_size: usize) -> Arc<dyn Volume> {
        let data: Vec<u8> = (0..blocks)
            .flat_map(|i| std::iter::repeat(i as u8).take(block_size))
            .collect();
        Arc::new(ImageVolume::new("numbered", data, block_size).unwrap())
    }

    /// CHS image whose sector at linear index `i` is filled with `i as u8`.
    pub fn numbered_chs(geometry: Geometry, sector_size: usize) -> Arc<dyn Volume> {
        let blocks = geometry.block_count() as usize;
        let data: Vec<u8> = (0..blocks)
            .flat_map(|i| std::iter::repeat(i as u8).take(sector_size))
            .collect();
        Arc::new(ChsVolume::new("numbered-chs", data, geometry, sector_size).unwrap())
    }
}
