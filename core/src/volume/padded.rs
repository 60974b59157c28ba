// Extend a volume with synthesized zero blocks

use super::Volume;
use crate::block::Block;
use crate::error::{RelicError, Result};
use std::sync::Arc;

/// Recovers images whose trailing empty blocks were trimmed by the imaging
/// tool. Padding blocks are produced on read, never stored.
#[derive(Debug, Clone)]
pub struct PaddedVolume {
    inner: Arc<dyn Volume>,
    extra: u64,
}

impl PaddedVolume {
    pub fn new(inner: Arc<dyn Volume>, extra: u64) -> Self {
        Self { inner, extra }
    }

    pub fn extra_blocks(&self) -> u64 {
        self.extra
    }
}

impl Volume for PaddedVolume {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn block_count(&self) -> u64 {
        self.inner.block_count() + self.extra
    }

    fn source(&self) -> &str {
        self.inner.source()
    }

    fn info(&self) -> String {
        format!("padded +{} blocks over [{}]", self.extra, self.inner.info())
    }

    fn read_block(&self, index: u64) -> Result<Block<'_>> {
        let real = self.inner.block_count();
        if index < real {
            self.inner.read_block(index)
        } else if index < real + self.extra {
            Ok(Block::zeroed(index, self.block_size()))
        } else {
            Err(RelicError::out_of_range(index, self.block_count()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::test_support::numbered_image;

    #[test]
    fn test_padding_reads_zeros() {
        let base = numbered_image(3, 8);
        let padded = PaddedVolume::new(base.clone(), 5);

        assert_eq!(padded.block_count(), base.block_count() + 5);
        assert_eq!(padded.read_block(2).unwrap().as_slice(), &[2u8; 8]);
        for index in 3..8 {
            let block = padded.read_block(index).unwrap();
            assert_eq!(block.size(), 8);
            assert!(block.is_zeroed());
            assert_eq!(block.offset(), index);
        }
        assert!(matches!(padded.read_block(8), Err(RelicError::OutOfRange { .. })));
    }

    #[test]
    fn test_zero_padding_is_identity() {
        let base = numbered_image(2, 4);
        let padded = PaddedVolume::new(base, 0);
        assert_eq!(padded.block_count(), 2);
        assert!(padded.read_block(2).is_err());
    }
}
