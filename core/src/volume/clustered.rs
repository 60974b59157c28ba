// Regroup N physical blocks into one logical block

use super::Volume;
use crate::block::Block;
use crate::error::{RelicError, Result};
use std::sync::Arc;

/// Logical block `i` is the concatenation of underlying blocks
/// `skip + i*factor .. skip + i*factor + factor`. A partial group at the tail
/// is not represented.
#[derive(Debug, Clone)]
pub struct ClusteredVolume {
    inner: Arc<dyn Volume>,
    factor: u32,
    skip: u64,
}

impl ClusteredVolume {
    pub fn new(inner: Arc<dyn Volume>, factor: u32, skip: u64) -> Result<Self> {
        if factor == 0 {
            return Err(RelicError::InvalidInput("cluster factor must be at least 1".to_string()));
        }
        if skip > inner.block_count() {
            return Err(RelicError::InvalidInput(format!(
                "cannot skip {} of {} blocks",
                skip,
                inner.block_count()
            )));
        }
        Ok(Self { inner, factor, skip })
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    pub fn inner(&self) -> &Arc<dyn Volume> {
        &self.inner
    }
}

impl Volume for ClusteredVolume {
    fn block_size(&self) -> usize {
        self.inner.block_size() * self.factor as usize
    }

    fn block_count(&self) -> u64 {
        (self.inner.block_count() - self.skip) / self.factor as u64
    }

    fn source(&self) -> &str {
        self.inner.source()
    }

    fn info(&self) -> String {
        let mut info = format!("clustered {}x{}", self.factor, self.inner.block_size());
        if self.skip > 0 {
            info.push_str(&format!(" skipping {}", self.skip));
        }
        format!("{} over [{}]", info, self.inner.info())
    }

    fn read_block(&self, index: u64) -> Result<Block<'_>> {
        let count = self.block_count();
        if index >= count {
            return Err(RelicError::out_of_range(index, count));
        }
        let first = self.skip + index * self.factor as u64;
        let mut data = Vec::with_capacity(self.block_size());
        for physical in first..first + self.factor as u64 {
            data.extend_from_slice(self.inner.read_block(physical)?.as_slice());
        }
        Ok(Block::owned(index, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::test_support::numbered_image;

    #[test]
    fn test_block_count_truncates_tail() {
        let base = numbered_image(11, 4);
        let clustered = ClusteredVolume::new(base.clone(), 2, 0).unwrap();
        assert_eq!(clustered.block_size(), 8);
        assert_eq!(clustered.block_count(), 5);

        let skipped = ClusteredVolume::new(base, 4, 1).unwrap();
        assert_eq!(skipped.block_count(), 2);
        assert!(matches!(skipped.read_block(2), Err(RelicError::OutOfRange { .. })));
    }

    #[test]
    fn test_block_zero_concatenates_underlying() {
        let base = numbered_image(9, 2);
        let clustered = ClusteredVolume::new(base.clone(), 3, 2).unwrap();

        let mut expected = Vec::new();
        for i in 2..5 {
            expected.extend_from_slice(base.read_block(i).unwrap().as_slice());
        }
        assert_eq!(clustered.read_block(0).unwrap().as_slice(), expected.as_slice());
        assert_eq!(clustered.read_block(1).unwrap().as_slice(), &[5, 5, 6, 6, 7, 7]);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let base = numbered_image(4, 2);
        assert!(ClusteredVolume::new(base.clone(), 0, 0).is_err());
        assert!(ClusteredVolume::new(base.clone(), 1, 5).is_err());

        let all_skipped = ClusteredVolume::new(base, 2, 4).unwrap();
        assert_eq!(all_skipped.block_count(), 0);
    }
}
