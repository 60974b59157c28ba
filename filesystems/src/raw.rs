// Raw fallback: a volume nobody claimed, exposed block by block

use log::debug;
use relic_core::{DirEntry, FileSystem, FsKind, Result, Volume};
use std::sync::Arc;

pub const RAW: FsKind = FsKind("raw");

/// Unstructured view of a volume. There is no probe for it; callers that
/// want a fallback construct it directly after identification fails.
pub struct RawFileSystem {
    volume: Arc<dyn Volume>,
}

impl RawFileSystem {
    pub fn new(volume: Arc<dyn Volume>) -> Result<Self> {
        debug!("Opening {} as raw blocks: {}", volume.source(), volume.info());
        Ok(Self { volume })
    }
}

impl FileSystem for RawFileSystem {
    fn kind(&self) -> FsKind {
        RAW
    }

    fn volume(&self) -> &Arc<dyn Volume> {
        &self.volume
    }

    fn entries(&self) -> Result<Vec<DirEntry>> {
        Ok(Vec::new())
    }
}
