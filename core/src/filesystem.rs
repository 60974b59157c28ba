use crate::error::Result;
use crate::probe::FsKind;
use crate::volume::Volume;
use serde::Serialize;
use std::sync::Arc;

/// Directory entry as reported by a file-system browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub file_type: String,
    pub start_block: Option<u64>,
    pub size_blocks: u64,
}

/// A mounted file system. Browsers are constructed from the volume the
/// resolver settled on and only ever read from it.
pub trait FileSystem: Send + Sync {
    fn kind(&self) -> FsKind;

    fn volume(&self) -> &Arc<dyn Volume>;

    fn label(&self) -> Option<String> {
        None
    }

    fn entries(&self) -> Result<Vec<DirEntry>>;
}
