// Filesystem Families Organization
// One module per historical file-system family

pub mod cbm;
pub mod rt11;

use relic_core::FsKind;
use serde::Serialize;

/// Descriptive metadata for a file-system family.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyMetadata {
    pub kind: FsKind,
    pub description: &'static str,
    /// Year the format first shipped.
    pub era_start: u32,
    /// Block size the probe requires.
    pub block_size: usize,
    /// Media the format is usually found on.
    pub typical_media: &'static [&'static str],
}

/// Metadata for every built-in family.
pub fn families() -> Vec<FamilyMetadata> {
    vec![cbm::metadata(), rt11::metadata()]
}
