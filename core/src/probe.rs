// Probe contract - how a file-system format takes part in identification

use crate::error::Result;
use crate::volume::Volume;
use serde::Serialize;
use std::fmt;

/// Identity of a concrete file-system format (e.g. "rt11", "cbm1541").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FsKind(pub &'static str);

impl FsKind {
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Confidence levels, each a structural test more specific than the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ProbeLevel {
    /// Block size and addressing mode.
    Shape = 0,
    /// Boot block plausibility.
    Boot = 1,
    /// Home block / superblock plausibility.
    Home = 2,
    /// File header or inode plausibility.
    FileHeader = 3,
    /// Directory structure plausibility.
    Directory = 4,
    /// File header allocation plausibility.
    HeaderAllocation = 5,
    /// Data block allocation plausibility.
    DataAllocation = 6,
}

impl ProbeLevel {
    pub const MAX: ProbeLevel = ProbeLevel::DataAllocation;

    pub const ALL: [ProbeLevel; 7] = [
        ProbeLevel::Shape,
        ProbeLevel::Boot,
        ProbeLevel::Home,
        ProbeLevel::FileHeader,
        ProbeLevel::Directory,
        ProbeLevel::HeaderAllocation,
        ProbeLevel::DataAllocation,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }
}

impl fmt::Display for ProbeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Outcome of one probe call.
///
/// At [`ProbeLevel::Shape`] `size` is the block size the format requires; at
/// higher levels it is the current estimate of the volume size in blocks,
/// `None` when it cannot be determined at that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub passed: bool,
    pub size: Option<u64>,
    pub kind: FsKind,
}

impl ProbeReport {
    pub fn pass(kind: FsKind, size: u64) -> Self {
        Self { passed: true, size: Some(size), kind }
    }

    /// Passed, but nothing learned about the size.
    pub fn pass_through(kind: FsKind) -> Self {
        Self { passed: true, size: None, kind }
    }

    pub fn fail(kind: FsKind) -> Self {
        Self { passed: false, size: None, kind }
    }

    /// Failed the shape test; still reports the block size that would pass.
    pub fn wrong_shape(kind: FsKind, required_block_size: usize) -> Self {
        Self {
            passed: false,
            size: Some(required_block_size as u64),
            kind,
        }
    }
}

/// A staged structural test for one file-system family.
///
/// Implementations must be pure: the same `(volume, level)` always gives the
/// same report. Levels a probe does not check must pass. With `volume ==
/// None` and `level == Shape` the probe reports its required block size
/// without touching any content.
pub trait Probe: Send + Sync {
    /// Family this probe belongs to; reports may name a more specific kind.
    fn family(&self) -> FsKind;

    fn probe(&self, volume: Option<&dyn Volume>, level: ProbeLevel) -> Result<ProbeReport>;

    /// Static capability query.
    fn requirements(&self) -> Result<ProbeReport> {
        self.probe(None, ProbeLevel::Shape)
    }
}

/// Shape check shared by most probes: exact block size.
pub fn check_block_size(kind: FsKind, volume: Option<&dyn Volume>, required: usize) -> ProbeReport {
    match volume {
        Some(v) if v.block_size() == required => ProbeReport::pass(kind, required as u64),
        _ => ProbeReport::wrong_shape(kind, required),
    }
}
