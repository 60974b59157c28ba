pub mod block;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod geometry;
pub mod image;
pub mod probe;
pub mod registry;
pub mod resolver;
pub mod volume;

pub use block::Block;
pub use config::{CustomGeometry, ImageConfig};
pub use error::{RelicError, Result};
pub use filesystem::{DirEntry, FileSystem};
pub use geometry::{Chs, Geometry, GeometryPreset, InterleaveSpec, Zone};
pub use image::ImageSource;
pub use probe::{check_block_size, FsKind, Probe, ProbeLevel, ProbeReport};
pub use registry::{Constructor, FilesystemRegistry};
pub use resolver::{Identification, Resolver};
pub use volume::{
    pad_to, ChsVolume, ClusteredVolume, ImageVolume, InterleavedVolume, PaddedVolume, Volume,
    VolumeVariant,
};
