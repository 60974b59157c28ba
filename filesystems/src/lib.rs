// Filesystem families organization
pub mod families;

pub mod raw;
pub mod registration;

pub use families::cbm::{CbmFileSystem, CbmProbe, CBM1541};
pub use families::rt11::{Rt11FileSystem, Rt11Probe, RT11};
pub use families::{families, FamilyMetadata};
pub use raw::{RawFileSystem, RAW};

// Re-export registration functions
pub use registration::{
    builtin_registry, family_summary, get_family_info, list_available_filesystems, open_raw,
    register_builtin_filesystems,
};
