use relic_core::{FileSystem, FilesystemRegistry, Probe, Result, Volume, VolumeVariant};
use std::sync::Arc;

use crate::families::cbm::{CbmFileSystem, CbmProbe, CBM1541};
use crate::families::rt11::{Rt11FileSystem, Rt11Probe, RT11};
use crate::families::{families, FamilyMetadata};
use crate::raw::{RawFileSystem, RAW};

fn boxed<F, T>(
    open: F,
) -> impl Fn(Arc<dyn Volume>) -> Result<Box<dyn FileSystem>> + Send + Sync + 'static
where
    F: Fn(Arc<dyn Volume>) -> Result<T> + Send + Sync + 'static,
    T: FileSystem + 'static,
{
    move |volume| Ok(Box::new(open(volume)?) as Box<dyn FileSystem>)
}

/// Register all built-in probes and constructors
pub fn register_builtin_filesystems(registry: &mut FilesystemRegistry) -> Result<()> {
    // Commodore 1541 - D64 images, raw or track-ordered
    registry.register_probe(Arc::new(CbmProbe) as Arc<dyn Probe>)?;
    registry.register_constructor(CBM1541, VolumeVariant::Linear, boxed(CbmFileSystem::new));
    registry.register_constructor(CBM1541, VolumeVariant::Chs, boxed(CbmFileSystem::new));

    // RT-11 - addressed by logical block on either variant
    registry.register_probe(Arc::new(Rt11Probe) as Arc<dyn Probe>)?;
    registry.register_constructor(RT11, VolumeVariant::Linear, boxed(Rt11FileSystem::new));
    registry.register_constructor(RT11, VolumeVariant::Chs, boxed(Rt11FileSystem::new));

    // Raw fallback, constructed by the caller when nothing matches
    registry.register_constructor(RAW, VolumeVariant::Linear, boxed(RawFileSystem::new));
    registry.register_constructor(RAW, VolumeVariant::Chs, boxed(RawFileSystem::new));

    Ok(())
}

/// Registry with every built-in family.
pub fn builtin_registry() -> Result<FilesystemRegistry> {
    let mut registry = FilesystemRegistry::new();
    register_builtin_filesystems(&mut registry)?;
    Ok(registry)
}

/// Open a volume with the raw fallback.
pub fn open_raw(
    registry: &FilesystemRegistry,
    volume: Arc<dyn Volume>,
) -> Result<Box<dyn FileSystem>> {
    registry.construct(RAW, volume)
}

/// Get detailed information about a specific family
pub fn get_family_info(name: &str) -> Option<String> {
    families().into_iter().find(|f| f.kind.0 == name).map(|meta| family_summary(&meta))
}

pub fn family_summary(meta: &FamilyMetadata) -> String {
    format!(
        "Family: {}\n\
         Description: {}\n\
         Since: {}\n\
         Block Size: {}\n\
         Media: {}",
        meta.kind,
        meta.description,
        meta.era_start,
        meta.block_size,
        meta.typical_media.join(", "),
    )
}

/// Names of every registered probe family.
pub fn list_available_filesystems(registry: &FilesystemRegistry) -> Vec<String> {
    registry.probes().iter().map(|p| p.family().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_core::ImageVolume;

    #[test]
    fn test_builtin_registration() {
        let registry = builtin_registry().unwrap();
        let names = list_available_filesystems(&registry);
        assert!(names.contains(&"cbm1541".to_string()));
        assert!(names.contains(&"rt11".to_string()));
        assert!(!names.contains(&"raw".to_string()));

        assert!(registry.has_constructor(CBM1541, VolumeVariant::Chs));
        assert!(registry.has_constructor(RT11, VolumeVariant::Linear));
        assert!(registry.has_constructor(RT11, VolumeVariant::Chs));
    }

    #[test]
    fn test_raw_fallback_opens_anything() {
        let registry = builtin_registry().unwrap();
        let volume: Arc<dyn Volume> =
            Arc::new(ImageVolume::new("junk", vec![0x5au8; 1000], 512).unwrap());
        let fs = open_raw(&registry, volume).unwrap();
        assert_eq!(fs.kind(), RAW);
        assert!(fs.entries().unwrap().is_empty());
        assert_eq!(fs.volume().block_count(), 2);
    }

    #[test]
    fn test_family_info() {
        let info = get_family_info("rt11").unwrap();
        assert!(info.contains("Block Size: 512"));
        assert!(get_family_info("ntfs").is_none());
    }
}
