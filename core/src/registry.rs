use crate::error::{RelicError, Result};
use crate::filesystem::FileSystem;
use crate::probe::{FsKind, Probe};
use crate::volume::{Volume, VolumeVariant};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub type Constructor = Box<dyn Fn(Arc<dyn Volume>) -> Result<Box<dyn FileSystem>> + Send + Sync>;

/// Probes and constructors of every known file system.
///
/// Built once by the caller, then shared read-only with the
/// [`Resolver`](crate::Resolver).
pub struct FilesystemRegistry {
    probes: Vec<Arc<dyn Probe>>,
    constructors: HashMap<(FsKind, VolumeVariant), Constructor>,
}

impl FilesystemRegistry {
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            constructors: HashMap::new(),
        }
    }

    /// Register a probe after checking its static level-0 contract.
    ///
    /// A probe that errors, fails, or names no block size when queried
    /// without a volume is rejected with `MalformedProbe` and not registered.
    pub fn register_probe(&mut self, probe: Arc<dyn Probe>) -> Result<()> {
        let family = probe.family();
        let malformed = |reason: String| RelicError::MalformedProbe {
            kind: family.to_string(),
            reason,
        };
        let report = probe
            .requirements()
            .map_err(|e| malformed(format!("static query failed: {}", e)))?;
        match report.size {
            Some(size) if size > 0 => {}
            _ => return Err(malformed("static query reported no block size".to_string())),
        }
        debug!(kind = %family, block_size = ?report.size, "registered probe");
        self.probes.push(probe);
        Ok(())
    }

    /// Like [`register_probe`](Self::register_probe), but logs and skips a
    /// malformed probe. Returns whether it was registered.
    pub fn register_probe_or_skip(&mut self, probe: Arc<dyn Probe>) -> bool {
        match self.register_probe(probe) {
            Ok(()) => true,
            Err(e) => {
                warn!("excluding probe: {}", e);
                false
            }
        }
    }

    pub fn register_constructor<F>(&mut self, kind: FsKind, variant: VolumeVariant, constructor: F)
    where
        F: Fn(Arc<dyn Volume>) -> Result<Box<dyn FileSystem>> + Send + Sync + 'static,
    {
        self.constructors.insert((kind, variant), Box::new(constructor));
    }

    /// Instantiate the file system registered for `kind` on this volume's variant.
    pub fn construct(&self, kind: FsKind, volume: Arc<dyn Volume>) -> Result<Box<dyn FileSystem>> {
        let variant = volume.variant();
        let constructor = self
            .constructors
            .get(&(kind, variant))
            .ok_or_else(|| RelicError::NotConstructible {
                kind: kind.to_string(),
                variant: variant.to_string(),
            })?;
        constructor(volume)
    }

    pub fn has_constructor(&self, kind: FsKind, variant: VolumeVariant) -> bool {
        self.constructors.contains_key(&(kind, variant))
    }

    pub fn probes(&self) -> &[Arc<dyn Probe>] {
        &self.probes
    }

    /// Every kind with a constructor, sorted.
    pub fn kinds(&self) -> Vec<FsKind> {
        let mut kinds: Vec<FsKind> = self.constructors.keys().map(|(k, _)| *k).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

impl Default for FilesystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}
