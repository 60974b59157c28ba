// Image supply - load raw bytes once and offer candidate interpretations

use crate::config::ImageConfig;
use crate::error::Result;
use crate::geometry::{self, Geometry, InterleaveSpec};
use crate::volume::{ChsVolume, ImageVolume, InterleavedVolume, Volume};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Raw bytes of one image, shared by every view derived from it.
#[derive(Debug, Clone)]
pub struct ImageSource {
    name: String,
    data: Arc<[u8]>,
}

struct Layout {
    name: String,
    sector_size: usize,
    geometry: Geometry,
    interleave: Option<InterleaveSpec>,
}

impl ImageSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        debug!(path = %path.display(), bytes = data.len(), "loaded image");
        Ok(Self::from_bytes(path.display().to_string(), data))
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Linear view at a single block size.
    pub fn linear(&self, block_size: usize) -> Result<Arc<dyn Volume>> {
        Ok(Arc::new(ImageVolume::new(self.name.clone(), Arc::clone(&self.data), block_size)?))
    }

    fn layouts(&self, config: &ImageConfig) -> Vec<Layout> {
        let mut layouts: Vec<Layout> = Vec::new();
        let mut presets: Vec<geometry::GeometryPreset> =
            config.geometries.iter().filter_map(|name| geometry::preset(name)).collect();
        if config.auto_geometry {
            presets.extend(geometry::presets_for_size(self.len()));
        }
        for preset in presets {
            if layouts.iter().any(|l| l.name == preset.name) {
                continue;
            }
            layouts.push(Layout {
                name: preset.name.to_string(),
                sector_size: preset.sector_size,
                geometry: preset.geometry,
                interleave: preset.interleave,
            });
        }
        for custom in &config.custom_geometries {
            layouts.push(Layout {
                name: custom.name.clone(),
                sector_size: custom.sector_size,
                geometry: custom.geometry.clone(),
                interleave: custom.interleave,
            });
        }
        layouts
    }

    /// Every distinct interpretation of the image the configuration asks for.
    ///
    /// A CHS layout stores its sectors in linear order, so it replaces the
    /// linear view at its own sector size rather than doubling it.
    pub fn candidates(&self, config: &ImageConfig) -> Result<Vec<Arc<dyn Volume>>> {
        config.validate()?;
        let mut volumes: Vec<Arc<dyn Volume>> = Vec::new();
        let layouts = self.layouts(config);

        let mut seen = HashSet::new();
        for &block_size in &config.block_sizes {
            if !seen.insert(block_size) {
                continue;
            }
            if layouts.iter().any(|l| l.sector_size == block_size) {
                debug!(image = %self.name, block_size, "linear view covered by a CHS layout");
                continue;
            }
            volumes.push(self.linear(block_size)?);
        }

        for layout in layouts {
            debug!(image = %self.name, layout = %layout.name, "offering CHS layout");
            let chs: Arc<dyn Volume> = Arc::new(ChsVolume::new(
                format!("{} ({})", self.name, layout.name),
                Arc::clone(&self.data),
                layout.geometry,
                layout.sector_size,
            )?);
            if let Some(spec) = layout.interleave {
                volumes.push(Arc::new(InterleavedVolume::new(Arc::clone(&chs), spec)?));
            }
            volumes.push(chs);
        }
        Ok(volumes)
    }
}
