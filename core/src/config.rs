// Image interpretation settings, loadable from JSON

use crate::error::{RelicError, Result};
use crate::geometry::{self, Geometry, InterleaveSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A geometry not covered by the built-in presets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomGeometry {
    pub name: String,
    pub sector_size: usize,
    pub geometry: Geometry,
    #[serde(default)]
    pub interleave: Option<InterleaveSpec>,
}

/// How a raw image is turned into candidate volumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Linear interpretations to offer, one per block size.
    pub block_sizes: Vec<usize>,
    /// Preset geometries to always offer, by name.
    pub geometries: Vec<String>,
    pub custom_geometries: Vec<CustomGeometry>,
    /// Also offer every preset whose byte size matches the image.
    pub auto_geometry: bool,
    /// Fall back to raw access when identification fails.
    pub raw_fallback: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            block_sizes: vec![512, 256],
            geometries: Vec::new(),
            custom_geometries: Vec::new(),
            auto_geometry: true,
            raw_fallback: true,
        }
    }
}

impl ImageConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ImageConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self.block_sizes.iter().find(|&&bs| bs == 0) {
            return Err(RelicError::Configuration(format!("invalid block size {}", bad)));
        }
        for name in &self.geometries {
            if geometry::preset(name).is_none() {
                return Err(RelicError::Configuration(format!(
                    "unknown geometry preset '{}'",
                    name
                )));
            }
        }
        for custom in &self.custom_geometries {
            if custom.sector_size == 0 {
                return Err(RelicError::Configuration(format!(
                    "geometry '{}' has zero sector size",
                    custom.name
                )));
            }
            let invalid = |e: RelicError| {
                RelicError::Configuration(format!("geometry '{}': {}", custom.name, e))
            };
            custom.geometry.validate().map_err(invalid)?;
            if let Some(spec) = custom.interleave {
                spec.check(&custom.geometry).map_err(invalid)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = ImageConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ImageConfig::default());
    }

    #[test]
    fn test_custom_geometry_round_trip() {
        let json = r#"{
            "block_sizes": [128],
            "auto_geometry": false,
            "custom_geometries": [{
                "name": "odd",
                "sector_size": 128,
                "geometry": {
                    "min_cylinder": 0, "max_cylinder": 1, "min_head": 0, "max_head": 0,
                    "zones": [{"first_cylinder": 0, "last_cylinder": 1, "min_sector": 1, "max_sector": 16}]
                },
                "interleave": {"interleave": 3}
            }]
        }"#;
        let config = ImageConfig::from_json_str(json).unwrap();
        assert_eq!(config.block_sizes, vec![128]);
        assert!(config.raw_fallback);
        let custom = &config.custom_geometries[0];
        assert_eq!(custom.geometry.block_count(), 32);
        assert_eq!(custom.interleave.unwrap().skew, 0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ImageConfig::from_json_str(r#"{"block_sizes": [0]}"#),
            Err(RelicError::Configuration(_))
        ));
        assert!(matches!(
            ImageConfig::from_json_str(r#"{"geometries": ["nope"]}"#),
            Err(RelicError::Configuration(_))
        ));
        let oversized = r#"{"custom_geometries": [{
            "name": "huge", "sector_size": 512,
            "geometry": {"min_cylinder": 0, "max_cylinder": 0, "min_head": 0, "max_head": 0,
                "zones": [{"first_cylinder": 0, "last_cylinder": 0, "min_sector": 0, "max_sector": 4294967295}]}
        }]}"#;
        assert!(matches!(ImageConfig::from_json_str(oversized), Err(RelicError::Configuration(_))));
        let mid_track = r#"{"custom_geometries": [{
            "name": "skewed", "sector_size": 256,
            "geometry": {"min_cylinder": 0, "max_cylinder": 1, "min_head": 0, "max_head": 0,
                "zones": [{"first_cylinder": 0, "last_cylinder": 1, "min_sector": 0, "max_sector": 9}]},
            "interleave": {"interleave": 2, "start_block": 5}
        }]}"#;
        assert!(matches!(ImageConfig::from_json_str(mid_track), Err(RelicError::Configuration(_))));
        assert!(matches!(
            ImageConfig::from_json_str("not json"),
            Err(RelicError::SerializationError(_))
        ));
    }
}
