// Cylinder/head/sector geometry for track-oriented media
// Supports zoned layouts where the sector count varies by cylinder range
// (Commodore drives, some 8-inch formats).

use crate::error::{RelicError, Result};
use serde::{Deserialize, Serialize};

/// Longest track a geometry may describe.
pub const MAX_SECTORS_PER_TRACK: u64 = 1 << 16;

/// A physical sector address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chs {
    pub cylinder: u32,
    pub head: u32,
    pub sector: u32,
}

impl Chs {
    pub const fn new(cylinder: u32, head: u32, sector: u32) -> Self {
        Self { cylinder, head, sector }
    }
}

impl std::fmt::Display for Chs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.cylinder, self.head, self.sector)
    }
}

/// A run of cylinders sharing the same sector numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub first_cylinder: u32,
    pub last_cylinder: u32,
    pub min_sector: u32,
    pub max_sector: u32,
}

impl Zone {
    pub const fn new(
        first_cylinder: u32,
        last_cylinder: u32,
        min_sector: u32,
        max_sector: u32,
    ) -> Self {
        Self {
            first_cylinder,
            last_cylinder,
            min_sector,
            max_sector,
        }
    }

    fn cylinders(&self) -> u64 {
        (self.last_cylinder as u64 + 1).saturating_sub(self.first_cylinder as u64)
    }

    fn sectors(&self) -> u64 {
        (self.max_sector as u64 + 1).saturating_sub(self.min_sector as u64)
    }

    fn contains(&self, cylinder: u32) -> bool {
        (self.first_cylinder..=self.last_cylinder).contains(&cylinder)
    }
}

/// CHS layout of a volume. Linear block order is cylinder-major, then head,
/// then sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub min_cylinder: u32,
    pub max_cylinder: u32,
    pub min_head: u32,
    pub max_head: u32,
    pub zones: Vec<Zone>,
}

impl Geometry {
    /// Same sector count on every track. Cylinders and heads start at 0.
    pub fn uniform(cylinders: u32, heads: u32, sectors: u32, first_sector: u32) -> Result<Self> {
        if cylinders == 0 || heads == 0 || sectors == 0 {
            return Err(RelicError::InvalidGeometry(format!(
                "{}x{}x{} has an empty dimension",
                cylinders, heads, sectors
            )));
        }
        let last_sector = first_sector.checked_add(sectors - 1).ok_or_else(|| {
            RelicError::InvalidGeometry(format!("sectors {}+{} overflow", first_sector, sectors))
        })?;
        Self::zoned(0, heads, vec![Zone::new(0, cylinders - 1, first_sector, last_sector)])
    }

    /// Zoned layout starting at `min_cylinder`; zones must be contiguous.
    pub fn zoned(min_cylinder: u32, heads: u32, zones: Vec<Zone>) -> Result<Self> {
        if heads == 0 {
            return Err(RelicError::InvalidGeometry("no heads".to_string()));
        }
        let max_cylinder = zones.last().map_or(min_cylinder, |z| z.last_cylinder);
        let geometry = Self {
            min_cylinder,
            max_cylinder,
            min_head: 0,
            max_head: heads - 1,
            zones,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check that the zones cover `min_cylinder..=max_cylinder` exactly once
    /// and that the block count is representable.
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(RelicError::InvalidGeometry("no zones".to_string()));
        }
        if self.min_head > self.max_head {
            return Err(RelicError::InvalidGeometry(format!(
                "head range {}..{} is empty",
                self.min_head, self.max_head
            )));
        }
        let heads = self.heads();
        let mut expected = self.min_cylinder as u64;
        let mut total = 0u64;
        for zone in &self.zones {
            if zone.first_cylinder as u64 != expected {
                return Err(RelicError::InvalidGeometry(format!(
                    "zone starts at cylinder {}, expected {}",
                    zone.first_cylinder, expected
                )));
            }
            if zone.last_cylinder < zone.first_cylinder || zone.max_sector < zone.min_sector {
                return Err(RelicError::InvalidGeometry(format!("empty zone {:?}", zone)));
            }
            if zone.sectors() > MAX_SECTORS_PER_TRACK {
                return Err(RelicError::InvalidGeometry(format!(
                    "zone {:?} has more than {} sectors per track",
                    zone, MAX_SECTORS_PER_TRACK
                )));
            }
            total = zone
                .cylinders()
                .checked_mul(heads)
                .and_then(|tracks| tracks.checked_mul(zone.sectors()))
                .and_then(|blocks| total.checked_add(blocks))
                .ok_or_else(|| RelicError::InvalidGeometry("block count overflows".to_string()))?;
            expected = zone.last_cylinder as u64 + 1;
        }
        if expected != self.max_cylinder as u64 + 1 {
            return Err(RelicError::InvalidGeometry(format!(
                "zones end at cylinder {}, geometry ends at {}",
                expected - 1,
                self.max_cylinder
            )));
        }
        Ok(())
    }

    pub fn heads(&self) -> u64 {
        (self.max_head as u64 + 1).saturating_sub(self.min_head as u64)
    }

    pub fn cylinders(&self) -> u64 {
        (self.max_cylinder as u64 + 1).saturating_sub(self.min_cylinder as u64)
    }

    pub fn is_zoned(&self) -> bool {
        self.zones.len() > 1
    }

    fn zone(&self, cylinder: u32) -> Result<&Zone> {
        self.zones
            .iter()
            .find(|z| z.contains(cylinder))
            .ok_or_else(|| RelicError::out_of_range(cylinder, self.max_cylinder as u64 + 1))
    }

    pub fn min_sector(&self, cylinder: u32) -> Result<u32> {
        Ok(self.zone(cylinder)?.min_sector)
    }

    pub fn max_sector(&self, cylinder: u32) -> Result<u32> {
        Ok(self.zone(cylinder)?.max_sector)
    }

    pub fn sectors_per_track(&self, cylinder: u32) -> Result<u32> {
        let sectors = self.zone(cylinder)?.sectors();
        u32::try_from(sectors)
            .map_err(|_| RelicError::InvalidGeometry(format!("{} sectors per track", sectors)))
    }

    /// Saturates instead of overflowing on geometries `validate` rejects.
    pub fn block_count(&self) -> u64 {
        self.zones.iter().fold(0u64, |total, z| {
            let tracks = z.cylinders().saturating_mul(self.heads());
            total.saturating_add(tracks.saturating_mul(z.sectors()))
        })
    }

    /// Linear index of the first sector on a track.
    pub fn track_start(&self, cylinder: u32, head: u32) -> Result<u64> {
        if !(self.min_head..=self.max_head).contains(&head) {
            return Err(RelicError::out_of_range(head, self.max_head as u64 + 1));
        }
        let heads = self.heads();
        let mut start = 0u64;
        for zone in &self.zones {
            if zone.contains(cylinder) {
                let cyl_in_zone = (cylinder - zone.first_cylinder) as u64;
                let track = cyl_in_zone * heads + (head - self.min_head) as u64;
                return Ok(start + track * zone.sectors());
            }
            start += zone.cylinders() * heads * zone.sectors();
        }
        Err(RelicError::out_of_range(cylinder, self.max_cylinder as u64 + 1))
    }

    pub fn to_linear(&self, chs: Chs) -> Result<u64> {
        let zone = self.zone(chs.cylinder)?;
        if !(zone.min_sector..=zone.max_sector).contains(&chs.sector) {
            return Err(RelicError::out_of_range(chs.sector, zone.max_sector as u64 + 1));
        }
        Ok(self.track_start(chs.cylinder, chs.head)? + (chs.sector - zone.min_sector) as u64)
    }

    pub fn to_chs(&self, linear: u64) -> Result<Chs> {
        let heads = self.heads();
        let mut remaining = linear;
        for zone in &self.zones {
            let zone_blocks = zone.cylinders() * heads * zone.sectors();
            if remaining < zone_blocks {
                let track = remaining / zone.sectors();
                return Ok(Chs {
                    cylinder: zone.first_cylinder + (track / heads) as u32,
                    head: self.min_head + (track % heads) as u32,
                    sector: zone.min_sector + (remaining % zone.sectors()) as u32,
                });
            }
            remaining -= zone_blocks;
        }
        Err(RelicError::out_of_range(linear, self.block_count()))
    }
}

/// Soft-interleave parameters for an [`InterleavedVolume`](crate::InterleavedVolume).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterleaveSpec {
    pub interleave: u32,
    #[serde(default)]
    pub base_sector: u32,
    #[serde(default)]
    pub skew: u32,
    #[serde(default)]
    pub start_block: u64,
}

impl InterleaveSpec {
    /// Interleave must be at least 1 and remapping must begin on a track boundary.
    pub fn check(&self, geometry: &Geometry) -> Result<()> {
        if self.interleave == 0 {
            return Err(RelicError::InvalidGeometry("interleave must be at least 1".to_string()));
        }
        let count = geometry.block_count();
        if self.start_block > count {
            return Err(RelicError::InvalidGeometry(format!(
                "interleave start {} beyond {} blocks",
                self.start_block, count
            )));
        }
        if self.start_block < count {
            let chs = geometry.to_chs(self.start_block)?;
            if chs.sector != geometry.min_sector(chs.cylinder)? {
                return Err(RelicError::InvalidGeometry(format!(
                    "interleave start {} is mid-track at {}",
                    self.start_block, chs
                )));
            }
        }
        Ok(())
    }
}

/// A named, well-known media layout.
#[derive(Debug, Clone, Serialize)]
pub struct GeometryPreset {
    pub name: &'static str,
    pub description: &'static str,
    pub sector_size: usize,
    pub geometry: Geometry,
    pub interleave: Option<InterleaveSpec>,
    /// Image may carry one trailing error byte per sector (D64 style).
    pub error_table: bool,
}

impl GeometryPreset {
    pub fn image_size(&self) -> u64 {
        self.geometry.block_count() * self.sector_size as u64
    }

    pub fn matches_size(&self, len: u64) -> bool {
        len == self.image_size()
            || (self.error_table && len == self.image_size() + self.geometry.block_count())
    }
}

fn cbm_zones(tracks: u32) -> Vec<Zone> {
    let mut zones = vec![
        Zone::new(1, 17, 0, 20),
        Zone::new(18, 24, 0, 18),
        Zone::new(25, 30, 0, 17),
        Zone::new(31, 35, 0, 16),
    ];
    if tracks > 35 {
        zones.push(Zone::new(36, tracks, 0, 16));
    }
    zones
}

const DEC_RX_INTERLEAVE: InterleaveSpec = InterleaveSpec {
    interleave: 2,
    base_sector: 0,
    skew: 6,
    start_block: 26,
};

/// All built-in presets.
pub fn presets() -> Vec<GeometryPreset> {
    let uniform = |cylinders: u32, heads: u32, sectors: u32| Geometry {
        min_cylinder: 0,
        max_cylinder: cylinders - 1,
        min_head: 0,
        max_head: heads - 1,
        zones: vec![Zone::new(0, cylinders - 1, 1, sectors)],
    };
    let zoned = |tracks: u32| Geometry {
        min_cylinder: 1,
        max_cylinder: tracks,
        min_head: 0,
        max_head: 0,
        zones: cbm_zones(tracks),
    };
    vec![
        GeometryPreset {
            name: "cbm1541",
            description: "Commodore 1541, 35 zoned tracks",
            sector_size: 256,
            geometry: zoned(35),
            interleave: None,
            error_table: true,
        },
        GeometryPreset {
            name: "cbm1541-40",
            description: "Commodore 1541, 40 zoned tracks",
            sector_size: 256,
            geometry: zoned(40),
            interleave: None,
            error_table: true,
        },
        GeometryPreset {
            name: "rx01",
            description: "DEC RX01 8-inch single density",
            sector_size: 128,
            geometry: uniform(77, 1, 26),
            interleave: Some(DEC_RX_INTERLEAVE),
            error_table: false,
        },
        GeometryPreset {
            name: "rx02",
            description: "DEC RX02 8-inch double density",
            sector_size: 256,
            geometry: uniform(77, 1, 26),
            interleave: Some(DEC_RX_INTERLEAVE),
            error_table: false,
        },
        GeometryPreset {
            name: "pc360",
            description: "PC 5.25-inch 360K",
            sector_size: 512,
            geometry: uniform(40, 2, 9),
            interleave: None,
            error_table: false,
        },
        GeometryPreset {
            name: "pc1440",
            description: "PC 3.5-inch 1.44M",
            sector_size: 512,
            geometry: uniform(80, 2, 18),
            interleave: None,
            error_table: false,
        },
    ]
}

pub fn preset(name: &str) -> Option<GeometryPreset> {
    presets().into_iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

pub fn presets_for_size(len: u64) -> Vec<GeometryPreset> {
    presets().into_iter().filter(|p| p.matches_size(len)).collect()
}
