// Undo a soft sector interleave imposed on top of the physical layout

use super::Volume;
use crate::block::Block;
use crate::error::{RelicError, Result};
use crate::geometry::{Chs, Geometry, InterleaveSpec};
use std::sync::Arc;

/// Presents the sectors of each track in logical order.
///
/// Logical sector `n` of a track sits in the physical slot reached by walking
/// from the track's starting slot in steps of `interleave`, sliding forward on
/// collision. The starting slot is `base_sector + skew * (cyl - c0)` mod the
/// track length, where `c0` is the cylinder holding `start_block`. Blocks
/// below `start_block` pass through untouched.
#[derive(Debug, Clone)]
pub struct InterleavedVolume {
    inner: Arc<dyn Volume>,
    spec: InterleaveSpec,
    first_cylinder: u32,
}

impl InterleavedVolume {
    pub fn new(inner: Arc<dyn Volume>, spec: InterleaveSpec) -> Result<Self> {
        let geometry = inner.geometry().ok_or_else(|| {
            RelicError::InvalidInput(format!(
                "{} has no CHS geometry to de-interleave",
                inner.source()
            ))
        })?;
        spec.check(geometry)
            .map_err(|e| RelicError::InvalidInput(format!("{}: {}", inner.source(), e)))?;
        let count = inner.block_count();
        let first_cylinder = if spec.start_block < count {
            geometry.to_chs(spec.start_block)?.cylinder
        } else {
            geometry.max_cylinder
        };
        Ok(Self { inner, spec, first_cylinder })
    }

    pub fn spec(&self) -> InterleaveSpec {
        self.spec
    }

    fn chs_geometry(&self) -> Result<&Geometry> {
        self.inner
            .geometry()
            .ok_or_else(|| RelicError::Other("underlying volume lost its geometry".to_string()))
    }

    /// Logical-to-physical slot table for one track of `cylinder`.
    fn track_table(&self, cylinder: u32) -> Result<Vec<u32>> {
        let n = self.chs_geometry()?.sectors_per_track(cylinder)? as u64;
        let rotation = self.spec.base_sector as u64
            + self.spec.skew as u64 * cylinder.saturating_sub(self.first_cylinder) as u64;
        let step = self.spec.interleave as u64;

        let mut used = vec![false; n as usize];
        let mut table = Vec::with_capacity(n as usize);
        let mut cursor = rotation % n;
        for _ in 0..n {
            while used[cursor as usize] {
                cursor = (cursor + 1) % n;
            }
            used[cursor as usize] = true;
            table.push(cursor as u32);
            cursor = (cursor + step) % n;
        }
        Ok(table)
    }

    /// Physical slot (0-based within the track) holding logical slot `logical`.
    pub fn physical_slot(&self, cylinder: u32, logical: u32) -> Result<u32> {
        let table = self.track_table(cylinder)?;
        table
            .get(logical as usize)
            .copied()
            .ok_or_else(|| RelicError::out_of_range(logical, table.len()))
    }

    /// Logical slot stored in physical slot `physical`.
    pub fn logical_slot(&self, cylinder: u32, physical: u32) -> Result<u32> {
        let table = self.track_table(cylinder)?;
        table
            .iter()
            .position(|&p| p == physical)
            .map(|l| l as u32)
            .ok_or_else(|| RelicError::out_of_range(physical, table.len()))
    }
}

impl Volume for InterleavedVolume {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn block_count(&self) -> u64 {
        self.inner.block_count()
    }

    fn source(&self) -> &str {
        self.inner.source()
    }

    fn info(&self) -> String {
        format!(
            "interleave {}:1 skew {} from block {} over [{}]",
            self.spec.interleave,
            self.spec.skew,
            self.spec.start_block,
            self.inner.info()
        )
    }

    fn read_block(&self, index: u64) -> Result<Block<'_>> {
        let count = self.block_count();
        if index >= count {
            return Err(RelicError::out_of_range(index, count));
        }
        if index < self.spec.start_block {
            return self.inner.read_block(index);
        }
        let geometry = self.chs_geometry()?;
        let chs = geometry.to_chs(index)?;
        let min_sector = geometry.min_sector(chs.cylinder)?;
        let slot = self.physical_slot(chs.cylinder, chs.sector - min_sector)?;
        let physical = Chs::new(chs.cylinder, chs.head, min_sector + slot);
        Ok(self.inner.read_sector(physical)?.at(index))
    }

    fn geometry(&self) -> Option<&Geometry> {
        self.inner.geometry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::test_support::numbered_chs;
    use crate::volume::VolumeVariant;

    fn spec(interleave: u32, skew: u32, start_block: u64) -> InterleaveSpec {
        InterleaveSpec {
            interleave,
            base_sector: 0,
            skew,
            start_block,
        }
    }

    #[test]
    fn test_two_to_one_visiting_order() {
        let raw = numbered_chs(Geometry::uniform(1, 1, 10, 0).unwrap(), 4);
        let view = InterleavedVolume::new(raw.clone(), spec(2, 0, 0)).unwrap();

        let visiting: Vec<u32> = (0..10).map(|p| view.logical_slot(0, p).unwrap()).collect();
        assert_eq!(visiting, vec![0, 5, 1, 6, 2, 7, 3, 8, 4, 9]);

        // Marker written at raw physical sector p is seen at the logical
        // position that slot maps to.
        for physical in 0..10u64 {
            let logical = view.logical_slot(0, physical as u32).unwrap() as u64;
            let through_view = view.read_block(logical).unwrap();
            let raw_block = raw.read_block(physical).unwrap();
            assert_eq!(through_view.byte(0).unwrap(), physical as u8);
            assert_eq!(through_view.as_slice(), raw_block.as_slice());
            assert_eq!(through_view.offset(), logical);
        }
    }

    #[test]
    fn test_rx01_skew_matches_controller_formula() {
        // RT-11 on RX01: 2:1 interleave, 6 sector skew per track, track 0 untouched.
        let geometry = Geometry::uniform(77, 1, 26, 1).unwrap();
        let raw = numbered_chs(geometry, 1);
        let view = InterleavedVolume::new(raw, spec(2, 6, 26)).unwrap();

        for track in 1..77u32 {
            for s in 0..26u32 {
                let expected = (2 * s + u32::from(s >= 13) + 6 * (track - 1)) % 26;
                let slot = view.physical_slot(track, s).unwrap();
                assert_eq!(slot, expected, "track {} sector {}", track, s);
            }
        }
    }

    #[test]
    fn test_start_block_passes_through() {
        let geometry = Geometry::uniform(3, 1, 10, 1).unwrap();
        let raw = numbered_chs(geometry, 2);
        let view = InterleavedVolume::new(raw.clone(), spec(3, 0, 10)).unwrap();

        for index in 0..10 {
            assert_eq!(view.read_block(index).unwrap(), raw.read_block(index).unwrap());
        }
        // Logical sector 1 of track 1 lives three slots on.
        assert_eq!(view.read_block(11).unwrap().byte(0).unwrap(), 13);
        assert_eq!(view.variant(), VolumeVariant::Chs);
        assert!(view.read_block(30).is_err());
    }

    #[test]
    fn test_interleave_one_is_identity() {
        let raw = numbered_chs(Geometry::uniform(2, 2, 5, 0).unwrap(), 2);
        let view = InterleavedVolume::new(raw.clone(), spec(1, 0, 0)).unwrap();
        for index in 0..raw.block_count() {
            let seen = view.read_block(index).unwrap();
            let expected = raw.read_block(index).unwrap();
            assert_eq!(seen.as_slice(), expected.as_slice());
        }
    }

    #[test]
    fn test_mid_track_start_is_rejected() {
        let raw = numbered_chs(Geometry::uniform(2, 1, 10, 0).unwrap(), 2);
        assert!(matches!(
            InterleavedVolume::new(raw.clone(), spec(2, 0, 5)),
            Err(RelicError::InvalidInput(_))
        ));

        // a track-aligned start keeps every physical sector reachable exactly once
        let view = InterleavedVolume::new(raw, spec(2, 0, 10)).unwrap();
        let mut seen: Vec<u8> = (0..20)
            .map(|i| view.read_block(i).unwrap().byte(0).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<u8>>());
    }

    #[test]
    fn test_requires_chs_volume() {
        let linear = crate::volume::test_support::numbered_image(10, 2);
        assert!(matches!(
            InterleavedVolume::new(linear, spec(2, 0, 0)),
            Err(RelicError::InvalidInput(_))
        ));
        let raw = numbered_chs(Geometry::uniform(1, 1, 10, 0).unwrap(), 2);
        assert!(InterleavedVolume::new(raw, spec(0, 0, 0)).is_err());
    }
}
