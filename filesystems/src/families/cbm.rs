// Commodore 1541 DOS (D64 images)
//
// 35 (or 40) zoned tracks of 256-byte sectors. Track 18 holds the BAM in
// sector 0 and the directory chain from sector 1.

use super::FamilyMetadata;
use log::{debug, trace};
use relic_core::{
    check_block_size, Block, Chs, DirEntry, FileSystem, FsKind, Probe, ProbeLevel, ProbeReport,
    RelicError, Result, Volume,
};
use static_assertions::const_assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

pub const CBM1541: FsKind = FsKind("cbm1541");

pub const SECTOR_SIZE: usize = 256;
pub const DIRECTORY_TRACK: u32 = 18;
pub const TRACKS: u32 = 35;
pub const EXTENDED_TRACKS: u32 = 40;
pub const BLOCKS: u64 = 683;
pub const EXTENDED_BLOCKS: u64 = 768;

const DOS_VERSION: u8 = b'A';
const BAM_ENTRIES: usize = 0x04;
const DISK_NAME: usize = 0x90;
const DISK_ID: usize = 0xA2;
const DOS_TYPE: usize = 0xA5;
/// SpeedDOS keeps the BAM of tracks 36-40 here.
const EXTENDED_BAM: usize = 0xC0;
const ENTRY_SIZE: usize = 32;

const_assert_eq!(ENTRY_SIZE * 8, SECTOR_SIZE);

/// Sectors on a 1-based track.
pub fn sectors_per_track(track: u32) -> Option<u32> {
    match track {
        1..=17 => Some(21),
        18..=24 => Some(19),
        25..=30 => Some(18),
        31..=40 => Some(17),
        _ => None,
    }
}

/// Linear D64 block number of a track/sector pair.
pub fn ts_block(track: u32, sector: u32) -> Option<u64> {
    let spt = sectors_per_track(track)?;
    if sector >= spt {
        return None;
    }
    let before: u64 = (1..track).filter_map(sectors_per_track).map(u64::from).sum();
    Some(before + sector as u64)
}

const_assert_eq!(17 * 21 + 7 * 19 + 6 * 18 + 5 * 17, BLOCKS as usize);

/// Read a track/sector, through the CHS facet when the volume has one.
fn read_ts(volume: &dyn Volume, track: u32, sector: u32) -> Result<Block<'_>> {
    if volume.geometry().is_some() {
        return volume.read_sector(Chs::new(track, 0, sector));
    }
    let block = ts_block(track, sector).ok_or_else(|| {
        RelicError::Corrupt(format!("track/sector {}/{} does not exist", track, sector))
    })?;
    volume.read_block(block)
}

/// Decode a PETSCII name field, stopping at shifted-space padding.
pub fn petscii_to_string(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|&&b| b != 0xA0)
        .map(|&b| match b {
            0x20..=0x5A => b as char,
            0xC1..=0xDA => (b - 0x80) as char,
            0x5B => '[',
            0x5D => ']',
            _ => '?',
        })
        .collect()
}

fn file_type_name(type_byte: u8) -> &'static str {
    match type_byte & 0x07 {
        0 => "DEL",
        1 => "SEQ",
        2 => "PRG",
        3 => "USR",
        4 => "REL",
        _ => "???",
    }
}

/// Facts read from the BAM sector.
struct Bam<'a> {
    block: Block<'a>,
    tracks: u32,
}

impl<'a> Bam<'a> {
    fn read(volume: &'a dyn Volume) -> Result<Option<Self>> {
        let block = read_ts(volume, DIRECTORY_TRACK, 0)?;
        if block.byte(0)? != DIRECTORY_TRACK as u8
            || block.byte(1)? != 1
            || block.byte(2)? != DOS_VERSION
        {
            return Ok(None);
        }
        let extended = volume.block_count() >= EXTENDED_BLOCKS
            && block.bytes(EXTENDED_BAM, 20)?.iter().any(|&b| b != 0);
        let tracks = if extended { EXTENDED_TRACKS } else { TRACKS };
        Ok(Some(Self { block, tracks }))
    }

    fn blocks(&self) -> u64 {
        if self.tracks == EXTENDED_TRACKS {
            EXTENDED_BLOCKS
        } else {
            BLOCKS
        }
    }

    /// Free count and bitmap for a track.
    fn track_entry(&self, track: u32) -> Result<(u8, u32)> {
        let offset = if track <= TRACKS {
            BAM_ENTRIES + 4 * (track as usize - 1)
        } else {
            EXTENDED_BAM + 4 * (track - TRACKS - 1) as usize
        };
        let bits = self.block.bytes(offset + 1, 3)?;
        let bitmap = u32::from(bits[0]) | u32::from(bits[1]) << 8 | u32::from(bits[2]) << 16;
        Ok((self.block.byte(offset)?, bitmap))
    }

    fn free_counts_consistent(&self) -> Result<bool> {
        for track in 1..=self.tracks {
            let spt = sectors_per_track(track).unwrap_or(17);
            let (free, bitmap) = self.track_entry(track)?;
            let mask = (1u32 << spt) - 1;
            if (bitmap & mask).count_ones() != u32::from(free) {
                trace!(
                    "BAM track {} claims {} free, bitmap has {}",
                    track,
                    free,
                    (bitmap & mask).count_ones()
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Sectors of the directory chain, in order. `None` if the chain leaves
/// track 18, loops, or names a sector that does not exist.
fn directory_chain(volume: &dyn Volume) -> Result<Option<Vec<u32>>> {
    let directory_sectors = sectors_per_track(DIRECTORY_TRACK).unwrap_or(19);
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let (mut track, mut sector) = (DIRECTORY_TRACK, 1u32);
    loop {
        if track != DIRECTORY_TRACK
            || sector >= directory_sectors
            || sector == 0
            || !seen.insert(sector)
        {
            return Ok(None);
        }
        chain.push(sector);
        let block = read_ts(volume, track, sector)?;
        let next_track = block.byte(0)? as u32;
        if next_track == 0 {
            return Ok(Some(chain));
        }
        track = next_track;
        sector = block.byte(1)? as u32;
    }
}

/// Directory entries that are in use, with their raw 32-byte records.
fn directory_records(volume: &dyn Volume, chain: &[u32]) -> Result<Vec<Vec<u8>>> {
    let mut records = Vec::new();
    for &sector in chain {
        let block = read_ts(volume, DIRECTORY_TRACK, sector)?;
        for slot in 0..SECTOR_SIZE / ENTRY_SIZE {
            let record = block.bytes(slot * ENTRY_SIZE, ENTRY_SIZE)?;
            if record[2] != 0 {
                records.push(record.to_vec());
            }
        }
    }
    Ok(records)
}

/// Probe for 1541 DOS volumes.
pub struct CbmProbe;

impl CbmProbe {
    fn shape(volume: Option<&dyn Volume>) -> ProbeReport {
        let report = check_block_size(CBM1541, volume, SECTOR_SIZE);
        match volume.and_then(|v| v.geometry()) {
            Some(g) if report.passed => {
                let fits = g.min_cylinder == 1
                    && g.sectors_per_track(DIRECTORY_TRACK).ok() == Some(19);
                if fits {
                    report
                } else {
                    ProbeReport::wrong_shape(CBM1541, SECTOR_SIZE)
                }
            }
            _ => report,
        }
    }
}

impl Probe for CbmProbe {
    fn family(&self) -> FsKind {
        CBM1541
    }

    fn probe(&self, volume: Option<&dyn Volume>, level: ProbeLevel) -> Result<ProbeReport> {
        if level == ProbeLevel::Shape {
            return Ok(Self::shape(volume));
        }
        let Some(volume) = volume else {
            return Ok(ProbeReport::fail(CBM1541));
        };

        match level {
            ProbeLevel::Shape | ProbeLevel::Boot | ProbeLevel::FileHeader => {
                Ok(ProbeReport::pass_through(CBM1541))
            }
            ProbeLevel::Home => Ok(match Bam::read(volume)? {
                Some(bam) => ProbeReport::pass(CBM1541, bam.blocks()),
                None => ProbeReport::fail(CBM1541),
            }),
            ProbeLevel::Directory => Ok(match directory_chain(volume)? {
                Some(chain) => {
                    debug!("1541 directory chain {:?}", chain);
                    ProbeReport::pass_through(CBM1541)
                }
                None => ProbeReport::fail(CBM1541),
            }),
            ProbeLevel::HeaderAllocation => {
                let Some(chain) = directory_chain(volume)? else {
                    return Ok(ProbeReport::fail(CBM1541));
                };
                let tracks = Bam::read(volume)?.map_or(TRACKS, |b| b.tracks);
                for record in directory_records(volume, &chain)? {
                    let (track, sector) = (record[3] as u32, record[4] as u32);
                    let in_range = track <= tracks && ts_block(track, sector).is_some();
                    // DEL entries may carry a zero link
                    if !in_range && record[2] & 0x07 != 0 {
                        return Ok(ProbeReport::fail(CBM1541));
                    }
                }
                Ok(ProbeReport::pass_through(CBM1541))
            }
            ProbeLevel::DataAllocation => {
                let Some(bam) = Bam::read(volume)? else {
                    return Ok(ProbeReport::fail(CBM1541));
                };
                Ok(if bam.free_counts_consistent()? {
                    ProbeReport::pass(CBM1541, bam.blocks())
                } else {
                    ProbeReport::fail(CBM1541)
                })
            }
        }
    }
}

/// Read-only browser for 1541 volumes.
pub struct CbmFileSystem {
    volume: Arc<dyn Volume>,
}

impl CbmFileSystem {
    pub fn new(volume: Arc<dyn Volume>) -> Result<Self> {
        if Bam::read(volume.as_ref())?.is_none() {
            return Err(RelicError::Corrupt(format!("{}: no 1541 BAM at 18/0", volume.source())));
        }
        Ok(Self { volume })
    }

    pub fn disk_id(&self) -> Result<String> {
        let bam = read_ts(self.volume.as_ref(), DIRECTORY_TRACK, 0)?;
        Ok(petscii_to_string(bam.bytes(DISK_ID, 2)?))
    }

    pub fn dos_type(&self) -> Result<String> {
        let bam = read_ts(self.volume.as_ref(), DIRECTORY_TRACK, 0)?;
        Ok(petscii_to_string(bam.bytes(DOS_TYPE, 2)?))
    }
}

impl FileSystem for CbmFileSystem {
    fn kind(&self) -> FsKind {
        CBM1541
    }

    fn volume(&self) -> &Arc<dyn Volume> {
        &self.volume
    }

    fn label(&self) -> Option<String> {
        let bam = read_ts(self.volume.as_ref(), DIRECTORY_TRACK, 0).ok()?;
        Some(petscii_to_string(bam.bytes(DISK_NAME, 16).ok()?))
    }

    fn entries(&self) -> Result<Vec<DirEntry>> {
        let chain = directory_chain(self.volume.as_ref())?
            .ok_or_else(|| RelicError::Corrupt("1541 directory chain is broken".to_string()))?;
        let records = directory_records(self.volume.as_ref(), &chain)?;
        Ok(records
            .iter()
            .map(|record| {
                let mut file_type = file_type_name(record[2]).to_string();
                if record[2] & 0x80 == 0 {
                    file_type.push('*');
                }
                if record[2] & 0x40 != 0 {
                    file_type.push('<');
                }
                DirEntry {
                    name: petscii_to_string(&record[5..21]),
                    file_type,
                    start_block: ts_block(record[3] as u32, record[4] as u32),
                    size_blocks: u64::from(u16::from_le_bytes([record[30], record[31]])),
                }
            })
            .collect())
    }
}

pub fn metadata() -> FamilyMetadata {
    FamilyMetadata {
        kind: CBM1541,
        description: "Commodore 1541 DOS 2.6",
        era_start: 1982,
        block_size: SECTOR_SIZE,
        typical_media: &["5.25-inch GCR floppy", "D64 image"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_block_layout() {
        assert_eq!(ts_block(1, 0), Some(0));
        assert_eq!(ts_block(18, 0), Some(357));
        assert_eq!(ts_block(18, 1), Some(358));
        assert_eq!(ts_block(35, 16), Some(BLOCKS - 1));
        assert_eq!(ts_block(40, 16), Some(EXTENDED_BLOCKS - 1));
        assert_eq!(ts_block(18, 19), None);
        assert_eq!(ts_block(0, 0), None);
        assert_eq!(ts_block(41, 0), None);
    }

    #[test]
    fn test_petscii_names() {
        assert_eq!(petscii_to_string(b"HELLO\xa0\xa0\xa0"), "HELLO");
        assert_eq!(petscii_to_string(&[0xC1, 0xC2, 0x31]), "AB1");
        assert_eq!(petscii_to_string(&[0x01]), "?");
    }

    #[test]
    fn test_file_type_names() {
        assert_eq!(file_type_name(0x82), "PRG");
        assert_eq!(file_type_name(0x81), "SEQ");
        assert_eq!(file_type_name(0x00), "DEL");
    }

    #[test]
    fn test_static_shape_query() {
        let report = CbmProbe.requirements().unwrap();
        assert!(!report.passed);
        assert_eq!(report.size, Some(SECTOR_SIZE as u64));
    }
}
