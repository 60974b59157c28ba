// DEC RT-11 file structure
//
// Contiguous files described by a chain of two-block directory segments.
// The volume size is not recorded anywhere: it is the data start of the
// last segment plus the lengths of every entry in it, empty areas included.
// The home block carries no size either, so a size is first reported at the
// Directory level.

use super::FamilyMetadata;
use log::{debug, trace};
use relic_core::{
    check_block_size, Block, DirEntry, FileSystem, FsKind, Probe, ProbeLevel, ProbeReport,
    RelicError, Result, Volume,
};
use std::collections::HashSet;
use std::sync::Arc;

pub const RT11: FsKind = FsKind("rt11");

pub const BLOCK_SIZE: usize = 512;
pub const HOME_BLOCK: u64 = 1;
pub const DEFAULT_DIRECTORY_START: u64 = 6;
pub const MAX_SEGMENTS: u16 = 31;

// Home block fields (octal offsets as documented by DEC)
const H_CLUSTER_SIZE: usize = 0o722;
const H_DIRECTORY_START: usize = 0o724;
const H_SYSTEM_VERSION: usize = 0o726;
const H_VOLUME_ID: usize = 0o730;
const H_OWNER: usize = 0o744;
const H_SYSTEM_ID: usize = 0o760;
const SYSTEM_ID: &[u8; 8] = b"DECRT11A";

const SEGMENT_BLOCKS: u64 = 2;
const SEGMENT_HEADER: usize = 10;
const ENTRY_BASE: usize = 14;

// Entry status bits
const E_TENT: u16 = 0o400;
const E_MPTY: u16 = 0o1000;
const E_PERM: u16 = 0o2000;
const E_EOS: u16 = 0o4000;
const E_TYPE_MASK: u16 = E_TENT | E_MPTY | E_PERM;

const RAD50: &[u8; 40] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ$.%0123456789";

/// Decode one RAD-50 word into three characters.
pub fn rad50_word(word: u16) -> String {
    let mut chars = [b' '; 3];
    let mut rest = word as usize;
    for slot in chars.iter_mut().rev() {
        *slot = RAD50[rest % 40];
        rest /= 40;
    }
    if rest != 0 {
        return "???".to_string();
    }
    String::from_utf8_lossy(&chars).into_owned()
}

/// `NAME.EXT` from the three RAD-50 name words.
pub fn rad50_filename(words: [u16; 3]) -> String {
    let name = format!("{}{}", rad50_word(words[0]), rad50_word(words[1]));
    let ext = rad50_word(words[2]);
    format!("{}.{}", name.trim_end(), ext.trim_end())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    Tentative,
    Empty,
    Permanent,
    Invalid,
}

impl EntryStatus {
    fn from_word(status: u16) -> Self {
        match status & E_TYPE_MASK {
            E_TENT => EntryStatus::Tentative,
            E_MPTY => EntryStatus::Empty,
            E_PERM => EntryStatus::Permanent,
            _ => EntryStatus::Invalid,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    status: EntryStatus,
    name: [u16; 3],
    length: u64,
    start_block: u64,
}

#[derive(Debug, Clone)]
struct Segment {
    number: u16,
    data_start: u64,
    entries: Vec<Entry>,
}

impl Segment {
    fn end_block(&self) -> u64 {
        self.data_start + self.entries.iter().map(|e| e.length).sum::<u64>()
    }
}

/// Parsed directory. Structural problems (bad headers, loops, unterminated
/// segments) make parsing fail; softer inconsistencies are kept for the
/// higher probe levels to judge.
#[derive(Debug, Clone)]
struct Directory {
    total_segments: u16,
    directory_start: u64,
    segments: Vec<Segment>,
}

impl Directory {
    fn volume_size(&self) -> u64 {
        self.segments.iter().map(Segment::end_block).max().unwrap_or(0)
    }

    fn statuses_valid(&self) -> bool {
        self.segments
            .iter()
            .flat_map(|s| &s.entries)
            .all(|e| e.status != EntryStatus::Invalid)
    }

    /// Each segment's data picks up where the previous one ended.
    fn contiguous(&self) -> bool {
        let mut ordered: Vec<&Segment> = self.segments.iter().collect();
        ordered.sort_by_key(|s| s.data_start);
        let first_data = self.directory_start + self.total_segments as u64 * SEGMENT_BLOCKS;
        if ordered.first().map(|s| s.data_start) != Some(first_data) {
            return false;
        }
        ordered.windows(2).all(|pair| pair[0].end_block() == pair[1].data_start)
    }
}

fn read_home(volume: &dyn Volume) -> Result<Block<'_>> {
    volume.read_block(HOME_BLOCK)
}

/// First directory block named by the home block, if it is an RT-11 home block.
fn home_directory_start(home: &Block<'_>) -> Result<Option<u64>> {
    if home.bytes(H_SYSTEM_ID, SYSTEM_ID.len())? != SYSTEM_ID {
        return Ok(None);
    }
    let start = match home.u16_le(H_DIRECTORY_START)? as u64 {
        0 => DEFAULT_DIRECTORY_START,
        start => start,
    };
    // boot block and home block come first
    if start <= HOME_BLOCK {
        return Ok(None);
    }
    Ok(Some(start))
}

fn read_segment_bytes(volume: &dyn Volume, directory_start: u64, number: u16) -> Result<Vec<u8>> {
    let first = directory_start + (number as u64 - 1) * SEGMENT_BLOCKS;
    let mut bytes = Vec::with_capacity(BLOCK_SIZE * SEGMENT_BLOCKS as usize);
    for block in first..first + SEGMENT_BLOCKS {
        bytes.extend_from_slice(volume.read_block(block)?.as_slice());
    }
    Ok(bytes)
}

fn word(bytes: &[u8], offset: usize) -> Option<u16> {
    bytes.get(offset..offset + 2).map(|w| u16::from_le_bytes([w[0], w[1]]))
}

fn parse_directory(volume: &dyn Volume, directory_start: u64) -> Result<Option<Directory>> {
    let mut segments = Vec::new();
    let mut seen = HashSet::new();
    let mut total_segments = 0u16;
    let mut number = 1u16;

    loop {
        if !seen.insert(number) {
            trace!("RT-11 segment chain loops at {}", number);
            return Ok(None);
        }
        let bytes = read_segment_bytes(volume, directory_start, number)?;
        let header = |i: usize| word(&bytes, i * 2).unwrap_or(0);
        let (total, next, extra, data_start) = (header(0), header(1), header(3), header(4) as u64);
        if number == 1 {
            total_segments = total;
        }
        let highest = header(2);
        if total == 0
            || total > MAX_SEGMENTS
            || total != total_segments
            || next > total
            || extra % 2 != 0
            || (number == 1 && (highest == 0 || highest > total))
        {
            trace!("RT-11 segment {} header rejected: {:?}", number, (total, next, highest, extra));
            return Ok(None);
        }

        let stride = ENTRY_BASE + extra as usize;
        let mut entries = Vec::new();
        let mut offset = SEGMENT_HEADER;
        let mut block = data_start;
        let mut terminated = false;
        while let Some(status) = word(&bytes, offset) {
            if status & E_EOS != 0 {
                terminated = true;
                break;
            }
            if offset + stride > bytes.len() {
                break;
            }
            let name = [
                word(&bytes, offset + 2).unwrap_or(0),
                word(&bytes, offset + 4).unwrap_or(0),
                word(&bytes, offset + 6).unwrap_or(0),
            ];
            let length = word(&bytes, offset + 8).unwrap_or(0) as u64;
            entries.push(Entry {
                status: EntryStatus::from_word(status),
                name,
                length,
                start_block: block,
            });
            block += length;
            offset += stride;
        }
        if !terminated {
            trace!("RT-11 segment {} has no end-of-segment marker", number);
            return Ok(None);
        }

        segments.push(Segment { number, data_start, entries });
        if next == 0 {
            break;
        }
        number = next;
    }

    Ok(Some(Directory {
        total_segments,
        directory_start,
        segments,
    }))
}

fn read_directory(volume: &dyn Volume) -> Result<Option<Directory>> {
    let home = read_home(volume)?;
    match home_directory_start(&home)? {
        Some(start) => parse_directory(volume, start),
        None => Ok(None),
    }
}

/// Probe for RT-11 volumes.
pub struct Rt11Probe;

impl Probe for Rt11Probe {
    fn family(&self) -> FsKind {
        RT11
    }

    fn probe(&self, volume: Option<&dyn Volume>, level: ProbeLevel) -> Result<ProbeReport> {
        if level == ProbeLevel::Shape {
            return Ok(check_block_size(RT11, volume, BLOCK_SIZE));
        }
        let Some(volume) = volume else {
            return Ok(ProbeReport::fail(RT11));
        };

        match level {
            // no boot block on non-system volumes, no file headers at all
            ProbeLevel::Shape | ProbeLevel::Boot | ProbeLevel::FileHeader => {
                Ok(ProbeReport::pass_through(RT11))
            }
            ProbeLevel::Home => {
                let home = read_home(volume)?;
                Ok(match home_directory_start(&home)? {
                    Some(_) => ProbeReport::pass_through(RT11),
                    None => ProbeReport::fail(RT11),
                })
            }
            ProbeLevel::Directory => Ok(match read_directory(volume)? {
                Some(directory) => {
                    debug!(
                        "RT-11 directory: {} of {} segments, {} blocks",
                        directory.segments.len(),
                        directory.total_segments,
                        directory.volume_size()
                    );
                    ProbeReport::pass(RT11, directory.volume_size())
                }
                None => ProbeReport::fail(RT11),
            }),
            ProbeLevel::HeaderAllocation => Ok(match read_directory(volume)? {
                Some(directory) if directory.statuses_valid() => {
                    ProbeReport::pass(RT11, directory.volume_size())
                }
                _ => ProbeReport::fail(RT11),
            }),
            ProbeLevel::DataAllocation => Ok(match read_directory(volume)? {
                Some(directory) if directory.statuses_valid() && directory.contiguous() => {
                    ProbeReport::pass(RT11, directory.volume_size())
                }
                _ => ProbeReport::fail(RT11),
            }),
        }
    }
}

/// Read-only browser for RT-11 volumes.
pub struct Rt11FileSystem {
    volume: Arc<dyn Volume>,
    directory: Directory,
}

impl Rt11FileSystem {
    pub fn new(volume: Arc<dyn Volume>) -> Result<Self> {
        let directory = read_directory(volume.as_ref())?
            .ok_or_else(|| {
                RelicError::Corrupt(format!("{}: no RT-11 directory", volume.source()))
            })?;
        Ok(Self { volume, directory })
    }

    pub fn pack_cluster_size(&self) -> Result<u16> {
        read_home(self.volume.as_ref())?.u16_le(H_CLUSTER_SIZE)
    }

    pub fn system_version(&self) -> Result<String> {
        Ok(rad50_word(read_home(self.volume.as_ref())?.u16_le(H_SYSTEM_VERSION)?))
    }

    pub fn owner(&self) -> Result<String> {
        read_home(self.volume.as_ref())?.string(H_OWNER, 12)
    }

    /// Blocks not allocated to permanent or tentative files.
    pub fn free_blocks(&self) -> u64 {
        self.directory
            .segments
            .iter()
            .flat_map(|s| &s.entries)
            .filter(|e| e.status == EntryStatus::Empty)
            .map(|e| e.length)
            .sum()
    }

    pub fn segments_in_use(&self) -> Vec<u16> {
        self.directory.segments.iter().map(|s| s.number).collect()
    }
}

impl FileSystem for Rt11FileSystem {
    fn kind(&self) -> FsKind {
        RT11
    }

    fn volume(&self) -> &Arc<dyn Volume> {
        &self.volume
    }

    fn label(&self) -> Option<String> {
        read_home(self.volume.as_ref()).ok()?.string(H_VOLUME_ID, 12).ok()
    }

    fn entries(&self) -> Result<Vec<DirEntry>> {
        Ok(self
            .directory
            .segments
            .iter()
            .flat_map(|s| &s.entries)
            .filter_map(|e| {
                let file_type = match e.status {
                    EntryStatus::Permanent => "permanent",
                    EntryStatus::Tentative => "tentative",
                    EntryStatus::Empty | EntryStatus::Invalid => return None,
                };
                Some(DirEntry {
                    name: rad50_filename(e.name),
                    file_type: file_type.to_string(),
                    start_block: Some(e.start_block),
                    size_blocks: e.length,
                })
            })
            .collect())
    }
}

pub fn metadata() -> FamilyMetadata {
    FamilyMetadata {
        kind: RT11,
        description: "DEC RT-11 file structure",
        era_start: 1973,
        block_size: BLOCK_SIZE,
        typical_media: &["RX01/RX02 8-inch floppy", "RK05 cartridge", "RL01/RL02"],
    }
}
