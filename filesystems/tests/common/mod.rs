// Synthetic disk images for integration tests

#![allow(dead_code)]

use byteorder::{ByteOrder, LittleEndian};
use relic_filesystems::families::cbm;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A file to place on a synthetic D64: (name, type byte, track, sector).
pub struct CbmFile {
    pub name: &'static str,
    pub file_type: u8,
    pub track: u8,
    pub sector: u8,
}

/// 35-track D64 with a consistent BAM and one directory sector.
pub fn build_d64(label: &str, files: &[CbmFile]) -> Vec<u8> {
    let mut image = vec![0u8; cbm::BLOCKS as usize * cbm::SECTOR_SIZE];
    let offset = |track: u8, sector: u8| {
        cbm::ts_block(track as u32, sector as u32).unwrap() as usize * cbm::SECTOR_SIZE
    };

    let mut used: Vec<(u8, u8)> = vec![(18, 0), (18, 1)];
    used.extend(files.iter().map(|f| (f.track, f.sector)));

    let bam = offset(18, 0);
    image[bam] = 18;
    image[bam + 1] = 1;
    image[bam + 2] = b'A';
    for track in 1..=35u8 {
        let spt = cbm::sectors_per_track(track as u32).unwrap() as u8;
        let mut bitmap = 0u32;
        for sector in 0..spt {
            if !used.contains(&(track, sector)) {
                bitmap |= 1 << sector;
            }
        }
        let entry = bam + 4 * track as usize;
        image[entry] = bitmap.count_ones() as u8;
        image[entry + 1] = bitmap as u8;
        image[entry + 2] = (bitmap >> 8) as u8;
        image[entry + 3] = (bitmap >> 16) as u8;
    }
    fill_petscii(&mut image[bam + 0x90..bam + 0xA0], label);
    image[bam + 0xA0] = 0xA0;
    image[bam + 0xA1] = 0xA0;
    image[bam + 0xA2..bam + 0xA4].copy_from_slice(b"01");
    image[bam + 0xA4] = 0xA0;
    image[bam + 0xA5..bam + 0xA7].copy_from_slice(b"2A");

    let dir = offset(18, 1);
    image[dir] = 0;
    image[dir + 1] = 0xFF;
    for (slot, file) in files.iter().enumerate() {
        let record = dir + slot * 32;
        image[record + 2] = file.file_type;
        image[record + 3] = file.track;
        image[record + 4] = file.sector;
        fill_petscii(&mut image[record + 5..record + 21], file.name);
        image[record + 30] = 1;
    }
    image
}

fn fill_petscii(field: &mut [u8], text: &str) {
    field.fill(0xA0);
    field[..text.len()].copy_from_slice(text.as_bytes());
}

const RAD50: &str = " ABCDEFGHIJKLMNOPQRSTUVWXYZ$.%0123456789";

pub fn rad50(text: &str) -> u16 {
    let mut padded: Vec<char> = text.chars().collect();
    padded.resize(3, ' ');
    padded
        .iter()
        .fold(0u16, |acc, &c| acc * 40 + RAD50.find(c).unwrap() as u16)
}

pub const RT11_DIRECTORY_START: u16 = 6;

/// RT-11 volume of `total_blocks` 512-byte blocks with four directory
/// segments (only the first in use), the given permanent files, and one
/// empty area covering the rest.
pub fn build_rt11(total_blocks: u16, directory_start: u16, files: &[(&str, &str, u16)]) -> Vec<u8> {
    let mut image = vec![0u8; total_blocks as usize * 512];

    let home = 512;
    LittleEndian::write_u16(&mut image[home + 0o722..], 1);
    LittleEndian::write_u16(&mut image[home + 0o724..], directory_start);
    LittleEndian::write_u16(&mut image[home + 0o726..], rad50("V05"));
    image[home + 0o730..home + 0o744].copy_from_slice(b"RT11A       ");
    image[home + 0o744..home + 0o760].copy_from_slice(b"TESTER      ");
    image[home + 0o760..home + 0o774].copy_from_slice(b"DECRT11A    ");

    let segments = 4u16;
    let data_start = directory_start + 2 * segments;
    let dir = directory_start as usize * 512;
    for (i, value) in [segments, 0, 1, 0, data_start].into_iter().enumerate() {
        LittleEndian::write_u16(&mut image[dir + i * 2..], value);
    }

    let mut entry = dir + 10;
    let mut used = data_start;
    for &(name, ext, length) in files {
        let (first, second) = name.split_at(name.len().min(3));
        LittleEndian::write_u16(&mut image[entry..], 0o2000);
        LittleEndian::write_u16(&mut image[entry + 2..], rad50(first));
        LittleEndian::write_u16(&mut image[entry + 4..], rad50(second));
        LittleEndian::write_u16(&mut image[entry + 6..], rad50(ext));
        LittleEndian::write_u16(&mut image[entry + 8..], length);
        entry += 14;
        used += length;
    }
    LittleEndian::write_u16(&mut image[entry..], 0o1000);
    LittleEndian::write_u16(&mut image[entry + 2..], rad50("EMP"));
    LittleEndian::write_u16(&mut image[entry + 4..], rad50("TY"));
    LittleEndian::write_u16(&mut image[entry + 6..], rad50("FIL"));
    LittleEndian::write_u16(&mut image[entry + 8..], total_blocks - used);
    LittleEndian::write_u16(&mut image[entry + 14..], 0o4000);
    image
}
