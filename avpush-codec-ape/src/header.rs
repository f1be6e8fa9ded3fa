// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed `"MAC "` descriptor/header pair and the seek table that follows it.
//!
//! Only the "new" header shape (format version 3.98 and later, where the descriptor and header
//! are two separate fixed-size structs) is modeled; older Monkey's Audio versions folded both
//! into one struct with a different field layout and are out of scope.

use avpush_core::errors::{bad_magic, corrupt, unsupported, Result};

const DESC_LEN: usize = 56;
const HDR_LEN: usize = 24;
/// Bytes gathered up front to read the descriptor and header in one shot: real-world encoders
/// always size both structs exactly this way, so this is also the minimum valid APE file size.
pub const APE_HDR_MIN: usize = DESC_LEN + HDR_LEN;
const MIN_VERSION: u16 = 3980;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApeInfo {
    pub version: u16,
    pub seekpoints: u32,
    pub block_samples: u32,
    pub lastframe_blocks: u32,
    pub total_frames: u32,
    pub bits_per_sample: u8,
    pub channels: u8,
    pub sample_rate: u32,
}

impl ApeInfo {
    pub fn total_samples(&self) -> u64 {
        if self.total_frames == 0 {
            0
        }
        else {
            (self.total_frames as u64 - 1) * self.block_samples as u64 + self.lastframe_blocks as u64
        }
    }
}

/// Parse the descriptor+header pair from exactly [`APE_HDR_MIN`] bytes.
pub fn parse(data: &[u8]) -> Result<ApeInfo> {
    if data.len() < APE_HDR_MIN {
        return corrupt("APE header: input shorter than the descriptor+header pair");
    }
    if &data[0..4] != b"MAC " {
        return bad_magic("APE: missing \"MAC \" signature");
    }

    let version = u16::from_le_bytes(data[4..6].try_into().unwrap());
    if version < MIN_VERSION {
        return unsupported("APE: format version older than 3.98 is not supported");
    }

    let desc_size = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
    let hdr_size = u32::from_le_bytes(data[12..16].try_into().unwrap()) as usize;
    let seektbl_size = u32::from_le_bytes(data[16..20].try_into().unwrap());

    if desc_size < DESC_LEN || hdr_size < HDR_LEN || desc_size + hdr_size > data.len() {
        return corrupt("APE: descriptor/header size fields disagree with the gathered bytes");
    }

    let h = &data[desc_size..desc_size + HDR_LEN];
    let block_samples = u32::from_le_bytes(h[4..8].try_into().unwrap());
    let lastframe_blocks = u32::from_le_bytes(h[8..12].try_into().unwrap());
    let total_frames = u32::from_le_bytes(h[12..16].try_into().unwrap());
    let bits_per_sample = u16::from_le_bytes(h[16..18].try_into().unwrap()) as u8;
    let channels = u16::from_le_bytes(h[18..20].try_into().unwrap()) as u8;
    let sample_rate = u32::from_le_bytes(h[20..24].try_into().unwrap());

    Ok(ApeInfo {
        version,
        seekpoints: seektbl_size / 4,
        block_samples,
        lastframe_blocks,
        total_frames,
        bits_per_sample,
        channels,
        sample_rate,
    })
}

/// Parse the seek table that immediately follows the header: an array of strictly increasing
/// absolute file offsets, one per block. A synthesized sentinel equal to `total_size` is appended
/// so every block's end offset is `offsets[i + 1]` without a special case for the last block.
///
/// A non-increasing offset ends the table early rather than failing outright (a handful of
/// encoders are known to emit trailing garbage entries); what's left over is only an error if the
/// last valid offset it found doesn't even fit before `total_size`.
pub fn parse_seek_table(data: &[u8], total_size: u64) -> Result<Vec<u64>> {
    let n = data.len() / 4;
    let mut offsets = Vec::with_capacity(n + 1);
    let mut prev = 0u32;

    for (i, chunk) in data.chunks_exact(4).take(n).enumerate() {
        let off = u32::from_le_bytes(chunk.try_into().unwrap());
        if i > 0 && prev >= off {
            break;
        }
        offsets.push(off as u64);
        prev = off;
    }

    match offsets.last() {
        Some(&last) if last < total_size => {}
        None if total_size > 0 => {}
        _ => return corrupt("APE: seek table offsets do not fit within the file"),
    }

    offsets.push(total_size);
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(
        seektbl_size: u32,
        block_samples: u32,
        lastframe_blocks: u32,
        total_frames: u32,
        channels: u16,
        bps: u16,
        rate: u32,
    ) -> Vec<u8> {
        let mut d = vec![0u8; APE_HDR_MIN];
        d[0..4].copy_from_slice(b"MAC ");
        d[4..6].copy_from_slice(&MIN_VERSION.to_le_bytes());
        d[8..12].copy_from_slice(&(DESC_LEN as u32).to_le_bytes());
        d[12..16].copy_from_slice(&(HDR_LEN as u32).to_le_bytes());
        d[16..20].copy_from_slice(&seektbl_size.to_le_bytes());

        let h = &mut d[DESC_LEN..DESC_LEN + HDR_LEN];
        h[4..8].copy_from_slice(&block_samples.to_le_bytes());
        h[8..12].copy_from_slice(&lastframe_blocks.to_le_bytes());
        h[12..16].copy_from_slice(&total_frames.to_le_bytes());
        h[16..18].copy_from_slice(&bps.to_le_bytes());
        h[18..20].copy_from_slice(&channels.to_le_bytes());
        h[20..24].copy_from_slice(&rate.to_le_bytes());
        d
    }

    #[test]
    fn parses_descriptor_and_header() {
        let data = header_bytes(3 * 4, 73728, 1000, 10, 2, 16, 44100);
        let info = parse(&data).unwrap();
        assert_eq!(info.seekpoints, 3);
        assert_eq!(info.block_samples, 73728);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.total_samples(), 9 * 73728 + 1000);
    }

    #[test]
    fn rejects_old_version() {
        let mut data = header_bytes(0, 1, 1, 1, 2, 16, 44100);
        data[4..6].copy_from_slice(&3970u16.to_le_bytes());
        assert!(parse(&data).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = header_bytes(0, 1, 1, 1, 2, 16, 44100);
        data[0..4].copy_from_slice(b"XXXX");
        assert!(parse(&data).is_err());
    }

    #[test]
    fn seek_table_appends_total_size_sentinel() {
        let mut raw = Vec::new();
        for off in [100u32, 2000, 4000] {
            raw.extend_from_slice(&off.to_le_bytes());
        }
        let table = parse_seek_table(&raw, 5000).unwrap();
        assert_eq!(table, vec![100, 2000, 4000, 5000]);
    }

    #[test]
    fn seek_table_stops_at_non_increasing_offset() {
        let mut raw = Vec::new();
        for off in [100u32, 50, 4000] {
            raw.extend_from_slice(&off.to_le_bytes());
        }
        let table = parse_seek_table(&raw, 5000).unwrap();
        assert_eq!(table, vec![100, 5000]);
    }

    #[test]
    fn seek_table_rejects_offsets_past_total_size() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&6000u32.to_le_bytes());
        assert!(parse_seek_table(&raw, 5000).is_err());
    }
}
