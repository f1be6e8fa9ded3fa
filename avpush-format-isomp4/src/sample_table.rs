// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction of a track's sample map — `{offset, size}` per encoded frame — from `stts`
//! (sample durations), `stsc` (chunk-to-samples mapping), `stsz` (sample sizes), and `stco`/
//! `co64` (chunk offsets). Built once, when `trak` closes; consumed by the frame-delivery loop
//! and by `seek(sample)`.

use avpush_core::errors::{corrupt, limit_exceeded, Result};

const MAX_SAMPLES: usize = 8_000_000;

#[derive(Debug, Clone, Copy)]
pub struct SampleEntry {
    pub offset: u64,
    pub size: u32,
    pub duration: u32,
}

#[derive(Debug, Clone, Copy)]
struct StscEntry {
    first_chunk: u32,
    samples_per_chunk: u32,
}

/// Parses a full-box body (the 4-byte version/flags already stripped by the caller).
pub fn parse_stsc(body: &[u8]) -> Result<Vec<StscEntry>> {
    if body.len() < 4 {
        return corrupt("stsc: truncated entry count");
    }
    let count = u32::from_be_bytes(body[0..4].try_into().unwrap()) as usize;
    if 4 + count * 12 > body.len() {
        return corrupt("stsc: entry table runs past box body");
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = &body[4 + i * 12..4 + i * 12 + 12];
        out.push(StscEntry {
            first_chunk: u32::from_be_bytes(e[0..4].try_into().unwrap()),
            samples_per_chunk: u32::from_be_bytes(e[4..8].try_into().unwrap()),
        });
    }
    Ok(out)
}

pub fn parse_stco(body: &[u8], is_64bit: bool) -> Result<Vec<u64>> {
    if body.len() < 4 {
        return corrupt("stco/co64: truncated entry count");
    }
    let count = u32::from_be_bytes(body[0..4].try_into().unwrap()) as usize;
    let entry_len = if is_64bit { 8 } else { 4 };
    if 4 + count * entry_len > body.len() {
        return corrupt("stco/co64: entry table runs past box body");
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let off = 4 + i * entry_len;
        let value = if is_64bit {
            u64::from_be_bytes(body[off..off + 8].try_into().unwrap())
        }
        else {
            u32::from_be_bytes(body[off..off + 4].try_into().unwrap()) as u64
        };
        out.push(value);
    }
    Ok(out)
}

/// `stts`: run-length encoded per-sample duration, `{sample_count, sample_delta}` pairs.
pub fn parse_stts(body: &[u8]) -> Result<Vec<(u32, u32)>> {
    if body.len() < 4 {
        return corrupt("stts: truncated entry count");
    }
    let count = u32::from_be_bytes(body[0..4].try_into().unwrap()) as usize;
    if 4 + count * 8 > body.len() {
        return corrupt("stts: entry table runs past box body");
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = &body[4 + i * 8..4 + i * 8 + 8];
        out.push((
            u32::from_be_bytes(e[0..4].try_into().unwrap()),
            u32::from_be_bytes(e[4..8].try_into().unwrap()),
        ));
    }
    Ok(out)
}

/// Expand an `stts` run-length table into one duration value per sample, falling back to `0` for
/// any sample index past the end of the table (a malformed but non-fatal mismatch with `stsz`'s
/// count; see the crate-level non-goals on trusting the tables to agree).
fn duration_for_sample(stts: &[(u32, u32)], mut index: usize) -> u32 {
    for &(run_count, delta) in stts {
        let run_count = run_count as usize;
        if index < run_count {
            return delta;
        }
        index -= run_count;
    }
    0
}

/// `stsz`: either a uniform sample size (`sample_size != 0`, `count` identical samples) or a full
/// per-sample size table.
pub fn parse_stsz(body: &[u8]) -> Result<Vec<u32>> {
    if body.len() < 8 {
        return corrupt("stsz: truncated header");
    }
    let sample_size = u32::from_be_bytes(body[0..4].try_into().unwrap());
    let count = u32::from_be_bytes(body[4..8].try_into().unwrap()) as usize;
    if count > MAX_SAMPLES {
        return limit_exceeded("stsz: sample count exceeds the configured ceiling");
    }
    if sample_size != 0 {
        return Ok(vec![sample_size; count]);
    }
    if 8 + count * 4 > body.len() {
        return corrupt("stsz: size table runs past box body");
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let off = 8 + i * 4;
        out.push(u32::from_be_bytes(body[off..off + 4].try_into().unwrap()));
    }
    Ok(out)
}

/// Build the full per-sample `{offset, size, duration}` map from the already-parsed stsc/stco/
/// stsz/stts tables.
pub fn build_sample_map(
    stsc: &[u8],
    stco: &[u8],
    stsz: &[u8],
    stts: &[u8],
    co64: bool,
) -> Result<Vec<SampleEntry>> {
    let stsc = parse_stsc(stsc)?;
    let chunk_offsets = parse_stco(stco, co64)?;
    let sizes = parse_stsz(stsz)?;
    let durations = parse_stts(stts)?;

    if stsc.is_empty() || chunk_offsets.is_empty() {
        return Ok(Vec::new());
    }
    if sizes.len() > MAX_SAMPLES {
        return limit_exceeded("sample map exceeds the configured ceiling");
    }

    let mut map = Vec::with_capacity(sizes.len());
    let mut sample_idx = 0usize;

    for (entry_idx, entry) in stsc.iter().enumerate() {
        let next_first_chunk =
            stsc.get(entry_idx + 1).map(|e| e.first_chunk).unwrap_or(chunk_offsets.len() as u32 + 1);
        let first = entry.first_chunk.max(1) as usize;
        let last = (next_first_chunk.max(1) as usize).saturating_sub(1).min(chunk_offsets.len());

        for chunk_no in first..=last {
            let Some(&chunk_offset) = chunk_offsets.get(chunk_no - 1)
            else {
                break;
            };
            let mut running_offset = chunk_offset;
            for _ in 0..entry.samples_per_chunk {
                let Some(&size) = sizes.get(sample_idx)
                else {
                    break;
                };
                let duration = duration_for_sample(&durations, sample_idx);
                map.push(SampleEntry { offset: running_offset, size, duration });
                running_offset += size as u64;
                sample_idx += 1;
            }
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_entries(count: u32, values: &[u32]) -> Vec<u8> {
        let mut out = count.to_be_bytes().to_vec();
        for &v in values {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out
    }

    #[test]
    fn builds_sample_map_for_single_chunk_per_frame_layout() {
        // stsc: one entry, 1 sample per chunk, starting at chunk 1.
        let mut stsc = 1u32.to_be_bytes().to_vec();
        stsc.extend_from_slice(&1u32.to_be_bytes()); // first_chunk
        stsc.extend_from_slice(&1u32.to_be_bytes()); // samples_per_chunk
        stsc.extend_from_slice(&1u32.to_be_bytes()); // sample_description_index

        let stco = u32_entries(3, &[100, 200, 350]);
        let mut stsz = 0u32.to_be_bytes().to_vec(); // non-uniform
        stsz.extend_from_slice(&3u32.to_be_bytes());
        stsz.extend_from_slice(&50u32.to_be_bytes());
        stsz.extend_from_slice(&80u32.to_be_bytes());
        stsz.extend_from_slice(&40u32.to_be_bytes());

        let stts = u32_entries(1, &[3, 1024]);

        let map = build_sample_map(&stsc, &stco, &stsz, &stts, false).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map[0].offset, 100);
        assert_eq!(map[0].size, 50);
        assert_eq!(map[0].duration, 1024);
        assert_eq!(map[1].offset, 200);
        assert_eq!(map[2].offset, 350);
    }

    #[test]
    fn builds_sample_map_for_multi_sample_chunks() {
        let mut stsc = 1u32.to_be_bytes().to_vec();
        stsc.extend_from_slice(&1u32.to_be_bytes());
        stsc.extend_from_slice(&2u32.to_be_bytes()); // 2 samples per chunk
        stsc.extend_from_slice(&1u32.to_be_bytes());

        let stco = u32_entries(1, &[1000]);
        let mut stsz = 0u32.to_be_bytes().to_vec();
        stsz.extend_from_slice(&2u32.to_be_bytes());
        stsz.extend_from_slice(&10u32.to_be_bytes());
        stsz.extend_from_slice(&20u32.to_be_bytes());

        let stts = u32_entries(1, &[2, 512]);

        let map = build_sample_map(&stsc, &stco, &stsz, &stts, false).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].offset, 1000);
        assert_eq!(map[1].offset, 1010);
        assert_eq!(map[0].duration, 512);
    }
}
