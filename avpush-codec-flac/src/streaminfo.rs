// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The mandatory 34-byte STREAMINFO metadata block: the one piece of FLAC metadata every stream
//! carries, and the fallback source for any frame header field coded as "use STREAMINFO".

use avpush_core::errors::{truncated, Result};

pub const STREAMINFO_LEN: usize = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub min_block_size: u32,
    pub max_block_size: u32,
    pub min_frame_size: u32,
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub total_samples: u64,
    pub md5: [u8; 16],
}

impl StreamInfo {
    /// The block size to assume for a fixed-blocksize frame's coded frame number. Streams that
    /// vary block size per-frame set `variable_blocksize` in the frame header instead and carry
    /// an exact sample number there, so this only matters for the common fixed-size case.
    pub fn block_size_hint(&self) -> u32 {
        if self.min_block_size == self.max_block_size { self.min_block_size } else { self.max_block_size }
    }

    pub fn parse(data: &[u8]) -> Result<StreamInfo> {
        if data.len() < STREAMINFO_LEN {
            return truncated("STREAMINFO block shorter than 34 bytes");
        }

        let min_block_size = u16::from_be_bytes([data[0], data[1]]) as u32;
        let max_block_size = u16::from_be_bytes([data[2], data[3]]) as u32;
        let min_frame_size = u32::from_be_bytes([0, data[4], data[5], data[6]]);
        let max_frame_size = u32::from_be_bytes([0, data[7], data[8], data[9]]);

        // Packed 64 bits: sample_rate(20) | channels-1(3) | bits_per_sample-1(5) | total_samples(36)
        let packed = u64::from_be_bytes(data[10..18].try_into().unwrap());
        let sample_rate = (packed >> 44) as u32;
        let channels = (((packed >> 41) & 0x7) + 1) as u8;
        let bits_per_sample = (((packed >> 36) & 0x1F) + 1) as u8;
        let total_samples = packed & 0xF_FFFF_FFFF;

        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&data[18..34]);

        Ok(StreamInfo {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples,
            md5,
        })
    }

    pub fn to_bytes(self) -> [u8; STREAMINFO_LEN] {
        let mut out = [0u8; STREAMINFO_LEN];
        out[0..2].copy_from_slice(&(self.min_block_size as u16).to_be_bytes());
        out[2..4].copy_from_slice(&(self.max_block_size as u16).to_be_bytes());
        out[4..7].copy_from_slice(&self.min_frame_size.to_be_bytes()[1..4]);
        out[7..10].copy_from_slice(&self.max_frame_size.to_be_bytes()[1..4]);

        let packed: u64 = ((self.sample_rate as u64) << 44)
            | (((self.channels as u64 - 1) & 0x7) << 41)
            | (((self.bits_per_sample as u64 - 1) & 0x1F) << 36)
            | (self.total_samples & 0xF_FFFF_FFFF);
        out[10..18].copy_from_slice(&packed.to_be_bytes());
        out[18..34].copy_from_slice(&self.md5);
        out
    }
}
