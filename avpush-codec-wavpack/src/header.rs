// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 32-byte WavPack block header. Unlike FLAC, the block's total byte length (`ck_size + 8`)
//! is a direct header field, so WavPack fits the generic two-consecutive-headers
//! [`avpush_core::framesync::FrameSyncEngine`] the same way MPEG/ADTS do.

use avpush_core::framesync::{FrameHeader, ParsedHeader};

const SAMPLE_RATES: [u32; 15] =
    [6000, 8000, 9600, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000, 64000, 88200, 96000, 192000];

#[derive(Debug, Clone, Copy)]
pub struct WavPackHeader {
    pub ck_size: u32,
    pub version: u16,
    /// Total samples in the stream; only meaningful on `block_index == 0` and only when not
    /// `0xFFFFFFFF` (unknown length, e.g. a live encode).
    pub total_samples: u32,
    pub block_index: u32,
    pub block_samples: u32,
    pub bytes_per_sample: u8,
    pub mono: bool,
    pub float_data: bool,
    pub sample_rate: u32,
}

impl WavPackHeader {
    pub fn channels(&self) -> u8 {
        if self.mono {
            1
        }
        else {
            2
        }
    }

    pub fn bits_per_sample(&self) -> u8 {
        self.bytes_per_sample * 8
    }
}

impl FrameHeader for WavPackHeader {
    const MAX_HEADER_LEN: usize = 32;

    fn try_parse(data: &[u8]) -> Option<ParsedHeader<Self>> {
        if data.len() < Self::MAX_HEADER_LEN || &data[0..4] != b"wvpk" {
            return None;
        }

        let ck_size = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let version = u16::from_le_bytes(data[8..10].try_into().unwrap());
        if !(0x0400..=0x0500).contains(&version) {
            return None;
        }

        let total_samples = u32::from_le_bytes(data[12..16].try_into().unwrap());
        let block_index = u32::from_le_bytes(data[16..20].try_into().unwrap());
        let block_samples = u32::from_le_bytes(data[20..24].try_into().unwrap());
        let flags = u32::from_le_bytes(data[24..28].try_into().unwrap());

        let bytes_per_sample = ((flags & 0x3) + 1) as u8;
        let mono = flags & 0x4 != 0;
        let float_data = flags & 0x80 != 0;
        let rate_index = ((flags >> 23) & 0xF) as usize;
        let sample_rate = SAMPLE_RATES.get(rate_index).copied().unwrap_or(44100);

        let frame_size = ck_size as usize + 8;
        if frame_size < Self::MAX_HEADER_LEN {
            return None;
        }

        Some(ParsedHeader {
            header: WavPackHeader {
                ck_size,
                version,
                total_samples,
                block_index,
                block_samples,
                bytes_per_sample,
                mono,
                float_data,
                sample_rate,
            },
            frame_size,
        })
    }

    fn same_stream(&self, other: &Self) -> bool {
        self.bytes_per_sample == other.bytes_per_sample
            && self.mono == other.mono
            && self.float_data == other.float_data
            && self.sample_rate == other.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(ck_size: u32, block_index: u32, block_samples: u32, payload_len: usize) -> Vec<u8> {
        let mut h = Vec::with_capacity(32 + payload_len);
        h.extend_from_slice(b"wvpk");
        h.extend_from_slice(&ck_size.to_le_bytes());
        h.extend_from_slice(&0x0410u16.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes()); // track/index
        h.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes()); // total_samples unknown
        h.extend_from_slice(&block_index.to_le_bytes());
        h.extend_from_slice(&block_samples.to_le_bytes());
        let flags: u32 = 0x1 | (9 << 23); // bytes_per_sample=2, 44100
        h.extend_from_slice(&flags.to_le_bytes());
        h.extend_from_slice(&0u32.to_le_bytes()); // crc
        h.extend(std::iter::repeat(0).take(payload_len));
        h
    }

    #[test]
    fn parses_block_header_and_size() {
        let payload_len = 100;
        let data = block(32 - 8 + payload_len as u32, 0, 4096, payload_len);
        let parsed = WavPackHeader::try_parse(&data).expect("valid header");
        assert_eq!(parsed.frame_size, data.len());
        assert_eq!(parsed.header.sample_rate, 44100);
        assert_eq!(parsed.header.channels(), 2);
        assert_eq!(parsed.header.bits_per_sample(), 16);
    }

    #[test]
    fn rejects_missing_magic() {
        let mut data = vec![0u8; 32];
        data[0..4].copy_from_slice(b"RIFF");
        assert!(WavPackHeader::try_parse(&data).is_none());
    }
}
