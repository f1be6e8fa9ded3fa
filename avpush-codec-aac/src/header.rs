// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 7-byte ADTS fixed+variable header (9 bytes when a trailing CRC is present).

use avpush_core::framesync::{FrameHeader, ParsedHeader};

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// One ADTS frame header's fixed fields, enough to drive the frame-sync engine and to derive
/// stream-level info at HEADER time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    pub mpeg_version: u8,
    pub protection_absent: bool,
    pub profile: u8,
    pub sampling_frequency_index: u8,
    pub channel_configuration: u8,
    pub frame_length: u16,
    pub raw_data_blocks: u8,
}

impl AdtsHeader {
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sampling_frequency_index as usize]
    }

    pub fn channels(&self) -> u8 {
        match self.channel_configuration {
            0 => 0, // implicit in the PCE, not modeled (codec config, not framing)
            7 => 8,
            n => n,
        }
    }

    /// Samples per raw data block (always 1024 for this profile family).
    pub const SAMPLES_PER_BLOCK: u32 = 1024;

    pub fn samples(&self) -> u32 {
        Self::SAMPLES_PER_BLOCK * (self.raw_data_blocks as u32 + 1)
    }

    /// Length of the fixed ADTS header itself: 7 bytes, or 9 with a trailing CRC word.
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            7
        }
        else {
            9
        }
    }
}

impl FrameHeader for AdtsHeader {
    const MAX_HEADER_LEN: usize = 9;

    fn try_parse(data: &[u8]) -> Option<ParsedHeader<Self>> {
        if data.len() < 7 || data[0] != 0xFF || (data[1] & 0xF0) != 0xF0 {
            return None;
        }

        let mpeg_version = (data[1] >> 3) & 0x01;
        let layer = (data[1] >> 1) & 0x03;
        if layer != 0 {
            return None;
        }
        let protection_absent = data[1] & 0x01 != 0;
        let profile = (data[2] >> 6) & 0x03;
        let sampling_frequency_index = (data[2] >> 2) & 0x0F;
        if sampling_frequency_index as usize >= SAMPLE_RATES.len() {
            return None;
        }
        let channel_configuration = ((data[2] & 0x01) << 2) | ((data[3] >> 6) & 0x03);
        let frame_length =
            (((data[3] as u16) & 0x03) << 11) | ((data[4] as u16) << 3) | ((data[5] as u16) >> 5);
        let raw_data_blocks = data[6] & 0x03;

        if (frame_length as usize) < 7 {
            return None;
        }

        let header = AdtsHeader {
            mpeg_version,
            protection_absent,
            profile,
            sampling_frequency_index,
            channel_configuration,
            frame_length,
            raw_data_blocks,
        };

        Some(ParsedHeader { header, frame_size: frame_length as usize })
    }

    fn same_stream(&self, other: &Self) -> bool {
        self.mpeg_version == other.mpeg_version
            && self.profile == other.profile
            && self.sampling_frequency_index == other.sampling_frequency_index
            && self.channel_configuration == other.channel_configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(frame_len: u16, payload_len: usize) -> Vec<u8> {
        let mut h = [0u8; 7];
        h[0] = 0xFF;
        h[1] = 0xF1; // MPEG-4, layer 0, protection absent
        h[2] = (1 << 6) | (4 << 2); // profile=1(LC), sfi=4 (44100), private=0
        h[3] = (2 << 6) | ((frame_len >> 11) as u8 & 0x03); // channel_configuration=2
        h[4] = (frame_len >> 3) as u8;
        h[5] = ((frame_len & 0x7) as u8) << 5 | 0x1F;
        h[6] = 0xFC;
        let mut out = h.to_vec();
        out.extend(std::iter::repeat(0).take(payload_len));
        out
    }

    #[test]
    fn parses_sample_rate_and_channels() {
        let frame = build(7 + 9, 9);
        let parsed = AdtsHeader::try_parse(&frame).unwrap();
        assert_eq!(parsed.header.sample_rate(), 44100);
        assert_eq!(parsed.header.channels(), 2);
        assert_eq!(parsed.frame_size, 16);
    }

    #[test]
    fn rejects_bad_sync() {
        let mut frame = build(16, 9);
        frame[0] = 0;
        assert!(AdtsHeader::try_parse(&frame).is_none());
    }
}
