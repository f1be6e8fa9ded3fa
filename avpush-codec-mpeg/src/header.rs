// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 4-byte MPEG-1/2 audio frame header.

use avpush_core::framesync::{FrameHeader, ParsedHeader};

const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];
const BITRATES_V1_L3: [u32; 15] =
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V1_L1: [u32; 15] =
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const BITRATES_V1_L2: [u32; 15] =
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const BITRATES_V2: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    L1,
    L2,
    L3,
}

/// One MPEG-1/2 audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mpeg1Header {
    pub version: MpegVersion,
    pub layer: Layer,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub channel_mode: u8,
    pub padding: bool,
    pub has_crc: bool,
}

impl Mpeg1Header {
    pub fn channels(&self) -> u8 {
        if self.channel_mode == 3 {
            1
        }
        else {
            2
        }
    }

    pub fn samples_per_frame(&self) -> u32 {
        match (self.version, self.layer) {
            (MpegVersion::V1, Layer::L1) => 384,
            (MpegVersion::V1, _) => 1152,
            (_, Layer::L1) => 384,
            (_, Layer::L3) => 576,
            (_, Layer::L2) => 1152,
        }
    }

    /// Offset from the start of the header to the first byte of side information — where a
    /// Xing/Info or VBRI tag, if present, begins.
    pub fn side_info_offset(&self) -> usize {
        let crc = if self.has_crc { 2 } else { 0 };
        let mono = self.channel_mode == 3;
        match (self.version, mono) {
            (MpegVersion::V1, false) => 4 + crc + 32,
            (MpegVersion::V1, true) => 4 + crc + 17,
            (_, false) => 4 + crc + 17,
            (_, true) => 4 + crc + 9,
        }
    }
}

fn frame_length(header: &Mpeg1Header) -> usize {
    let bitrate_bps = header.bitrate_kbps * 1000;
    let padding = if header.padding { 1 } else { 0 };
    match header.layer {
        Layer::L1 => {
            (((12 * bitrate_bps / header.sample_rate) + padding) * 4) as usize
        }
        _ => ((144 * bitrate_bps / header.sample_rate) + padding) as usize,
    }
}

impl FrameHeader for Mpeg1Header {
    const MAX_HEADER_LEN: usize = 4;

    fn try_parse(data: &[u8]) -> Option<ParsedHeader<Self>> {
        if data.len() < 4 || data[0] != 0xFF || (data[1] & 0xE0) != 0xE0 {
            return None;
        }

        let version = match (data[1] >> 3) & 0x03 {
            0b00 => MpegVersion::V25,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return None, // reserved
        };
        let layer = match (data[1] >> 1) & 0x03 {
            0b01 => Layer::L3,
            0b10 => Layer::L2,
            0b11 => Layer::L1,
            _ => return None, // reserved
        };
        let has_crc = data[1] & 0x01 == 0;

        let bitrate_idx = ((data[2] >> 4) & 0x0F) as usize;
        if bitrate_idx == 0 || bitrate_idx == 15 {
            return None;
        }
        let bitrate_kbps = match (version, layer) {
            (MpegVersion::V1, Layer::L1) => BITRATES_V1_L1[bitrate_idx],
            (MpegVersion::V1, Layer::L2) => BITRATES_V1_L2[bitrate_idx],
            (MpegVersion::V1, Layer::L3) => BITRATES_V1_L3[bitrate_idx],
            _ => BITRATES_V2[bitrate_idx],
        };

        let sr_idx = ((data[2] >> 2) & 0x03) as usize;
        if sr_idx == 3 {
            return None;
        }
        let base_rate = SAMPLE_RATES_V1[sr_idx];
        let sample_rate = match version {
            MpegVersion::V1 => base_rate,
            MpegVersion::V2 => base_rate / 2,
            MpegVersion::V25 => base_rate / 4,
        };

        let padding = (data[2] >> 1) & 0x01 != 0;
        let channel_mode = (data[3] >> 6) & 0x03;

        let header =
            Mpeg1Header { version, layer, bitrate_kbps, sample_rate, channel_mode, padding, has_crc };
        let frame_size = frame_length(&header);
        if frame_size < 4 {
            return None;
        }

        Some(ParsedHeader { header, frame_size })
    }

    fn same_stream(&self, other: &Self) -> bool {
        // Bitrate is deliberately excluded: it legitimately varies frame to frame in a VBR
        // stream, per spec.
        self.version == other.version && self.layer == other.layer && self.sample_rate == other.sample_rate
            && self.channel_mode == other.channel_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bytes(bitrate_idx: u8, sr_idx: u8, padding: bool, channel_mode: u8, body: &[u8]) -> Vec<u8> {
        let mut h = [0u8; 4];
        h[0] = 0xFF;
        h[1] = 0xFB; // V1, Layer III, no CRC
        h[2] = (bitrate_idx << 4) | (sr_idx << 2) | ((padding as u8) << 1);
        h[3] = channel_mode << 6;
        let mut out = h.to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn parses_128kbps_44100_stereo() {
        let frame = frame_bytes(9, 0, false, 0, &vec![0u8; 417 - 4]);
        let parsed = Mpeg1Header::try_parse(&frame).unwrap();
        assert_eq!(parsed.header.sample_rate, 44100);
        assert_eq!(parsed.header.channels(), 2);
        assert_eq!(parsed.frame_size, 417);
    }

    #[test]
    fn mono_has_fewer_channels() {
        let frame = frame_bytes(9, 0, false, 3, &vec![0u8; 417 - 4]);
        let parsed = Mpeg1Header::try_parse(&frame).unwrap();
        assert_eq!(parsed.header.channels(), 1);
    }
}
