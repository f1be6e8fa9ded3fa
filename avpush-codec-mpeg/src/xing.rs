// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Xing/Info (LAME-family encoders) and VBRI (Fraunhofer encoders) VBR side-information tags,
//! found at a fixed offset past the first frame's own header (see
//! [`crate::header::Mpeg1Header::side_info_offset`]).

/// Decoded fields from a Xing/Info or VBRI header, used to seed the duration/bitrate fields of
/// the stream HEADER and to drive [`avpush_core::bisect::xing_toc_offset`].
#[derive(Debug, Clone)]
pub struct XingInfo {
    pub total_frames: Option<u32>,
    pub total_bytes: Option<u32>,
    /// 100-entry percent-to-byte-fraction table, present only on a Xing tag with the TOC flag
    /// set.
    pub toc: Option<[u8; 100]>,
    /// Encoder delay/padding in samples, from the LAME-extension trailer on a Xing/Info tag
    /// (absent on VBRI, which carries no such field).
    pub encoder_delay: u32,
    pub end_padding: u32,
}

const FRAMES_FLAG: u32 = 0x0001;
const BYTES_FLAG: u32 = 0x0002;
const TOC_FLAG: u32 = 0x0004;

/// `data` is the frame's side-information gap onward (i.e. starting at
/// `Mpeg1Header::side_info_offset()` bytes past the frame header).
pub fn parse_xing(data: &[u8]) -> Option<XingInfo> {
    if data.len() < 8 || (&data[0..4] != b"Xing" && &data[0..4] != b"Info") {
        return None;
    }
    let flags = u32::from_be_bytes(data[4..8].try_into().unwrap());
    let mut offset = 8;

    let mut total_frames = None;
    if flags & FRAMES_FLAG != 0 {
        if data.len() < offset + 4 {
            return None;
        }
        total_frames = Some(u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap()));
        offset += 4;
    }

    let mut total_bytes = None;
    if flags & BYTES_FLAG != 0 {
        if data.len() < offset + 4 {
            return None;
        }
        total_bytes = Some(u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap()));
        offset += 4;
    }

    let mut toc = None;
    if flags & TOC_FLAG != 0 {
        if data.len() < offset + 100 {
            return None;
        }
        let mut t = [0u8; 100];
        t.copy_from_slice(&data[offset..offset + 100]);
        toc = Some(t);
        offset += 100;
    }
    // quality field (4 bytes), if present, is skipped: not modeled.
    offset += 4;

    // LAME extension: "LAME" + version (5 ASCII bytes) ... encoder delay/padding packed as a
    // 3-byte big-endian pair of 12-bit values, 21 bytes into the LAME block.
    let mut encoder_delay = 0;
    let mut end_padding = 0;
    if data.len() >= offset + 9 && &data[offset..offset + 4] == b"LAME" {
        let delay_pad_off = offset + 21;
        if data.len() >= delay_pad_off + 3 {
            let b = &data[delay_pad_off..delay_pad_off + 3];
            let packed = ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32;
            encoder_delay = packed >> 12;
            end_padding = packed & 0x0FFF;
        }
    }

    Some(XingInfo { total_frames, total_bytes, toc, encoder_delay, end_padding })
}

/// `data` is the frame's side-information gap onward.
pub fn parse_vbri(data: &[u8]) -> Option<XingInfo> {
    if data.len() < 26 || &data[0..4] != b"VBRI" {
        return None;
    }
    let total_bytes = u32::from_be_bytes(data[10..14].try_into().unwrap());
    let total_frames = u32::from_be_bytes(data[14..18].try_into().unwrap());
    Some(XingInfo {
        total_frames: Some(total_frames),
        total_bytes: Some(total_bytes),
        toc: None,
        encoder_delay: 0,
        end_padding: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xing_frames_and_bytes() {
        let mut data = Vec::new();
        data.extend_from_slice(b"Xing");
        data.extend_from_slice(&(FRAMES_FLAG | BYTES_FLAG).to_be_bytes());
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&500_000u32.to_be_bytes());

        let info = parse_xing(&data).unwrap();
        assert_eq!(info.total_frames, Some(1000));
        assert_eq!(info.total_bytes, Some(500_000));
    }

    #[test]
    fn parses_vbri_header() {
        let mut data = vec![0u8; 26];
        data[0..4].copy_from_slice(b"VBRI");
        data[10..14].copy_from_slice(&1_000_000u32.to_be_bytes());
        data[14..18].copy_from_slice(&2000u32.to_be_bytes());
        let info = parse_vbri(&data).unwrap();
        assert_eq!(info.total_bytes, Some(1_000_000));
        assert_eq!(info.total_frames, Some(2000));
    }
}
