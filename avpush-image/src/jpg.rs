// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.jpg` header: `SOI SOF...`, stopping at the first Start-Of-Frame marker. Scan data (`SOS`
//! onward) is never inspected.

use avpush_core::errors::{corrupt, Result};

use crate::ImageInfo;

const MARKER_START: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOF0: u8 = 0xC0;
const SOF1: u8 = 0xC1;
const SOF2: u8 = 0xC2;
const SOS: u8 = 0xDA;

/// Scan markers from the start of a JPEG stream up to (and including) the first SOF0/1/2 marker,
/// returning its width/height. `bpp` is always `0`: JPEG's SOF doesn't carry a simple
/// bits-per-pixel value the way BMP/PNG headers do.
pub fn decode_jpeg_header(data: &[u8]) -> Result<ImageInfo> {
    if data.len() < 2 || data[0] != MARKER_START || data[1] != SOI {
        return corrupt("JPEG: missing SOI marker");
    }

    let mut pos = 2;
    loop {
        if pos + 4 > data.len() {
            return corrupt("JPEG: truncated before a SOF/EOI marker was found");
        }
        if data[pos] != MARKER_START {
            return corrupt("JPEG: bad marker start byte");
        }
        let marker_type = data[pos + 1];

        if marker_type == EOI {
            return corrupt("JPEG: reached EOI before any SOF marker");
        }
        if marker_type == SOS {
            return corrupt("JPEG: reached SOS before any SOF marker");
        }

        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if len < 2 {
            return corrupt("JPEG: marker length shorter than its own length field");
        }
        let body_start = pos + 4;
        let body_len = len - 2;
        if body_start + body_len > data.len() {
            return corrupt("JPEG: marker body runs past end of input");
        }

        if matches!(marker_type, SOF0 | SOF1 | SOF2) {
            if body_len < 5 {
                return corrupt("JPEG: SOF marker shorter than its fixed fields");
            }
            let body = &data[body_start..body_start + body_len];
            let height = u16::from_be_bytes([body[1], body[2]]) as u32;
            let width = u16::from_be_bytes([body[3], body[4]]) as u32;
            return Ok(ImageInfo { width, height, bpp: 0 });
        }

        pos = body_start + body_len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(buf: &mut Vec<u8>, marker_type: u8, body: &[u8]) {
        buf.push(MARKER_START);
        buf.push(marker_type);
        buf.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        buf.extend_from_slice(body);
    }

    fn build(width: u16, height: u16) -> Vec<u8> {
        let mut out = vec![MARKER_START, SOI];
        marker(&mut out, 0xE0, &[0x4A, 0x46, 0x49, 0x46, 0]); // APP0
        let mut sof_body = vec![8u8]; // precision
        sof_body.extend_from_slice(&height.to_be_bytes());
        sof_body.extend_from_slice(&width.to_be_bytes());
        sof_body.push(3); // components
        marker(&mut out, SOF0, &sof_body);
        out
    }

    #[test]
    fn reads_dimensions_from_sof0() {
        let jpg = build(1024, 768);
        let info = decode_jpeg_header(&jpg).unwrap();
        assert_eq!(info.width, 1024);
        assert_eq!(info.height, 768);
        assert_eq!(info.bpp, 0);
    }

    #[test]
    fn rejects_missing_soi() {
        let jpg = build(1, 1);
        assert!(decode_jpeg_header(&jpg[1..]).is_err());
    }

    #[test]
    fn skips_unrelated_markers_before_sof() {
        let mut out = vec![MARKER_START, SOI];
        marker(&mut out, 0xDB, &[0; 64]); // DQT
        marker(&mut out, 0xC4, &[0; 10]); // DHT
        let mut sof_body = vec![8u8];
        sof_body.extend_from_slice(&100u16.to_be_bytes());
        sof_body.extend_from_slice(&200u16.to_be_bytes());
        sof_body.push(1);
        marker(&mut out, SOF1, &sof_body);
        let info = decode_jpeg_header(&out).unwrap();
        assert_eq!(info.width, 200);
        assert_eq!(info.height, 100);
    }
}
