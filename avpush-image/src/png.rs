// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.png` header: `SIGN IHDR`.

use avpush_core::errors::{corrupt, Result};

use crate::ImageInfo;

const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const IHDR_DATA_LEN: usize = 13;

const COLOR_RGB: u8 = 2;
const COLOR_ALPHA: u8 = 4;

/// Decode a PNG signature plus `IHDR` chunk into [`ImageInfo`].
pub fn decode_png_header(data: &[u8]) -> Result<ImageInfo> {
    if data.len() < SIGNATURE.len() + 8 + IHDR_DATA_LEN {
        return corrupt("PNG: input shorter than signature + IHDR");
    }
    if data[..SIGNATURE.len()] != SIGNATURE {
        return corrupt("PNG: bad signature");
    }

    let rest = &data[SIGNATURE.len()..];
    let chunk_len = u32::from_be_bytes(rest[0..4].try_into().unwrap()) as usize;
    if &rest[4..8] != b"IHDR" {
        return corrupt("PNG: first chunk is not IHDR");
    }
    if chunk_len < IHDR_DATA_LEN {
        return corrupt("PNG: IHDR chunk shorter than 13 bytes");
    }

    let ihdr = &rest[8..8 + IHDR_DATA_LEN];
    let width = u32::from_be_bytes(ihdr[0..4].try_into().unwrap());
    let height = u32::from_be_bytes(ihdr[4..8].try_into().unwrap());
    let color = ihdr[9];

    let bpp = match color {
        COLOR_RGB => 24,
        c if c == COLOR_RGB | COLOR_ALPHA => 32,
        _ => 8,
    };

    Ok(ImageInfo { width, height, bpp })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(width: u32, height: u32, color: u8) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&SIGNATURE);
        out.extend_from_slice(&(IHDR_DATA_LEN as u32).to_be_bytes());
        out.extend_from_slice(b"IHDR");
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out.push(8); // bit depth
        out.push(color);
        out.extend_from_slice(&[0, 0, 0]);
        out
    }

    #[test]
    fn reads_truecolor_dimensions() {
        let png = build(1920, 1080, COLOR_RGB);
        let info = decode_png_header(&png).unwrap();
        assert_eq!(info, ImageInfo { width: 1920, height: 1080, bpp: 24 });
    }

    #[test]
    fn reads_truecolor_alpha_as_32bpp() {
        let png = build(4, 4, COLOR_RGB | COLOR_ALPHA);
        assert_eq!(decode_png_header(&png).unwrap().bpp, 32);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut png = build(1, 1, COLOR_RGB);
        png[0] = 0;
        assert!(decode_png_header(&png).is_err());
    }
}
