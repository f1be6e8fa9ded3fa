// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.bmp` header: `FILEHDR (HDRV3 | HDRV4)`, 24bpp uncompressed or 32bpp with `BITFIELDS`.

use avpush_core::errors::{corrupt, unsupported, Result};

use crate::ImageInfo;

const FILE_HDR_LEN: usize = 54;
const HDR4_LEN: usize = 16 + 4 + 12 + 12 + 12 + 12;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

/// Decode a BMP `FILEHDR`+`HDRV3` (and `HDRV4` extension for 32bpp) into [`ImageInfo`].
///
/// `data` must hold at least the 54-byte file+info header; for 32bpp images it must also hold the
/// following 56-byte `HDRV4` colour-mask block.
pub fn decode_bmp_header(data: &[u8]) -> Result<ImageInfo> {
    if data.len() < FILE_HDR_LEN {
        return corrupt("BMP header shorter than 54 bytes");
    }
    if &data[0..2] != b"BM" {
        return corrupt("BMP: missing 'BM' signature");
    }

    let header_size = u32::from_le_bytes(data[10..14].try_into().unwrap());
    if (header_size as usize) < FILE_HDR_LEN {
        return corrupt("BMP: declared header size smaller than the file+info header");
    }

    let width = u32::from_le_bytes(data[18..22].try_into().unwrap());
    let height = u32::from_le_bytes(data[22..26].try_into().unwrap());
    let bpp = u16::from_le_bytes(data[28..30].try_into().unwrap()) as u32;
    let compression = u32::from_le_bytes(data[30..34].try_into().unwrap());

    match bpp {
        24 => {
            if compression != BI_RGB {
                return unsupported("BMP: 24bpp image with a compression method other than none");
            }
        }
        32 => {
            if compression != BI_BITFIELDS {
                return unsupported("BMP: 32bpp image with a compression method other than BITFIELDS");
            }
            if (header_size as usize) < FILE_HDR_LEN + HDR4_LEN {
                return unsupported("BMP: 32bpp image missing the HDRV4 colour-mask extension");
            }
            if data.len() < FILE_HDR_LEN + HDR4_LEN {
                return corrupt("BMP: truncated HDRV4 colour-mask block");
            }
            let h4 = &data[FILE_HDR_LEN..FILE_HDR_LEN + HDR4_LEN];
            let masks = [
                u32::from_be_bytes(h4[0..4].try_into().unwrap()),
                u32::from_be_bytes(h4[4..8].try_into().unwrap()),
                u32::from_be_bytes(h4[8..12].try_into().unwrap()),
                u32::from_be_bytes(h4[12..16].try_into().unwrap()),
            ];
            if masks != [0x0000_00ff, 0x0000_ff00, 0x00ff_0000, 0xff00_0000] {
                return unsupported("BMP: HDRV4 colour masks other than the standard BGRA layout");
            }
            if &h4[16..20] != b"BGRs" {
                return unsupported("BMP: HDRV4 colour space other than 'BGRs'");
            }
        }
        _ => return unsupported("BMP: bits-per-pixel other than 24 or 32"),
    }

    Ok(ImageInfo { width, height, bpp })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_24bpp(width: u32, height: u32) -> Vec<u8> {
        let mut h = vec![0u8; FILE_HDR_LEN];
        h[0..2].copy_from_slice(b"BM");
        h[10..14].copy_from_slice(&(FILE_HDR_LEN as u32).to_le_bytes());
        h[14..18].copy_from_slice(&40u32.to_le_bytes());
        h[18..22].copy_from_slice(&width.to_le_bytes());
        h[22..26].copy_from_slice(&height.to_le_bytes());
        h[26..28].copy_from_slice(&1u16.to_le_bytes());
        h[28..30].copy_from_slice(&24u16.to_le_bytes());
        h[30..34].copy_from_slice(&BI_RGB.to_le_bytes());
        h
    }

    #[test]
    fn reads_24bpp_dimensions() {
        let h = build_24bpp(640, 480);
        let info = decode_bmp_header(&h).unwrap();
        assert_eq!(info, ImageInfo { width: 640, height: 480, bpp: 24 });
    }

    #[test]
    fn rejects_bad_signature() {
        let mut h = build_24bpp(1, 1);
        h[0] = b'X';
        assert!(decode_bmp_header(&h).is_err());
    }

    #[test]
    fn rejects_compressed_24bpp() {
        let mut h = build_24bpp(1, 1);
        h[30..34].copy_from_slice(&BI_BITFIELDS.to_le_bytes());
        assert!(decode_bmp_header(&h).is_err());
    }

    #[test]
    fn reads_32bpp_with_hdrv4() {
        let mut h = build_24bpp(16, 16);
        h[10..14].copy_from_slice(&((FILE_HDR_LEN + HDR4_LEN) as u32).to_le_bytes());
        h[28..30].copy_from_slice(&32u16.to_le_bytes());
        h[30..34].copy_from_slice(&BI_BITFIELDS.to_le_bytes());
        let mut h4 = vec![0u8; HDR4_LEN];
        h4[0..4].copy_from_slice(&0x0000_00ffu32.to_be_bytes());
        h4[4..8].copy_from_slice(&0x0000_ff00u32.to_be_bytes());
        h4[8..12].copy_from_slice(&0x00ff_0000u32.to_be_bytes());
        h4[12..16].copy_from_slice(&0xff00_0000u32.to_be_bytes());
        h4[16..20].copy_from_slice(b"BGRs");
        h.extend_from_slice(&h4);

        let info = decode_bmp_header(&h).unwrap();
        assert_eq!(info, ImageInfo { width: 16, height: 16, bpp: 32 });
    }
}
