// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OGG page framing: the fixed 27-byte header, the variable-length segment table that follows
//! it, and the page checksum. Packet reassembly (segments -> packets, continuation across pages)
//! lives in `reader`; this module only knows how to parse one page's own framing.

use avpush_core::errors::{bad_magic, corrupt, Result};

pub const FIXED_HEADER_LEN: usize = 27;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderType: u8 {
        /// This page's first packet continues the previous page's unterminated last packet.
        const CONTINUED = 0x01;
        /// Beginning of logical stream: the first page for this serial number.
        const BOS = 0x02;
        /// End of logical stream: no further pages for this serial number follow.
        const EOS = 0x04;
    }
}

/// The fixed portion of an OGG page header, decoded ahead of its segment table.
#[derive(Debug, Clone, Copy)]
pub struct PageFixed {
    pub header_type: HeaderType,
    /// Per-codec stream-position counter (§ "granule position" in the library glossary).
    /// `u64::MAX` is the on-wire "-1" sentinel meaning no packet completes on this page.
    pub granule_position: u64,
    pub serial: u32,
    pub page_seq: u32,
    pub checksum: u32,
    pub segment_count: u8,
}

/// Parses the fixed 27-byte header. `data` must be at least [`FIXED_HEADER_LEN`] bytes.
pub fn parse_fixed(data: &[u8]) -> Result<PageFixed> {
    if data.len() < FIXED_HEADER_LEN {
        return corrupt("ogg: page header shorter than 27 bytes");
    }
    if &data[0..4] != b"OggS" {
        return bad_magic("missing OggS capture pattern");
    }
    let version = data[4];
    if version != 0 {
        return corrupt("ogg: unrecognized page header version");
    }
    let header_type = HeaderType::from_bits_truncate(data[5]);
    let granule_position = u64::from_le_bytes(data[6..14].try_into().unwrap());
    let serial = u32::from_le_bytes(data[14..18].try_into().unwrap());
    let page_seq = u32::from_le_bytes(data[18..22].try_into().unwrap());
    let checksum = u32::from_le_bytes(data[22..26].try_into().unwrap());
    let segment_count = data[26];
    Ok(PageFixed { header_type, granule_position, serial, page_seq, checksum, segment_count })
}

/// Splits a segment table into the lengths of the packets it encodes, plus whether the last one
/// is left unterminated (segment length 255 at the very end of the table) and so continues onto
/// the next page.
pub fn packet_lengths(segment_table: &[u8]) -> (Vec<usize>, bool) {
    let mut lens = Vec::new();
    let mut current = 0usize;
    let mut any = false;
    for &seg in segment_table {
        current += seg as usize;
        any = true;
        if seg < 255 {
            lens.push(current);
            current = 0;
            any = false;
        }
    }
    let unterminated = any || current > 0;
    if unterminated {
        lens.push(current);
    }
    (lens, unterminated)
}

/// The CRC-32 variant OGG uses: polynomial `0x04c11db7`, no reflection, zero init/xorout. The
/// checksum field itself is zeroed before the page is hashed.
pub fn crc32(data: &[u8]) -> u32 {
    const POLY: u32 = 0x04c1_1db7;
    let mut crc: u32 = 0;
    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_magic() {
        assert!(parse_fixed(&[0u8; 27]).is_err());
    }

    #[test]
    fn packet_lengths_splits_on_short_segment() {
        let table = [255, 10, 255, 255, 5];
        let (lens, unterminated) = packet_lengths(&table);
        assert_eq!(lens, vec![265, 515]);
        assert!(!unterminated);
    }

    #[test]
    fn packet_lengths_flags_trailing_continuation() {
        let table = [255, 255];
        let (lens, unterminated) = packet_lengths(&table);
        assert_eq!(lens, vec![510]);
        assert!(unterminated);
    }

    #[test]
    fn crc32_is_deterministic() {
        assert_eq!(crc32(b"12345"), crc32(b"12345"));
        assert_ne!(crc32(b"12345"), crc32(b"12346"));
    }
}
