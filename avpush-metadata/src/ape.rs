// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! APEv2 tag codec: footer-at-tail location, then a flat `{value_len, flags, name\0, value}`
//! record stream.

use avpush_core::errors::{corrupt, unsupported, Result};
use avpush_core::tag::TagRecord;

use crate::tables::{lookup, APEV2_NAMES};

pub const FOOTER_SIZE: usize = 32;
const MAGIC: &[u8; 8] = b"APETAGEX";
const VERSION: u32 = 2000;
const FLAG_HAS_HEADER: u32 = 0x8000_0000;
const FLAG_IS_BINARY: u32 = 0x0000_0002;

/// Parsed `APETAGEX` footer (always the last 32 bytes of the tag block, and of the file if no
/// trailing data follows the tag).
#[derive(Debug, Clone, Copy)]
pub struct ApeFooter {
    /// Size of every field plus the footer (and the header, if present); this is the byte
    /// distance to seek backward from the end of file to reach the start of the tag block.
    pub tag_size: u64,
    pub has_header: bool,
    pub item_count: u32,
}

/// Parse the 32-byte APEv2 footer from the tail of a file. `tail` must be at least
/// [`FOOTER_SIZE`] bytes and must end at the last byte of the file.
pub fn parse_footer(tail: &[u8]) -> Result<Option<ApeFooter>> {
    if tail.len() < FOOTER_SIZE {
        return corrupt("APEv2 footer: input too small");
    }
    let f = &tail[tail.len() - FOOTER_SIZE..];

    if &f[0..8] != MAGIC {
        return Ok(None);
    }

    let version = u32::from_le_bytes(f[8..12].try_into().unwrap());
    if version != VERSION {
        return unsupported("APEv2 tag version other than 2000");
    }

    let mut size = u32::from_le_bytes(f[12..16].try_into().unwrap()) as u64;
    if size < FOOTER_SIZE as u64 {
        return corrupt("APEv2 footer: declared size smaller than the footer itself");
    }
    let item_count = u32::from_le_bytes(f[16..20].try_into().unwrap());
    let flags = u32::from_le_bytes(f[20..24].try_into().unwrap());

    let has_header = flags & FLAG_HAS_HEADER != 0;
    if has_header {
        size += FOOTER_SIZE as u64;
    }

    Ok(Some(ApeFooter { tag_size: size, has_header, item_count }))
}

/// Iterates the `{value_len, flags, name\0, value}` records of an already fully-gathered tag
/// block body (the header, if present, and the trailing footer already stripped by the caller).
pub struct ApeTagIter<'a> {
    data: &'a [u8],
    items_left: u32,
}

impl<'a> ApeTagIter<'a> {
    pub fn new(body: &'a [u8], item_count: u32) -> Self {
        Self { data: body, items_left: item_count }
    }
}

impl<'a> Iterator for ApeTagIter<'a> {
    type Item = Result<TagRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.items_left == 0 || self.data.len() < 8 {
            return None;
        }

        let val_len = u32::from_le_bytes(self.data[0..4].try_into().unwrap()) as usize;
        let flags = u32::from_le_bytes(self.data[4..8].try_into().unwrap());
        let rest = &self.data[8..];

        let Some(name_end) = rest.iter().position(|&b| b == 0) else {
            self.items_left = 0;
            return Some(corrupt("APEv2 field: missing NUL after name"));
        };

        if name_end + 1 + val_len > rest.len() {
            self.items_left = 0;
            return Some(corrupt("APEv2 field: value runs past end of tag block"));
        }

        let name = match std::str::from_utf8(&rest[..name_end]) {
            Ok(n) => n,
            Err(_) => {
                self.items_left = 0;
                return Some(corrupt("APEv2 field: name is not valid UTF-8"));
            }
        };
        let value_bytes = &rest[name_end + 1..name_end + 1 + val_len];

        self.data = &rest[name_end + 1 + val_len..];
        self.items_left -= 1;

        // Binary fields (cover art) are surfaced with their name only; decoding image bytes as
        // text would corrupt them, and image pixel decoding is out of scope for this library.
        let value = if flags & FLAG_IS_BINARY != 0 {
            match value_bytes.iter().position(|&b| b == 0) {
                Some(p) => std::str::from_utf8(&value_bytes[..p]).unwrap_or(""),
                None => "",
            }
        }
        else {
            match std::str::from_utf8(value_bytes) {
                Ok(v) => v,
                Err(_) => {
                    self.items_left = 0;
                    return Some(corrupt("APEv2 field: value is not valid UTF-8"));
                }
            }
        };

        let id = lookup(APEV2_NAMES, name);
        Some(Ok(TagRecord::new(id, name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn footer_bytes(size: u32, item_count: u32, flags: u32) -> [u8; FOOTER_SIZE] {
        let mut f = [0u8; FOOTER_SIZE];
        f[0..8].copy_from_slice(MAGIC);
        f[8..12].copy_from_slice(&VERSION.to_le_bytes());
        f[12..16].copy_from_slice(&size.to_le_bytes());
        f[16..20].copy_from_slice(&item_count.to_le_bytes());
        f[20..24].copy_from_slice(&flags.to_le_bytes());
        f
    }

    #[test]
    fn reads_three_replaygain_fields() {
        // Build three fields: MP3GAIN_MINMAX, REPLAYGAIN_TRACK_GAIN, REPLAYGAIN_TRACK_PEAK.
        let mut body = Vec::new();
        for (name, value) in [
            ("MP3GAIN_MINMAX", "083,210"),
            ("REPLAYGAIN_TRACK_GAIN", "+0.060000 dB"),
            ("REPLAYGAIN_TRACK_PEAK", "0.923697"),
        ] {
            body.extend_from_slice(&(value.len() as u32).to_le_bytes());
            body.extend_from_slice(&0u32.to_le_bytes());
            body.extend_from_slice(name.as_bytes());
            body.push(0);
            body.extend_from_slice(value.as_bytes());
        }

        let tags: Vec<_> =
            ApeTagIter::new(&body, 3).map(|r| r.unwrap()).map(|t| (t.name.to_string(), t.value.to_string())).collect();
        assert_eq!(
            tags,
            vec![
                ("MP3GAIN_MINMAX".to_string(), "083,210".to_string()),
                ("REPLAYGAIN_TRACK_GAIN".to_string(), "+0.060000 dB".to_string()),
                ("REPLAYGAIN_TRACK_PEAK".to_string(), "0.923697".to_string()),
            ]
        );
    }

    #[test]
    fn footer_reports_seek_distance() {
        let footer = footer_bytes(100, 2, 0);
        let parsed = parse_footer(&footer).unwrap().unwrap();
        assert_eq!(parsed.tag_size, 100);
        assert!(!parsed.has_header);
    }

    #[test]
    fn footer_with_header_flag_adds_header_size() {
        let footer = footer_bytes(100, 2, FLAG_HAS_HEADER);
        let parsed = parse_footer(&footer).unwrap().unwrap();
        assert_eq!(parsed.tag_size, 100 + FOOTER_SIZE as u64);
        assert!(parsed.has_header);
    }
}
