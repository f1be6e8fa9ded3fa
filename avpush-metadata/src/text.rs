// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal text decoding for the handful of legacy encodings ID3v1/ID3v2 need: ISO-8859-1 (every
//! code point maps 1:1 onto a Unicode scalar value below U+0100), an 8-bit codepage fallback, and
//! ID3v2's three UTF-16 variants. No general charset conversion is attempted; see the crate-level
//! non-goals.

use avpush_core::format::CodePage;

/// ID3v2 text-frame encoding byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Id3v2Encoding {
    Iso8859_1,
    Utf16Bom,
    Utf16Be,
    Utf8,
}

impl Id3v2Encoding {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Id3v2Encoding::Iso8859_1),
            1 => Some(Id3v2Encoding::Utf16Bom),
            2 => Some(Id3v2Encoding::Utf16Be),
            3 => Some(Id3v2Encoding::Utf8),
            _ => None,
        }
    }
}

pub fn decode_latin1(buf: &[u8]) -> String {
    buf.iter().map(|&b| b as char).collect()
}

/// Windows-1252 differs from Latin-1 only in the 0x80..=0x9F range (where Latin-1 has C1
/// control codes that are never used for text; Windows-1252 has printable punctuation).
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

pub fn decode_codepage(buf: &[u8], page: CodePage) -> String {
    match page {
        CodePage::Latin1 => decode_latin1(buf),
        CodePage::Windows1252 => buf
            .iter()
            .map(|&b| match b {
                0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
                other => other as char,
            })
            .collect(),
    }
}

/// Decode ID3v1/legacy ID3v2 text, preferring UTF-8 if valid, else falling back to the
/// configured codepage (defaulting to Latin-1).
pub fn decode_text_fallback(buf: &[u8], fallback: Option<CodePage>) -> String {
    match std::str::from_utf8(buf) {
        Ok(s) => s.to_string(),
        Err(_) => decode_codepage(buf, fallback.unwrap_or(CodePage::Latin1)),
    }
}

/// Decode a UTF-16 text frame body given its encoding. `Utf16Bom` sniffs a leading byte-order
/// mark (default big-endian if absent, per the ID3v2 spec's stated default); `Utf16Be` is always
/// big-endian with no BOM.
pub fn decode_utf16(buf: &[u8], encoding: Id3v2Encoding) -> String {
    let (body, big_endian) = match encoding {
        Id3v2Encoding::Utf16Bom => {
            if buf.len() >= 2 && buf[0] == 0xFF && buf[1] == 0xFE {
                (&buf[2..], false)
            }
            else if buf.len() >= 2 && buf[0] == 0xFE && buf[1] == 0xFF {
                (&buf[2..], true)
            }
            else {
                (buf, true)
            }
        }
        Id3v2Encoding::Utf16Be => (buf, true),
        _ => (buf, true),
    };

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            }
            else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();

    String::from_utf16_lossy(&units)
}

/// Decode a single ID3v2 text-frame body (the leading encoding byte has already been stripped).
pub fn decode_id3v2_text(buf: &[u8], encoding: Id3v2Encoding) -> String {
    match encoding {
        Id3v2Encoding::Iso8859_1 => decode_latin1(buf),
        Id3v2Encoding::Utf8 => String::from_utf8_lossy(buf).into_owned(),
        Id3v2Encoding::Utf16Bom | Id3v2Encoding::Utf16Be => decode_utf16(buf, encoding),
    }
}

/// Trim trailing NUL bytes and spaces the way fixed-width legacy text fields (ID3v1, RIFF INFO)
/// pad short values.
pub fn trim_padding(s: &str) -> &str {
    s.trim_end_matches(['\0', ' '])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_bom_little_endian_roundtrips_ascii() {
        let mut buf = vec![0xFF, 0xFE];
        for ch in "hello".encode_utf16() {
            buf.extend_from_slice(&ch.to_le_bytes());
        }
        assert_eq!(decode_utf16(&buf, Id3v2Encoding::Utf16Bom), "hello");
    }

    #[test]
    fn trims_null_and_space_padding() {
        assert_eq!(trim_padding("Title\0\0\0"), "Title");
        assert_eq!(trim_padding("Artist   "), "Artist");
    }
}
