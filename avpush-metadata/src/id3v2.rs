// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ID3v2 (v2.2, v2.3, v2.4): synchsafe tag header, tag-level unsynchronization, per-frame
//! parsing with version-dependent frame header shapes, and the special-cased frames (`TRCK`,
//! `TCON`, `TXXX`, `COMM`/`USLT`, `APIC`) called out in the format's own docs.

use avpush_core::errors::{corrupt, unsupported, Result};
use avpush_core::tag::NormalizedTag as T;

use crate::tables::genre_name;
use crate::text::{decode_id3v2_text, Id3v2Encoding};
use crate::DecodedTag;

pub const HEADER_SIZE: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub major_version: u8,
    pub unsync: bool,
    pub has_extended_header: bool,
    /// Size of the tag body, excluding the 10-byte header itself.
    pub tag_size: u32,
}

fn synchsafe_u32(b: &[u8]) -> u32 {
    ((b[0] as u32 & 0x7F) << 21)
        | ((b[1] as u32 & 0x7F) << 14)
        | ((b[2] as u32 & 0x7F) << 7)
        | (b[3] as u32 & 0x7F)
}

/// Parse the fixed 10-byte `ID3` header.
pub fn parse_header(data: &[u8; HEADER_SIZE]) -> Result<Header> {
    if &data[0..3] != b"ID3" {
        return corrupt("ID3v2: missing \"ID3\" marker");
    }
    let major_version = data[3];
    if !(2..=4).contains(&major_version) {
        return unsupported("ID3v2: version newer than 2.4 is not recognized");
    }
    let flags = data[5];
    Ok(Header {
        major_version,
        unsync: flags & 0x80 != 0,
        has_extended_header: flags & 0x40 != 0,
        tag_size: synchsafe_u32(&data[6..10]),
    })
}

/// Undo the tag-level `0xFF 0x00 -> 0xFF` escaping applied to the whole frame area.
pub fn de_unsynchronize(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.push(data[i]);
        if data[i] == 0xFF && i + 1 < data.len() && data[i + 1] == 0x00 {
            i += 2;
        }
        else {
            i += 1;
        }
    }
    out
}

struct FrameHeaderInfo {
    id_len: usize,
    size_len: usize,
    has_flags: bool,
}

fn frame_header_shape(major_version: u8) -> FrameHeaderInfo {
    if major_version == 2 {
        FrameHeaderInfo { id_len: 3, size_len: 3, has_flags: false }
    }
    else {
        FrameHeaderInfo { id_len: 4, size_len: 4, has_flags: true }
    }
}

/// Normalize a v2.2 three-letter id onto its v2.3/v2.4 four-letter equivalent so a single match
/// downstream covers every version.
fn canonical_id(id: &str) -> String {
    match id {
        "TT2" => "TIT2".into(),
        "TP1" => "TPE1".into(),
        "TP2" => "TPE2".into(),
        "TAL" => "TALB".into(),
        "TYE" => "TYER".into(),
        "TCO" => "TCON".into(),
        "TRK" => "TRCK".into(),
        "TPA" => "TPOS".into(),
        "TCM" => "TCOM".into(),
        "TPB" => "TPUB".into(),
        "TCR" => "TCOP".into(),
        "TXX" => "TXXX".into(),
        "COM" => "COMM".into(),
        "ULT" => "USLT".into(),
        "PIC" => "APIC".into(),
        other if other.len() == 3 => format!("T{other}"), // best-effort for unmapped text ids
        other => other.to_string(),
    }
}

/// Find the end of an encoding-aware null-terminated string: one zero byte for Latin-1/UTF-8,
/// two (aligned) zero bytes for the UTF-16 variants.
fn find_terminator(buf: &[u8], encoding: Id3v2Encoding) -> Option<usize> {
    match encoding {
        Id3v2Encoding::Iso8859_1 | Id3v2Encoding::Utf8 => buf.iter().position(|&b| b == 0),
        Id3v2Encoding::Utf16Bom | Id3v2Encoding::Utf16Be => {
            let mut i = 0;
            while i + 1 < buf.len() {
                if buf[i] == 0 && buf[i + 1] == 0 {
                    return Some(i);
                }
                i += 2;
            }
            None
        }
    }
}

fn split_track_total(value: &str) -> (Option<String>, Option<String>) {
    match value.split_once('/') {
        Some((n, m)) => (Some(n.trim().to_string()), Some(m.trim().to_string())),
        None => (Some(value.trim().to_string()), None),
    }
}

/// Map a `TCON` genre string: `"(NN)"`, `"(NN)Remainder"`, or free text.
fn resolve_genre(value: &str) -> String {
    if let Some(stripped) = value.strip_prefix('(') {
        if let Some(end) = stripped.find(')') {
            let (num_part, remainder) = stripped.split_at(end);
            let remainder = &remainder[1..];
            if let Ok(idx) = num_part.parse::<u8>() {
                if let Some(name) = genre_name(idx) {
                    return if remainder.is_empty() { name.to_string() } else { remainder.to_string() };
                }
            }
        }
    }
    value.to_string()
}

/// Decode every frame in an already de-unsynchronized, already-gathered tag body.
pub fn decode_frames(mut body: &[u8], major_version: u8) -> Result<Vec<DecodedTag>> {
    let shape = frame_header_shape(major_version);
    let mut tags = Vec::new();

    while body.len() > shape.id_len + shape.size_len {
        let id_bytes = &body[..shape.id_len];
        if id_bytes.iter().all(|&b| b == 0) {
            break; // padding
        }
        let id = match std::str::from_utf8(id_bytes) {
            Ok(s) => s.to_string(),
            Err(_) => break,
        };
        let size_bytes = &body[shape.id_len..shape.id_len + shape.size_len];
        let size = if major_version == 4 {
            synchsafe_u32(size_bytes) as usize
        }
        else if shape.size_len == 4 {
            u32::from_be_bytes(size_bytes.try_into().unwrap()) as usize
        }
        else {
            ((size_bytes[0] as usize) << 16) | ((size_bytes[1] as usize) << 8) | size_bytes[2] as usize
        };

        let mut header_len = shape.id_len + shape.size_len;
        let mut frame_flags = 0u16;
        if shape.has_flags {
            frame_flags = u16::from_be_bytes([body[header_len], body[header_len + 1]]);
            header_len += 2;
        }

        if header_len + size > body.len() {
            return corrupt("ID3v2: frame size runs past end of tag");
        }

        let mut frame_body = &body[header_len..header_len + size];
        body = &body[header_len + size..];

        // v2.4 frame-level unsynchronisation (bit 0x02 of the format-flags byte) and data
        // length indicator (bit 0x01) are only meaningful at v2.4.
        if major_version == 4 {
            if frame_flags & 0x0001 != 0 && frame_body.len() >= 4 {
                frame_body = &frame_body[4..]; // data length indicator; size already known
            }
            let owned;
            if frame_flags & 0x0002 != 0 {
                owned = de_unsynchronize(frame_body);
                frame_body = &owned;
                tags.extend(decode_one_frame(&canonical_id(&id), frame_body));
                continue;
            }
        }
        // Compression/encryption (v2.3 bits 0x80/0x40, not modeled) makes a frame's payload
        // opaque to us; skip it rather than emit garbage text.
        if shape.has_flags && major_version == 3 && frame_flags & 0xC0 != 0 {
            continue;
        }

        tags.extend(decode_one_frame(&canonical_id(&id), frame_body));
    }

    Ok(tags)
}

fn decode_one_frame(id: &str, body: &[u8]) -> Vec<DecodedTag> {
    match id {
        "TRCK" | "TPOS" => {
            let Some((_, text)) = decode_text_frame(body) else { return Vec::new() };
            let (n, m) = split_track_total(&text);
            let (num_kind, total_kind) =
                if id == "TRCK" { (T::TrackNo, T::TrackTotal) } else { (T::DiscNumber, T::DiscTotal) };
            let mut out = Vec::with_capacity(2);
            if let Some(n) = n {
                out.push(DecodedTag::new(num_kind, id, n));
            }
            if let Some(m) = m {
                out.push(DecodedTag::new(total_kind, id, m));
            }
            out
        }
        "TCON" => match decode_text_frame(body) {
            Some((_, text)) => vec![DecodedTag::new(T::Genre, id, resolve_genre(&text))],
            None => Vec::new(),
        },
        "TXXX" => split_encoding(body)
            .and_then(|(encoding, rest)| {
                let desc_end = find_terminator(rest, encoding)?;
                let sep = if matches!(encoding, Id3v2Encoding::Utf16Bom | Id3v2Encoding::Utf16Be) { 2 } else { 1 };
                let name = decode_id3v2_text(&rest[..desc_end], encoding);
                let value = decode_id3v2_text(&rest[desc_end + sep..], encoding);
                Some(vec![DecodedTag::new(T::Unknown, if name.is_empty() { "TXXX".to_string() } else { name }, value)])
            })
            .unwrap_or_default(),
        "COMM" | "USLT" => split_encoding(body)
            .and_then(|(encoding, rest)| {
                if rest.len() < 3 {
                    return None;
                }
                let rest = &rest[3..]; // 3-byte language code
                let desc_end = find_terminator(rest, encoding)?;
                let sep = if matches!(encoding, Id3v2Encoding::Utf16Bom | Id3v2Encoding::Utf16Be) { 2 } else { 1 };
                let value = decode_id3v2_text(&rest[desc_end + sep..], encoding);
                let kind = if id == "COMM" { T::Comment } else { T::Lyrics };
                Some(vec![DecodedTag::new(kind, id, value)])
            })
            .unwrap_or_default(),
        "APIC" | "PIC" => split_encoding(body)
            .and_then(|(encoding, rest)| {
                // MIME type (always Latin-1/ASCII, NUL-terminated), picture type byte, description.
                let mime_end = rest.iter().position(|&b| b == 0)?;
                if mime_end + 2 > rest.len() {
                    return None;
                }
                let after_type = &rest[mime_end + 2..];
                let desc_end = find_terminator(after_type, encoding).unwrap_or(after_type.len());
                let desc = decode_id3v2_text(&after_type[..desc_end], encoding);
                Some(vec![DecodedTag::new(T::Picture, id, desc)])
            })
            .unwrap_or_default(),
        "TIT2" => text_tag(T::Title, id, body),
        "TPE1" => text_tag(T::Artist, id, body),
        "TPE2" => text_tag(T::AlbumArtist, id, body),
        "TALB" => text_tag(T::Album, id, body),
        "TDRC" | "TYER" => text_tag(T::Date, id, body),
        "TCOM" => text_tag(T::Composer, id, body),
        "TPUB" => text_tag(T::Publisher, id, body),
        "TCOP" => text_tag(T::Copyright, id, body),
        "TENC" | "TSSE" => text_tag(T::Encoder, id, body),
        _ => Vec::new(),
    }
}

fn split_encoding(body: &[u8]) -> Option<(Id3v2Encoding, &[u8])> {
    let (&enc_byte, rest) = body.split_first()?;
    Some((Id3v2Encoding::from_byte(enc_byte)?, rest))
}

fn decode_text_frame(body: &[u8]) -> Option<(Id3v2Encoding, String)> {
    let (encoding, rest) = split_encoding(body)?;
    let text = decode_id3v2_text(rest, encoding);
    Some((encoding, text.trim_end_matches('\0').to_string()))
}

fn text_tag(id: T, name: &str, body: &[u8]) -> Vec<DecodedTag> {
    match decode_text_frame(body) {
        Some((_, text)) => vec![DecodedTag::new(id, name, text)],
        None => Vec::new(),
    }
}
