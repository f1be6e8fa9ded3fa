// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MP4 `ilst` atom codec: each child atom is a `[size][fourcc]` box wrapping a single `data` atom
//! (or, for `----` freeform atoms, a `mean`/`name`/`data` triple). `trkn`/`disk` are 8/6-byte
//! binary pairs rather than text, and `gnre` is a 1-based index into the ID3v1 genre table.

use avpush_core::errors::{corrupt, Result};
use avpush_core::tag::NormalizedTag as T;

use crate::tables::genre_name;
use crate::DecodedTag;

fn iter_atoms(buf: &[u8]) -> impl Iterator<Item = (&[u8; 4], &[u8])> {
    let mut rest = buf;
    std::iter::from_fn(move || {
        if rest.len() < 8 {
            return None;
        }
        let size = u32::from_be_bytes(rest[0..4].try_into().unwrap()) as usize;
        if size < 8 || size > rest.len() {
            return None;
        }
        let fourcc: &[u8; 4] = rest[4..8].try_into().unwrap();
        let payload = &rest[8..size];
        rest = &rest[size..];
        Some((fourcc, payload))
    })
}

/// A `data` atom's payload after its own 8-byte `[type indicator][locale]` header.
fn data_atom_payload(atom_body: &[u8]) -> Option<(u32, &[u8])> {
    let (fourcc, payload) = iter_atoms(atom_body).find(|(fourcc, _)| *fourcc == b"data")?;
    let _ = fourcc;
    if payload.len() < 8 {
        return None;
    }
    let type_indicator = u32::from_be_bytes(payload[0..4].try_into().unwrap());
    Some((type_indicator, &payload[8..]))
}

fn text_value(atom_body: &[u8]) -> Option<String> {
    let (_, bytes) = data_atom_payload(atom_body)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

fn decode_freeform(atom_body: &[u8]) -> Option<DecodedTag> {
    let mut mean = None;
    let mut name = None;
    let mut value = None;
    for (fourcc, payload) in iter_atoms(atom_body) {
        match fourcc {
            b"mean" if payload.len() > 4 => mean = Some(String::from_utf8_lossy(&payload[4..]).into_owned()),
            b"name" if payload.len() > 4 => name = Some(String::from_utf8_lossy(&payload[4..]).into_owned()),
            b"data" if payload.len() >= 8 => value = Some(String::from_utf8_lossy(&payload[8..]).into_owned()),
            _ => {}
        }
    }
    let name = name?;
    let value = value.unwrap_or_default();
    let _ = mean; // kept for future namespace disambiguation; the bare name is enough to normalize on
    Some(DecodedTag::new(T::Unknown, name, value))
}

/// Decode the children of an already fully-gathered `ilst` box body.
pub fn decode_ilst(body: &[u8]) -> Result<Vec<DecodedTag>> {
    let mut tags = Vec::new();

    for (fourcc, atom_body) in iter_atoms(body) {
        match fourcc {
            b"\xa9nam" => push_text(&mut tags, T::Title, "\u{a9}nam", atom_body),
            b"\xa9ART" => push_text(&mut tags, T::Artist, "\u{a9}ART", atom_body),
            b"aART" => push_text(&mut tags, T::AlbumArtist, "aART", atom_body),
            b"\xa9alb" => push_text(&mut tags, T::Album, "\u{a9}alb", atom_body),
            b"\xa9day" => push_text(&mut tags, T::Date, "\u{a9}day", atom_body),
            b"\xa9gen" => push_text(&mut tags, T::Genre, "\u{a9}gen", atom_body),
            b"\xa9cmt" => push_text(&mut tags, T::Comment, "\u{a9}cmt", atom_body),
            b"\xa9wrt" => push_text(&mut tags, T::Composer, "\u{a9}wrt", atom_body),
            b"\xa9too" => push_text(&mut tags, T::Encoder, "\u{a9}too", atom_body),
            b"cprt" => push_text(&mut tags, T::Copyright, "cprt", atom_body),
            b"gnre" => {
                if let Some((_, payload)) = data_atom_payload(atom_body) {
                    if payload.len() >= 2 {
                        let index = u16::from_be_bytes([payload[0], payload[1]]);
                        if let Some(idx) = index.checked_sub(1) {
                            if let Some(name) = genre_name(idx as u8) {
                                tags.push(DecodedTag::new(T::Genre, "gnre", name));
                            }
                        }
                    }
                }
            }
            b"trkn" => push_pair(&mut tags, T::TrackNo, T::TrackTotal, "trkn", atom_body)?,
            b"disk" => push_pair(&mut tags, T::DiscNumber, T::DiscTotal, "disk", atom_body)?,
            b"----" => {
                if let Some(tag) = decode_freeform(atom_body) {
                    tags.push(tag);
                }
            }
            _ => {}
        }
    }

    Ok(tags)
}

fn push_text(tags: &mut Vec<DecodedTag>, id: T, name: &str, atom_body: &[u8]) {
    if let Some(value) = text_value(atom_body) {
        tags.push(DecodedTag::new(id, name, value));
    }
}

/// `trkn`/`disk` binary payloads: `[2 reserved][number BE16][total BE16]`, optionally followed
/// by two more reserved bytes for `trkn`.
fn push_pair(tags: &mut Vec<DecodedTag>, num_id: T, total_id: T, name: &str, atom_body: &[u8]) -> Result<()> {
    let Some((_, payload)) = data_atom_payload(atom_body)
    else {
        return Ok(());
    };
    if payload.len() < 6 {
        return corrupt("mp4 ilst: trkn/disk payload too short");
    }
    let number = u16::from_be_bytes([payload[2], payload[3]]);
    let total = u16::from_be_bytes([payload[4], payload[5]]);
    if number != 0 {
        tags.push(DecodedTag::new(num_id, name, number.to_string()));
    }
    if total != 0 {
        tags.push(DecodedTag::new(total_id, name, total.to_string()));
    }
    Ok(())
}

fn data_atom_bytes(type_indicator: u32, payload: &[u8]) -> Vec<u8> {
    let mut atom = Vec::new();
    let body_len = 8 + payload.len();
    atom.extend_from_slice(&((8 + body_len) as u32).to_be_bytes());
    atom.extend_from_slice(b"data");
    atom.extend_from_slice(&type_indicator.to_be_bytes());
    atom.extend_from_slice(&0u32.to_be_bytes()); // locale
    atom.extend_from_slice(payload);
    atom
}

fn text_atom(fourcc: &[u8; 4], text: &str) -> Vec<u8> {
    let mut atom = Vec::new();
    let data = data_atom_bytes(1, text.as_bytes());
    atom.extend_from_slice(&((8 + data.len()) as u32).to_be_bytes());
    atom.extend_from_slice(fourcc);
    atom.extend_from_slice(&data);
    atom
}

fn fourcc_for(id: T) -> Option<&'static [u8; 4]> {
    match id {
        T::Title => Some(b"\xa9nam"),
        T::Artist => Some(b"\xa9ART"),
        T::AlbumArtist => Some(b"aART"),
        T::Album => Some(b"\xa9alb"),
        T::Date => Some(b"\xa9day"),
        T::Genre => Some(b"\xa9gen"),
        T::Comment => Some(b"\xa9cmt"),
        T::Composer => Some(b"\xa9wrt"),
        T::Encoder => Some(b"\xa9too"),
        T::Copyright => Some(b"cprt"),
        _ => None,
    }
}

/// Encode a set of already-normalized tags into an `ilst` box body. `trkn`/`disk`/`gnre`'s
/// binary encodings and freeform `----` atoms are out of scope for the writer: only the plain
/// text fields this crate's reader also round-trips are emitted.
pub fn encode_ilst(tags: &[(T, String)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, value) in tags {
        if let Some(fourcc) = fourcc_for(*id) {
            body.extend_from_slice(&text_atom(fourcc, value));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_atom(type_indicator: u32, payload: &[u8]) -> Vec<u8> {
        let mut atom = Vec::new();
        let body_len = 8 + payload.len();
        atom.extend_from_slice(&((8 + body_len) as u32).to_be_bytes());
        atom.extend_from_slice(b"data");
        atom.extend_from_slice(&type_indicator.to_be_bytes());
        atom.extend_from_slice(&0u32.to_be_bytes()); // locale
        atom.extend_from_slice(payload);
        atom
    }

    fn wrap(fourcc: &[u8; 4], data_atom_bytes: &[u8]) -> Vec<u8> {
        let mut atom = Vec::new();
        atom.extend_from_slice(&((8 + data_atom_bytes.len()) as u32).to_be_bytes());
        atom.extend_from_slice(fourcc);
        atom.extend_from_slice(data_atom_bytes);
        atom
    }

    #[test]
    fn decodes_title_and_track_pair() {
        let mut body = Vec::new();
        body.extend_from_slice(&wrap(b"\xa9nam", &data_atom(1, b"My Song")));
        let trkn_payload = [0u8, 0, 0, 3, 0, 12, 0, 0];
        body.extend_from_slice(&wrap(b"trkn", &data_atom(0, &trkn_payload)));

        let tags = decode_ilst(&body).unwrap();
        assert!(tags.iter().any(|t| t.id == T::Title && t.value == "My Song"));
        assert!(tags.iter().any(|t| t.id == T::TrackNo && t.value == "3"));
        assert!(tags.iter().any(|t| t.id == T::TrackTotal && t.value == "12"));
    }

    #[test]
    fn decodes_gnre_genre_index() {
        let mut body = Vec::new();
        body.extend_from_slice(&wrap(b"gnre", &data_atom(0, &[0, 1])));
        let tags = decode_ilst(&body).unwrap();
        assert_eq!(tags[0].value, "Blues");
    }

    #[test]
    fn decodes_freeform_mean_name_data_triple() {
        let mut freeform = Vec::new();
        let mut mean = Vec::new();
        mean.extend_from_slice(&12u32.to_be_bytes());
        mean.extend_from_slice(b"mean");
        mean.extend_from_slice(&0u32.to_be_bytes());
        freeform.extend_from_slice(&mean);

        let mut name_atom = Vec::new();
        name_atom.extend_from_slice(&((8 + 4 + "iTunSMPB".len()) as u32).to_be_bytes());
        name_atom.extend_from_slice(b"name");
        name_atom.extend_from_slice(&0u32.to_be_bytes());
        name_atom.extend_from_slice(b"iTunSMPB");
        freeform.extend_from_slice(&name_atom);

        let mut data = Vec::new();
        data.extend_from_slice(&((8 + 4 + 4 + 5) as u32).to_be_bytes());
        data.extend_from_slice(b"data");
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"00 00");
        freeform.extend_from_slice(&data);

        let body = wrap(b"----", &freeform);
        let tags = decode_ilst(&body).unwrap();
        assert_eq!(tags[0].name, "iTunSMPB");
        assert_eq!(tags[0].value, "00 00");
    }

    #[test]
    fn encode_then_decode_round_trips_text_fields() {
        let body = encode_ilst(&[(T::Title, "My Song".to_string()), (T::Artist, "Someone".to_string())]);
        let tags = decode_ilst(&body).unwrap();
        assert!(tags.iter().any(|t| t.id == T::Title && t.value == "My Song"));
        assert!(tags.iter().any(|t| t.id == T::Artist && t.value == "Someone"));
    }
}
