// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ID3v1: the fixed 128-byte trailer. No seek capability is needed beyond "the last 128 bytes
//! of the file", which the caller (an MP3/MPEG-1 reader) requests via `Status::Seek` itself.

use avpush_core::errors::{bad_magic, Result};
use avpush_core::format::CodePage;

use crate::tables::genre_name;
use crate::text::{decode_text_fallback, trim_padding};
use crate::DecodedTag;

pub const TAG_SIZE: usize = 128;

/// Decode a 128-byte ID3v1 trailer (starting at the `"TAG"` marker) into normalized tags. Empty
/// fixed-width fields are omitted rather than emitted as empty tags.
pub fn decode(tag: &[u8; TAG_SIZE], code_page: Option<CodePage>) -> Result<Vec<DecodedTag>> {
    use avpush_core::tag::NormalizedTag as T;

    if &tag[0..3] != b"TAG" {
        return bad_magic("ID3v1: missing \"TAG\" marker");
    }

    let mut tags = Vec::with_capacity(7);

    let title = trim_padding(&decode_text_fallback(&tag[3..33], code_page)).to_string();
    if !title.is_empty() {
        tags.push(DecodedTag::new(T::Title, "TITLE", title));
    }

    let artist = trim_padding(&decode_text_fallback(&tag[33..63], code_page)).to_string();
    if !artist.is_empty() {
        tags.push(DecodedTag::new(T::Artist, "ARTIST", artist));
    }

    let album = trim_padding(&decode_text_fallback(&tag[63..93], code_page)).to_string();
    if !album.is_empty() {
        tags.push(DecodedTag::new(T::Album, "ALBUM", album));
    }

    let year = trim_padding(&decode_text_fallback(&tag[93..97], code_page)).to_string();
    if !year.is_empty() {
        tags.push(DecodedTag::new(T::Date, "YEAR", year));
    }

    // ID3v1.1: if the second-last comment byte is 0, the last byte is the track number and the
    // comment field is only 28 bytes instead of 30.
    let (comment_bytes, track) =
        if tag[125] == 0 { (&tag[97..125], Some(tag[126])) } else { (&tag[97..127], None) };

    let comment = trim_padding(&decode_text_fallback(comment_bytes, code_page)).to_string();
    if !comment.is_empty() {
        tags.push(DecodedTag::new(T::Comment, "COMMENT", comment));
    }

    if let Some(track) = track {
        if track != 0 {
            tags.push(DecodedTag::new(T::TrackNo, "TRACK", track.to_string()));
        }
    }

    if let Some(genre) = genre_name(tag[127]) {
        tags.push(DecodedTag::new(T::Genre, "GENRE", genre.to_string()));
    }

    Ok(tags)
}
