// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Matroska `SimpleTag` codec: the EBML element itself (`TagName`/`TagString`/`TagBinary`, with
//! possible nested `SimpleTag` children for multi-valued tags) is parsed by the container's own
//! EBML reader; this module only normalizes the resulting `(name, value)` pair. `TagBinary`
//! values (cover art, etc.) are delivered opaquely: the byte payload is not this library's
//! concern, so only the tag's presence and name are surfaced.

use avpush_core::tag::NormalizedTag;

use crate::tables::lookup;
use crate::DecodedTag;

/// Matroska tag names are free-form uppercase-with-underscores strings (the "Matroska Tag
/// Name" registry), not a fixed four-character id like RIFF's.
pub const SIMPLETAG_NAMES: &[(&str, NormalizedTag)] = &[
    ("album", NormalizedTag::Album),
    ("album_artist", NormalizedTag::AlbumArtist),
    ("artist", NormalizedTag::Artist),
    ("comment", NormalizedTag::Comment),
    ("composer", NormalizedTag::Composer),
    ("copyright", NormalizedTag::Copyright),
    ("date_released", NormalizedTag::Date),
    ("encoder", NormalizedTag::Encoder),
    ("genre", NormalizedTag::Genre),
    ("lyrics", NormalizedTag::Lyrics),
    ("part_number", NormalizedTag::TrackNo),
    ("publisher", NormalizedTag::Publisher),
    ("title", NormalizedTag::Title),
    ("total_parts", NormalizedTag::TrackTotal),
];

/// A `SimpleTag`'s value is either text (`TagString`) or opaque binary (`TagBinary`); exactly one
/// is present per the format's own definition.
pub enum SimpleTagValue<'a> {
    Text(&'a str),
    Binary,
}

/// Normalize one already-EBML-decoded `SimpleTag` into a [`DecodedTag`].
pub fn decode_entry(name: &str, value: SimpleTagValue<'_>) -> DecodedTag {
    let id = lookup(SIMPLETAG_NAMES, name);
    match value {
        SimpleTagValue::Text(text) => DecodedTag::new(id, name, text),
        SimpleTagValue::Binary => DecodedTag::new(id, name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_title_case_insensitively() {
        let tag = decode_entry("TITLE", SimpleTagValue::Text("My Track"));
        assert_eq!(tag.id, NormalizedTag::Title);
        assert_eq!(tag.value, "My Track");
    }

    #[test]
    fn binary_value_carries_no_text() {
        let tag = decode_entry("COVER", SimpleTagValue::Binary);
        assert_eq!(tag.id, NormalizedTag::Unknown);
        assert_eq!(tag.value, "");
    }
}
