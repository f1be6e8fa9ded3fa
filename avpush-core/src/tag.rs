// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The normalized tag identifier space shared by every tag codec (APEv2, ID3v1/v2, Vorbis
//! Comments, MP4 `ilst`, RIFF `INFO`, Matroska `SimpleTag`).

/// A closed set of metadata fields, independent of the container/tag format they were read from.
///
/// Each codec maps its own field names onto this enum via a fixed, sorted, case-insensitive
/// lookup table (see `avpush-metadata`). Anything outside a codec's table is `Unknown`, and the
/// original field name is preserved verbatim in [`TagRecord::name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NormalizedTag {
    Vendor,
    Artist,
    AlbumArtist,
    Album,
    Title,
    Date,
    Genre,
    TrackNo,
    TrackTotal,
    DiscNumber,
    DiscTotal,
    Comment,
    Composer,
    Publisher,
    Lyrics,
    Copyright,
    Encoder,
    ReplayGainTrackGain,
    ReplayGainTrackPeak,
    ReplayGainAlbumGain,
    ReplayGainAlbumPeak,
    Picture,
    Unknown,
}

/// A single decoded tag. `name` is the format's own field name (verbatim, not normalized);
/// `value` is the decoded text. Both borrow from the codec's own scratch buffer and must be
/// copied or consumed before the next read call.
#[derive(Debug, Clone, Copy)]
pub struct TagRecord<'a> {
    pub id: NormalizedTag,
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> TagRecord<'a> {
    pub fn new(id: NormalizedTag, name: &'a str, value: &'a str) -> Self {
        Self { id, name, value }
    }
}

/// Case-insensitive binary search over a table that must already be sorted (ASCII-lowercase,
/// byte-wise) by `name`. Every tag codec's normalization table uses this helper so the
/// "fixed sorted lowercase table" contract in the per-format docs has one implementation.
pub fn lookup_ci(table: &[(&'static str, NormalizedTag)], name: &str) -> Option<NormalizedTag> {
    let lower = name.to_ascii_lowercase();
    table.binary_search_by(|(key, _)| key.cmp(&lower.as_str())).ok().map(|idx| table[idx].1)
}
