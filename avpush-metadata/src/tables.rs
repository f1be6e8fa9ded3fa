// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static lookup tables shared by more than one tag codec: the canonical ID3v1 genre list (also
//! used by ID3v2's `TCON "(NN)"` shorthand and MP4's `gnre` atom) and the normalized-name tables
//! each codec's fixed-field mapping is built from.

use avpush_core::tag::NormalizedTag;

/// The canonical 192-entry ID3v1 genre table (the original 80 Nullsoft/WinAmp entries plus the
/// Extended Genre List additions later codified by ID3v2's `TCON`). Index 255 is "unknown" / not
/// set.
pub const ID3V1_GENRES: &[&str] = &[
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop", "Jazz",
    "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap", "Reggae", "Rock", "Techno",
    "Industrial", "Alternative", "Ska", "Death Metal", "Pranks", "Soundtrack", "Euro-Techno",
    "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical", "Instrumental",
    "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise", "AlternRock", "Bass", "Soul",
    "Punk", "Space", "Meditative", "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic",
    "Darkwave", "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap", "Pop/Funk", "Jungle",
    "Native US", "Cabaret", "New Wave", "Psychedelic", "Rave", "Showtunes", "Trailer", "Lo-Fi",
    "Tribal", "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical", "Rock & Roll", "Hard Rock",
    "Folk", "Folk-Rock", "National Folk", "Swing", "Fast Fusion", "Bebop", "Latin", "Revival",
    "Celtic", "Bluegrass", "Avantgarde", "Gothic Rock", "Progressive Rock", "Psychedelic Rock",
    "Symphonic Rock", "Slow Rock", "Big Band", "Chorus", "Easy Listening", "Acoustic", "Humour",
    "Speech", "Chanson", "Opera", "Chamber Music", "Sonata", "Symphony", "Booty Bass", "Primus",
    "Porn Groove", "Satire", "Slow Jam", "Club", "Tango", "Samba", "Folklore", "Ballad",
    "Power Ballad", "Rhythmic Soul", "Freestyle", "Duet", "Punk Rock", "Drum Solo", "A Capella",
    "Euro-House", "Dance Hall",
];

pub fn genre_name(index: u8) -> Option<&'static str> {
    ID3V1_GENRES.get(index as usize).copied()
}

/// Case-insensitive binary search helper shared by every codec whose normalization table is a
/// `&[(&str, NormalizedTag)]` sorted ascending by lowercase key.
pub fn lookup(table: &[(&'static str, NormalizedTag)], name: &str) -> NormalizedTag {
    avpush_core::tag::lookup_ci(table, name).unwrap_or(NormalizedTag::Unknown)
}

/// APEv2 field names are lowercase by convention; table from `apetagread`'s reference mapping.
pub const APEV2_NAMES: &[(&str, NormalizedTag)] = &[
    ("album", NormalizedTag::Album),
    ("albumartist", NormalizedTag::AlbumArtist),
    ("artist", NormalizedTag::Artist),
    ("comment", NormalizedTag::Comment),
    ("cover art (front)", NormalizedTag::Picture),
    ("genre", NormalizedTag::Genre),
    ("publisher", NormalizedTag::Publisher),
    ("replaygain_album_gain", NormalizedTag::ReplayGainAlbumGain),
    ("replaygain_album_peak", NormalizedTag::ReplayGainAlbumPeak),
    ("replaygain_track_gain", NormalizedTag::ReplayGainTrackGain),
    ("replaygain_track_peak", NormalizedTag::ReplayGainTrackPeak),
    ("title", NormalizedTag::Title),
    ("track", NormalizedTag::TrackNo),
    ("year", NormalizedTag::Date),
];

/// Vorbis Comment field names are conventionally uppercase; table from `vorbistagread`.
pub const VORBIS_NAMES: &[(&str, NormalizedTag)] = &[
    ("album", NormalizedTag::Album),
    ("album artist", NormalizedTag::AlbumArtist),
    ("albumartist", NormalizedTag::AlbumArtist),
    ("artist", NormalizedTag::Artist),
    ("comment", NormalizedTag::Comment),
    ("composer", NormalizedTag::Composer),
    ("copyright", NormalizedTag::Copyright),
    ("date", NormalizedTag::Date),
    ("discnumber", NormalizedTag::DiscNumber),
    ("disctotal", NormalizedTag::DiscTotal),
    ("encoder", NormalizedTag::Encoder),
    ("genre", NormalizedTag::Genre),
    ("lyrics", NormalizedTag::Lyrics),
    ("publisher", NormalizedTag::Publisher),
    ("replaygain_album_gain", NormalizedTag::ReplayGainAlbumGain),
    ("replaygain_album_peak", NormalizedTag::ReplayGainAlbumPeak),
    ("replaygain_track_gain", NormalizedTag::ReplayGainTrackGain),
    ("replaygain_track_peak", NormalizedTag::ReplayGainTrackPeak),
    ("title", NormalizedTag::Title),
    ("totaltracks", NormalizedTag::TrackTotal),
    ("tracknumber", NormalizedTag::TrackNo),
    ("tracktotal", NormalizedTag::TrackTotal),
];

/// RIFF `INFO` four-character chunk ids.
pub const RIFF_INFO_NAMES: &[(&str, NormalizedTag)] = &[
    ("iart", NormalizedTag::Artist),
    ("icmt", NormalizedTag::Comment),
    ("icop", NormalizedTag::Copyright),
    ("icrd", NormalizedTag::Date),
    ("ignr", NormalizedTag::Genre),
    ("inam", NormalizedTag::Title),
    ("iprd", NormalizedTag::Album),
    ("iprt", NormalizedTag::TrackNo),
    ("isft", NormalizedTag::Encoder),
];
