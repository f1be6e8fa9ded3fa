// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tag codecs for every metadata format this library understands, all normalizing into the
//! same [`avpush_core::tag::NormalizedTag`] space.
//!
//! Two shapes coexist here deliberately:
//!
//! - APEv2 and Vorbis Comments decode straight off a single gathered byte slice with no text
//!   re-encoding, so they hand back borrowed [`avpush_core::tag::TagRecord`]s, true to the
//!   "each reader exposes outputs by reference into its own internal buffer" lifetime contract.
//! - ID3v1, ID3v2, MP4 `ilst`, RIFF `INFO`, and Matroska `SimpleTag` all either convert text out
//!   of a legacy encoding (UTF-16, an 8-bit codepage) or synthesize a value that was never a
//!   contiguous byte range in the source (`TRCK`'s `N/M` split, `trkn`'s binary pair, a genre
//!   index looked up in a table). Manufacturing a byte range to borrow from for those would add
//!   indirection without removing an allocation, so they hand back an owned [`DecodedTag`]
//!   instead.
//!
//! [`icy`] is a third shape: it isn't a tag codec over an already-gathered block at all, but an
//! incremental `ByteGatherer`-driven splitter that pulls `StreamTitle`/`StreamUrl` metadata back
//! out of an HTTP body it is otherwise interleaved with.

pub mod ape;
pub mod icy;
pub mod id3v1;
pub mod id3v2;
pub mod mp4_ilst;
pub mod riff_info;
pub mod simpletag;
pub mod tables;
pub mod text;
pub mod vorbis;

use avpush_core::tag::NormalizedTag;

/// An owned, normalized tag. See the module docs for why this exists alongside the borrowed
/// [`avpush_core::tag::TagRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTag {
    pub id: NormalizedTag,
    pub name: String,
    pub value: String,
}

impl DecodedTag {
    pub fn new(id: NormalizedTag, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { id, name: name.into(), value: value.into() }
    }
}
