// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Native FLAC: `fLaC` marker, metadata-block iteration (STREAMINFO/SEEKTABLE/VORBIS_COMMENT/
//! PICTURE), then a CRC-8-delimited frame stream.

mod header;
mod reader;
mod streaminfo;
mod writer;

pub use header::FlacFrameHeader;
pub use reader::FlacReader;
pub use streaminfo::StreamInfo;
pub use writer::FlacWriter;
