// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OGG page/packet reassembly, a single-logical-stream reader, and a writer that pages frames
//! back up. The codec multiplexer recognizes Vorbis, Opus, and FLAC-in-OGG by their
//! identification packet's magic prefix.

mod mux;
mod page;
mod reader;
mod writer;

pub use reader::OggReader;
pub use writer::OggWriter;
