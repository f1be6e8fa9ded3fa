// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MPEG-1/2 Layer I/II/III (MP3): frame-sync resync, Xing/VBRI/LAME side-information, Xing-TOC
//! bisecting seek, and tail ID3v1/APEv2 tag reads.

mod header;
mod reader;
mod writer;
mod xing;

pub use header::Mpeg1Header;
pub use reader::Mp3Reader;
pub use writer::Mp3Writer;
pub use xing::XingInfo;
