// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WavPack block-stream reader: `wvpk` frame-sync via the generic two-consecutive-headers
//! engine, sample rate/channel/bit-depth decode straight from the block header.

mod header;
mod reader;

pub use header::WavPackHeader;
pub use reader::WavPackReader;
