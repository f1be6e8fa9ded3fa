// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ADTS/AAC: a bare AAC bitstream framed by ADTS headers, read through the shared
//! two-consecutive-headers frame-sync engine (see [`avpush_core::framesync`]).

mod header;
mod reader;

pub use header::AdtsHeader;
pub use reader::AdtsReader;
