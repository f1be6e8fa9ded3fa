// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Musepack (SV7/SV8) reader: SV8 packet-key stream and SV7 frame-size-in-words stream,
//! replaygain packet redispatch.

mod header;
mod reader;

pub use header::MpcInfo;
pub use reader::MpcReader;
