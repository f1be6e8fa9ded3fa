// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core Audio Format (CAF) reader: `caff` magic, then a flat sequence of big-endian chunks
//! (`desc`/`info`/`kuki`/`pakt`/`data`).

mod reader;

pub use reader::CafReader;
