// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ISO base media file format (MP4/MOV) reader and writer: `moov`/`trak` sample-table
//! construction, `ilst` tags, AAC/ALAC sample delivery.

mod boxes;
mod reader;
mod sample_table;
mod writer;

pub use reader::Mp4Reader;
pub use writer::Mp4Writer;
