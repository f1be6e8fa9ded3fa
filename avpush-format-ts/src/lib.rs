// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MPEG transport stream (TS) reader: fixed 188-byte packets, a PID registry built up from the
//! PAT and PMT tables, and PES-header PTS extraction for whichever audio elementary stream the
//! PMT names.

mod reader;

pub use reader::TsReader;
