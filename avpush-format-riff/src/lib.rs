// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RIFF-family container readers/writers: WAVE (full read/write) and a minimal AVI audio-only
//! reader, sharing the fixed 8-byte `{fourcc, u32le size}` chunk header in [`common`].

pub mod avi;
pub mod common;
pub mod wave;

pub use avi::AviReader;
pub use wave::{WavReader, WavWriter};
