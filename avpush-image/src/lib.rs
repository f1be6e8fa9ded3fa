// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Width/height/bits-per-pixel extraction from BMP, PNG, and JPEG headers.
//!
//! Unlike the rest of this library, these are not push-model readers: a handful of fixed-offset
//! header fields don't benefit from incremental gathering, and the embedding format (an ID3
//! `APIC` frame, an MP4 `covr` atom) has already gathered the whole image buffer by the time it
//! hands it here. Each function is a pure, allocation-free decode over an already-complete byte
//! slice. Pixel data is never decoded.

mod bmp;
mod jpg;
mod png;

pub use bmp::decode_bmp_header;
pub use jpg::decode_jpeg_header;
pub use png::decode_png_header;

/// Dimensions and pixel depth decoded from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Bits per pixel. JPEG headers don't carry this directly, so it is always `0` there.
    pub bpp: u32,
}
