// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MP4/ISO-BMFF's box header: `[u32be size][4-byte type]`, extended to a 64-bit size by a
//! following `u64be` when `size == 1` ("largesize"), or implicitly "extends to end of file" when
//! `size == 0` (used by a trailing `mdat`).

pub const BOX_HEADER_LEN: usize = 8;
pub const LARGESIZE_LEN: usize = 8;

pub fn parse_box_header(buf: &[u8; BOX_HEADER_LEN]) -> (u32, [u8; 4]) {
    let size = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let box_type: [u8; 4] = buf[4..8].try_into().unwrap();
    (size, box_type)
}
