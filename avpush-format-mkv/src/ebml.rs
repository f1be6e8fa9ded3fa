// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EBML variable-length integer decoding (RFC 8794 §4), operating on already-gathered byte
//! slices rather than a stream: the reader's state machine is responsible for gathering exactly
//! `vint_width(first_byte)` bytes before calling these, since the width is only known from the
//! first byte's leading-zero count.

use avpush_core::errors::{corrupt, Result};

/// Number of octets a vint occupies, derived from the position of the leading one bit in its
/// first byte (1-8, though this library's element ids/sizes never exceed the 4/8 byte range the
/// Matroska spec actually uses).
pub fn vint_width(first_byte: u8) -> Result<u32> {
    if first_byte == 0 {
        return corrupt("ebml: vint first byte is 0 (width would exceed 8 octets)");
    }
    Ok(first_byte.leading_zeros() + 1)
}

/// Decodes an EBML *element id*: the VINT_MARKER bit is kept as part of the id (ids are
/// compared bitwise-whole, unlike sizes).
pub fn decode_id(bytes: &[u8]) -> u32 {
    let mut v: u32 = 0;
    for &b in bytes {
        v = (v << 8) | b as u32;
    }
    v
}

/// Decodes an EBML *size* vint: the marker bit is stripped. A size whose value is all-ones
/// across its width ("unknown size") returns `None`, matching the spec's explicit allowance for
/// master elements (most commonly `Segment` and `Cluster` in a streamed file) to omit a known
/// size.
pub fn decode_size(bytes: &[u8]) -> Result<Option<u64>> {
    let width = bytes.len() as u32;
    if width == 0 || width > 8 {
        return corrupt("ebml: size vint width out of range");
    }
    let marker_bit = 8 - width;
    let mut v: u64 = (bytes[0] ^ (1 << marker_bit)) as u64;
    for &b in &bytes[1..] {
        v = (v << 8) | b as u64;
    }
    let all_ones = (1u64 << (7 * width)) - 1;
    if v == all_ones {
        Ok(None)
    }
    else {
        Ok(Some(v))
    }
}

/// Decodes an EBML *signed* vint (used by lacing deltas): the value is range-shifted by
/// `2^(7*width - 1) - 1`, per RFC 8794 §4.5.
pub fn decode_signed(bytes: &[u8]) -> Result<i64> {
    let width = bytes.len() as u32;
    if width == 0 || width > 8 {
        return corrupt("ebml: signed vint width out of range");
    }
    let marker_bit = 8 - width;
    let mut v: u64 = (bytes[0] ^ (1 << marker_bit)) as u64;
    for &b in &bytes[1..] {
        v = (v << 8) | b as u64;
    }
    let half_range = (1i64 << (7 * width - 1)) - 1;
    Ok(v as i64 - half_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_id_and_size() {
        assert_eq!(vint_width(0x82).unwrap(), 1);
        assert_eq!(decode_id(&[0x82]), 0x82);
        assert_eq!(decode_size(&[0x82]).unwrap(), Some(2));
    }

    #[test]
    fn four_byte_segment_id() {
        assert_eq!(vint_width(0x18).unwrap(), 4);
        assert_eq!(decode_id(&[0x18, 0x53, 0x80, 0x67]), 0x1853_8067);
    }

    #[test]
    fn unknown_size_is_none() {
        // 8-byte all-ones vint, the common "unknown size" encoding for a streamed Segment.
        assert_eq!(decode_size(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), None);
    }

    #[test]
    fn signed_vint_round_trips_small_deltas() {
        // width 1, value 0 after un-marking -> half_range = 2^6 - 1 = 63 -> -63
        assert_eq!(decode_signed(&[0x80]).unwrap(), -63);
        // width 1, value 63 after un-marking (0xBF & strip marker = 0x3F = 63) -> 0
        assert_eq!(decode_signed(&[0xBF]).unwrap(), 0);
    }
}
