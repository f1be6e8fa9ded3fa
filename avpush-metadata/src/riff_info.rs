// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RIFF `INFO` list codec: a flat sequence of four-character-id chunks, each holding a
//! NUL-terminated (and even-padded) ASCII/Latin-1 string.

use avpush_core::format::CodePage;

use crate::tables::{lookup, RIFF_INFO_NAMES};
use crate::text::{decode_text_fallback, trim_padding};
use crate::DecodedTag;

/// Decode one `INFO` sub-chunk's payload (the 4-byte id and 4-byte size are assumed already
/// consumed by the RIFF container engine; `payload` is the chunk's data, without its pad byte).
pub fn decode_entry(id: &[u8; 4], payload: &[u8], code_page: Option<CodePage>) -> Option<DecodedTag> {
    let name = std::str::from_utf8(id).ok()?;
    let value = trim_padding(&decode_text_fallback(payload, code_page)).to_string();
    if value.is_empty() {
        return None;
    }
    let tag_id = lookup(RIFF_INFO_NAMES, name);
    Some(DecodedTag::new(tag_id, name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_inam_to_title() {
        let tag = decode_entry(b"INAM", b"My Track\0", None).unwrap();
        assert_eq!(tag.id, avpush_core::tag::NormalizedTag::Title);
        assert_eq!(tag.value, "My Track");
    }

    #[test]
    fn unmapped_id_falls_back_to_unknown() {
        let tag = decode_entry(b"IKEY", b"keywords", None).unwrap();
        assert_eq!(tag.id, avpush_core::tag::NormalizedTag::Unknown);
        assert_eq!(tag.name, "IKEY");
    }

    #[test]
    fn empty_value_is_skipped() {
        assert!(decode_entry(b"ICRD", b"\0\0", None).is_none());
    }
}
