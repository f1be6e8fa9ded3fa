// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vorbis Comment codec: `(LENGTH VENDOR) COUNT [LENGTH KEY=VALUE]...`, all little-endian
//! length-prefixed. Shared verbatim by native Vorbis streams, Opus (`OpusTags`), and embedded
//! FLAC `VORBIS_COMMENT` metadata blocks.

use avpush_core::errors::{corrupt, Result};
use avpush_core::tag::{NormalizedTag, TagRecord};

use crate::tables::{lookup, VORBIS_NAMES};

/// Iterates a fully-gathered Vorbis Comment block, starting with a synthetic `VENDOR` entry.
pub struct VorbisTagIter<'a> {
    data: &'a [u8],
    stage: Stage,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Vendor,
    Count,
    Entries,
    Done,
}

impl<'a> VorbisTagIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, stage: Stage::Vendor, count: 0 }
    }

    fn take_len_prefixed(&mut self) -> Result<&'a [u8]> {
        if self.data.len() < 4 {
            return corrupt("vorbis comment: truncated length prefix");
        }
        let n = u32::from_le_bytes(self.data[0..4].try_into().unwrap()) as usize;
        let rest = &self.data[4..];
        if n > rest.len() {
            return corrupt("vorbis comment: length prefix exceeds remaining data");
        }
        let (value, tail) = rest.split_at(n);
        self.data = tail;
        Ok(value)
    }
}

impl<'a> Iterator for VorbisTagIter<'a> {
    type Item = Result<TagRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stage {
                Stage::Vendor => {
                    let vendor = match self.take_len_prefixed() {
                        Ok(v) => v,
                        Err(e) => {
                            self.stage = Stage::Done;
                            return Some(Err(e));
                        }
                    };
                    self.stage = Stage::Count;
                    let value = match std::str::from_utf8(vendor) {
                        Ok(v) => v,
                        Err(_) => {
                            self.stage = Stage::Done;
                            return Some(corrupt("vorbis comment: vendor string is not valid UTF-8"));
                        }
                    };
                    return Some(Ok(TagRecord::new(NormalizedTag::Vendor, "VENDOR", value)));
                }
                Stage::Count => {
                    if self.data.len() < 4 {
                        self.stage = Stage::Done;
                        return Some(corrupt("vorbis comment: truncated entry count"));
                    }
                    self.count = u32::from_le_bytes(self.data[0..4].try_into().unwrap());
                    self.data = &self.data[4..];
                    self.stage = Stage::Entries;
                }
                Stage::Entries => {
                    if self.count == 0 {
                        self.stage = Stage::Done;
                        return None;
                    }
                    let entry = match self.take_len_prefixed() {
                        Ok(v) => v,
                        Err(e) => {
                            self.stage = Stage::Done;
                            return Some(Err(e));
                        }
                    };
                    self.count -= 1;

                    let entry_str = match std::str::from_utf8(entry) {
                        Ok(s) => s,
                        Err(_) => return Some(corrupt("vorbis comment: entry is not valid UTF-8")),
                    };
                    let (name, value) = match entry_str.find('=') {
                        Some(pos) => (&entry_str[..pos], &entry_str[pos + 1..]),
                        None => (entry_str, ""),
                    };

                    let id = lookup(VORBIS_NAMES, name);
                    return Some(Ok(TagRecord::new(id, name, value)));
                }
                Stage::Done => return None,
            }
        }
    }
}

/// Builds a Vorbis Comment block for writing. The first entry added must be the vendor string
/// (mirroring the reference encoder's convention of treating index 0 specially rather than
/// requiring a separate API).
#[derive(Debug, Default)]
pub struct VorbisTagWriter {
    out: Vec<u8>,
    count: u32,
}

impl VorbisTagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vendor(&mut self, vendor: &str) {
        self.out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        self.out.extend_from_slice(vendor.as_bytes());
        // Placeholder for the entry count, patched in `finish`.
        self.out.extend_from_slice(&0u32.to_le_bytes());
    }

    pub fn add(&mut self, name: &str, value: &str) {
        let entry_len = name.len() + 1 + value.len();
        self.out.extend_from_slice(&(entry_len as u32).to_le_bytes());
        self.out.extend_from_slice(name.to_ascii_uppercase().as_bytes());
        self.out.push(b'=');
        self.out.extend_from_slice(value.as_bytes());
        self.count += 1;
    }

    pub fn finish(mut self) -> Vec<u8> {
        // The count field sits right after the vendor string; `add_vendor` wrote a placeholder
        // at a known fixed offset (4 + vendor length).
        let vendor_len = u32::from_le_bytes(self.out[0..4].try_into().unwrap()) as usize;
        let count_pos = 4 + vendor_len;
        self.out[count_pos..count_pos + 4].copy_from_slice(&self.count.to_le_bytes());
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_vendor_and_entries() {
        let mut w = VorbisTagWriter::new();
        w.add_vendor("avpush");
        w.add("artist", "Test Artist");
        w.add("title", "Test Title");
        let bytes = w.finish();

        let tags: Vec<_> = VorbisTagIter::new(&bytes).map(|r| r.unwrap()).collect();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].id, NormalizedTag::Vendor);
        assert_eq!(tags[0].value, "avpush");
        assert_eq!(tags[1].id, NormalizedTag::Artist);
        assert_eq!(tags[1].value, "Test Artist");
        assert_eq!(tags[2].id, NormalizedTag::Title);
    }

    #[test]
    fn unknown_key_preserves_verbatim_name() {
        let mut w = VorbisTagWriter::new();
        w.add_vendor("v");
        w.add("MYCUSTOMKEY", "hello");
        let bytes = w.finish();
        let tags: Vec<_> = VorbisTagIter::new(&bytes).map(|r| r.unwrap()).collect();
        assert_eq!(tags[1].id, NormalizedTag::Unknown);
        assert_eq!(tags[1].name, "MYCUSTOMKEY");
    }
}
