// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ICY (SHOUTcast/Icecast) in-band metadata de-interleaving.
//!
//! An ICY body is audio bytes with a metadata block spliced in every `meta_interval` bytes: one
//! length byte (`N`, meaning `N * 16` bytes follow) and then that many bytes of
//! `StreamTitle='artist - track';StreamUrl='...';` padded with trailing NULs. This is not a
//! container format in its own right (there is no `Format` variant for it): it is a pre-filter
//! HTTP callers run the response body through before handing the `Data` blocks it yields on to
//! whichever real [`avpush_core::format::Reader`] the stream's content-type names. `meta_interval`
//! itself comes from the `icy-metaint` HTTP response header, which is outside this crate's scope
//! (no I/O is performed here, same as every other reader).

use avpush_core::errors::{corrupt, Result};
use avpush_core::gather::ByteGatherer;
use avpush_core::tag::NormalizedTag;

/// What [`IcyStream::process`] produced this call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcyOutcome {
    /// No output yet; more input is required.
    More,
    /// A chunk of audio data, to be forwarded to the real format reader.
    Data(Vec<u8>),
    /// A complete metadata block, with trailing NUL padding already trimmed.
    Meta(Vec<u8>),
}

/// De-interleaves an ICY body into audio data and metadata blocks.
///
/// `meta_interval` of `0` means the stream carries no in-band metadata at all (every byte is
/// `Data`), matching the reference's own `(ffuint)-1` sentinel for "not present".
pub struct IcyStream {
    meta_interval: u64,
    data_remaining: u64,
    meta_remaining: usize,
    meta_len_known: bool,
    gather: ByteGatherer,
    cap: usize,
}

const DEFAULT_CAP: usize = 16 * 1024;

impl IcyStream {
    pub fn new(meta_interval: u32) -> Self {
        let no_meta = meta_interval == 0;
        Self {
            meta_interval: meta_interval as u64,
            data_remaining: if no_meta { u64::MAX } else { meta_interval as u64 },
            meta_remaining: 0,
            meta_len_known: false,
            gather: ByteGatherer::new(),
            cap: DEFAULT_CAP,
        }
    }

    pub fn reset(&mut self) {
        self.gather.reset();
        self.meta_remaining = 0;
        self.meta_len_known = false;
        self.data_remaining = if self.meta_interval == 0 { u64::MAX } else { self.meta_interval };
    }

    pub fn process(&mut self, input: &mut &[u8]) -> Result<IcyOutcome> {
        if input.is_empty() {
            return Ok(IcyOutcome::More);
        }

        if self.meta_interval != 0 && self.data_remaining == 0 {
            if !self.meta_len_known {
                self.meta_remaining = (input[0] as usize) * 16;
                *input = &input[1..];
                self.meta_len_known = true;
            }

            if self.meta_remaining != 0 {
                let (consumed, view) = self.gather.gather(*input, self.meta_remaining, self.cap)?;
                *input = &input[consumed..];
                let Some(view) = view else {
                    return Ok(IcyOutcome::More);
                };
                let block = trim_padding(view.as_slice()).to_vec();
                self.gather.consume(self.meta_remaining);
                self.meta_remaining = 0;
                self.meta_len_known = false;
                self.data_remaining = self.meta_interval;
                return Ok(IcyOutcome::Meta(block));
            }

            self.meta_len_known = false;
            self.data_remaining = self.meta_interval;
            if input.is_empty() {
                return Ok(IcyOutcome::More);
            }
        }

        let n = (self.data_remaining.min(input.len() as u64)) as usize;
        let chunk = input[..n].to_vec();
        *input = &input[n..];
        if self.meta_interval != 0 {
            self.data_remaining -= n as u64;
        }
        Ok(IcyOutcome::Data(chunk))
    }
}

fn trim_padding(block: &[u8]) -> &[u8] {
    let end = block.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &block[..end]
}

/// One `KEY='value';` pair decoded from an ICY metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcyTag {
    pub id: NormalizedTag,
    pub name: String,
    pub value: String,
}

/// Iterates `KEY='value';...` pairs out of a metadata block already separated by [`IcyStream`].
///
/// `StreamTitle` is split into `Artist`/`Title` on the first `" - "` separator, matching the
/// reference's `icymeta_artist_title`; everything else (notably `StreamUrl`) is `Unknown`,
/// verbatim-named.
pub fn parse_meta(block: &[u8]) -> Result<Vec<IcyTag>> {
    let text = match std::str::from_utf8(block) {
        Ok(t) => t,
        Err(_) => return corrupt("icy meta: invalid utf-8"),
    };
    let mut tags = Vec::new();
    let mut rest = text;

    while let Some(eq) = rest.find('=') {
        let key = &rest[..eq];
        let after_eq = &rest[eq + 1..];
        if !after_eq.starts_with('\'') {
            return corrupt("icy meta: expected quote after '='");
        }
        let value_start = &after_eq[1..];
        let Some(close_and_tail) = find_closing_quote(value_start) else {
            return corrupt("icy meta: no closing quote");
        };
        let (value, tail) = close_and_tail;

        if key.eq_ignore_ascii_case("StreamTitle") {
            if let Some(sep) = value.find(" - ") {
                tags.push(IcyTag {
                    id: NormalizedTag::Artist,
                    name: "StreamTitle".into(),
                    value: value[..sep].to_string(),
                });
                tags.push(IcyTag {
                    id: NormalizedTag::Title,
                    name: "StreamTitle".into(),
                    value: value[sep + 3..].to_string(),
                });
            }
            else {
                tags.push(IcyTag {
                    id: NormalizedTag::Title,
                    name: "StreamTitle".into(),
                    value: value.to_string(),
                });
            }
        }
        else {
            tags.push(IcyTag { id: NormalizedTag::Unknown, name: key.to_string(), value: value.to_string() });
        }

        rest = tail;
    }

    Ok(tags)
}

/// Finds the `'` that closes a value, honoring the reference's own quirk: a `'` not immediately
/// followed by `;` is treated as part of the value rather than a terminator, and scanning
/// continues past it.
fn find_closing_quote(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    loop {
        let rel = bytes[i..].iter().position(|&b| b == b'\'')?;
        let pos = i + rel;
        if bytes.get(pos + 1) == Some(&b';') {
            return Some((&s[..pos], &s[pos + 2..]));
        }
        i = pos + 1;
        if i >= bytes.len() {
            return None;
        }
    }
}

/// Encodes `StreamTitle`/`StreamUrl`-style pairs into a length-prefixed ICY metadata block,
/// padded to a 16-byte multiple, mirroring `icymeta_add`/`icymeta_fin`.
pub fn encode_meta(pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut body = String::new();
    for (key, value) in pairs {
        body.push_str(key);
        body.push_str("='");
        body.push_str(value);
        body.push_str("';");
    }

    let mut block = Vec::with_capacity(1 + body.len());
    block.push(0u8); // length byte patched in below
    block.extend_from_slice(body.as_bytes());

    let pad = (16 - (block.len() - 1) % 16) % 16;
    block.resize(block.len() + pad, 0);
    block[0] = (((block.len() - 1) / 16) as u8).min(255);
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_data_and_meta_at_interval() {
        let mut audio = Vec::new();
        audio.extend_from_slice(b"0123456789"); // 10 bytes of "audio"
        let meta = encode_meta(&[("StreamTitle", "artist - track"), ("StreamUrl", "")]);
        audio.extend_from_slice(&meta);
        audio.extend_from_slice(b"more-audio");

        let mut icy = IcyStream::new(10);
        let mut input = &audio[..];

        let mut data = Vec::new();
        let mut metas = Vec::new();
        loop {
            if input.is_empty() {
                break;
            }
            match icy.process(&mut input).unwrap() {
                IcyOutcome::More => break,
                IcyOutcome::Data(d) => data.extend_from_slice(&d),
                IcyOutcome::Meta(m) => metas.push(m),
            }
        }

        assert_eq!(data, b"0123456789more-audio");
        assert_eq!(metas.len(), 1);
        let tags = parse_meta(&metas[0]).unwrap();
        assert!(tags.iter().any(|t| t.id == NormalizedTag::Artist && t.value == "artist"));
        assert!(tags.iter().any(|t| t.id == NormalizedTag::Title && t.value == "track"));
        assert!(tags.iter().any(|t| t.name == "StreamUrl" && t.value.is_empty()));
    }

    #[test]
    fn chunking_invariance() {
        let mut audio = Vec::new();
        audio.extend_from_slice(b"0123456789");
        audio.extend_from_slice(&encode_meta(&[("StreamTitle", "a - b")]));
        audio.extend_from_slice(b"tail012345");

        let mut whole = IcyStream::new(10);
        let mut input = &audio[..];
        let mut whole_data = Vec::new();
        let mut whole_meta_count = 0;
        while !input.is_empty() {
            match whole.process(&mut input).unwrap() {
                IcyOutcome::More => break,
                IcyOutcome::Data(d) => whole_data.extend_from_slice(&d),
                IcyOutcome::Meta(_) => whole_meta_count += 1,
            }
        }

        let mut chunked = IcyStream::new(10);
        let mut chunked_data = Vec::new();
        let mut chunked_meta_count = 0;
        let mut offset = 0;
        while offset < audio.len() {
            let end = (offset + 3).min(audio.len());
            let mut slice = &audio[offset..end];
            offset = end;
            loop {
                match chunked.process(&mut slice).unwrap() {
                    IcyOutcome::More => break,
                    IcyOutcome::Data(d) => chunked_data.extend_from_slice(&d),
                    IcyOutcome::Meta(_) => chunked_meta_count += 1,
                }
            }
        }

        assert_eq!(whole_data, chunked_data);
        assert_eq!(whole_meta_count, chunked_meta_count);
    }

    #[test]
    fn no_metadata_when_interval_is_zero() {
        let mut icy = IcyStream::new(0);
        let mut input = &b"just audio, no metadata here"[..];
        match icy.process(&mut input).unwrap() {
            IcyOutcome::Data(d) => assert_eq!(d, b"just audio, no metadata here"),
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn quote_inside_value_does_not_terminate_it() {
        // A `'` not immediately followed by `;` is part of the value, not a terminator.
        let block = b"StreamTitle='artist - title with ' and ; title2';StreamUrl='';";
        let tags = parse_meta(block).unwrap();
        assert!(tags.iter().any(|t| t.id == NormalizedTag::Artist && t.value == "artist"));
        assert!(tags
            .iter()
            .any(|t| t.id == NormalizedTag::Title && t.value == "title with ' and ; title2"));
    }

    #[test]
    fn parses_stream_title_without_separator() {
        let tags = parse_meta(b"StreamTitle='just a title';").unwrap();
        assert_eq!(tags, vec![IcyTag {
            id: NormalizedTag::Title,
            name: "StreamTitle".into(),
            value: "just a title".into(),
        }]);
    }
}
