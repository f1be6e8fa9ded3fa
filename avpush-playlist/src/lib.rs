// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line-oriented M3U/PLS/CUE playlist parsing and writing.
//!
//! Playlists are small text files, not chunked media streams: none of these three formats gets a
//! push-model reader over [`avpush_core::gather::ByteGatherer`]. Each parses a fully-buffered
//! `&str` directly and returns its result in one call.

mod cue;
mod m3u;
mod pls;

pub use cue::{parse_cue, CueSheet, CueTrack};
pub use m3u::{parse_m3u, write_m3u, M3uEntry};
pub use pls::{parse_pls, PlsEntry};

use core::fmt;

/// The one error kind this crate raises: a line didn't match the format's own grammar at all
/// (unlike the chunked formats, a malformed playlist line is always a parse failure, never a
/// recoverable warning — there is no stream to resynchronize within).
#[derive(Debug)]
pub struct ParseError {
    pub line: u32,
    pub message: &'static str,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Split `text` into trimmed, non-empty, BOM-stripped lines, tracking 1-based line numbers the
/// way every reader in this crate reports them.
fn lines(text: &str) -> impl Iterator<Item = (u32, &str)> {
    let mut bom_stripped = false;
    text.lines().enumerate().filter_map(move |(idx, raw)| {
        let mut line = raw.trim();
        if !bom_stripped {
            bom_stripped = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }
        if line.is_empty() {
            None
        }
        else {
            Some((idx as u32 + 1, line))
        }
    })
}
