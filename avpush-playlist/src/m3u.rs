// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.m3u` playlist:
//! ```text
//! #EXTM3U
//! #EXTINF:DUR_SEC,ARTIST - TITLE
//! /path/filename
//! ```

use crate::{lines, ParseError, Result};

/// One playlist entry: the accumulated `#EXTINF` fields (if any preceded it) plus the URL line
/// that closes them out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct M3uEntry {
    pub url: String,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub duration_sec: Option<i32>,
}

/// Parse an entire `.m3u` playlist. `#EXTM3U` and unrecognized `#`-prefixed lines are skipped;
/// every non-`#` line closes out the most recently seen `#EXTINF` fields (if any) into an entry.
pub fn parse_m3u(text: &str) -> Result<Vec<M3uEntry>> {
    let mut entries = Vec::new();
    let mut pending = M3uEntry::default();
    let mut have_pending_info = false;

    for (_line_num, line) in lines(text) {
        if let Some(rest) = line.strip_prefix('#') {
            if rest.eq_ignore_ascii_case("EXTM3U") {
                continue;
            }
            if let Some(info) = rest_of_extinf(rest) {
                let (dur_text, tail) = match info.find(',') {
                    Some(pos) => (&info[..pos], &info[pos + 1..]),
                    None => (info, ""),
                };
                let duration_sec = dur_text.trim().parse::<i32>().ok().map(|d| d.max(0));
                let (artist, title) = match tail.find(" - ") {
                    Some(pos) => (Some(tail[..pos].to_string()), Some(tail[pos + 3..].to_string())),
                    None => (None, Some(tail.to_string())),
                };
                pending = M3uEntry { url: String::new(), artist, title, duration_sec };
                have_pending_info = true;
            }
            // Any other `#`-prefixed line is an unrecognized extension line; ignored.
            continue;
        }

        if have_pending_info {
            pending.url = line.to_string();
            entries.push(std::mem::take(&mut pending));
            have_pending_info = false;
        }
        else {
            entries.push(M3uEntry { url: line.to_string(), ..M3uEntry::default() });
        }
    }

    if have_pending_info {
        return Err(ParseError { line: entries.len() as u32 + 1, message: "#EXTINF with no following URL line" });
    }

    Ok(entries)
}

fn rest_of_extinf(rest: &str) -> Option<&str> {
    rest.strip_prefix("EXTINF:").or_else(|| rest.strip_prefix("extinf:"))
}

/// Serialize entries back into `.m3u` text. `crlf` selects `\r\n` line endings (the format's own
/// default) over bare `\n`.
pub fn write_m3u(entries: &[M3uEntry], crlf: bool) -> String {
    let nl = if crlf { "\r\n" } else { "\n" };
    let mut out = String::new();
    out.push_str("#EXTM3U");
    out.push_str(nl);

    for e in entries {
        let sep = if e.artist.is_none() && e.title.is_none() { "" } else { " - " };
        out.push_str(&format!(
            "#EXTINF:{},{}{}{}{}",
            e.duration_sec.unwrap_or(0),
            e.artist.as_deref().unwrap_or(""),
            sep,
            e.title.as_deref().unwrap_or(""),
            nl,
        ));
        out.push_str(&e.url);
        out.push_str(nl);
    }

    out
}
