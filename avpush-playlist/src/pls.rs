// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.pls` playlist:
//! ```text
//! [playlist]
//! File1=/path/filename
//! Title1=Some Title
//! Length1=180
//! ```

use crate::{lines, ParseError, Result};

/// One playlist entry, indexed the way `.pls` indexes its `FileN`/`TitleN`/`LengthN` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlsEntry {
    pub index: u32,
    pub url: Option<String>,
    pub title: Option<String>,
    pub length_sec: Option<i64>,
}

/// Parse a `.pls` playlist. The first non-empty line must case-insensitively equal `[playlist]`;
/// everything after is `Key=Value`, keyed by a `file`/`title`/`length` prefix plus a trailing
/// index number. Unrecognized keys are skipped, not errors.
pub fn parse_pls(text: &str) -> Result<Vec<PlsEntry>> {
    let mut iter = lines(text);

    match iter.next() {
        Some((_, line)) if line.eq_ignore_ascii_case("[playlist]") => {}
        Some((line_num, _)) => return Err(ParseError { line: line_num, message: "first line is not [playlist]" }),
        None => return Err(ParseError { line: 1, message: "empty input" }),
    }

    let mut entries: Vec<PlsEntry> = Vec::new();

    for (_line_num, line) in iter {
        let Some(eq) = line.find('=') else { continue };
        let key = &line[..eq];
        let value = &line[eq + 1..];

        let (prefix, suffix) = split_key(key);
        let Some(index) = suffix.parse::<u32>().ok() else { continue };

        match prefix {
            p if p.eq_ignore_ascii_case("file") => entry_for(&mut entries, index).url = Some(value.to_string()),
            p if p.eq_ignore_ascii_case("title") => entry_for(&mut entries, index).title = Some(value.to_string()),
            p if p.eq_ignore_ascii_case("length") => {
                entry_for(&mut entries, index).length_sec = Some(value.trim().parse().unwrap_or(0));
            }
            _ => continue,
        }
    }

    entries.sort_by_key(|e| e.index);
    Ok(entries)
}

/// Find (or append) the entry for `index`.
fn entry_for(entries: &mut Vec<PlsEntry>, index: u32) -> &mut PlsEntry {
    if let Some(pos) = entries.iter().position(|e| e.index == index) {
        &mut entries[pos]
    }
    else {
        entries.push(PlsEntry { index, ..PlsEntry::default() });
        entries.last_mut().unwrap()
    }
}

/// Split `NumberSuffix` key into its longest alphabetic prefix and trailing digit suffix, e.g.
/// `"File12"` -> `("File", "12")`.
fn split_key(key: &str) -> (&str, &str) {
    let split = key.find(|c: char| c.is_ascii_digit()).unwrap_or(key.len());
    key.split_at(split)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_title_length() {
        let text = "[playlist]\nFile1=http://example.com/a.mp3\nTitle1=Stream A\nLength1=-1\n";
        let entries = parse_pls(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[0].url.as_deref(), Some("http://example.com/a.mp3"));
        assert_eq!(entries[0].title.as_deref(), Some("Stream A"));
        assert_eq!(entries[0].length_sec, Some(-1));
    }

    #[test]
    fn rejects_missing_playlist_header() {
        assert!(parse_pls("File1=a.mp3\n").is_err());
    }

    #[test]
    fn header_is_case_insensitive_and_unknown_keys_skipped() {
        let text = "[PlayList]\nNumberOfEntries=1\nFile1=a.mp3\nVersion=2\n";
        let entries = parse_pls(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url.as_deref(), Some("a.mp3"));
    }

    #[test]
    fn multiple_entries_sorted_by_index() {
        let text = "[playlist]\nFile2=b.mp3\nFile1=a.mp3\n";
        let entries = parse_pls(text).unwrap();
        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[1].index, 2);
    }
}
