// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.cue` sheet: a sequence of `KEYWORD rest-of-line` lines, most of which belong either to the
//! sheet as a whole or to whichever `TRACK` block most recently opened.

use crate::{lines, ParseError, Result};

/// One `INDEX` point within a track: `number` is `0` for the pre-gap index, `1..=99` for
/// ordinary indices; `frames` is CD frames (75/sec) from the start of the referenced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueIndex {
    pub number: u32,
    pub frames: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueTrack {
    pub number: u32,
    pub performer: Option<String>,
    pub title: Option<String>,
    pub indexes: Vec<CueIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueSheet {
    pub performer: Option<String>,
    pub title: Option<String>,
    pub file: Option<(String, String)>,
    pub rems: Vec<(String, String)>,
    pub tracks: Vec<CueTrack>,
}

/// Parse a full `.cue` sheet.
pub fn parse_cue(text: &str) -> Result<CueSheet> {
    let mut sheet = CueSheet::default();
    let mut current_track: Option<usize> = None;

    for (line_num, line) in lines(text) {
        let (keyword, rest) = split_keyword(line);

        match keyword {
            "REM" => {
                let (name, rest) = take_token(rest);
                let (value, _) = take_value(rest);
                sheet.rems.push((name.to_string(), value));
            }
            "PERFORMER" => {
                let (value, _) = take_value(rest);
                match current_track {
                    Some(idx) => sheet.tracks[idx].performer = Some(value),
                    None => sheet.performer = Some(value),
                }
            }
            "TITLE" => {
                let (value, _) = take_value(rest);
                match current_track {
                    Some(idx) => sheet.tracks[idx].title = Some(value),
                    None => sheet.title = Some(value),
                }
            }
            "FILE" => {
                let (path, rest) = take_value(rest);
                let file_type = rest.trim();
                sheet.file = Some((path, file_type.to_string()));
            }
            "TRACK" => {
                let (num_text, _) = take_token(rest);
                let number = num_text
                    .parse::<u32>()
                    .map_err(|_| ParseError { line: line_num, message: "TRACK number is not an integer" })?;
                sheet.tracks.push(CueTrack { number, ..CueTrack::default() });
                current_track = Some(sheet.tracks.len() - 1);
            }
            "INDEX" => {
                let idx = current_track
                    .ok_or(ParseError { line: line_num, message: "INDEX outside of a TRACK block" })?;
                let (num_text, rest) = take_token(rest);
                let number: u32 = num_text
                    .parse()
                    .map_err(|_| ParseError { line: line_num, message: "INDEX number is not an integer" })?;
                let frames = parse_timestamp(rest.trim())
                    .ok_or(ParseError { line: line_num, message: "INDEX timestamp is not MM:SS:FF" })?;
                sheet.tracks[idx].indexes.push(CueIndex { number, frames });
            }
            // Any other leading keyword is an unrecognized directive; skipped.
            _ => {}
        }
    }

    Ok(sheet)
}

/// Split a line into its leading keyword (matched against the fixed `.cue` keyword set) and the
/// remainder of the line. Unknown keywords are returned as-is so the caller can ignore them.
fn split_keyword(line: &str) -> (&str, &str) {
    let (token, rest) = take_token(line);
    const KEYWORDS: &[&str] = &["FILE", "INDEX", "PERFORMER", "REM", "TITLE", "TRACK"];
    if KEYWORDS.contains(&token) {
        (token, rest.trim_start())
    }
    else {
        ("", line)
    }
}

/// Split off the next whitespace-delimited token.
fn take_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// Take a value that is either a `"quoted string"` or the remainder of the line verbatim.
fn take_value(s: &str) -> (String, &str) {
    if let Some(body) = s.strip_prefix('"') {
        if let Some(end) = body.find('"') {
            return (body[..end].to_string(), body[end + 1..].trim_start());
        }
    }
    (s.trim_end().to_string(), "")
}

/// Parse a CD timestamp `MM:SS:FF` into total CD frames (75 frames/sec).
fn parse_timestamp(s: &str) -> Option<u64> {
    let mut parts = s.splitn(3, ':');
    let min: u64 = parts.next()?.parse().ok()?;
    let sec: u64 = parts.next()?.parse().ok()?;
    let frm: u64 = parts.next()?.parse().ok()?;
    Some((min * 60 + sec) * 75 + frm)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        "REM GENRE Rock\n",
        "PERFORMER \"Pink Floyd\"\n",
        "TITLE \"The Wall\"\n",
        "FILE \"album.wav\" WAVE\n",
        "  TRACK 01 AUDIO\n",
        "    TITLE \"In The Flesh?\"\n",
        "    INDEX 00 00:00:00\n",
        "    INDEX 01 00:01:50\n",
        "  TRACK 02 AUDIO\n",
        "    TITLE \"The Thin Ice\"\n",
        "    INDEX 01 04:20:00\n",
    );

    #[test]
    fn parses_sheet_level_fields() {
        let sheet = parse_cue(SAMPLE).unwrap();
        assert_eq!(sheet.performer.as_deref(), Some("Pink Floyd"));
        assert_eq!(sheet.title.as_deref(), Some("The Wall"));
        assert_eq!(sheet.file, Some(("album.wav".to_string(), "WAVE".to_string())));
        assert_eq!(sheet.rems, vec![("GENRE".to_string(), "Rock".to_string())]);
    }

    #[test]
    fn parses_tracks_with_indexes() {
        let sheet = parse_cue(SAMPLE).unwrap();
        assert_eq!(sheet.tracks.len(), 2);
        assert_eq!(sheet.tracks[0].number, 1);
        assert_eq!(sheet.tracks[0].title.as_deref(), Some("In The Flesh?"));
        assert_eq!(sheet.tracks[0].indexes[0], CueIndex { number: 0, frames: 0 });
        assert_eq!(sheet.tracks[0].indexes[1], CueIndex { number: 1, frames: 1 * 75 + 50 });
        assert_eq!(sheet.tracks[1].indexes[0].frames, (4 * 60 + 20) * 75);
    }

    #[test]
    fn index_outside_track_is_an_error() {
        assert!(parse_cue("INDEX 00 00:00:00\n").is_err());
    }
}
