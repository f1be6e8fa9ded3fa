// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The format sniffer: a pure function over an input prefix. The only piece of this library
//! that is not an instance method on some reader/writer state.

use crate::format::Format;

/// Detect the container/codec format from the first bytes of a stream. `data` should be at
/// least 189 bytes for a fully reliable result (to rule in/out MPEG-TS), but shorter prefixes
/// still resolve unambiguous formats.
pub fn detect(data: &[u8]) -> Option<Format> {
    if data.len() >= 189 && data[0] == 0x47 && data[188] == 0x47 {
        return Some(Format::Ts);
    }

    if data.len() >= 12 && &data[0..4] == b"RIFF" {
        if &data[8..12] == b"WAVE" {
            return Some(Format::Wav);
        }
        if &data[8..12] == b"AVI " {
            return Some(Format::Avi);
        }
    }

    if data.len() >= 11 && &data[0..10] == b"[playlist]" && (data[10] == b'\r' || data[10] == b'\n') {
        return Some(Format::Pls);
    }

    if data.len() >= 10 && &data[0..4] == b"wvpk" && data[9] == 0x04 {
        return Some(Format::WavPack);
    }

    if data.len() >= 8 && &data[4..8] == b"ftyp" && u32::from_be_bytes(data[0..4].try_into().unwrap()) <= 255 {
        return Some(Format::Mp4);
    }

    if data.len() >= 8 && &data[0..8] == b"caff\x00\x01\x00\x00" {
        return Some(Format::Caf);
    }

    if data.len() >= 8 && &data[0..7] == b"#EXTM3U" && (data[7] == b'\r' || data[7] == b'\n') {
        return Some(Format::M3u);
    }

    if data.len() >= 7 && adts_sync_valid(data) {
        return Some(Format::Aac);
    }

    if data.len() >= 5 && &data[0..4] == b"OggS" && data[4] == 0 {
        return Some(Format::Ogg);
    }

    if data.len() >= 5 && &data[0..4] == b"fLaC" && (data[4] & 0x7f) < 9 {
        return Some(Format::Flac);
    }

    if data.len() >= 5 && &data[0..3] == b"ID3" && data[3] <= 9 && data[4] <= 9 {
        return Some(Format::Id3);
    }

    if data.len() >= 4 && &data[0..4] == b"\x1a\x45\xdf\xa3" {
        return Some(Format::Mkv);
    }

    if data.len() >= 4 && mpeg1_sync_valid(data) {
        return Some(Format::Mp3);
    }

    None
}

/// ADTS sync word (12-bit `0xFFF`) plus the header fields that can be validated from a fixed
/// prefix alone (MPEG version bit, layer bits, sampling-frequency index, channel config).
fn adts_sync_valid(d: &[u8]) -> bool {
    if d[0] != 0xFF || (d[1] & 0xF0) != 0xF0 {
        return false;
    }
    let sfi = (d[2] >> 2) & 0x0F;
    let chan_cfg = ((d[2] & 0x01) << 2) | ((d[3] >> 6) & 0x03);
    sfi < 13 && chan_cfg != 0
}

/// MPEG-1/2 audio sync word (11 bits set) plus a non-reserved layer and bitrate index.
fn mpeg1_sync_valid(d: &[u8]) -> bool {
    if d[0] != 0xFF || (d[1] & 0xE0) != 0xE0 {
        return false;
    }
    let layer = (d[1] >> 1) & 0x03;
    let bitrate_idx = (d[2] >> 4) & 0x0F;
    let sr_idx = (d[2] >> 2) & 0x03;
    layer != 0 && bitrate_idx != 0x0F && sr_idx != 0x03
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wav_and_avi() {
        let mut wav = vec![0u8; 12];
        wav[0..4].copy_from_slice(b"RIFF");
        wav[8..12].copy_from_slice(b"WAVE");
        assert_eq!(detect(&wav), Some(Format::Wav));

        let mut avi = wav.clone();
        avi[8..12].copy_from_slice(b"AVI ");
        assert_eq!(detect(&avi), Some(Format::Avi));
    }

    #[test]
    fn detects_ogg_and_flac() {
        assert_eq!(detect(b"OggS\0rest-of-bytes"), Some(Format::Ogg));
        assert_eq!(detect(b"fLaC\x80restofbytes"), Some(Format::Flac));
    }

    #[test]
    fn detects_mkv() {
        assert_eq!(detect(&[0x1a, 0x45, 0xdf, 0xa3, 0, 0, 0, 0]), Some(Format::Mkv));
    }
}
