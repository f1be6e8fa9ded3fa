// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal AVI reader. AVI is a sibling of WAVE under the same RIFF container engine but this
//! library does not decode or remux video; the reader's only job is to surface the `movi` list's
//! audio sub-chunks (any `##wb`-suffixed id, not just a specifically-matched stream index — see
//! `DESIGN.md` for why per-stream disambiguation was dropped) as frames after an empty HEADER.
//! Everything else (`hdrl`, `idx1`, `JUNK`) is skipped wholesale via the RIFF chunk header.

use avpush_core::errors::{corrupt, Result};
use avpush_core::format::{Codec, Format, Reader, ReaderConf};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status};

use crate::common::{parse_chunk_header, CHUNK_HEADER_LEN, RIFF_HEADER_LEN};

const GATHER_CAP: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RiffHeader,
    TopChunkHeader,
    SkipTopChunk { remaining: u32, pad: u32 },
    MovieChunkHeader,
    MovieFrame { remaining: u32, is_audio: bool, pad: u32 },
    Done,
}

pub struct AviReader {
    gather: ByteGatherer,
    state: State,
    header_emitted: bool,
    /// Bytes remaining in the `movi` list; bounds `MovieChunkHeader`/`MovieFrame` so the reader
    /// doesn't misparse whatever list (typically `idx1`) follows `movi` as more sub-chunks.
    movi_remaining: u32,
}

impl AviReader {
    pub fn new(_conf: ReaderConf) -> Self {
        Self { gather: ByteGatherer::new(), state: State::RiffHeader, header_emitted: false, movi_remaining: 0 }
    }

    fn emit_header(&mut self, out: &mut ReadResult) -> Status {
        *out = ReadResult::Header(HeaderInfo {
            duration: 0,
            sample_rate: 0,
            sample_bits: 0,
            sample_float: false,
            channels: 0,
            codec: Codec::Unknown,
            real_bitrate: 0,
            encoder_delay: 0,
            end_padding: 0,
        });
        self.header_emitted = true;
        Status::Header
    }
}

impl Reader for AviReader {
    fn format(&self) -> Format {
        Format::Avi
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        loop {
            match self.state {
                State::RiffHeader => {
                    let (consumed, view) = self.gather.gather(*input, RIFF_HEADER_LEN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let buf = view.as_slice();
                    if &buf[0..4] != b"RIFF" || &buf[8..12] != b"AVI " {
                        self.gather.reset();
                        return corrupt("AVI: missing RIFF/AVI marker");
                    }
                    self.gather.consume(RIFF_HEADER_LEN);
                    self.state = State::TopChunkHeader;
                }
                State::TopChunkHeader => {
                    let (consumed, view) = self.gather.gather(*input, CHUNK_HEADER_LEN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let header = parse_chunk_header(view.as_slice().try_into().unwrap());
                    self.gather.consume(CHUNK_HEADER_LEN);

                    if &header.id == b"LIST" {
                        let (consumed, view) = self.gather.gather(*input, 4, GATHER_CAP)?;
                        *input = &input[consumed..];
                        let Some(view) = view else { return Ok(Status::More) };
                        let list_type: [u8; 4] = view.as_slice().try_into().unwrap();
                        self.gather.consume(4);
                        if &list_type == b"movi" {
                            self.movi_remaining = header.size - 4;
                            if !self.header_emitted {
                                let status = self.emit_header(out);
                                self.state = State::MovieChunkHeader;
                                return Ok(status);
                            }
                            self.state = State::MovieChunkHeader;
                        }
                        else {
                            self.state = State::SkipTopChunk { remaining: header.size - 4, pad: header.size & 1 };
                        }
                    }
                    else {
                        self.state = State::SkipTopChunk { remaining: header.size, pad: header.size & 1 };
                    }
                }
                State::SkipTopChunk { remaining, pad } => {
                    if remaining == 0 {
                        if pad > 0 {
                            if input.is_empty() {
                                return Ok(Status::More);
                            }
                            let take = (input.len() as u32).min(pad);
                            *input = &input[take as usize..];
                        }
                        self.state = State::TopChunkHeader;
                        continue;
                    }
                    if input.is_empty() {
                        return Ok(Status::More);
                    }
                    let take = (input.len() as u32).min(remaining);
                    *input = &input[take as usize..];
                    self.state = State::SkipTopChunk { remaining: remaining - take, pad };
                }
                State::MovieChunkHeader => {
                    if self.movi_remaining < CHUNK_HEADER_LEN as u32 {
                        self.state = State::Done;
                        continue;
                    }
                    let (consumed, view) = self.gather.gather(*input, CHUNK_HEADER_LEN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let header = parse_chunk_header(view.as_slice().try_into().unwrap());
                    self.gather.consume(CHUNK_HEADER_LEN);
                    let is_audio = &header.id[2..4] == b"wb";
                    let padded = header.size + (header.size & 1);
                    self.movi_remaining = self.movi_remaining.saturating_sub(CHUNK_HEADER_LEN as u32 + padded);
                    self.state = State::MovieFrame { remaining: header.size, is_audio, pad: header.size & 1 };
                }
                State::MovieFrame { remaining, is_audio, pad } => {
                    if remaining == 0 {
                        if pad > 0 {
                            if input.is_empty() {
                                return Ok(Status::More);
                            }
                            let take = (input.len() as u32).min(pad);
                            *input = &input[take as usize..];
                        }
                        self.state = State::MovieChunkHeader;
                        continue;
                    }
                    if input.is_empty() {
                        return Ok(Status::More);
                    }
                    let take = (input.len() as u32).min(remaining);
                    let bytes = input[..take as usize].to_vec();
                    *input = &input[take as usize..];
                    let next = State::MovieFrame { remaining: remaining - take, is_audio, pad };
                    if is_audio {
                        self.state = next;
                        *out = ReadResult::Frame(FrameRecord { bytes, pos: None, end_pos: None, duration: None });
                        return Ok(Status::Data);
                    }
                    self.state = next;
                }
                State::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.gather.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_avi(audio_payload: &[u8]) -> Vec<u8> {
        let mut movi_body = Vec::new();
        movi_body.extend_from_slice(b"movi");
        movi_body.extend_from_slice(b"00wb");
        movi_body.extend_from_slice(&(audio_payload.len() as u32).to_le_bytes());
        movi_body.extend_from_slice(audio_payload);
        if audio_payload.len() % 2 == 1 {
            movi_body.push(0);
        }

        let mut list = Vec::new();
        list.extend_from_slice(b"LIST");
        list.extend_from_slice(&(movi_body.len() as u32).to_le_bytes());
        list.extend_from_slice(&movi_body);

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&((4 + list.len()) as u32).to_le_bytes());
        out.extend_from_slice(b"AVI ");
        out.extend_from_slice(&list);
        out
    }

    #[test]
    fn passes_through_audio_subchunk() {
        let avi = build_minimal_avi(b"soundbytes");
        let mut reader = AviReader::new(ReaderConf::default());
        let mut input = &avi[..];
        let mut saw_header = false;
        let mut frame = None;
        loop {
            let mut result = ReadResult::default();
            let status = reader.process(&mut input, &mut result).unwrap();
            match status {
                Status::Header => saw_header = true,
                Status::Data => {
                    if let ReadResult::Frame(f) = result {
                        frame = Some(f.bytes);
                    }
                }
                Status::More if input.is_empty() => break,
                Status::Fin => break,
                _ => {}
            }
        }
        assert!(saw_header);
        assert_eq!(frame.unwrap(), b"soundbytes".to_vec());
    }
}
