// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WAVE reader and writer: `RIFF....WAVEfmt <fmt-chunk>data<samples>`, plus an optional `LIST
//! INFO` chunk redispatched to [`avpush_metadata::riff_info`].

use avpush_core::errors::{corrupt, unsupported, Result};
use avpush_core::format::{Codec, Format, Reader, ReaderConf, WriteFlags, Writer, WriterInfo};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status};

use crate::common::{parse_chunk_header, ChunkHeader, CHUNK_HEADER_LEN, RIFF_HEADER_LEN};

const GATHER_CAP: usize = 1024 * 1024;
const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RiffHeader,
    ChunkHeader,
    ChunkBody(ChunkHeader),
    Streaming { remaining: u64 },
    Skipping { remaining: u64, pad: u32 },
    Done,
}

/// Incremental WAVE reader.
pub struct WavReader {
    conf: ReaderConf,
    gather: ByteGatherer,
    state: State,
    block_align: u32,
    sample_pos: u64,
    header_emitted: bool,
    fmt_seen: bool,
}

impl WavReader {
    pub fn new(conf: ReaderConf) -> Self {
        Self {
            conf,
            gather: ByteGatherer::new(),
            state: State::RiffHeader,
            block_align: 0,
            sample_pos: 0,
            header_emitted: false,
            fmt_seen: false,
        }
    }

    fn parse_fmt(&mut self, body: &[u8], out: &mut ReadResult) -> Result<Status> {
        if body.len() < 16 {
            return corrupt("WAVE fmt chunk smaller than the minimum PCM layout");
        }
        let format_tag = u16::from_le_bytes(body[0..2].try_into().unwrap());
        let channels = u16::from_le_bytes(body[2..4].try_into().unwrap());
        let sample_rate = u32::from_le_bytes(body[4..8].try_into().unwrap());
        let block_align = u16::from_le_bytes(body[12..14].try_into().unwrap());
        let bits_per_sample = u16::from_le_bytes(body[14..16].try_into().unwrap());

        let sample_float = match format_tag {
            WAVE_FORMAT_PCM => false,
            WAVE_FORMAT_IEEE_FLOAT => true,
            _ => return unsupported("WAVE fmt: format tag other than PCM/IEEE_FLOAT"),
        };

        self.block_align = block_align as u32;
        self.fmt_seen = true;

        *out = ReadResult::Header(HeaderInfo {
            duration: 0,
            sample_rate,
            sample_bits: bits_per_sample as u8,
            sample_float,
            channels: channels as u8,
            codec: Codec::Pcm,
            real_bitrate: 0,
            encoder_delay: 0,
            end_padding: 0,
        });
        self.header_emitted = true;
        Ok(Status::Header)
    }

    fn parse_info_list(&mut self, body: &[u8], out: &mut ReadResult) -> Result<Status> {
        // Only the first INFO entry is surfaced per call; callers drain repeated META calls the
        // same way any other tag-bearing format does. We stash the rest by re-entering Skipping
        // with a zero pad once drained — simplest correct approach: decode eagerly and queue.
        let mut rest = body;
        while rest.len() >= CHUNK_HEADER_LEN {
            let id: [u8; 4] = rest[0..4].try_into().unwrap();
            let size = u32::from_le_bytes(rest[4..8].try_into().unwrap()) as usize;
            if 8 + size > rest.len() {
                break;
            }
            let payload = &rest[8..8 + size];
            if let Some(tag) = avpush_metadata::riff_info::decode_entry(&id, payload, self.conf.code_page) {
                *out = ReadResult::Tag(tag.into());
                return Ok(Status::Meta);
            }
            rest = &rest[8 + size + (size & 1)..];
        }
        Ok(Status::More)
    }
}

impl Reader for WavReader {
    fn format(&self) -> Format {
        Format::Wav
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        loop {
            match self.state {
                State::RiffHeader => {
                    let (consumed, view) = self.gather.gather(*input, RIFF_HEADER_LEN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let buf = view.as_slice();
                    if &buf[0..4] != b"RIFF" || &buf[8..12] != b"WAVE" {
                        self.gather.reset();
                        return corrupt("WAVE: missing RIFF/WAVE marker");
                    }
                    self.gather.consume(RIFF_HEADER_LEN);
                    self.state = State::ChunkHeader;
                }
                State::ChunkHeader => {
                    let (consumed, view) = self.gather.gather(*input, CHUNK_HEADER_LEN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let header = parse_chunk_header(view.as_slice().try_into().unwrap());
                    self.gather.consume(CHUNK_HEADER_LEN);
                    self.state = State::ChunkBody(header);
                }
                State::ChunkBody(header) => {
                    match &header.id {
                        b"fmt " => {
                            let size = header.size as usize;
                            let (consumed, view) = self.gather.gather(*input, size, GATHER_CAP)?;
                            *input = &input[consumed..];
                            let Some(view) = view else { return Ok(Status::More) };
                            let body = view.as_slice().to_vec();
                            self.gather.consume(size + (header.size & 1) as usize);
                            let status = self.parse_fmt(&body, out)?;
                            self.state = State::ChunkHeader;
                            return Ok(status);
                        }
                        b"LIST" => {
                            let size = header.size as usize;
                            let (consumed, view) = self.gather.gather(*input, size, GATHER_CAP)?;
                            *input = &input[consumed..];
                            let Some(view) = view else { return Ok(Status::More) };
                            let body = view.as_slice().to_vec();
                            self.gather.consume(size + (header.size & 1) as usize);
                            if body.len() >= 4 && &body[0..4] == b"INFO" {
                                let status = self.parse_info_list(&body[4..], out)?;
                                self.state = State::ChunkHeader;
                                if status == Status::Meta {
                                    return Ok(status);
                                }
                            }
                            else {
                                self.state = State::ChunkHeader;
                            }
                        }
                        b"data" => {
                            if !self.fmt_seen {
                                return corrupt("WAVE: data chunk before fmt chunk");
                            }
                            self.state = State::Streaming { remaining: header.size as u64 };
                        }
                        _ => {
                            self.state = State::Skipping {
                                remaining: header.size as u64,
                                pad: header.size & 1,
                            };
                        }
                    }
                }
                State::Streaming { remaining } => {
                    if remaining == 0 {
                        self.state = State::Done;
                        return Ok(Status::Fin);
                    }
                    if input.is_empty() {
                        return Ok(Status::More);
                    }
                    let take = (input.len() as u64).min(remaining) as usize;
                    let bytes = input[..take].to_vec();
                    *input = &input[take..];
                    let samples = if self.block_align > 0 { take as u64 / self.block_align as u64 } else { 0 };
                    let frame = FrameRecord {
                        bytes,
                        pos: Some(self.sample_pos),
                        end_pos: Some(self.sample_pos + samples),
                        duration: Some(samples as u32),
                    };
                    self.sample_pos += samples;
                    self.state = State::Streaming { remaining: remaining - take as u64 };
                    *out = ReadResult::Frame(frame);
                    return Ok(Status::Data);
                }
                State::Skipping { remaining, pad } => {
                    if remaining == 0 {
                        let total = pad as u64;
                        if total > 0 && input.is_empty() {
                            return Ok(Status::More);
                        }
                        let take = (input.len() as u64).min(total) as usize;
                        *input = &input[take..];
                        self.state = State::ChunkHeader;
                        continue;
                    }
                    if input.is_empty() {
                        return Ok(Status::More);
                    }
                    let take = (input.len() as u64).min(remaining) as usize;
                    *input = &input[take..];
                    self.state = State::Skipping { remaining: remaining - take as u64, pad };
                }
                State::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.gather.reset();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Streaming,
    NeedSeekRiffSize,
    EmitRiffSize,
    NeedSeekDataSize,
    EmitDataSize,
    Done,
}

/// Incremental WAVE writer. Header (`RIFF`/`WAVE`/`fmt `/`data` with placeholder sizes) is
/// buffered at `create` and flushed on the first `process` call; `LAST` triggers the two-field
/// finalize (RIFF chunk size at offset 4, `data` chunk size at the offset recorded when the
/// `data` chunk header was written).
pub struct WavWriter {
    state: WriteState,
    data_bytes_written: u64,
    data_size_offset: u64,
    pending: Vec<u8>,
}

impl Default for WavWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WavWriter {
    pub fn new() -> Self {
        Self { state: WriteState::Streaming, data_bytes_written: 0, data_size_offset: 0, pending: Vec::new() }
    }
}

impl Writer for WavWriter {
    fn format(&self) -> Format {
        Format::Wav
    }

    fn create(&mut self, info: &WriterInfo) -> Result<()> {
        if info.codec != Codec::Pcm {
            return unsupported("WAVE writer only emits PCM");
        }
        let block_align = (info.channels as u32 * info.sample_bits as u32).div_ceil(8);
        let byte_rate = info.sample_rate * block_align;

        let mut header = Vec::with_capacity(44);
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&0u32.to_le_bytes()); // patched at finalize
        header.extend_from_slice(b"WAVE");
        header.extend_from_slice(b"fmt ");
        header.extend_from_slice(&16u32.to_le_bytes());
        let format_tag: u16 = if info.sample_float { WAVE_FORMAT_IEEE_FLOAT } else { WAVE_FORMAT_PCM };
        header.extend_from_slice(&format_tag.to_le_bytes());
        header.extend_from_slice(&(info.channels as u16).to_le_bytes());
        header.extend_from_slice(&info.sample_rate.to_le_bytes());
        header.extend_from_slice(&byte_rate.to_le_bytes());
        header.extend_from_slice(&(block_align as u16).to_le_bytes());
        header.extend_from_slice(&(info.sample_bits as u16).to_le_bytes());
        header.extend_from_slice(b"data");
        self.data_size_offset = header.len() as u64 + 4;
        header.extend_from_slice(&0u32.to_le_bytes()); // patched at finalize

        self.pending = header;
        Ok(())
    }

    fn tag_add(&mut self, _id: avpush_core::tag::NormalizedTag, _name: &str, _value: &str) -> Result<()> {
        // A LIST/INFO chunk would have to precede `data`, which is already flushed by the time
        // any tag could arrive through this API; WAVE's writer therefore does not support tags.
        unsupported("WAVE writer does not support tag_add (LIST INFO must be written before data)")
    }

    fn process(&mut self, frame: &[u8], flags: WriteFlags, out: &mut ReadResult) -> Result<Status> {
        match self.state {
            WriteState::Streaming => {
                let mut bytes = std::mem::take(&mut self.pending);
                bytes.extend_from_slice(frame);
                self.data_bytes_written += frame.len() as u64;

                if flags.contains(WriteFlags::LAST) {
                    self.state = WriteState::NeedSeekRiffSize;
                }

                *out = ReadResult::Frame(FrameRecord { bytes, pos: None, end_pos: None, duration: None });
                Ok(Status::Data)
            }
            WriteState::NeedSeekRiffSize => {
                self.state = WriteState::EmitRiffSize;
                *out = ReadResult::SeekOffset(4);
                Ok(Status::Seek)
            }
            WriteState::EmitRiffSize => {
                let riff_size = 4 + (8 + 16) + (8 + self.data_bytes_written);
                self.state = WriteState::NeedSeekDataSize;
                *out = ReadResult::Frame(FrameRecord {
                    bytes: (riff_size as u32).to_le_bytes().to_vec(),
                    pos: None,
                    end_pos: None,
                    duration: None,
                });
                Ok(Status::Data)
            }
            WriteState::NeedSeekDataSize => {
                self.state = WriteState::EmitDataSize;
                *out = ReadResult::SeekOffset(self.data_size_offset);
                Ok(Status::Seek)
            }
            WriteState::EmitDataSize => {
                self.state = WriteState::Done;
                *out = ReadResult::Frame(FrameRecord {
                    bytes: (self.data_bytes_written as u32).to_le_bytes().to_vec(),
                    pos: None,
                    end_pos: None,
                    duration: None,
                });
                Ok(Status::Data)
            }
            WriteState::Done => Ok(Status::Fin),
        }
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_pcm_wav(channels: u16, rate: u32, bits: u16, data: &[u8]) -> Vec<u8> {
        let block_align = (channels * bits / 8) as u32;
        let byte_rate = rate * block_align;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        let riff_size = 4 + 24 + 8 + data.len() as u32;
        out.extend_from_slice(&riff_size.to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&((block_align) as u16).to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn drain(reader: &mut WavReader, mut input: &[u8]) -> Vec<(Status, ReadResult)> {
        let mut out = Vec::new();
        loop {
            let mut result = ReadResult::default();
            let status = reader.process(&mut input, &mut result).unwrap();
            let done = matches!(status, Status::Fin | Status::More) && input.is_empty();
            out.push((status, result));
            if status == Status::Fin || (status == Status::More && input.is_empty()) {
                if done {
                    break;
                }
            }
        }
        out
    }

    #[test]
    fn reads_header_and_single_data_frame() {
        let wav = build_pcm_wav(2, 48000, 16, b"1234");
        let mut reader = WavReader::new(ReaderConf::default());
        let events = drain(&mut reader, &wav);

        let header = events.iter().find_map(|(s, r)| {
            if *s == Status::Header {
                if let ReadResult::Header(h) = r {
                    return Some(h.clone());
                }
            }
            None
        });
        let header = header.expect("expected a Header event");
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 48000);
        assert_eq!(header.sample_bits, 16);

        let frame = events.iter().find_map(|(s, r)| {
            if *s == Status::Data {
                if let ReadResult::Frame(f) = r {
                    return Some(f.bytes.clone());
                }
            }
            None
        });
        assert_eq!(frame.unwrap(), b"1234".to_vec());
    }

    #[test]
    fn chunking_invariance_three_byte_slices() {
        let wav = build_pcm_wav(1, 44100, 8, b"abcdefgh");

        let mut whole_reader = WavReader::new(ReaderConf::default());
        let whole = drain(&mut whole_reader, &wav);

        let mut chunked_reader = WavReader::new(ReaderConf::default());
        let mut collected = Vec::new();
        let mut offset = 0;
        loop {
            let end = (offset + 3).min(wav.len());
            let mut slice = &wav[offset..end];
            offset = end;
            loop {
                let mut result = ReadResult::default();
                let status = chunked_reader.process(&mut slice, &mut result).unwrap();
                if status != Status::More {
                    collected.push((status, result));
                }
                else {
                    break;
                }
                if status == Status::Fin {
                    break;
                }
            }
            if offset >= wav.len() {
                break;
            }
        }

        let whole_statuses: Vec<_> = whole.iter().map(|(s, _)| *s).filter(|s| *s != Status::More).collect();
        let chunked_statuses: Vec<_> = collected.iter().map(|(s, _)| *s).collect();
        assert_eq!(whole_statuses, chunked_statuses);
    }

    #[test]
    fn rejects_non_pcm_format_tag() {
        let mut wav = build_pcm_wav(2, 44100, 16, b"xx");
        wav[20] = 0x06; // mangle wFormatTag to something unsupported (A-law)
        wav[21] = 0x00;
        let mut reader = WavReader::new(ReaderConf::default());
        let mut input = &wav[..];
        loop {
            let mut result = ReadResult::default();
            let status = reader.process(&mut input, &mut result).unwrap_or(Status::Error);
            if status == Status::Error {
                return;
            }
            if input.is_empty() {
                break;
            }
        }
        panic!("expected an error or Result::Err for unsupported format tag");
    }

    #[test]
    fn writer_round_trips_header_and_frame() {
        let mut writer = WavWriter::new();
        writer
            .create(&WriterInfo {
                codec: Codec::Pcm,
                sample_rate: 48000,
                channels: 2,
                sample_bits: 16,
                sample_float: false,
                total_samples: 0,
                encoder_delay: 0,
                end_padding: 0,
            })
            .unwrap();

        let mut written: Vec<u8> = Vec::new();
        let mut pos: usize = 0;

        fn write_at(written: &mut Vec<u8>, pos: &mut usize, bytes: &[u8]) {
            let end = *pos + bytes.len();
            if written.len() < end {
                written.resize(end, 0);
            }
            written[*pos..end].copy_from_slice(bytes);
            *pos = end;
        }

        let mut result = ReadResult::default();
        let status = writer.process(b"1234", WriteFlags::LAST, &mut result).unwrap();
        assert_eq!(status, Status::Data);
        if let ReadResult::Frame(f) = result {
            write_at(&mut written, &mut pos, &f.bytes);
        }

        // Drive the finalize sequence: Seek, Data(riff size), Seek, Data(data size).
        for _ in 0..4 {
            let mut result = ReadResult::default();
            let status = writer.process(&[], WriteFlags::empty(), &mut result).unwrap();
            match result {
                ReadResult::Frame(f) => write_at(&mut written, &mut pos, &f.bytes),
                ReadResult::SeekOffset(off) => pos = off as usize,
                _ => {}
            }
            if status == Status::Fin {
                break;
            }
        }

        let mut reader = WavReader::new(ReaderConf::default());
        let events = drain(&mut reader, &written);
        let frame = events.iter().find_map(|(s, r)| {
            if *s == Status::Data {
                if let ReadResult::Frame(f) = r {
                    return Some(f.bytes.clone());
                }
            }
            None
        });
        assert_eq!(frame.unwrap(), b"1234".to_vec());
    }
}
