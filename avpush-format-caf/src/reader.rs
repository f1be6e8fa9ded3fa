// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `caff\x00\x01\x00\x00` magic followed by a flat sequence of big-endian
//! `{ id: [u8; 4], size: i64 }` chunks. `desc` carries the stream format, `info` carries
//! Vorbis-Comment-shaped tags, `pakt` carries the packet table a variable-bitrate codec needs to
//! split `data` into packets, and `kuki` carries an opaque codec magic cookie this reader does
//! not interpret (mirroring this library's MP4 demuxer, which likewise treats `esds`'s
//! decoder-specific bytes as out of scope for a container reader).

use std::collections::VecDeque;

use avpush_core::errors::{corrupt, unsupported, Result};
use avpush_core::format::{Codec, Format, Reader, ReaderConf};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status};
use avpush_metadata::tables::{lookup, VORBIS_NAMES};
use avpush_metadata::text::decode_text_fallback;

const MAGIC_LEN: usize = 8;
const CHUNK_HEADER_LEN: usize = 12;
const DESC_LEN: usize = 32;
const META_CHUNK_MAX: usize = 2 * 1024 * 1024;
const DATA_READ_MAX: usize = 1024 * 1024;

const FLAG_FLOAT: u32 = 0x1;
const FLAG_LITTLE_ENDIAN: u32 = 0x2;

/// `size == -1` marks a `data` chunk that runs to end of stream (only chunk type allowed to use
/// this sentinel).
const SIZE_TO_EOF: i64 = -1;

#[derive(Debug, Clone, Copy)]
struct ChunkHeader {
    id: [u8; 4],
    size: i64,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Magic,
    ChunkHeader,
    ChunkBody(ChunkHeader),
    DataEditCount(ChunkHeader),
    DrainTags,
    Streaming { remaining: Option<u64> },
    Skipping { remaining: u64 },
    Done,
}

/// Incremental CAF reader.
pub struct CafReader {
    conf: ReaderConf,
    gather: ByteGatherer,
    state: State,

    sample_rate: f64,
    channels: u32,
    bits_per_channel: u32,
    bytes_per_packet: u32,
    frames_per_packet: u32,
    format_flags: u32,
    codec: Codec,
    desc_seen: bool,
    header_emitted: bool,

    total_valid_frames: u64,
    packet_sizes: Vec<u64>,
    next_packet_index: usize,
    sample_pos: u64,

    pending_tags: VecDeque<(String, String)>,
}

impl CafReader {
    pub fn new(conf: ReaderConf) -> Self {
        Self {
            conf,
            gather: ByteGatherer::new(),
            state: State::Magic,
            sample_rate: 0.0,
            channels: 0,
            bits_per_channel: 0,
            bytes_per_packet: 0,
            frames_per_packet: 0,
            format_flags: 0,
            codec: Codec::Unknown,
            desc_seen: false,
            header_emitted: false,
            total_valid_frames: 0,
            packet_sizes: Vec::new(),
            next_packet_index: 0,
            sample_pos: 0,
            pending_tags: VecDeque::new(),
        }
    }

    fn parse_desc(&mut self, body: &[u8]) -> Result<()> {
        self.sample_rate = f64::from_bits(u64::from_be_bytes(body[0..8].try_into().unwrap()));
        let format_id: [u8; 4] = body[8..12].try_into().unwrap();
        self.format_flags = u32::from_be_bytes(body[12..16].try_into().unwrap());
        self.bytes_per_packet = u32::from_be_bytes(body[16..20].try_into().unwrap());
        self.frames_per_packet = u32::from_be_bytes(body[20..24].try_into().unwrap());
        self.channels = u32::from_be_bytes(body[24..28].try_into().unwrap());
        self.bits_per_channel = u32::from_be_bytes(body[28..32].try_into().unwrap());

        self.codec = match &format_id {
            b"lpcm" => Codec::Pcm,
            b"alac" => Codec::Alac,
            b"aac " => Codec::Aac,
            _ => return unsupported("CAF: desc format id other than lpcm/alac/aac "),
        };
        if self.sample_rate <= 0.0 || self.channels == 0 {
            return corrupt("CAF: desc chunk has zero sample rate or channel count");
        }
        self.desc_seen = true;
        Ok(())
    }

    fn parse_info(&mut self, body: &[u8]) -> Result<()> {
        if body.len() < 4 {
            return corrupt("CAF: info chunk shorter than its entry count field");
        }
        let count = u32::from_be_bytes(body[0..4].try_into().unwrap());
        let mut rest = &body[4..];
        for _ in 0..count {
            let Some(key_end) = rest.iter().position(|&b| b == 0) else {
                return corrupt("CAF: info entry key is not NUL-terminated");
            };
            let key = decode_text_fallback(&rest[..key_end], self.conf.code_page);
            rest = &rest[key_end + 1..];
            let Some(value_end) = rest.iter().position(|&b| b == 0) else {
                return corrupt("CAF: info entry value is not NUL-terminated");
            };
            let value = decode_text_fallback(&rest[..value_end], self.conf.code_page);
            rest = &rest[value_end + 1..];
            self.pending_tags.push_back((key, value));
        }
        Ok(())
    }

    /// `pakt`: packet table header plus, for variable-bitrate codecs, one 7-bit-continuation
    /// varint per packet giving that packet's byte size.
    fn parse_pakt(&mut self, body: &[u8]) -> Result<()> {
        if !self.desc_seen {
            return corrupt("CAF: pakt chunk appeared before desc chunk");
        }
        if body.len() < 24 {
            return corrupt("CAF: pakt chunk shorter than its fixed header");
        }
        let num_packets = u64::from_be_bytes(body[0..8].try_into().unwrap());
        self.total_valid_frames = u64::from_be_bytes(body[8..16].try_into().unwrap());
        // body[16..20] = priming frames, body[20..24] = remainder frames; neither is surfaced
        // through `HeaderInfo` today.

        if self.bytes_per_packet == 0 {
            let mut pos = 24;
            self.packet_sizes.reserve(num_packets as usize);
            for _ in 0..num_packets {
                let (size, used) = parse_varint(&body[pos..])?;
                self.packet_sizes.push(size);
                pos += used;
            }
        }
        Ok(())
    }

    fn build_header(&self) -> HeaderInfo {
        let sample_float = self.codec == Codec::Pcm && (self.format_flags & FLAG_FLOAT) != 0;
        HeaderInfo {
            duration: self.total_valid_frames,
            sample_rate: self.sample_rate.round() as u32,
            sample_bits: self.bits_per_channel as u8,
            sample_float,
            channels: self.channels as u8,
            codec: self.codec,
            real_bitrate: 0,
            encoder_delay: 0,
            end_padding: 0,
        }
    }

    fn next_frame(&mut self, input: &mut &[u8], remaining: Option<u64>, out: &mut ReadResult) -> Result<Status> {
        if self.bytes_per_packet != 0 {
            // Constant bit rate (PCM or a fixed-size-packet codec): stream as many whole packets
            // as are available in one go, capped at `DATA_READ_MAX`.
            let bound = remaining.map(|r| r as usize).unwrap_or(usize::MAX).min(input.len());
            if bound == 0 {
                if remaining == Some(0) || (remaining.is_none() && input.is_empty()) {
                    self.state = State::Done;
                    return Ok(Status::Fin);
                }
                return Ok(Status::More);
            }
            let packet_bytes = self.bytes_per_packet as usize;
            let whole_packets = bound.min(DATA_READ_MAX) / packet_bytes;
            if whole_packets == 0 {
                return Ok(Status::More);
            }
            let take = whole_packets * packet_bytes;
            let bytes = input[..take].to_vec();
            *input = &input[take..];
            let frames = whole_packets as u64 * self.frames_per_packet.max(1) as u64;
            let frame = FrameRecord {
                bytes,
                pos: Some(self.sample_pos),
                end_pos: Some(self.sample_pos + frames),
                duration: Some(frames as u32),
            };
            self.sample_pos += frames;
            self.state = State::Streaming { remaining: remaining.map(|r| r - take as u64) };
            *out = ReadResult::Frame(frame);
            return Ok(Status::Data);
        }

        // Variable bit rate: `pakt` gave us an exact byte size per packet.
        if self.next_packet_index >= self.packet_sizes.len() {
            self.state = State::Done;
            return Ok(Status::Fin);
        }
        let size = self.packet_sizes[self.next_packet_index] as usize;
        if input.len() < size {
            return Ok(Status::More);
        }
        let bytes = input[..size].to_vec();
        *input = &input[size..];
        self.next_packet_index += 1;
        let frames = self.frames_per_packet.max(1) as u64;
        let frame = FrameRecord {
            bytes,
            pos: Some(self.sample_pos),
            end_pos: Some(self.sample_pos + frames),
            duration: Some(frames as u32),
        };
        self.sample_pos += frames;
        self.state = State::Streaming { remaining: remaining.map(|r| r.saturating_sub(size as u64)) };
        *out = ReadResult::Frame(frame);
        Ok(Status::Data)
    }
}

impl Reader for CafReader {
    fn format(&self) -> Format {
        Format::Caf
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        loop {
            match self.state {
                State::Magic => {
                    let (consumed, view) = self.gather.gather(*input, MAGIC_LEN, MAGIC_LEN)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let buf = view.as_slice();
                    if &buf[0..4] != b"caff" || &buf[4..6] != [0, 1] {
                        self.gather.reset();
                        return corrupt("CAF: missing 'caff' magic or unsupported version");
                    }
                    self.gather.consume(MAGIC_LEN);
                    self.state = State::ChunkHeader;
                }
                State::ChunkHeader => {
                    let (consumed, view) = self.gather.gather(*input, CHUNK_HEADER_LEN, CHUNK_HEADER_LEN)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let buf = view.as_slice();
                    let header = ChunkHeader {
                        id: buf[0..4].try_into().unwrap(),
                        size: i64::from_be_bytes(buf[4..12].try_into().unwrap()),
                    };
                    self.gather.consume(CHUNK_HEADER_LEN);
                    if header.size < 0 && !(header.size == SIZE_TO_EOF && &header.id == b"data") {
                        return corrupt("CAF: negative chunk size on a chunk other than a final data chunk");
                    }
                    self.state = State::ChunkBody(header);
                }
                State::ChunkBody(header) if &header.id == b"data" => {
                    if !self.desc_seen {
                        return corrupt("CAF: data chunk appeared before desc chunk");
                    }
                    if !self.header_emitted {
                        self.header_emitted = true;
                        *out = ReadResult::Header(self.build_header());
                        return Ok(Status::Header);
                    }
                    self.state = State::DataEditCount(header);
                }
                State::DataEditCount(header) => {
                    let (consumed, view) = self.gather.gather(*input, 4, 4)?;
                    *input = &input[consumed..];
                    let Some(_view) = view else { return Ok(Status::More) };
                    self.gather.consume(4);
                    let remaining = if header.size == SIZE_TO_EOF {
                        None
                    }
                    else {
                        Some((header.size as u64).saturating_sub(4))
                    };
                    self.state = State::Streaming { remaining };
                }
                State::ChunkBody(header) if &header.id == b"desc" => {
                    if header.size as usize != DESC_LEN {
                        return corrupt("CAF: desc chunk is not exactly 32 bytes");
                    }
                    let (consumed, view) = self.gather.gather(*input, DESC_LEN, DESC_LEN)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(DESC_LEN);
                    self.parse_desc(&body)?;
                    self.state = State::ChunkHeader;
                }
                State::ChunkBody(header) if &header.id == b"info" => {
                    let size = header.size as usize;
                    if size > META_CHUNK_MAX {
                        return corrupt("CAF: info chunk exceeds the configured ceiling");
                    }
                    let (consumed, view) = self.gather.gather(*input, size, META_CHUNK_MAX)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(size);
                    self.parse_info(&body)?;
                    self.state = State::DrainTags;
                }
                State::DrainTags => {
                    let Some((key, value)) = self.pending_tags.pop_front() else {
                        self.state = State::ChunkHeader;
                        continue;
                    };
                    let id = lookup(VORBIS_NAMES, &key);
                    *out = ReadResult::Tag(avpush_core::status::Tag { id, name: key, value });
                    return Ok(Status::Meta);
                }
                State::ChunkBody(header) if &header.id == b"pakt" => {
                    let size = header.size as usize;
                    if size > META_CHUNK_MAX {
                        return corrupt("CAF: pakt chunk exceeds the configured ceiling");
                    }
                    let (consumed, view) = self.gather.gather(*input, size, META_CHUNK_MAX)?;
                    *input = &input[consumed..];
                    let Some(view) = view else { return Ok(Status::More) };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(size);
                    self.parse_pakt(&body)?;
                    self.state = State::ChunkHeader;
                }
                State::ChunkBody(header) => {
                    // `kuki` (codec magic cookie, uninterpreted) and any chunk type this reader
                    // does not know are skipped wholesale.
                    self.state = State::Skipping { remaining: header.size as u64 };
                }
                State::Streaming { remaining } => {
                    if remaining == Some(0) {
                        self.state = State::Done;
                        return Ok(Status::Fin);
                    }
                    return self.next_frame(input, remaining, out);
                }
                State::Skipping { remaining } => {
                    if remaining == 0 {
                        self.state = State::ChunkHeader;
                        continue;
                    }
                    if input.is_empty() {
                        return Ok(Status::More);
                    }
                    let take = (input.len() as u64).min(remaining) as usize;
                    *input = &input[take..];
                    self.state = State::Skipping { remaining: remaining - take as u64 };
                }
                State::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.gather.reset();
    }
}

/// CAF's 7-bit continuation varint: each byte contributes its low 7 bits, high bit set means
/// another byte follows.
fn parse_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &b) in buf.iter().enumerate().take(10) {
        value = (value << 7) | (b & 0x7f) as u64;
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    corrupt("CAF: pakt varint runs past the chunk body or the 10-byte limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be_chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(id);
        out.extend_from_slice(&(body.len() as i64).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn build_pcm_caf(sample_rate: f64, channels: u32, bits: u32, frame_count: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"caff");
        out.extend_from_slice(&[0, 1, 0, 0]);

        let bytes_per_frame = channels * (bits / 8);
        let mut desc = Vec::new();
        desc.extend_from_slice(&sample_rate.to_bits().to_be_bytes());
        desc.extend_from_slice(b"lpcm");
        desc.extend_from_slice(&0u32.to_be_bytes()); // big-endian, integer PCM
        desc.extend_from_slice(&bytes_per_frame.to_be_bytes());
        desc.extend_from_slice(&1u32.to_be_bytes());
        desc.extend_from_slice(&channels.to_be_bytes());
        desc.extend_from_slice(&bits.to_be_bytes());
        out.extend_from_slice(&be_chunk(b"desc", &desc));

        let mut info = Vec::new();
        info.extend_from_slice(&1u32.to_be_bytes());
        info.extend_from_slice(b"artist\0Test Artist\0");
        out.extend_from_slice(&be_chunk(b"info", &info));

        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_be_bytes()); // edit count
        data.extend(std::iter::repeat(0u8).take((frame_count * bytes_per_frame) as usize));
        out.extend_from_slice(&be_chunk(b"data", &data));

        out
    }

    fn drain(reader: &mut CafReader, mut input: &[u8]) -> Vec<(Status, ReadResult)> {
        let mut out = Vec::new();
        loop {
            let mut result = ReadResult::None;
            let status = reader.process(&mut input, &mut result).unwrap();
            let stop = matches!(status, Status::Fin | Status::Error) || (status == Status::More && input.is_empty());
            out.push((status, result));
            if stop {
                break;
            }
        }
        out
    }

    #[test]
    fn reads_header_tag_and_frames() {
        let caf = build_pcm_caf(44100.0, 2, 16, 4);
        let mut reader = CafReader::new(ReaderConf::default());
        let events = drain(&mut reader, &caf);

        let header = events.iter().find_map(|(s, r)| {
            if *s == Status::Header {
                if let ReadResult::Header(h) = r {
                    return Some(h.clone());
                }
            }
            None
        });
        let header = header.expect("expected a Header event");
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_bits, 16);
        assert_eq!(header.codec, Codec::Pcm);

        let tag = events.iter().find_map(|(s, r)| {
            if *s == Status::Meta {
                if let ReadResult::Tag(t) = r {
                    return Some(t.clone());
                }
            }
            None
        });
        let tag = tag.expect("expected a Meta event");
        assert_eq!(tag.value, "Test Artist");

        let total_frames: u32 = events
            .iter()
            .filter_map(|(s, r)| {
                if *s == Status::Data {
                    if let ReadResult::Frame(f) = r {
                        return f.duration;
                    }
                }
                None
            })
            .sum();
        assert_eq!(total_frames, 4);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut caf = build_pcm_caf(44100.0, 1, 16, 1);
        caf[0] = b'X';
        let mut reader = CafReader::new(ReaderConf::default());
        let mut input: &[u8] = &caf;
        let mut result = ReadResult::None;
        assert!(reader.process(&mut input, &mut result).is_err());
    }

    #[test]
    fn chunking_does_not_change_decoded_results() {
        let caf = build_pcm_caf(8000.0, 1, 8, 10);
        let mut whole_reader = CafReader::new(ReaderConf::default());
        let whole = drain(&mut whole_reader, &caf);

        let mut chunked_reader = CafReader::new(ReaderConf::default());
        let mut events = Vec::new();
        for chunk in caf.chunks(3) {
            let mut input = chunk;
            loop {
                let mut result = ReadResult::None;
                let status = chunked_reader.process(&mut input, &mut result).unwrap();
                if status == Status::More {
                    break;
                }
                events.push((status, result));
            }
        }

        let whole_statuses: Vec<Status> = whole.iter().map(|(s, _)| *s).filter(|s| *s != Status::More).collect();
        let chunked_statuses: Vec<Status> = events.iter().map(|(s, _)| *s).collect();
        assert_eq!(whole_statuses, chunked_statuses);
    }
}
