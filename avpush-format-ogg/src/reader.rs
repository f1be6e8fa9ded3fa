// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental OGG reader: page reassembly, packet reconstruction via the segment table, and
//! the Vorbis/Opus/FLAC-in-OGG codec multiplexer.
//!
//! Like the Matroska reader, only a single logical stream is surfaced: the first one whose
//! `BOS` page's first packet identifies as one of the three codecs this library recognizes (see
//! [`crate::mux`]). Pages belonging to any other serial number are fully skipped — their bytes
//! are still consumed (so the gather/offset bookkeeping stays correct) but no packet
//! reassembly happens for them, since this library never multiplexes more than one audio stream
//! out of a single reader instance.
//!
//! Position information is page-granular, per the format itself: only the packet that *finishes*
//! on a page gets a granule position (spec glossary: "OGG's per-codec stream-position counter
//! carried per page"); earlier packets completing on the same page carry no position. One
//! upstream quirk is preserved deliberately rather than "fixed": a granule position of exactly 0
//! on a non-initial page is treated the same as an undefined position (as if the page carried no
//! completed packet), matching a long-standing behavior of the reference reader that at least one
//! commercial encoder's output depends on.

use std::collections::VecDeque;

use avpush_core::errors::{corrupt, limit_exceeded, Result};
use avpush_core::format::{Codec, Format, Reader, ReaderConf};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status, Tag};
use avpush_metadata::vorbis::VorbisTagIter;

use crate::mux;
use crate::page::{self, HeaderType, PageFixed, FIXED_HEADER_LEN};

const GATHER_CAP: usize = 128 * 1024;

#[derive(Debug, Clone)]
enum State {
    FixedHeader,
    SegmentTable { raw_header: Vec<u8>, fixed: PageFixed },
    Body { raw_header: Vec<u8>, fixed: PageFixed, seg_table: Vec<u8> },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderPhase {
    /// Waiting for a logical stream's first (identification) packet.
    AwaitingIdentification,
    /// Inside Vorbis's three-packet header (comment, then an opaque setup packet).
    VorbisTail { setup_remaining: bool },
    /// Inside Opus's two-packet header (comment only).
    OpusTail,
    /// Inside FLAC-in-OGG's chained metadata blocks; counts remaining packets.
    FlacTail { remaining: u32 },
    /// Header fully consumed; subsequent packets are audio data.
    Audio,
}

pub struct OggReader {
    gather: ByteGatherer,
    state: State,
    abs_pos: u64,

    selected_serial: Option<u32>,
    codec: Codec,
    phase: HeaderPhase,
    continued: Vec<u8>,

    pending_header: Option<HeaderInfo>,
    pending_tags: VecDeque<Tag>,
    pending_frames: VecDeque<FrameRecord>,
    last_granule: Option<u64>,
    eos_seen: bool,
}

impl OggReader {
    pub fn new(_conf: ReaderConf) -> Self {
        Self {
            gather: ByteGatherer::new(),
            state: State::FixedHeader,
            abs_pos: 0,
            selected_serial: None,
            codec: Codec::Unknown,
            phase: HeaderPhase::AwaitingIdentification,
            continued: Vec::new(),
            pending_header: None,
            pending_tags: VecDeque::new(),
            pending_frames: VecDeque::new(),
            last_granule: None,
            eos_seen: false,
        }
    }

    /// Dispatches one already-reassembled page: validates its checksum (log-only), splits its
    /// body into packets via the segment table, and hands packets belonging to the selected
    /// logical stream to [`Self::handle_packet`].
    fn process_page(&mut self, raw_header: &[u8], fixed: &PageFixed, seg_table: &[u8], body: &[u8]) -> Result<()> {
        let mut check_bytes = raw_header.to_vec();
        check_bytes[22..26].copy_from_slice(&[0, 0, 0, 0]);
        check_bytes.extend_from_slice(seg_table);
        check_bytes.extend_from_slice(body);
        if page::crc32(&check_bytes) != fixed.checksum {
            log::warn!("ogg: page {} (serial {}) failed its checksum", fixed.page_seq, fixed.serial);
        }

        let mut identified_this_page = false;
        if fixed.header_type.contains(HeaderType::BOS) && self.selected_serial.is_none() {
            let (lens, _) = page::packet_lengths(seg_table);
            if let Some(&first_len) = lens.first() {
                if let Some(id) = mux::identify(&body[..first_len.min(body.len())]) {
                    self.selected_serial = Some(fixed.serial);
                    self.codec = id.codec;
                    self.pending_header = Some(id.header);
                    self.phase = match id.codec {
                        Codec::Vorbis => HeaderPhase::VorbisTail { setup_remaining: true },
                        Codec::Opus => HeaderPhase::OpusTail,
                        Codec::Flac => HeaderPhase::FlacTail { remaining: id.extra_header_packets },
                        _ => HeaderPhase::Audio,
                    };
                    identified_this_page = true;
                }
            }
        }

        if self.selected_serial != Some(fixed.serial) {
            return Ok(());
        }

        if !fixed.header_type.contains(HeaderType::CONTINUED) && !self.continued.is_empty() {
            log::warn!("ogg: dropping an unterminated packet continuation the next page didn't mark CONTINUED");
            self.continued.clear();
        }

        let (lens, unterminated) = page::packet_lengths(seg_table);
        if lens.is_empty() {
            return Ok(());
        }

        let mut offset = 0usize;
        let packet_count = lens.len();
        for (i, &len) in lens.iter().enumerate() {
            if offset + len > body.len() {
                return corrupt("ogg: packet length exceeds page body");
            }
            let mut bytes = if i == 0 && fixed.header_type.contains(HeaderType::CONTINUED) {
                std::mem::take(&mut self.continued)
            }
            else {
                Vec::new()
            };
            bytes.extend_from_slice(&body[offset..offset + len]);
            offset += len;

            let is_last_packet_in_table = i + 1 == packet_count;
            if is_last_packet_in_table && unterminated {
                // This packet continues onto a subsequent page; hold it rather than deliver it.
                self.continued = bytes;
                continue;
            }

            if i == 0 && identified_this_page {
                // This is the identification packet itself, already consumed above.
                continue;
            }

            let completes_page = is_last_packet_in_table;
            self.handle_packet(bytes, completes_page, fixed.granule_position, fixed.header_type)?;
        }

        if fixed.header_type.contains(HeaderType::EOS) {
            self.eos_seen = true;
        }
        Ok(())
    }

    fn handle_packet(&mut self, bytes: Vec<u8>, completes_page: bool, granule: u64, header_type: HeaderType) -> Result<()> {
        match self.phase {
            HeaderPhase::AwaitingIdentification => {
                // Already handled by `process_page` for the BOS page; any further packet here
                // means identification failed and this stream is being ignored.
            }
            HeaderPhase::VorbisTail { setup_remaining } => {
                if bytes.starts_with(b"\x03vorbis") {
                    self.queue_comment_tags(&bytes[7..]);
                    self.phase = HeaderPhase::VorbisTail { setup_remaining: false };
                }
                else if !setup_remaining {
                    // This was the (opaque, unparsed) setup packet.
                    self.phase = HeaderPhase::Audio;
                }
                else {
                    return corrupt("ogg: expected a vorbis comment packet, got something else");
                }
            }
            HeaderPhase::OpusTail => {
                if bytes.starts_with(b"OpusTags") {
                    self.queue_comment_tags(&bytes[8..]);
                }
                self.phase = HeaderPhase::Audio;
            }
            HeaderPhase::FlacTail { remaining } => {
                if bytes.len() >= 4 {
                    let block_type = bytes[0] & 0x7F;
                    let len = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]) as usize;
                    if block_type == 4 && bytes.len() >= 4 + len {
                        self.queue_comment_tags(&bytes[4..4 + len]);
                    }
                }
                self.phase = if remaining <= 1 {
                    HeaderPhase::Audio
                }
                else {
                    HeaderPhase::FlacTail { remaining: remaining - 1 }
                };
            }
            HeaderPhase::Audio => {
                // The known "granule 0 on a non-initial page" quirk: such a page is treated as
                // carrying no completed packet, same as the undefined `u64::MAX` sentinel.
                let is_undefined = granule == u64::MAX || (granule == 0 && !header_type.contains(HeaderType::BOS));
                let end_pos = if completes_page && !is_undefined { Some(granule) } else { None };
                let pos = self.last_granule;
                let duration = match (pos, end_pos) {
                    (Some(p), Some(e)) if e >= p => Some((e - p) as u32),
                    _ => None,
                };
                if end_pos.is_some() {
                    self.last_granule = end_pos;
                }
                self.pending_frames.push_back(FrameRecord { bytes, pos, end_pos, duration });
            }
        }
        Ok(())
    }

    fn queue_comment_tags(&mut self, body: &[u8]) {
        for record in VorbisTagIter::new(body).filter_map(|r| r.ok()) {
            self.pending_tags.push_back(Tag::from(record));
        }
    }
}

impl Reader for OggReader {
    fn format(&self) -> Format {
        Format::Ogg
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        loop {
            if let Some(header) = self.pending_header.take() {
                *out = ReadResult::Header(header);
                return Ok(Status::Header);
            }
            if let Some(tag) = self.pending_tags.pop_front() {
                *out = ReadResult::Tag(tag);
                return Ok(Status::Meta);
            }
            if let Some(frame) = self.pending_frames.pop_front() {
                *out = ReadResult::Frame(frame);
                return Ok(Status::Data);
            }

            match self.state.clone() {
                State::FixedHeader => {
                    if self.eos_seen && self.gather.is_empty() && input.is_empty() {
                        self.state = State::Done;
                        return Ok(Status::Fin);
                    }
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, FIXED_HEADER_LEN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        if input.is_empty() {
                            return Ok(if self.eos_seen { Status::Fin } else { Status::More });
                        }
                        continue;
                    };
                    let raw_header = view.as_slice().to_vec();
                    let fixed = page::parse_fixed(&raw_header)?;
                    self.gather.consume(FIXED_HEADER_LEN);
                    self.state = State::SegmentTable { raw_header, fixed };
                }
                State::SegmentTable { raw_header, fixed } => {
                    let need = fixed.segment_count as usize;
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, need, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let seg_table = view.as_slice().to_vec();
                    self.gather.consume(need);
                    self.state = State::Body { raw_header, fixed, seg_table };
                }
                State::Body { raw_header, fixed, seg_table } => {
                    let body_len: usize = seg_table.iter().map(|&b| b as usize).sum();
                    if body_len > GATHER_CAP {
                        return limit_exceeded("ogg: page body exceeds the configured ceiling");
                    }
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, body_len, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(body_len);
                    self.process_page(&raw_header, &fixed, &seg_table, &body)?;
                    self.state = State::FixedHeader;
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

    fn build_page(fixed_flags: HeaderType, granule: u64, serial: u32, seq: u32, packets: &[&[u8]]) -> Vec<u8> {
        let mut seg_table = Vec::new();
        let mut body = Vec::new();
        for p in packets {
            let mut remaining = p.len();
            while remaining >= 255 {
                seg_table.push(255);
                remaining -= 255;
            }
            seg_table.push(remaining as u8);
            body.extend_from_slice(p);
        }

        let mut header = Vec::with_capacity(27);
        header.extend_from_slice(b"OggS");
        header.push(0);
        header.push(fixed_flags.bits());
        header.extend_from_slice(&granule.to_le_bytes());
        header.extend_from_slice(&serial.to_le_bytes());
        header.extend_from_slice(&seq.to_le_bytes());
        header.extend_from_slice(&[0, 0, 0, 0]);
        header.push(seg_table.len() as u8);

        let mut full = header.clone();
        full.extend_from_slice(&seg_table);
        full.extend_from_slice(&body);
        let crc = page::crc32(&full);
        full[22..26].copy_from_slice(&crc.to_le_bytes());
        full
    }

    fn vorbis_id_packet() -> Vec<u8> {
        let mut p = b"\x01vorbis".to_vec();
        p.extend_from_slice(&0u32.to_le_bytes());
        p.push(1);
        p.extend_from_slice(&44100u32.to_le_bytes());
        p.extend_from_slice(&[0u8; 12]);
        p.push(0);
        p.push(1);
        p
    }

    fn vorbis_comment_packet() -> Vec<u8> {
        let mut p = b"\x03vorbis".to_vec();
        let mut w = avpush_metadata::vorbis::VorbisTagWriter::new();
        w.add_vendor("avpush-test");
        w.add("title", "My Title");
        p.extend_from_slice(&w.finish());
        p
    }

    fn drain(reader: &mut OggReader, data: &[u8]) -> Vec<(Status, ReadResult)> {
        let mut out = Vec::new();
        let mut input = data;
        loop {
            let mut result = ReadResult::default();
            let status = reader.process(&mut input, &mut result).unwrap();
            match status {
                Status::More if input.is_empty() => break,
                Status::More => continue,
                Status::Fin => {
                    out.push((status, result));
                    break;
                }
                _ => out.push((status, result)),
            }
        }
        out
    }

    #[test]
    fn reads_vorbis_header_tag_and_frame() {
        let mut stream = Vec::new();
        stream.extend(build_page(HeaderType::BOS, 0, 42, 0, &[&vorbis_id_packet()]));
        stream.extend(build_page(HeaderType::empty(), 0, 42, 1, &[&vorbis_comment_packet(), b"setup-packet-stub"]));
        stream.extend(build_page(HeaderType::EOS, 1024, 42, 2, &[b"oggframe1"]));

        let mut reader = OggReader::new(ReaderConf::default());
        let events = drain(&mut reader, &stream);

        let header = events.iter().find_map(|(s, r)| {
            if *s == Status::Header {
                if let ReadResult::Header(h) = r {
                    return Some(h.clone());
                }
            }
            None
        });
        let header = header.expect("expected a Header event");
        assert_eq!(header.codec, Codec::Vorbis);
        assert_eq!(header.sample_rate, 44100);

        let tag_value = events.iter().find_map(|(s, r)| {
            if *s == Status::Meta {
                if let ReadResult::Tag(t) = r {
                    return Some(t.value.clone());
                }
            }
            None
        });
        assert_eq!(tag_value.unwrap(), "My Title");

        let frame = events.iter().find_map(|(s, r)| {
            if *s == Status::Data {
                if let ReadResult::Frame(f) = r {
                    return Some(f.clone());
                }
            }
            None
        });
        let frame = frame.expect("expected a Data event");
        assert_eq!(frame.bytes, b"oggframe1".to_vec());
        assert_eq!(frame.end_pos, Some(1024));
    }

    #[test]
    fn chunking_invariance_at_three_bytes() {
        let mut stream = Vec::new();
        stream.extend(build_page(HeaderType::BOS, 0, 7, 0, &[&vorbis_id_packet()]));
        stream.extend(build_page(HeaderType::empty(), 0, 7, 1, &[&vorbis_comment_packet(), b"setup-packet-stub"]));
        stream.extend(build_page(HeaderType::EOS, 1024, 7, 2, &[b"oggframe1"]));

        let mut whole = OggReader::new(ReaderConf::default());
        let whole_frames: Vec<_> = drain(&mut whole, &stream)
            .into_iter()
            .filter_map(|(s, r)| if s == Status::Data { if let ReadResult::Frame(f) = r { Some(f.bytes) } else { None } } else { None })
            .collect();

        let mut chunked = OggReader::new(ReaderConf::default());
        let mut out = Vec::new();
        let mut remaining = &stream[..];
        loop {
            let take = remaining.len().min(3);
            let mut input = &remaining[..take];
            loop {
                let mut result = ReadResult::default();
                let status = chunked.process(&mut input, &mut result).unwrap();
                if status == Status::More {
                    break;
                }
                out.push((status, result));
                if status == Status::Fin {
                    break;
                }
            }
            remaining = &remaining[take..];
            if remaining.is_empty() {
                break;
            }
        }
        let chunked_frames: Vec<_> = out
            .into_iter()
            .filter_map(|(s, r)| if s == Status::Data { if let ReadResult::Frame(f) = r { Some(f.bytes) } else { None } } else { None })
            .collect();
        assert_eq!(whole_frames, chunked_frames);
    }

    #[test]
    fn checksum_mismatch_is_log_only_not_an_error() {
        let mut page = build_page(HeaderType::BOS | HeaderType::EOS, 0, 1, 0, &[&vorbis_id_packet()]);
        let len = page.len();
        page[len - 1] ^= 0xFF; // corrupt the last body byte after the checksum was computed
        let mut reader = OggReader::new(ReaderConf::default());
        let mut input = &page[..];
        let mut result = ReadResult::default();
        let status = reader.process(&mut input, &mut result).unwrap();
        assert_eq!(status, Status::Header);
    }
}
