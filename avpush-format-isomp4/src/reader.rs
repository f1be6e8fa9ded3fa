// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental MP4/MOV reader.
//!
//! Drives its own lightweight box-stack (a `Vec<{type, remaining}>`, the same shape as
//! [`avpush_core::container::ContainerNode`]) rather than instantiating the shared
//! `ContainerStack` toolkit directly: the sample-table boxes (`stsc`/`stsz`/`stco`/`stts`) fold
//! into one builder across several sibling boxes before `trak` closes, which is a stateful
//! accumulation the generic invariant-checking stack doesn't model any better than a hand-rolled
//! one. Same choice already made for WAVE/AVI in `avpush-format-riff`.
//!
//! Only the common `ftyp`/`moov`/`mdat` ordering (`moov` fully before `mdat`) is supported;
//! "fragmented" MP4 (`moof`/streamed `mdat`-before-`moov`) is out of scope.

use std::collections::VecDeque;

use avpush_core::errors::{corrupt, limit_exceeded, unsupported, Result};
use avpush_core::format::{Codec, Format, Reader, ReaderConf};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{ErrorInfo, FrameRecord, HeaderInfo, ReadResult, Status};
use avpush_metadata::DecodedTag;

use crate::boxes::{parse_box_header, BOX_HEADER_LEN, LARGESIZE_LEN};
use crate::sample_table::{build_sample_map, SampleEntry};

const GATHER_CAP: usize = 4 * 1024 * 1024;
const MAX_LEAF_GATHER: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoxKind {
    Moov,
    Trak,
    Udta,
    Meta,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct BoxCtx {
    kind: BoxKind,
    remaining: u64,
}

#[derive(Debug, Clone)]
enum State {
    BoxHeader,
    BoxHeaderLargesize { box_type: [u8; 4] },
    MetaVersionFlags,
    GatherLeaf { box_type: [u8; 4], body_len: u64 },
    Skip { remaining: u64 },
    DeliverQueuedTag,
    StreamSamples,
    Done,
}

#[derive(Debug, Default, Clone)]
struct TrackBuilder {
    is_audio: bool,
    codec: Codec,
    channels: u8,
    sample_bits: u8,
    sample_rate: u32,
    stsc: Option<Vec<u8>>,
    stsz: Option<Vec<u8>>,
    stts: Option<Vec<u8>>,
    stco: Option<Vec<u8>>,
    co64: bool,
}

/// Incremental MP4/MOV reader.
pub struct Mp4Reader {
    gather: ByteGatherer,
    state: State,
    stack: Vec<BoxCtx>,
    abs_pos: u64,
    seen_ftyp: bool,
    seen_moov: bool,
    current_track: TrackBuilder,
    header: HeaderInfo,
    header_ready: bool,
    header_emitted: bool,
    pending_tags: VecDeque<DecodedTag>,
    itunsmpb_name_seen: bool,
    sample_map: Vec<SampleEntry>,
    next_sample: usize,
    sample_pos: u64,
    warned_duplicate: bool,
}

impl Mp4Reader {
    pub fn new(_conf: ReaderConf) -> Self {
        Self {
            gather: ByteGatherer::new(),
            state: State::BoxHeader,
            stack: Vec::new(),
            abs_pos: 0,
            seen_ftyp: false,
            seen_moov: false,
            current_track: TrackBuilder::default(),
            header: HeaderInfo::default(),
            header_ready: false,
            header_emitted: false,
            pending_tags: VecDeque::new(),
            itunsmpb_name_seen: false,
            sample_map: Vec::new(),
            next_sample: 0,
            sample_pos: 0,
            warned_duplicate: false,
        }
    }

    fn consume_stack(&mut self, n: u64) {
        for ctx in self.stack.iter_mut() {
            ctx.remaining = ctx.remaining.saturating_sub(n);
        }
    }

    fn body_len_from_size32(size32: u32) -> Result<u64> {
        match size32 {
            0 => Ok(u64::MAX),
            n if (n as usize) >= BOX_HEADER_LEN => Ok((n as u64) - BOX_HEADER_LEN as u64),
            _ => corrupt("mp4: box size smaller than its own header"),
        }
    }

    fn parent_kind(&self) -> Option<BoxKind> {
        self.stack.last().map(|c| c.kind)
    }

    /// Finalize the just-closed `trak`: if it was an audio track and no audio track has been
    /// selected yet, build its sample map and adopt it as the stream's header information.
    fn finalize_track(&mut self) -> Result<()> {
        let track = std::mem::take(&mut self.current_track);
        if !track.is_audio || self.header_ready {
            return Ok(());
        }
        let (Some(stsc), Some(stsz), Some(stco)) = (&track.stsc, &track.stsz, &track.stco)
        else {
            return Ok(());
        };
        let stts = track.stts.as_deref().unwrap_or(&[]);
        let map = build_sample_map(stsc, stco, stsz, stts, track.co64)?;
        let total_duration: u64 = map.iter().map(|s| s.duration as u64).sum();

        self.header = HeaderInfo {
            duration: total_duration,
            sample_rate: track.sample_rate,
            sample_bits: track.sample_bits,
            sample_float: false,
            channels: track.channels,
            codec: track.codec,
            real_bitrate: 0,
            encoder_delay: 0,
            end_padding: 0,
        };
        self.sample_map = map;
        self.header_ready = true;
        Ok(())
    }

    fn apply_itunsmpb(&mut self, value: &str) {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 3 {
            return;
        }
        let enc_delay = u32::from_str_radix(fields[1], 16).unwrap_or(0);
        let padding = u32::from_str_radix(fields[2], 16).unwrap_or(0);
        self.header.encoder_delay = enc_delay;
        self.header.end_padding = padding;
    }

    /// `body` is `stsd`'s full-box body (4-byte version/flags, then entry count and entries).
    fn decode_stsd_audio_entry(&mut self, body: &[u8]) -> Result<()> {
        if body.len() < 16 {
            return corrupt("mp4 stsd: truncated entry-count header");
        }
        let entry_count = u32::from_be_bytes(body[4..8].try_into().unwrap());
        if entry_count == 0 {
            return Ok(());
        }
        let entry_size = u32::from_be_bytes(body[8..12].try_into().unwrap()) as usize;
        let fourcc: [u8; 4] = body[12..16].try_into().unwrap();
        let codec = match &fourcc {
            b"mp4a" => Codec::Aac,
            b"alac" => Codec::Alac,
            _ => return Ok(()),
        };
        // `mp4_afmt`: 8 bytes reserved/data-ref-index, then ver[2], res2[6], channels[2],
        // bits[2], unused2[4], rate[2], rate_res[2] — 28 bytes total from the entry body start.
        let afmt_start = 16;
        if body.len() < afmt_start + 28 || entry_size < 8 + 28 {
            return Ok(());
        }
        let afmt = &body[afmt_start..afmt_start + 28];
        let channels = u16::from_be_bytes(afmt[16..18].try_into().unwrap());
        let bits = u16::from_be_bytes(afmt[18..20].try_into().unwrap());
        let rate = u16::from_be_bytes(afmt[26..28].try_into().unwrap());

        self.current_track.codec = codec;
        self.current_track.channels = channels as u8;
        self.current_track.sample_bits = bits as u8;
        self.current_track.sample_rate = rate as u32;
        Ok(())
    }

    /// Strips a full-box's leading 4-byte version/flags field.
    fn strip_fullbox(body: &[u8]) -> Result<Vec<u8>> {
        if body.len() < 4 {
            return corrupt("mp4: full-box body shorter than its own version/flags header");
        }
        Ok(body[4..].to_vec())
    }

    fn handle_leaf(&mut self, box_type: [u8; 4], body: &[u8]) -> Result<()> {
        match (self.parent_kind(), &box_type) {
            (_, b"hdlr") => {
                // `mp4_hdlr`: 4-byte full-box prefix, then unused[4], type[4] ("soun").
                if body.len() >= 12 && &body[8..12] == b"soun" {
                    self.current_track.is_audio = true;
                }
            }
            (_, b"mdhd") => {}
            (_, b"stsd") => self.decode_stsd_audio_entry(body)?,
            (_, b"stsc") => self.current_track.stsc = Some(Self::strip_fullbox(body)?),
            (_, b"stts") => self.current_track.stts = Some(Self::strip_fullbox(body)?),
            (_, b"stsz") => self.current_track.stsz = Some(Self::strip_fullbox(body)?),
            (_, b"stco") => {
                self.current_track.stco = Some(Self::strip_fullbox(body)?);
                self.current_track.co64 = false;
            }
            (_, b"co64") => {
                self.current_track.stco = Some(Self::strip_fullbox(body)?);
                self.current_track.co64 = true;
            }
            (_, b"ilst") => {
                let tags = avpush_metadata::mp4_ilst::decode_ilst(body)?;
                for tag in tags {
                    if tag.name == "iTunSMPB" {
                        self.apply_itunsmpb(&tag.value);
                    }
                    else {
                        self.pending_tags.push_back(tag);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn dispatch_box(&mut self, box_type: [u8; 4], body_len: u64) -> Result<()> {
        match (self.parent_kind(), &box_type) {
            (None, b"ftyp") => {
                self.seen_ftyp = true;
                self.state = State::Skip { remaining: body_len };
            }
            (None, b"moov") => {
                if self.seen_moov {
                    self.warned_duplicate = true;
                    self.state = State::Skip { remaining: body_len };
                }
                else {
                    self.seen_moov = true;
                    self.stack.push(BoxCtx { kind: BoxKind::Moov, remaining: body_len });
                    self.state = State::BoxHeader;
                }
            }
            (None, b"mdat") => {
                self.state = State::StreamSamples;
            }
            (Some(BoxKind::Moov), b"trak") => {
                self.current_track = TrackBuilder::default();
                self.stack.push(BoxCtx { kind: BoxKind::Trak, remaining: body_len });
                self.state = State::BoxHeader;
            }
            (Some(BoxKind::Moov) | None, b"udta") => {
                self.stack.push(BoxCtx { kind: BoxKind::Udta, remaining: body_len });
                self.state = State::BoxHeader;
            }
            (Some(BoxKind::Udta), b"meta") => {
                self.stack.push(BoxCtx { kind: BoxKind::Meta, remaining: body_len });
                self.state = State::MetaVersionFlags;
            }
            // Transparent containers: descend without changing kind bookkeeping.
            (_, b"mdia") | (_, b"minf") | (_, b"stbl") | (_, b"dinf") => {
                self.stack.push(BoxCtx { kind: BoxKind::Other, remaining: body_len });
                self.state = State::BoxHeader;
            }
            // Small fixed-shape leaves gathered whole and inspected for the fields we need.
            (_, b"hdlr" | b"mdhd" | b"stsd" | b"stsc" | b"stts" | b"stsz" | b"stco" | b"co64" | b"ilst") => {
                if body_len > MAX_LEAF_GATHER {
                    return limit_exceeded("mp4: leaf box exceeds the configured ceiling");
                }
                self.state = State::GatherLeaf { box_type, body_len };
            }
            // Everything else (mvhd, tkhd, smhd, dref/url, esds, elst, free, wide, ...) is
            // skipped; codec decoder configuration is out of scope for a demuxer that only
            // frames compressed payloads.
            _ => {
                self.state = State::Skip { remaining: body_len };
            }
        }
        Ok(())
    }
}

impl Reader for Mp4Reader {
    fn format(&self) -> Format {
        Format::Mp4
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        loop {
            match self.state.clone() {
                State::BoxHeader => {
                    while let Some(top) = self.stack.last() {
                        if top.remaining > 0 {
                            break;
                        }
                        let finished = self.stack.pop().unwrap();
                        match finished.kind {
                            BoxKind::Trak => self.finalize_track()?,
                            BoxKind::Moov => {
                                if self.header_ready && !self.header_emitted {
                                    self.header_emitted = true;
                                    *out = ReadResult::Header(self.header.clone());
                                    return Ok(Status::Header);
                                }
                            }
                            _ => {}
                        }
                    }

                    if self.warned_duplicate {
                        self.warned_duplicate = false;
                        *out = ReadResult::Error(ErrorInfo {
                            message: "duplicate top-level moov box skipped".to_string(),
                            offset: Some(self.abs_pos),
                        });
                        return Ok(Status::Warning);
                    }

                    let (consumed, view) = self.gather.gather(*input, BOX_HEADER_LEN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let (size32, box_type) = parse_box_header(view.as_slice().try_into().unwrap());
                    self.gather.consume(BOX_HEADER_LEN);

                    if size32 == 1 {
                        self.consume_stack(BOX_HEADER_LEN as u64);
                        self.state = State::BoxHeaderLargesize { box_type };
                    }
                    else {
                        let body_len = Self::body_len_from_size32(size32)?;
                        self.consume_stack(BOX_HEADER_LEN as u64);
                        self.dispatch_box(box_type, body_len)?;
                    }
                }
                State::BoxHeaderLargesize { box_type } => {
                    let (consumed, view) = self.gather.gather(*input, LARGESIZE_LEN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let largesize = u64::from_be_bytes(view.as_slice().try_into().unwrap());
                    self.gather.consume(LARGESIZE_LEN);
                    let header_len = (BOX_HEADER_LEN + LARGESIZE_LEN) as u64;
                    if largesize < header_len {
                        return corrupt("mp4: largesize smaller than its own extended header");
                    }
                    self.consume_stack(LARGESIZE_LEN as u64);
                    self.dispatch_box(box_type, largesize - header_len)?;
                }
                State::MetaVersionFlags => {
                    let (consumed, view) = self.gather.gather(*input, 4, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(_view) = view
                    else {
                        return Ok(Status::More);
                    };
                    self.gather.consume(4);
                    self.consume_stack(4);
                    self.state = State::BoxHeader;
                }
                State::GatherLeaf { box_type, body_len } => {
                    let size = body_len as usize;
                    let (consumed, view) = self.gather.gather(*input, size, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(size);
                    self.consume_stack(body_len);
                    self.handle_leaf(box_type, &body)?;
                    self.state = State::DeliverQueuedTag;
                }
                State::DeliverQueuedTag => {
                    self.state = State::BoxHeader;
                    if let Some(tag) = self.pending_tags.pop_front() {
                        *out = ReadResult::Tag(avpush_core::status::Tag {
                            id: tag.id,
                            name: tag.name,
                            value: tag.value,
                        });
                        return Ok(Status::Meta);
                    }
                }
                State::Skip { remaining } => {
                    if remaining == 0 {
                        self.state = State::BoxHeader;
                        continue;
                    }
                    if input.is_empty() {
                        return Ok(Status::More);
                    }
                    let take = (input.len() as u64).min(remaining) as usize;
                    *input = &input[take..];
                    self.abs_pos += take as u64;
                    self.consume_stack(take as u64);
                    self.state = State::Skip { remaining: remaining - take as u64 };
                }
                State::StreamSamples => {
                    if !self.header_ready {
                        return unsupported("mp4: reached mdat before an audio trak with a complete sample table");
                    }
                    if !self.header_emitted {
                        self.header_emitted = true;
                        *out = ReadResult::Header(self.header.clone());
                        return Ok(Status::Header);
                    }
                    if let Some(tag) = self.pending_tags.pop_front() {
                        *out = ReadResult::Tag(avpush_core::status::Tag {
                            id: tag.id,
                            name: tag.name,
                            value: tag.value,
                        });
                        return Ok(Status::Meta);
                    }

                    let Some(entry) = self.sample_map.get(self.next_sample).copied()
                    else {
                        self.state = State::Done;
                        return Ok(Status::Fin);
                    };

                    if entry.offset != self.abs_pos {
                        // The caller repositions to exactly this offset before feeding more
                        // input, so our tracked stream position becomes this immediately.
                        self.abs_pos = entry.offset;
                        *out = ReadResult::SeekOffset(entry.offset);
                        return Ok(Status::Seek);
                    }

                    let size = entry.size as usize;
                    let (consumed, view) = self.gather.gather(*input, size, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let bytes = view.as_slice().to_vec();
                    self.gather.consume(size);

                    let frame = FrameRecord {
                        bytes,
                        pos: Some(self.sample_pos),
                        end_pos: Some(self.sample_pos + entry.duration as u64),
                        duration: Some(entry.duration),
                    };
                    self.sample_pos += entry.duration as u64;
                    self.next_sample += 1;
                    *out = ReadResult::Frame(frame);
                    return Ok(Status::Data);
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

    fn box_(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((8 + body.len()) as u32).to_be_bytes());
        out.extend_from_slice(fourcc);
        out.extend_from_slice(body);
        out
    }

    fn full_box(version_flags: u32, body: &[u8]) -> Vec<u8> {
        let mut out = version_flags.to_be_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    fn afmt_body(fourcc: &[u8; 4], channels: u16, bits: u16, rate: u16) -> Vec<u8> {
        let mut entry = Vec::new();
        entry.extend_from_slice(&0u64.to_be_bytes()); // reserved + data_ref_index
        entry.extend_from_slice(&0u16.to_be_bytes()); // version
        entry.extend_from_slice(&[0u8; 6]); // res2
        entry.extend_from_slice(&channels.to_be_bytes());
        entry.extend_from_slice(&bits.to_be_bytes());
        entry.extend_from_slice(&0u32.to_be_bytes()); // unused2
        entry.extend_from_slice(&rate.to_be_bytes());
        entry.extend_from_slice(&0u16.to_be_bytes()); // rate_res
        let entry_box = box_(fourcc, &entry);

        let mut stsd = 1u32.to_be_bytes().to_vec(); // entry_count
        stsd.extend_from_slice(&entry_box);
        full_box(0, &stsd)
    }

    fn u32_table(count: u32, values: &[u32]) -> Vec<u8> {
        let mut out = count.to_be_bytes().to_vec();
        for &v in values {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out
    }

    fn data_atom(type_indicator: u32, payload: &[u8]) -> Vec<u8> {
        let mut atom = Vec::new();
        let body_len = 8 + payload.len();
        atom.extend_from_slice(&((8 + body_len) as u32).to_be_bytes());
        atom.extend_from_slice(b"data");
        atom.extend_from_slice(&type_indicator.to_be_bytes());
        atom.extend_from_slice(&0u32.to_be_bytes());
        atom.extend_from_slice(payload);
        atom
    }

    fn text_tag_atom(fourcc: &[u8; 4], text: &str) -> Vec<u8> {
        box_(fourcc, &data_atom(1, text.as_bytes()))
    }

    /// Assembles `ftyp`+`moov`(with the given `stco` chunk offset baked in)+`mdat`. Building
    /// `moov` is a pure function of `stco_offset`, and changing that one `u32` field's value
    /// never changes `moov`'s byte length — so calling this twice (once with a placeholder
    /// offset to measure where `mdat`'s payload will land, once with the real offset) gives an
    /// exact answer without hand-computing box lengths.
    fn assemble(frame: &[u8], stco_offset: u32) -> Vec<u8> {
        let stsd = afmt_body(b"mp4a", 2, 16, 48000);
        let stsc = full_box(0, &{
            let mut e = 1u32.to_be_bytes().to_vec();
            e.extend_from_slice(&1u32.to_be_bytes());
            e.extend_from_slice(&1u32.to_be_bytes());
            e.extend_from_slice(&1u32.to_be_bytes());
            e
        });
        let stts = full_box(0, &u32_table(1, &[1, 1024]));
        let stsz = full_box(0, &{
            let mut b = 0u32.to_be_bytes().to_vec();
            b.extend_from_slice(&1u32.to_be_bytes());
            b.extend_from_slice(&(frame.len() as u32).to_be_bytes());
            b
        });
        let stco = full_box(0, &u32_table(1, &[stco_offset]));

        let hdlr = full_box(0, &{
            let mut h = 0u32.to_be_bytes().to_vec();
            h.extend_from_slice(b"soun");
            h.extend_from_slice(&[0u8; 12]);
            h
        });

        let stbl = box_(
            b"stbl",
            &[box_(b"stsd", &stsd), box_(b"stts", &stts), box_(b"stsc", &stsc), box_(b"stsz", &stsz), box_(b"stco", &stco)]
                .concat(),
        );
        let minf = box_(b"minf", &stbl);
        let mdia = box_(b"mdia", &[box_(b"hdlr", &hdlr), minf].concat());
        let trak = box_(b"trak", &mdia);

        let mut ilst_body = Vec::new();
        ilst_body.extend_from_slice(&text_tag_atom(b"\xa9nam", "Title"));
        ilst_body.extend_from_slice(&text_tag_atom(b"\xa9ART", "Artist"));
        let meta = box_(b"meta", &[full_box(0, &[]), box_(b"ilst", &ilst_body)].concat());
        let udta = box_(b"udta", &meta);

        let moov = box_(b"moov", &[trak, udta].concat());
        let ftyp = box_(b"ftyp", b"isomiso2mp41");
        let mdat = box_(b"mdat", frame);

        [ftyp, moov, mdat].concat()
    }

    /// Builds a minimal single-audio-track MP4: `ftyp`, `moov/trak/mdia/{hdlr,minf/stbl}`,
    /// `moov/udta/meta/ilst` with a couple of text tags, and `mdat` with one AAC frame placed
    /// at the offset the `stco` table declares.
    fn build_minimal_mp4(frame: &[u8]) -> Vec<u8> {
        let probe = assemble(frame, 0);
        let ftyp_len = box_(b"ftyp", b"isomiso2mp41").len();
        let mdat_box_offset_in_probe = probe.len() - (8 + frame.len());
        let moov_len = mdat_box_offset_in_probe - ftyp_len;
        let mdat_payload_offset = (ftyp_len + moov_len + 8) as u32;

        let real = assemble(frame, mdat_payload_offset);
        assert_eq!(real.len(), probe.len(), "changing stco's value must not change moov's length");
        real
    }

    fn drain(reader: &mut Mp4Reader, data: &[u8]) -> Vec<(Status, ReadResult)> {
        let mut out = Vec::new();
        let mut input = data;
        let mut pos: usize = 0;
        loop {
            let mut result = ReadResult::default();
            let status = reader.process(&mut input, &mut result).unwrap();
            match status {
                Status::Seek => {
                    if let ReadResult::SeekOffset(off) = &result {
                        pos = *off as usize;
                        input = &data[pos..];
                    }
                }
                Status::More => {
                    if input.is_empty() {
                        break;
                    }
                }
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
    fn reads_header_tags_and_single_frame() {
        let mp4 = build_minimal_mp4(b"aacframe1");
        let mut reader = Mp4Reader::new(ReaderConf::default());
        let events = drain(&mut reader, &mp4);

        let header = events.iter().find_map(|(s, r)| {
            if *s == Status::Header {
                if let ReadResult::Header(h) = r {
                    return Some(h.clone());
                }
            }
            None
        });
        let header = header.expect("expected a Header event");
        assert_eq!(header.codec, Codec::Aac);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 48000);

        let titles: Vec<_> = events
            .iter()
            .filter_map(|(s, r)| {
                if *s == Status::Meta {
                    if let ReadResult::Tag(t) = r {
                        return Some(t.value.clone());
                    }
                }
                None
            })
            .collect();
        assert!(titles.contains(&"Title".to_string()));
        assert!(titles.contains(&"Artist".to_string()));

        let frame = events.iter().find_map(|(s, r)| {
            if *s == Status::Data {
                if let ReadResult::Frame(f) = r {
                    return Some(f.bytes.clone());
                }
            }
            None
        });
        assert_eq!(frame.unwrap(), b"aacframe1".to_vec());
    }
}
