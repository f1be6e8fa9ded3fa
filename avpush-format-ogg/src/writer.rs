// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental OGG writer: pages whatever packets the caller feeds it (identification header,
//! then — if tags were registered before the first frame — a synthesized comment packet, then
//! audio packets) into ~4 KiB pages, the same size Xiph's own muxer targets. A page flushes early
//! when the caller passes [`WriteFlags::OGG_FLUSH`] or [`WriteFlags::LAST`], or once the
//! accumulated packet bytes reach the target size.
//!
//! Unlike the other writers in this library, `process` does not produce output on every call:
//! several packets can accumulate in one page before it is due to flush, so calls that only
//! buffer return [`Status::More`] the way a reader would when it needs more input, rather than
//! always returning [`Status::Data`].
//!
//! This writer never decodes the packets it pages, so it has no way to know how many samples
//! each one represents; granule positions on every page except the last are written as the
//! on-wire "undefined" sentinel (`u64::MAX`). The final page's granule is the caller-supplied
//! total sample count from [`WriterInfo`] when known, or the same undefined sentinel otherwise —
//! mirroring the FLAC writer's documented choice to leave what it cannot derive as an honest
//! "unknown" rather than a fabricated number.

use avpush_core::errors::{unsupported, Result};
use avpush_core::format::{Codec, Format, WriteFlags, Writer, WriterInfo};
use avpush_core::status::{FrameRecord, ReadResult, Status};
use avpush_metadata::vorbis::VorbisTagWriter;

use crate::page;

const PAGE_TARGET_LEN: usize = 4096;
/// Fixed rather than randomized: this writer opens exactly one logical stream per instance, so
/// there is no sibling stream on the same page sequence a random serial would need to avoid
/// colliding with.
const SERIAL: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    Done,
}

pub struct OggWriter {
    state: State,
    codec: Codec,
    total_samples: u64,
    page_seq: u32,
    packet_count: u32,
    tags: Vec<(String, String)>,
    comment_due: bool,
    held_frame: Option<Vec<u8>>,
    page_packets: Vec<Vec<u8>>,
    page_body_len: usize,
}

impl Default for OggWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl OggWriter {
    pub fn new() -> Self {
        Self {
            state: State::Streaming,
            codec: Codec::Unknown,
            total_samples: 0,
            page_seq: 0,
            packet_count: 0,
            tags: Vec::new(),
            comment_due: false,
            held_frame: None,
            page_packets: Vec::new(),
            page_body_len: 0,
        }
    }

    fn build_comment_packet(&self) -> Vec<u8> {
        let mut writer = VorbisTagWriter::new();
        writer.add_vendor("avpush");
        for (name, value) in &self.tags {
            writer.add(name, value);
        }
        let body = writer.finish();

        match self.codec {
            Codec::Vorbis => {
                let mut p = b"\x03vorbis".to_vec();
                p.extend_from_slice(&body);
                p
            }
            Codec::Opus => {
                let mut p = b"OpusTags".to_vec();
                p.extend_from_slice(&body);
                p
            }
            Codec::Flac => {
                let mut p = Vec::with_capacity(4 + body.len());
                p.push(0x80 | 0x04); // last metadata block, type 4 = VORBIS_COMMENT
                p.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..4]);
                p.extend_from_slice(&body);
                p
            }
            _ => body,
        }
    }

    /// Builds one complete page (fixed header + segment table + body + checksum) from the
    /// packets accumulated in `self.page_packets`.
    fn build_page(&self, bos: bool, eos: bool, granule: u64) -> Vec<u8> {
        let mut seg_table = Vec::new();
        let mut body = Vec::new();
        for packet in &self.page_packets {
            let mut remaining = packet.len();
            while remaining >= 255 {
                seg_table.push(255);
                remaining -= 255;
            }
            seg_table.push(remaining as u8);
            body.extend_from_slice(packet);
        }

        let mut header_type = page::HeaderType::empty();
        if bos {
            header_type |= page::HeaderType::BOS;
        }
        if eos {
            header_type |= page::HeaderType::EOS;
        }

        let mut page_bytes = Vec::with_capacity(27 + seg_table.len() + body.len());
        page_bytes.extend_from_slice(b"OggS");
        page_bytes.push(0); // version
        page_bytes.push(header_type.bits());
        page_bytes.extend_from_slice(&granule.to_le_bytes());
        page_bytes.extend_from_slice(&SERIAL.to_le_bytes());
        page_bytes.extend_from_slice(&self.page_seq.to_le_bytes());
        page_bytes.extend_from_slice(&[0, 0, 0, 0]); // checksum, patched below
        page_bytes.push(seg_table.len() as u8);
        page_bytes.extend_from_slice(&seg_table);
        page_bytes.extend_from_slice(&body);

        let crc = page::crc32(&page_bytes);
        page_bytes[22..26].copy_from_slice(&crc.to_le_bytes());
        page_bytes
    }
}

impl Writer for OggWriter {
    fn format(&self) -> Format {
        Format::Ogg
    }

    fn create(&mut self, info: &WriterInfo) -> Result<()> {
        self.codec = info.codec;
        self.total_samples = info.total_samples;
        Ok(())
    }

    fn tag_add(&mut self, _id: avpush_core::tag::NormalizedTag, name: &str, value: &str) -> Result<()> {
        if self.packet_count > 1 || self.comment_due {
            return unsupported("OGG writer: tags must be added before the second packet is written");
        }
        self.tags.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn process(&mut self, frame: &[u8], flags: WriteFlags, out: &mut ReadResult) -> Result<Status> {
        if self.state == State::Done {
            return Ok(Status::Fin);
        }

        let is_identification = self.packet_count == 0;
        let wants_comment = self.packet_count == 1 && !self.comment_due && !self.tags.is_empty();

        let (packet, effective_flags, solo_page) = if wants_comment {
            self.comment_due = true;
            self.held_frame = Some(frame.to_vec());
            (self.build_comment_packet(), WriteFlags::empty(), true)
        }
        else if let Some(held) = self.held_frame.take() {
            (held, flags, false)
        }
        else {
            (frame.to_vec(), flags, is_identification)
        };

        self.page_body_len += packet.len();
        self.page_packets.push(packet);
        self.packet_count += 1;

        let is_last = effective_flags.contains(WriteFlags::LAST);
        let force_flush =
            solo_page || is_last || effective_flags.contains(WriteFlags::OGG_FLUSH) || self.page_body_len >= PAGE_TARGET_LEN;

        if !force_flush {
            *out = ReadResult::None;
            return Ok(Status::More);
        }

        let bos = self.page_seq == 0;
        let granule = if is_last {
            if self.total_samples > 0 { self.total_samples } else { u64::MAX }
        }
        else {
            u64::MAX
        };
        let bytes = self.build_page(bos, is_last, granule);
        self.page_packets.clear();
        self.page_body_len = 0;
        self.page_seq += 1;
        if is_last {
            self.state = State::Done;
        }

        *out = ReadResult::Frame(FrameRecord { bytes, pos: None, end_pos: None, duration: None });
        Ok(Status::Data)
    }

    fn close(&mut self) {
        self.page_packets.clear();
    }
}
