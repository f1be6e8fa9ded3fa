// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental native FLAC reader: `fLaC` magic, a metadata-block chain (STREAMINFO feeds the
//! HEADER event directly, no waiting on the first frame the way MP3 waits on Xing), then a
//! CRC-8-delimited frame stream.
//!
//! Frame delimiting does not use [`avpush_core::framesync::FrameSyncEngine`]: a FLAC frame's
//! byte length depends on the compressed subframe data it carries and cannot be computed from
//! its header the way an MPEG frame's can. Instead this reader grows its gather window and
//! rescans for the *next* CRC-8-valid, stream-consistent header, committing everything before it
//! as the prior frame's bytes. A false sync candidate (a stray `0xFF 0xF8`/`F9` byte pair inside
//! compressed audio data) is rejected by the header's own CRC-8 combined with the requirement
//! that sample rate/channels/bits-per-sample match the rest of the stream; no second-header
//! handshake is performed the way the MPEG engine does one, since CRC-8 alone already makes a
//! false positive astronomically unlikely.
//!
//! Seeking uses the full iterative [`BisectSeeker`] loop (narrowed by the SEEKTABLE block when
//! present), unlike MP3's single probe, because every FLAC frame header carries an exact sample
//! position. The frame size fed to [`BisectSeeker::on_frame_found`] is approximated as the
//! header length alone (the true compressed size is unknown until the next header is found); this
//! only needs to move the search window's lower bound past the header just matched, not to be
//! exact.

use std::collections::VecDeque;

use avpush_core::bisect::{BisectSeeker, SeekPoint, SeekStep};
use avpush_core::errors::Result;
use avpush_core::format::{Codec, Format, Reader, ReaderConf, Seekable};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status, Tag};
use avpush_metadata::vorbis::VorbisTagIter;

use crate::header::{self, FlacFrameHeader, MAX_HEADER_LEN};
use crate::streaminfo::StreamInfo;

const GATHER_CAP: usize = 1024 * 1024;
const PROBE_GROWTH: usize = 4096;

const BLOCK_TYPE_STREAMINFO: u8 = 0;
const BLOCK_TYPE_SEEKTABLE: u8 = 3;
const BLOCK_TYPE_VORBIS_COMMENT: u8 = 4;

#[derive(Debug, Clone, Copy)]
struct SeekTableEntry {
    sample: u64,
    offset: u64,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Magic,
    MetaBlockHeader,
    MetaBlockBody { is_last: bool, block_type: u8, len: usize },
    /// Scanning for a frame header without a known prior frame to anchor `same_stream` on: used
    /// both for the very first frame and for the landing spot after a seek.
    Syncing,
    Frames,
    SeekScan,
    Done,
}

pub struct FlacReader {
    conf: ReaderConf,
    gather: ByteGatherer,
    stage: Stage,
    abs_pos: u64,
    streaminfo: Option<StreamInfo>,
    seektable: Vec<SeekTableEntry>,
    pending_tags: VecDeque<Tag>,
    pending_header: Option<HeaderInfo>,
    current_header: Option<FlacFrameHeader>,
    probe_need: usize,
    pending_seek_offset: Option<u64>,
    seeker: Option<BisectSeeker>,
    data_start: u64,
}

impl FlacReader {
    pub fn new(conf: ReaderConf) -> Self {
        Self {
            gather: ByteGatherer::new(),
            stage: Stage::Magic,
            abs_pos: 0,
            streaminfo: None,
            seektable: Vec::new(),
            pending_tags: VecDeque::new(),
            pending_header: None,
            current_header: None,
            probe_need: MAX_HEADER_LEN,
            pending_seek_offset: None,
            seeker: None,
            data_start: 0,
            conf,
        }
    }

    fn streaminfo(&self) -> &StreamInfo {
        self.streaminfo.as_ref().expect("STREAMINFO decoded before frame scanning begins")
    }

    fn make_frame(&self, header: FlacFrameHeader, bytes: Vec<u8>) -> ReadResult {
        ReadResult::Frame(FrameRecord {
            bytes,
            pos: Some(header.position),
            end_pos: Some(header.position + header.block_size as u64),
            duration: Some(header.block_size),
        })
    }

    /// Scans `buf[start..]` for the next CRC-8-valid header consistent with `mask` (or any valid
    /// header, when seeking blind and `mask` is `None`).
    fn find_header(
        buf: &[u8],
        start: usize,
        streaminfo: &StreamInfo,
        mask: Option<&FlacFrameHeader>,
    ) -> Option<(usize, FlacFrameHeader)> {
        if buf.len() < 4 {
            return None;
        }
        for p in start..=buf.len() - 4 {
            if buf[p] != 0xFF || (buf[p + 1] & 0xFE) != 0xF8 {
                continue;
            }
            if let Some(h) = header::try_parse(&buf[p..], streaminfo) {
                if mask.map(|m| h.same_stream(m)).unwrap_or(true) {
                    return Some((p, h));
                }
            }
        }
        None
    }
}

impl Reader for FlacReader {
    fn format(&self) -> Format {
        Format::Flac
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        if let Some(off) = self.pending_seek_offset.take() {
            self.abs_pos = off;
            *out = ReadResult::SeekOffset(off);
            return Ok(Status::Seek);
        }

        loop {
            if let Some(info) = self.pending_header.take() {
                *out = ReadResult::Header(info);
                return Ok(Status::Header);
            }
            if let Some(tag) = self.pending_tags.pop_front() {
                *out = ReadResult::Tag(tag);
                return Ok(Status::Meta);
            }

            match self.stage {
                Stage::Magic => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, 4, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    if view.as_slice() != b"fLaC" {
                        return avpush_core::errors::bad_magic("missing fLaC marker");
                    }
                    self.gather.consume(4);
                    self.stage = Stage::MetaBlockHeader;
                }
                Stage::MetaBlockHeader => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, 4, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let buf = view.as_slice();
                    let is_last = buf[0] & 0x80 != 0;
                    let block_type = buf[0] & 0x7F;
                    let len = u32::from_be_bytes([0, buf[1], buf[2], buf[3]]) as usize;
                    self.gather.consume(4);
                    self.stage = Stage::MetaBlockBody { is_last, block_type, len };
                }
                Stage::MetaBlockBody { is_last, block_type, len } => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, len, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(len);

                    match block_type {
                        BLOCK_TYPE_STREAMINFO => {
                            let info = StreamInfo::parse(&body)?;
                            self.pending_header = Some(HeaderInfo {
                                duration: info.total_samples,
                                sample_rate: info.sample_rate,
                                sample_bits: info.bits_per_sample,
                                sample_float: false,
                                channels: info.channels,
                                codec: Codec::Flac,
                                real_bitrate: 0,
                                encoder_delay: 0,
                                end_padding: 0,
                            });
                            self.streaminfo = Some(info);
                        }
                        BLOCK_TYPE_SEEKTABLE => {
                            for chunk in body.chunks_exact(18) {
                                let sample = u64::from_be_bytes(chunk[0..8].try_into().unwrap());
                                if sample == u64::MAX {
                                    continue; // placeholder point
                                }
                                let offset = u64::from_be_bytes(chunk[8..16].try_into().unwrap());
                                self.seektable.push(SeekTableEntry { sample, offset });
                            }
                        }
                        BLOCK_TYPE_VORBIS_COMMENT => {
                            for tag in VorbisTagIter::new(&body) {
                                self.pending_tags.push_back(Tag {
                                    id: tag.id,
                                    name: tag.name.to_string(),
                                    value: tag.value.to_string(),
                                });
                            }
                        }
                        _ => {} // PADDING/APPLICATION/CUESHEET/PICTURE: out of scope, skip.
                    }

                    self.stage = if is_last {
                        self.data_start = self.abs_pos;
                        Stage::Syncing
                    }
                    else {
                        Stage::MetaBlockHeader
                    };
                }
                Stage::Syncing | Stage::SeekScan => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, self.probe_need, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        if input.is_empty() {
                            return Ok(Status::More);
                        }
                        continue;
                    };
                    let buf = view.as_slice().to_vec();

                    match Self::find_header(&buf, 0, self.streaminfo(), None) {
                        Some((0, h)) => {
                            self.current_header = Some(h);
                            self.probe_need = h.header_len + MAX_HEADER_LEN;
                            self.stage = Stage::Frames;
                        }
                        Some((k, _)) => {
                            self.gather.consume(k);
                            self.probe_need = MAX_HEADER_LEN;
                        }
                        None => {
                            self.probe_need = (self.probe_need + PROBE_GROWTH).min(GATHER_CAP);
                        }
                    }
                }
                Stage::Frames => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, self.probe_need, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        if input.is_empty() {
                            if self.conf.total_size > 0 && self.abs_pos >= self.conf.total_size && !self.gather.is_empty()
                            {
                                let header = self.current_header.take().expect("frame in progress at EOF");
                                let bytes = self.gather.view().to_vec();
                                self.gather.reset();
                                self.stage = Stage::Done;
                                *out = self.make_frame(header, bytes);
                                return Ok(Status::Data);
                            }
                            return Ok(Status::More);
                        }
                        continue;
                    };
                    let buf = view.as_slice().to_vec();

                    let mask = *self.current_header.as_ref().expect("Frames stage requires a current header");
                    match Self::find_header(&buf, mask.header_len, self.streaminfo(), Some(&mask)) {
                        Some((k, next)) => {
                            let frame_bytes = buf[..k].to_vec();
                            self.gather.consume(k);
                            let finished = self.current_header.replace(next).unwrap();
                            self.probe_need = next.header_len + MAX_HEADER_LEN;
                            *out = self.make_frame(finished, frame_bytes);
                            return Ok(Status::Data);
                        }
                        None => {
                            self.probe_need = (self.probe_need + PROBE_GROWTH).min(GATHER_CAP);
                        }
                    }
                }
                Stage::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.gather.reset();
    }
}

impl Seekable for FlacReader {
    fn seek(&mut self, sample_index: u64) {
        let total_samples = self.streaminfo.as_ref().map(|s| s.total_samples).unwrap_or(0);

        let mut lo = SeekPoint { sample: 0, offset: self.data_start };
        let mut hi = SeekPoint { sample: total_samples, offset: self.conf.total_size };

        if let Some((l, h)) = bracket(&self.seektable, sample_index) {
            lo = l;
            hi = h;
        }

        let mut seeker = BisectSeeker::new(lo, hi, sample_index);
        seeker.narrow_initial(lo, hi);
        let offset = seeker.estimate_offset();

        self.seeker = Some(seeker);
        self.gather.reset();
        self.current_header = None;
        self.probe_need = MAX_HEADER_LEN;
        self.stage = Stage::SeekScan;
        self.pending_seek_offset = Some(offset);
    }
}

fn bracket(table: &[SeekTableEntry], target: u64) -> Option<(SeekPoint, SeekPoint)> {
    if table.is_empty() {
        return None;
    }
    let mut lo = SeekPoint { sample: table[0].sample, offset: table[0].offset };
    let mut hi = lo;
    for e in table {
        if e.sample <= target {
            lo = SeekPoint { sample: e.sample, offset: e.offset };
        }
        if e.sample >= target {
            hi = SeekPoint { sample: e.sample, offset: e.offset };
            break;
        }
    }
    Some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avpush_core::format::ReaderFlags;

    fn crc8(data: &[u8]) -> u8 {
        let mut crc: u8 = 0;
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
            }
        }
        crc
    }

    fn flac_frame(frame_number: u8, body: &[u8]) -> Vec<u8> {
        let mut h = vec![0xFF, 0xF8];
        h.push((0x8 << 4) | 0x9); // block size code 256, sample rate code 44100
        h.push((0x1 << 4) | (0x4 << 1)); // stereo, 16 bit
        h.push(frame_number);
        let crc = crc8(&h);
        h.push(crc);
        h.extend_from_slice(body);
        h
    }

    fn streaminfo_block() -> Vec<u8> {
        let info = StreamInfo {
            min_block_size: 256,
            max_block_size: 256,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            total_samples: 0,
            md5: [0; 16],
        };
        let bytes = info.to_bytes();
        let mut block = vec![0x80, 0, 0, bytes.len() as u8]; // last block, type=0 STREAMINFO
        block.extend_from_slice(&bytes);
        block
    }

    fn drain(reader: &mut FlacReader, data: &[u8]) -> Vec<Status> {
        let mut out = Vec::new();
        let mut input = data;
        loop {
            let mut result = ReadResult::default();
            let status = reader.process(&mut input, &mut result).unwrap();
            match status {
                Status::More if input.is_empty() => break,
                Status::More => continue,
                Status::Fin => {
                    out.push(status);
                    break;
                }
                _ => out.push(status),
            }
        }
        out
    }

    #[test]
    fn emits_header_then_frames() {
        let mut stream = b"fLaC".to_vec();
        stream.extend(streaminfo_block());
        stream.extend(flac_frame(0, &[0u8; 20]));
        stream.extend(flac_frame(1, &[0u8; 20]));
        let total_size = stream.len() as u64;

        let mut reader = FlacReader::new(ReaderConf {
            flags: ReaderFlags::NO_SEEK,
            total_size,
            ..Default::default()
        });
        let statuses = drain(&mut reader, &stream);

        assert_eq!(statuses.iter().filter(|s| **s == Status::Header).count(), 1);
        assert_eq!(statuses.iter().filter(|s| **s == Status::Data).count(), 2);
        assert_eq!(statuses.first(), Some(&Status::Header));
    }

    #[test]
    fn rejects_missing_magic() {
        let mut reader = FlacReader::new(ReaderConf::default());
        let mut input: &[u8] = b"OggS";
        let mut result = ReadResult::default();
        assert!(reader.process(&mut input, &mut result).is_err());
    }
}
