// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental MP3 (MPEG-1/2 Layer I/II/III) reader: a leading ID3v2 tag (if present) is decoded
//! and its frames queued as META, then the frame-sync engine takes over; the first frame's side
//! information is inspected for a Xing/Info or VBRI VBR tag before HEADER is emitted. When the
//! stream's total size is known and `NO_SEEK` is not set, the reader requests a SEEK to the tail
//! to decode ID3v1 and APEv2 tags once no further frame can fit before the end of the stream.
//!
//! Seeking without a Xing TOC is a single interpolated probe rather than the full bisection
//! loop: a bare MPEG frame header carries no sample position, so unlike FLAC/OGG/WavPack there
//! is nothing to narrow the search window against after repositioning. This is an approximation,
//! same as most real MP3 seekers without a VBR index.

use std::collections::VecDeque;

use avpush_core::bisect::{xing_toc_offset, BisectSeeker, SeekPoint};
use avpush_core::errors::Result;
use avpush_core::format::{Codec, Format, Reader, ReaderConf, ReaderFlags, Seekable};
use avpush_core::framesync::{FrameSyncEngine, SyncOutcome};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{ErrorInfo, FrameRecord, HeaderInfo, ReadResult, Status, Tag};
use avpush_metadata::id3v1;
use avpush_metadata::id3v2;

use crate::header::Mpeg1Header;
use crate::xing::{parse_vbri, parse_xing, XingInfo};

const GATHER_CAP: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
enum Stage {
    Id3v2Header,
    Id3v2Body { tag_size: usize, unsync: bool, major_version: u8 },
    Frames,
    /// No further frame can fit before `total_size`; ask the caller to reposition to the tail
    /// and decode ID3v1/APEv2.
    SeekTailId3v1,
    ReadId3v1,
    SeekTailApe,
    ReadApeFooter,
    ReadApeBody { tag_size: usize, has_header: bool, item_count: u32 },
    Done,
}

pub struct Mp3Reader {
    conf: ReaderConf,
    gather: ByteGatherer,
    engine: FrameSyncEngine<Mpeg1Header>,
    stage: Stage,
    abs_pos: u64,
    header_emitted: bool,
    committed_header: Option<Mpeg1Header>,
    xing: Option<XingInfo>,
    pending_tags: VecDeque<Tag>,
    pending_frame: Option<(Mpeg1Header, Vec<u8>)>,
    sample_pos: u64,
    id3v1_len: u64,
    pending_seek_offset: Option<u64>,
}

impl Mp3Reader {
    pub fn new(conf: ReaderConf) -> Self {
        Self {
            gather: ByteGatherer::new(),
            engine: FrameSyncEngine::new(GATHER_CAP),
            stage: Stage::Id3v2Header,
            abs_pos: 0,
            header_emitted: false,
            committed_header: None,
            xing: None,
            pending_tags: VecDeque::new(),
            pending_frame: None,
            sample_pos: 0,
            id3v1_len: 0,
            pending_seek_offset: None,
            conf,
        }
    }

    fn no_seek(&self) -> bool {
        self.conf.flags.contains(ReaderFlags::NO_SEEK)
    }

    fn near_tail(&self) -> bool {
        self.conf.total_size > 0 && self.abs_pos + 4 > self.conf.total_size
    }

    fn emit_header(&mut self, header: Mpeg1Header) -> ReadResult {
        let duration = self
            .xing
            .as_ref()
            .and_then(|x| x.total_frames)
            .map(|frames| frames as u64 * header.samples_per_frame() as u64)
            .unwrap_or(0);
        let real_bitrate = if duration > 0 {
            match self.xing.as_ref().and_then(|x| x.total_bytes) {
                Some(total_bytes) => ((total_bytes as u64 * 8 * header.sample_rate as u64) / duration) as u32,
                None => header.bitrate_kbps * 1000,
            }
        }
        else {
            header.bitrate_kbps * 1000
        };

        self.header_emitted = true;
        ReadResult::Header(HeaderInfo {
            duration,
            sample_rate: header.sample_rate,
            sample_bits: 16,
            sample_float: false,
            channels: header.channels(),
            codec: Codec::Mp3,
            real_bitrate,
            encoder_delay: self.xing.as_ref().map(|x| x.encoder_delay).unwrap_or(0),
            end_padding: self.xing.as_ref().map(|x| x.end_padding).unwrap_or(0),
        })
    }
}

impl Reader for Mp3Reader {
    fn format(&self) -> Format {
        Format::Mp3
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        if let Some(off) = self.pending_seek_offset.take() {
            self.abs_pos = off;
            *out = ReadResult::SeekOffset(off);
            return Ok(Status::Seek);
        }

        loop {
            if let Some(tag) = self.pending_tags.pop_front() {
                *out = ReadResult::Tag(tag);
                return Ok(Status::Meta);
            }

            match self.stage {
                Stage::Id3v2Header => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, id3v2::HEADER_SIZE, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let buf = view.as_slice();
                    if &buf[0..3] == b"ID3" {
                        let header_bytes: [u8; 10] = buf.try_into().unwrap();
                        match id3v2::parse_header(&header_bytes) {
                            Ok(h) => {
                                self.gather.consume(id3v2::HEADER_SIZE);
                                self.stage = Stage::Id3v2Body {
                                    tag_size: h.tag_size as usize,
                                    unsync: h.unsync,
                                    major_version: h.major_version,
                                };
                            }
                            Err(_) => {
                                self.stage = Stage::Frames;
                            }
                        }
                    }
                    else {
                        self.stage = Stage::Frames;
                    }
                }
                Stage::Id3v2Body { tag_size, unsync, major_version } => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, tag_size, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(tag_size);
                    let body = if unsync { id3v2::de_unsynchronize(&body) } else { body };
                    let tags = id3v2::decode_frames(&body, major_version)?;
                    for t in tags {
                        self.pending_tags.push_back(Tag { id: t.id, name: t.name, value: t.value });
                    }
                    self.stage = Stage::Frames;
                }
                Stage::Frames => {
                    if self.near_tail() {
                        self.stage = if self.no_seek() { Stage::Done } else { Stage::SeekTailId3v1 };
                        continue;
                    }

                    let before = input.len();
                    let outcome = self.engine.process(input)?;
                    self.abs_pos += (before - input.len()) as u64;

                    match outcome {
                        SyncOutcome::More => {
                            if input.is_empty() {
                                return Ok(Status::More);
                            }
                        }
                        SyncOutcome::Committed(h) => {
                            self.committed_header = Some(h);
                        }
                        SyncOutcome::Frame { header, bytes } => {
                            if !self.header_emitted {
                                let side_off = header.side_info_offset();
                                if bytes.len() > side_off {
                                    self.xing = parse_xing(&bytes[side_off..])
                                        .or_else(|| parse_vbri(&bytes[side_off..]));
                                }
                                self.pending_frame = Some((header, bytes));
                                *out = self.emit_header(header);
                                return Ok(Status::Header);
                            }

                            let samples = header.samples_per_frame();
                            let frame = FrameRecord {
                                bytes,
                                pos: Some(self.sample_pos),
                                end_pos: Some(self.sample_pos + samples as u64),
                                duration: Some(samples),
                            };
                            self.sample_pos += samples as u64;
                            *out = ReadResult::Frame(frame);
                            return Ok(Status::Data);
                        }
                        SyncOutcome::LostSync => {
                            *out = ReadResult::Error(ErrorInfo {
                                message: "MP3: lost sync, resynchronizing".to_string(),
                                offset: Some(self.abs_pos),
                            });
                            return Ok(Status::Warning);
                        }
                    }

                    if let Some((header, bytes)) = self.pending_frame.take() {
                        let samples = header.samples_per_frame();
                        let frame = FrameRecord {
                            bytes,
                            pos: Some(self.sample_pos),
                            end_pos: Some(self.sample_pos + samples as u64),
                            duration: Some(samples),
                        };
                        self.sample_pos += samples as u64;
                        *out = ReadResult::Frame(frame);
                        return Ok(Status::Data);
                    }
                }
                Stage::SeekTailId3v1 => {
                    let off = self.conf.total_size.saturating_sub(id3v1::TAG_SIZE as u64);
                    self.abs_pos = off;
                    self.gather.reset();
                    self.stage = Stage::ReadId3v1;
                    *out = ReadResult::SeekOffset(off);
                    return Ok(Status::Seek);
                }
                Stage::ReadId3v1 => {
                    let (consumed, view) = self.gather.gather(*input, id3v1::TAG_SIZE, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let buf: [u8; 128] = view.as_slice().try_into().unwrap();
                    self.gather.consume(id3v1::TAG_SIZE);
                    if let Ok(tags) = id3v1::decode(&buf, self.conf.code_page) {
                        self.id3v1_len = id3v1::TAG_SIZE as u64;
                        for t in tags {
                            self.pending_tags.push_back(Tag { id: t.id, name: t.name, value: t.value });
                        }
                    }
                    self.stage = Stage::SeekTailApe;
                }
                Stage::SeekTailApe => {
                    let tail_end = self.conf.total_size.saturating_sub(self.id3v1_len);
                    let off = tail_end.saturating_sub(avpush_metadata::ape::FOOTER_SIZE as u64);
                    self.abs_pos = off;
                    self.gather.reset();
                    self.stage = Stage::ReadApeFooter;
                    *out = ReadResult::SeekOffset(off);
                    return Ok(Status::Seek);
                }
                Stage::ReadApeFooter => {
                    let footer_size = avpush_metadata::ape::FOOTER_SIZE;
                    let (consumed, view) = self.gather.gather(*input, footer_size, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let footer = view.as_slice().to_vec();
                    self.gather.consume(footer_size);
                    match avpush_metadata::ape::parse_footer(&footer) {
                        Ok(Some(f)) => {
                            let tail_end = self.conf.total_size.saturating_sub(self.id3v1_len);
                            let body_start = tail_end.saturating_sub(f.tag_size);
                            self.stage = Stage::ReadApeBody {
                                tag_size: f.tag_size as usize,
                                has_header: f.has_header,
                                item_count: f.item_count,
                            };
                            self.abs_pos = body_start;
                            self.gather.reset();
                            *out = ReadResult::SeekOffset(body_start);
                            return Ok(Status::Seek);
                        }
                        _ => {
                            self.stage = Stage::Done;
                        }
                    }
                }
                Stage::ReadApeBody { tag_size, has_header, item_count } => {
                    let (consumed, view) = self.gather.gather(*input, tag_size, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(tag_size);

                    let records_start = if has_header { 32 } else { 0 };
                    let records_end = body.len().saturating_sub(32);
                    if records_end > records_start {
                        let iter =
                            avpush_metadata::ape::ApeTagIter::new(&body[records_start..records_end], item_count);
                        for rec in iter.flatten() {
                            self.pending_tags.push_back(Tag {
                                id: rec.id,
                                name: rec.name.to_string(),
                                value: rec.value.to_string(),
                            });
                        }
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.gather.reset();
        self.engine.reset();
    }
}

impl Seekable for Mp3Reader {
    fn seek(&mut self, sample_index: u64) {
        let total_samples = self
            .xing
            .as_ref()
            .and_then(|x| x.total_frames)
            .zip(self.committed_header)
            .map(|(frames, h)| frames as u64 * h.samples_per_frame() as u64)
            .unwrap_or(0);

        let offset = match (self.xing.as_ref().and_then(|x| x.toc), self.xing.as_ref().and_then(|x| x.total_bytes)) {
            (Some(toc), Some(total_bytes)) if total_samples > 0 => {
                xing_toc_offset(&toc, sample_index, total_samples, total_bytes as u64)
            }
            _ => {
                let hi = SeekPoint { sample: total_samples.max(sample_index + 1), offset: self.conf.total_size };
                let mut seeker = BisectSeeker::new(SeekPoint { sample: 0, offset: 0 }, hi, sample_index);
                seeker.estimate_offset()
            }
        };

        self.gather.reset();
        self.engine.reset();
        self.sample_pos = sample_index;
        self.stage = Stage::Frames;
        self.pending_seek_offset = Some(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp3_frame(body_len: usize) -> Vec<u8> {
        // 128kbps, 44100 Hz, stereo, no padding, no CRC -> frame_size = 417.
        let mut h = [0u8; 4];
        h[0] = 0xFF;
        h[1] = 0xFB;
        h[2] = 9 << 4; // bitrate idx 9 = 128kbps, sr idx 0 = 44100, no padding
        h[3] = 0;
        let mut frame = h.to_vec();
        frame.extend(std::iter::repeat(0).take(body_len));
        frame
    }

    fn drain(reader: &mut Mp3Reader, data: &[u8]) -> Vec<(Status, ReadResult)> {
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
    fn emits_header_and_frames_without_id3v2() {
        let mut stream = Vec::new();
        stream.extend(mp3_frame(417 - 4));
        stream.extend(mp3_frame(417 - 4));
        stream.extend(mp3_frame(417 - 4));

        let mut reader = Mp3Reader::new(ReaderConf { flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let events = drain(&mut reader, &stream);

        let header = events.iter().find_map(|(s, r)| {
            if *s == Status::Header {
                if let ReadResult::Header(h) = r {
                    return Some(h.clone());
                }
            }
            None
        });
        let header = header.expect("HEADER expected");
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channels, 2);

        let frames = events.iter().filter(|(s, _)| *s == Status::Data).count();
        assert_eq!(frames, 2);
    }

    #[test]
    fn chunking_invariance() {
        let mut stream = Vec::new();
        for _ in 0..4 {
            stream.extend(mp3_frame(417 - 4));
        }

        let mut whole_reader = Mp3Reader::new(ReaderConf { flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let whole: Vec<_> = drain(&mut whole_reader, &stream).into_iter().map(|(s, _)| s).collect();

        let mut chunked_reader = Mp3Reader::new(ReaderConf { flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let mut collected = Vec::new();
        let mut offset = 0;
        while offset < stream.len() {
            let end = (offset + 3).min(stream.len());
            let mut slice = &stream[offset..end];
            offset = end;
            loop {
                let mut result = ReadResult::default();
                let status = chunked_reader.process(&mut slice, &mut result).unwrap();
                if status == Status::More {
                    break;
                }
                collected.push(status);
            }
        }
        assert_eq!(whole, collected);
    }
}
