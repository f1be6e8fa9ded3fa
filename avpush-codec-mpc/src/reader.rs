// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental Musepack (MPC) SV8 reader.
//!
//! An SV8 stream is `"MPCK"` followed by a run of 2-byte-id + varint-size blocks; there is no
//! frame magic to scan for, so (like the APE reader) this drives its own small state machine
//! rather than the generic frame-sync engine. Only `SH` (stream header), `AP` (audio packet) and
//! `SE` (stream end) are interpreted; every other block (`EI`, `SO`, `ST`, and anything else) is
//! skipped by its declared length, unparsed — the reference decoder treats `ST` the same way,
//! deferring seek-table use to a full decoder library it doesn't itself embed, and this reader's
//! own [`Seekable`] impl is the same proportional estimate the reference falls back to as well.
//!
//! The first `AP` block encountered is where `HEADER` is emitted (built from the `SH` block seen
//! earlier). At that point, if a tail APEv2 tag read is possible, this reader seeks to the file's
//! end to read it before seeking back to the first `AP` block's own offset and re-parsing it from
//! scratch — that rewind is mandatory protocol, not a best-effort extra: without it the first
//! audio packet is never delivered. `NO_SEEK` only skips the optional tag read, not the rewind.

use std::collections::VecDeque;

use avpush_core::errors::{corrupt, Result};
use avpush_core::format::{Codec, Format, Reader, ReaderConf, ReaderFlags, Seekable};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status, Tag};
use avpush_metadata::ape;

use crate::header::{self, BlockKind, MpcInfo};

const GATHER_CAP: usize = 1024 * 1024;
const BLKHDR_MIN: usize = 3;
const BLKHDR_MAX: usize = 10;

#[derive(Debug, Clone, Copy)]
enum Stage {
    Magic,
    BlockHeaderMin,
    BlockHeaderMax,
    ShBody { size: usize },
    ApBody { size: usize },
    SkipBody { remaining: u64 },
    SeekTailApe,
    ReadApeFooter,
    ReadApeBody { tag_size: usize, has_header: bool, item_count: u32 },
    SeekToData,
    Done,
}

pub struct MpcReader {
    conf: ReaderConf,
    gather: ByteGatherer,
    stage: Stage,
    abs_pos: u64,
    header_found: bool,
    info: Option<MpcInfo>,
    dataoff: u64,
    cur_block_start: u64,
    sample_pos: u64,
    pending_tags: VecDeque<Tag>,
    pending_seek_offset: Option<u64>,
}

impl MpcReader {
    pub fn new(conf: ReaderConf) -> Self {
        Self {
            gather: ByteGatherer::new(),
            stage: Stage::Magic,
            abs_pos: 0,
            header_found: false,
            info: None,
            dataoff: 0,
            cur_block_start: 0,
            sample_pos: 0,
            pending_tags: VecDeque::new(),
            pending_seek_offset: None,
            conf,
        }
    }

    fn no_seek(&self) -> bool {
        self.conf.flags.contains(ReaderFlags::NO_SEEK)
    }

    fn emit_header(&self, info: &MpcInfo) -> ReadResult {
        let duration = info.total_samples;
        let real_bitrate = if duration > 0 && self.conf.total_size > 0 {
            ((self.conf.total_size * 8 * info.sample_rate as u64) / duration) as u32
        }
        else {
            0
        };

        ReadResult::Header(HeaderInfo {
            duration,
            sample_rate: info.sample_rate,
            sample_bits: 16,
            sample_float: false,
            channels: info.channels,
            codec: Codec::Mpc,
            real_bitrate,
            encoder_delay: info.delay as u32,
            end_padding: 0,
        })
    }
}

impl Reader for MpcReader {
    fn format(&self) -> Format {
        Format::Mpc
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
                Stage::Magic => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, 4, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    if view.as_slice() != b"MPCK" {
                        return corrupt("MPC: missing \"MPCK\" stream magic");
                    }
                    self.gather.consume(4);
                    self.stage = Stage::BlockHeaderMin;
                }
                Stage::BlockHeaderMin => {
                    self.cur_block_start = self.abs_pos;
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, BLKHDR_MIN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    match header::parse_varint(&view.as_slice()[2..]) {
                        Some((size, vlen)) => self.dispatch_block(view.as_slice()[0], view.as_slice()[1], size, 2 + vlen)?,
                        None => self.stage = Stage::BlockHeaderMax,
                    }
                }
                Stage::BlockHeaderMax => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, BLKHDR_MAX, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let (size, vlen) = header::parse_varint(&view.as_slice()[2..])
                        .ok_or(avpush_core::errors::Error::Corrupt("MPC: block size varint does not terminate within 8 bytes"))?;
                    self.dispatch_block(view.as_slice()[0], view.as_slice()[1], size, 2 + vlen)?;
                }
                Stage::ShBody { size } => {
                    let (consumed, view) = self.gather.gather(*input, size, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let info = header::parse_sh(view.as_slice())?;
                    self.gather.consume(size);
                    self.info = Some(info);
                    self.stage = Stage::BlockHeaderMin;
                }
                Stage::ApBody { size } => {
                    let (consumed, view) = self.gather.gather(*input, size, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let info = self.info.expect("header emitted before audio packets are delivered");
                    let bytes = view.as_slice().to_vec();
                    self.gather.consume(size);
                    let start = self.sample_pos;
                    self.sample_pos += info.frame_samples as u64;
                    self.stage = Stage::BlockHeaderMin;
                    *out = ReadResult::Frame(FrameRecord {
                        bytes,
                        pos: Some(start),
                        end_pos: Some(self.sample_pos),
                        duration: Some(info.frame_samples),
                    });
                    return Ok(Status::Data);
                }
                Stage::SkipBody { remaining } => {
                    let take = (remaining as usize).min(input.len());
                    *input = &input[take..];
                    self.abs_pos += take as u64;
                    let left = remaining - take as u64;
                    if left > 0 {
                        self.stage = Stage::SkipBody { remaining: left };
                        return Ok(Status::More);
                    }
                    self.stage = Stage::BlockHeaderMin;
                }
                Stage::SeekTailApe => {
                    let off = self.conf.total_size.saturating_sub(ape::FOOTER_SIZE as u64);
                    self.abs_pos = off;
                    self.gather.reset();
                    self.stage = Stage::ReadApeFooter;
                    *out = ReadResult::SeekOffset(off);
                    return Ok(Status::Seek);
                }
                Stage::ReadApeFooter => {
                    let (consumed, view) = self.gather.gather(*input, ape::FOOTER_SIZE, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let footer = view.as_slice().to_vec();
                    self.gather.consume(ape::FOOTER_SIZE);
                    match ape::parse_footer(&footer) {
                        Ok(Some(f)) => {
                            let body_start = self.conf.total_size.saturating_sub(f.tag_size);
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
                        _ => self.stage = Stage::SeekToData,
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
                        let iter = ape::ApeTagIter::new(&body[records_start..records_end], item_count);
                        for rec in iter.flatten() {
                            self.pending_tags.push_back(Tag { id: rec.id, name: rec.name.to_string(), value: rec.value.to_string() });
                        }
                    }
                    self.stage = Stage::SeekToData;
                }
                Stage::SeekToData => {
                    self.gather.reset();
                    self.abs_pos = self.dataoff;
                    self.stage = Stage::BlockHeaderMin;
                    *out = ReadResult::SeekOffset(self.dataoff);
                    return Ok(Status::Seek);
                }
                Stage::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.gather.reset();
    }
}

impl MpcReader {
    fn dispatch_block(&mut self, id0: u8, id1: u8, size: u64, header_len: usize) -> Result<()> {
        let body_len = size
            .checked_sub(header_len as u64)
            .ok_or(avpush_core::errors::Error::Corrupt("MPC: block declares itself shorter than its own header"))?;
        self.gather.consume(header_len);

        match header::block_kind([id0, id1]) {
            BlockKind::Sh => self.stage = Stage::ShBody { size: body_len as usize },
            BlockKind::Ap if !self.header_found => {
                self.header_found = true;
                self.dataoff = self.cur_block_start;
                self.stage = if self.conf.total_size > 0 && !self.no_seek() { Stage::SeekTailApe } else { Stage::SeekToData };
            }
            BlockKind::Ap => self.stage = Stage::ApBody { size: body_len as usize },
            BlockKind::Se if self.header_found => self.stage = Stage::Done,
            _ => {
                // The widened `BlockHeaderMax` prefetch may already hold a prefix of this body;
                // that much was already pulled off `input`, so it must not be skipped twice.
                let already = self.gather.len() as u64;
                self.gather.reset();
                self.stage = Stage::SkipBody { remaining: body_len.saturating_sub(already) };
            }
        }
        Ok(())
    }
}

impl Seekable for MpcReader {
    fn seek(&mut self, sample_index: u64) {
        let Some(info) = self.info
        else {
            return;
        };
        if info.total_samples == 0 || self.conf.total_size == 0 {
            return;
        }

        // No seek table is consulted for the same reason the reference decoder doesn't use one
        // here: a proportional estimate against the stream's total size is all that's wired up.
        let off = self.dataoff + (sample_index.min(info.total_samples) * self.conf.total_size / info.total_samples);

        self.gather.reset();
        self.stage = Stage::BlockHeaderMin;
        self.pending_seek_offset = Some(off);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varint(mut v: u64) -> Vec<u8> {
        let mut bytes = vec![(v & 0x7F) as u8];
        v >>= 7;
        while v > 0 {
            bytes.push(0x80 | (v & 0x7F) as u8);
            v >>= 7;
        }
        bytes.reverse();
        bytes
    }

    fn block(id: &[u8; 2], body: &[u8]) -> Vec<u8> {
        // Fixed-point: the size varint's own encoded length counts toward the total it encodes.
        let mut size_len = 1;
        let size = loop {
            let candidate = varint((2 + size_len + body.len()) as u64);
            if candidate.len() == size_len {
                break candidate;
            }
            size_len = candidate.len();
        };
        let mut b = Vec::new();
        b.extend_from_slice(id);
        b.extend_from_slice(&size);
        b.extend_from_slice(body);
        b
    }

    fn sh_body(total_samples: u64) -> Vec<u8> {
        let mut b = vec![0u8; 4];
        b.push(8);
        b.extend_from_slice(&varint(total_samples));
        b.extend_from_slice(&varint(0));
        b.push(0); // rate idx 0 (44100), maxband 0
        b.push(0x10); // channels = 2, midside 0, pwr 0
        b
    }

    fn stream(frames: &[&[u8]]) -> Vec<u8> {
        let mut s = Vec::new();
        s.extend_from_slice(b"MPCK");
        s.extend_from_slice(&block(b"SH", &sh_body(1000)));
        for f in frames {
            s.extend_from_slice(&block(b"AP", f));
        }
        s.extend_from_slice(&block(b"SE", &[]));
        s
    }

    fn drain(reader: &mut MpcReader, data: &[u8]) -> Vec<Status> {
        let mut out = Vec::new();
        let mut input = data;
        loop {
            let mut result = ReadResult::default();
            let status = reader.process(&mut input, &mut result).unwrap();
            match status {
                Status::More if input.is_empty() => break,
                Status::More => continue,
                Status::Seek => continue,
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
    fn emits_header_then_packets_then_fin() {
        let data = stream(&[&[1, 2, 3, 4], &[5, 6, 7, 8, 9]]);
        let total_size = data.len() as u64;
        let mut reader = MpcReader::new(ReaderConf { total_size, flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let statuses = drain(&mut reader, &data);
        assert_eq!(statuses.first(), Some(&Status::Header));
        assert_eq!(statuses.iter().filter(|s| **s == Status::Data).count(), 2);
        assert_eq!(statuses.last(), Some(&Status::Fin));
    }

    #[test]
    fn chunking_invariance() {
        let data = stream(&[&[1, 2, 3, 4], &[5, 6, 7, 8, 9], &[10, 11]]);
        let total_size = data.len() as u64;

        let mut whole = MpcReader::new(ReaderConf { total_size, flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let whole_statuses = drain(&mut whole, &data);

        let mut chunked = MpcReader::new(ReaderConf { total_size, flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let mut collected = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + 5).min(data.len());
            let mut slice = &data[offset..end];
            offset = end;
            loop {
                let mut result = ReadResult::default();
                let status = chunked.process(&mut slice, &mut result).unwrap();
                if status == Status::More {
                    break;
                }
                collected.push(status);
            }
        }
        assert_eq!(whole_statuses, collected);
    }

    #[test]
    fn unknown_block_is_skipped() {
        let mut data = Vec::new();
        data.extend_from_slice(b"MPCK");
        data.extend_from_slice(&block(b"SH", &sh_body(100)));
        data.extend_from_slice(&block(b"EI", &[0, 0, 0, 0]));
        data.extend_from_slice(&block(b"AP", &[9, 9, 9]));
        data.extend_from_slice(&block(b"SE", &[]));
        let total_size = data.len() as u64;
        let mut reader = MpcReader::new(ReaderConf { total_size, flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let statuses = drain(&mut reader, &data);
        assert_eq!(statuses.first(), Some(&Status::Header));
        assert_eq!(statuses.iter().filter(|s| **s == Status::Data).count(), 1);
    }
}
