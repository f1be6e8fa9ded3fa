// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental Monkey's Audio (APE) reader: unlike the frame-synced codecs, there is no frame
//! magic to scan for. Block boundaries come entirely from the seek table parsed right after the
//! header, so this reader drives a small hand-rolled byte accumulator instead of the generic
//! frame-sync engine (the same reasoning that leads the MP4/WAVE readers to hand-roll their own
//! chunk stacks rather than reuse the generic container engine directly).
//!
//! Monkey's Audio packs its compressed bitstream across block boundaries without byte alignment;
//! a block's on-disk byte range is widened to the next multiple of four so the decoder always
//! gets whole bytes, which means up to four bytes at a block's tail are shared with the next
//! block's head. Rather than re-reading those shared bytes from the source a second time (this
//! reader never rewinds within a block run), they are carried forward into the next block's
//! accumulator.

use std::collections::VecDeque;

use avpush_core::errors::Result;
use avpush_core::format::{Codec, Format, Reader, ReaderConf, ReaderFlags, Seekable};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status, Tag};
use avpush_metadata::{ape, id3v1};

use crate::header::{self, ApeInfo};

const GATHER_CAP: usize = 256 * 1024;

#[derive(Debug, Clone, Copy)]
enum Stage {
    Header,
    SeekTable,
    BlockGather,
    SeekTailId3v1,
    ReadId3v1,
    SeekTailApe,
    ReadApeFooter,
    ReadApeBody { tag_size: usize, has_header: bool, item_count: u32 },
    Done,
}

pub struct ApeReader {
    conf: ReaderConf,
    gather: ByteGatherer,
    stage: Stage,
    abs_pos: u64,
    info: Option<ApeInfo>,
    seektab: Vec<u64>,
    iblock: usize,
    block_buf: Vec<u8>,
    block_need: usize,
    carry: Vec<u8>,
    pending_tags: VecDeque<Tag>,
    id3v1_len: u64,
    pending_seek_offset: Option<u64>,
}

impl ApeReader {
    pub fn new(conf: ReaderConf) -> Self {
        Self {
            gather: ByteGatherer::new(),
            stage: Stage::Header,
            abs_pos: 0,
            info: None,
            seektab: Vec::new(),
            iblock: 0,
            block_buf: Vec::new(),
            block_need: 0,
            carry: Vec::new(),
            pending_tags: VecDeque::new(),
            id3v1_len: 0,
            pending_seek_offset: None,
            conf,
        }
    }

    fn no_seek(&self) -> bool {
        self.conf.flags.contains(ReaderFlags::NO_SEEK)
    }

    fn emit_header(&self, info: &ApeInfo) -> ReadResult {
        let duration = info.total_samples();
        let real_bitrate = if duration > 0 && self.conf.total_size > 0 {
            ((self.conf.total_size * 8 * info.sample_rate as u64) / duration) as u32
        }
        else {
            0
        };

        ReadResult::Header(HeaderInfo {
            duration,
            sample_rate: info.sample_rate,
            sample_bits: info.bits_per_sample,
            sample_float: false,
            channels: info.channels,
            codec: Codec::Ape,
            real_bitrate,
            encoder_delay: 0,
            end_padding: 0,
        })
    }

    /// Widen `[off1, off2)` (a seek table interval) to the 4-byte boundaries Monkey's Audio
    /// expects its block data to occupy, per `info.seektab[0]`'s alignment phase.
    fn align_block(&self, off1: u64, off2: u64, is_last: bool) -> (u64, u64) {
        let base = self.seektab[0];
        let align1 = (off1 - base) % 4;
        let start = off1 - align1;
        let end = if is_last {
            off2
        }
        else {
            let align2 = (off2 - base) % 4;
            if align2 == 0 { off2 } else { off2 + (4 - align2) }
        };
        (start, end)
    }
}

impl Reader for ApeReader {
    fn format(&self) -> Format {
        Format::Ape
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
                Stage::Header => {
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, header::APE_HDR_MIN, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let info = header::parse(view.as_slice())?;
                    self.gather.consume(header::APE_HDR_MIN);
                    let result = self.emit_header(&info);
                    self.info = Some(info);
                    self.stage = Stage::SeekTable;
                    *out = result;
                    return Ok(Status::Header);
                }
                Stage::SeekTable => {
                    let info = self.info.expect("header parsed before seek table");
                    let need = info.seekpoints as usize * 4;
                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, need, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    self.seektab = header::parse_seek_table(view.as_slice(), self.conf.total_size)?;
                    self.gather.consume(need);
                    self.gather.reset();
                    self.iblock = 0;
                    self.stage = Stage::BlockGather;
                }
                Stage::BlockGather => {
                    let info = self.info.expect("header parsed before block delivery");
                    let seekpoints = self.seektab.len().saturating_sub(1);

                    if self.block_need == 0 {
                        if self.iblock >= seekpoints {
                            self.stage =
                                if self.conf.total_size > 0 && !self.no_seek() { Stage::SeekTailId3v1 } else { Stage::Done };
                            continue;
                        }

                        let off1 = self.seektab[self.iblock];
                        let off2 = self.seektab[self.iblock + 1];
                        let is_last = self.iblock + 1 == seekpoints;
                        let (start, end) = self.align_block(off1, off2, is_last);

                        self.block_buf.clear();
                        self.block_buf.append(&mut self.carry);
                        let have = self.block_buf.len() as u64;
                        self.block_need = (end - start).saturating_sub(have) as usize;
                    }

                    let before = input.len();
                    let take = self.block_need.min(input.len());
                    self.block_buf.extend_from_slice(&input[..take]);
                    *input = &input[take..];
                    self.abs_pos += (before - input.len()) as u64;
                    self.block_need -= take;

                    if self.block_need > 0 {
                        return Ok(Status::More);
                    }

                    let is_last = self.iblock + 1 == seekpoints;
                    if !is_last {
                        let next_off1 = self.seektab[self.iblock + 1];
                        let align_next = (next_off1 - self.seektab[0]) % 4;
                        if align_next != 0 {
                            let carry_len = self.block_buf.len().min(4);
                            self.carry = self.block_buf[self.block_buf.len() - carry_len..].to_vec();
                        }
                    }

                    let block_start = self.iblock as u64 * info.block_samples as u64;
                    let block_samples = if is_last { info.lastframe_blocks } else { info.block_samples };
                    let bytes = std::mem::take(&mut self.block_buf);
                    self.iblock += 1;

                    *out = ReadResult::Frame(FrameRecord {
                        bytes,
                        pos: Some(block_start),
                        end_pos: Some(block_start + block_samples as u64),
                        duration: Some(block_samples),
                    });
                    return Ok(Status::Data);
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
                    let off = tail_end.saturating_sub(ape::FOOTER_SIZE as u64);
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
                        let iter = ape::ApeTagIter::new(&body[records_start..records_end], item_count);
                        for rec in iter.flatten() {
                            self.pending_tags.push_back(Tag { id: rec.id, name: rec.name.to_string(), value: rec.value.to_string() });
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
    }
}

impl Seekable for ApeReader {
    fn seek(&mut self, sample_index: u64) {
        let Some(info) = self.info
        else {
            return;
        };
        if self.seektab.len() < 2 {
            return;
        }

        let seekpoints = self.seektab.len() - 1;
        let iblock = if info.block_samples == 0 {
            0
        }
        else {
            ((sample_index / info.block_samples as u64) as usize).min(seekpoints - 1)
        };

        let off1 = self.seektab[iblock];
        let is_last = iblock + 1 == seekpoints;
        let (start, _) = self.align_block(off1, self.seektab[iblock + 1], is_last);

        self.gather.reset();
        self.carry.clear();
        self.block_buf.clear();
        self.block_need = 0;
        self.iblock = iblock;
        self.stage = Stage::BlockGather;
        self.pending_seek_offset = Some(start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a header + seek table whose offsets point right past the seek table itself (as a
    /// real encoder's would), then pads each block up to its declared end offset with zeroes.
    fn header_and_seektable(block_samples: u32, lastframe_blocks: u32, total_frames: u32, block_lens: &[u32]) -> Vec<u8> {
        let mut d = vec![0u8; header::APE_HDR_MIN];
        d[0..4].copy_from_slice(b"MAC ");
        d[4..6].copy_from_slice(&3980u16.to_le_bytes());
        d[8..12].copy_from_slice(&56u32.to_le_bytes());
        d[12..16].copy_from_slice(&24u32.to_le_bytes());
        d[16..20].copy_from_slice(&((block_lens.len() as u32) * 4).to_le_bytes());
        let h = &mut d[56..56 + 24];
        h[4..8].copy_from_slice(&block_samples.to_le_bytes());
        h[8..12].copy_from_slice(&lastframe_blocks.to_le_bytes());
        h[12..16].copy_from_slice(&total_frames.to_le_bytes());
        h[16..18].copy_from_slice(&16u16.to_le_bytes());
        h[18..20].copy_from_slice(&2u16.to_le_bytes());
        h[20..24].copy_from_slice(&44100u32.to_le_bytes());

        let data_start = header::APE_HDR_MIN as u32 + block_lens.len() as u32 * 4;
        let mut off = data_start;
        for &len in block_lens {
            d.extend_from_slice(&off.to_le_bytes());
            off += len;
        }
        d.resize(off as usize, 0);
        d
    }

    fn drain(reader: &mut ApeReader, data: &[u8]) -> Vec<Status> {
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
    fn emits_header_then_two_blocks() {
        let stream = header_and_seektable(4096, 4096, 2, &[100, 100]);
        let total_size = stream.len() as u64;

        let mut reader = ApeReader::new(ReaderConf { total_size, flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let statuses = drain(&mut reader, &stream);

        assert_eq!(statuses.first(), Some(&Status::Header));
        assert_eq!(statuses.iter().filter(|s| **s == Status::Data).count(), 2);
        assert_eq!(statuses.last(), Some(&Status::Fin));
    }

    #[test]
    fn chunking_invariance() {
        let stream = header_and_seektable(4096, 2048, 3, &[97, 101, 89]);
        let total_size = stream.len() as u64;

        let mut whole = ApeReader::new(ReaderConf { total_size, flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let whole_statuses = drain(&mut whole, &stream);

        let mut chunked = ApeReader::new(ReaderConf { total_size, flags: ReaderFlags::NO_SEEK, ..Default::default() });
        let mut collected = Vec::new();
        let mut offset = 0;
        while offset < stream.len() {
            let end = (offset + 7).min(stream.len());
            let mut slice = &stream[offset..end];
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
}
