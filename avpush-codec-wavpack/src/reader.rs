// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental WavPack reader: each `wvpk` block is this format's frame unit directly, delivered
//! by the generic frame-sync engine (WavPack's `ck_size` field gives the exact block length, the
//! same computable-size shape MPEG/ADTS have and FLAC lacks).
//!
//! WavPack carries no absolute per-block sample position in its header, only `block_samples`
//! (the sample count of that one block) and `block_index` (the block's sequence number). Seeking
//! therefore has no real index to narrow against (Cargo.toml deliberately omits a tag/seek-table
//! dependency here): the position fed to [`BisectSeeker`] is `block_index * block_samples`, an
//! approximation that holds as long as the encoder used a constant block length, which is the
//! overwhelming common case.

use avpush_core::bisect::{BisectSeeker, SeekPoint};
use avpush_core::errors::Result;
use avpush_core::format::{Codec, Format, Reader, ReaderConf, Seekable};
use avpush_core::framesync::{FrameSyncEngine, SyncOutcome};
use avpush_core::status::{ErrorInfo, FrameRecord, HeaderInfo, ReadResult, Status};

use crate::header::WavPackHeader;

const GATHER_CAP: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Frames,
    Done,
}

pub struct WavPackReader {
    conf: ReaderConf,
    engine: FrameSyncEngine<WavPackHeader>,
    stage: Stage,
    abs_pos: u64,
    header_emitted: bool,
    committed_header: Option<WavPackHeader>,
    pending_frame: Option<(WavPackHeader, Vec<u8>)>,
    pending_seek_offset: Option<u64>,
}

impl WavPackReader {
    pub fn new(conf: ReaderConf) -> Self {
        Self {
            engine: FrameSyncEngine::new(GATHER_CAP),
            stage: Stage::Frames,
            abs_pos: 0,
            header_emitted: false,
            committed_header: None,
            pending_frame: None,
            pending_seek_offset: None,
            conf,
        }
    }

    fn emit_header(&mut self, header: WavPackHeader) -> ReadResult {
        self.header_emitted = true;
        let duration = if header.total_samples != u32::MAX { header.total_samples as u64 } else { 0 };
        ReadResult::Header(HeaderInfo {
            duration,
            sample_rate: header.sample_rate,
            sample_bits: header.bits_per_sample(),
            sample_float: header.float_data,
            channels: header.channels(),
            codec: Codec::WavPack,
            real_bitrate: 0,
            encoder_delay: 0,
            end_padding: 0,
        })
    }
}

impl Reader for WavPackReader {
    fn format(&self) -> Format {
        Format::WavPack
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        if let Some(off) = self.pending_seek_offset.take() {
            self.abs_pos = off;
            *out = ReadResult::SeekOffset(off);
            return Ok(Status::Seek);
        }

        loop {
            match self.stage {
                Stage::Frames => {
                    if self.conf.total_size > 0 && self.abs_pos >= self.conf.total_size {
                        self.stage = Stage::Done;
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
                                self.pending_frame = Some((header, bytes));
                                *out = self.emit_header(header);
                                return Ok(Status::Header);
                            }

                            let pos = header.block_index as u64 * header.block_samples as u64;
                            let frame = FrameRecord {
                                bytes,
                                pos: Some(pos),
                                end_pos: Some(pos + header.block_samples as u64),
                                duration: Some(header.block_samples),
                            };
                            *out = ReadResult::Frame(frame);
                            return Ok(Status::Data);
                        }
                        SyncOutcome::LostSync => {
                            *out = ReadResult::Error(ErrorInfo {
                                message: "WavPack: lost sync, resynchronizing".to_string(),
                                offset: Some(self.abs_pos),
                            });
                            return Ok(Status::Warning);
                        }
                    }

                    if let Some((header, bytes)) = self.pending_frame.take() {
                        let pos = header.block_index as u64 * header.block_samples as u64;
                        let frame = FrameRecord {
                            bytes,
                            pos: Some(pos),
                            end_pos: Some(pos + header.block_samples as u64),
                            duration: Some(header.block_samples),
                        };
                        *out = ReadResult::Frame(frame);
                        return Ok(Status::Data);
                    }
                }
                Stage::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.engine.reset();
    }
}

impl Seekable for WavPackReader {
    fn seek(&mut self, sample_index: u64) {
        let total_samples = self
            .committed_header
            .and_then(|h| if h.total_samples != u32::MAX { Some(h.total_samples as u64) } else { None })
            .unwrap_or(0);

        let hi = SeekPoint { sample: total_samples.max(sample_index + 1), offset: self.conf.total_size };
        let mut seeker = BisectSeeker::new(SeekPoint { sample: 0, offset: 0 }, hi, sample_index);
        let offset = seeker.estimate_offset();

        self.engine.reset();
        self.stage = Stage::Frames;
        self.header_emitted = true; // a post-seek HEADER re-emit would be redundant
        self.pending_seek_offset = Some(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(ck_size: u32, block_index: u32, block_samples: u32, payload_len: usize) -> Vec<u8> {
        let mut h = Vec::with_capacity(32 + payload_len);
        h.extend_from_slice(b"wvpk");
        h.extend_from_slice(&ck_size.to_le_bytes());
        h.extend_from_slice(&0x0410u16.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes());
        h.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        h.extend_from_slice(&block_index.to_le_bytes());
        h.extend_from_slice(&block_samples.to_le_bytes());
        let flags: u32 = 0x1 | (9 << 23);
        h.extend_from_slice(&flags.to_le_bytes());
        h.extend_from_slice(&0u32.to_le_bytes());
        h.extend(std::iter::repeat(0).take(payload_len));
        h
    }

    fn drain(reader: &mut WavPackReader, data: &[u8]) -> Vec<Status> {
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
        let mut stream = Vec::new();
        stream.extend(block(32 - 8 + 64, 0, 4096, 64));
        stream.extend(block(32 - 8 + 64, 1, 4096, 64));
        stream.extend(block(32 - 8 + 64, 2, 4096, 64));

        let mut reader = WavPackReader::new(ReaderConf::default());
        let statuses = drain(&mut reader, &stream);

        assert_eq!(statuses.first(), Some(&Status::Header));
        // The first two blocks are consumed establishing the two-consecutive-headers commit
        // before either is individually delivered as a frame; only blocks after that land as
        // distinct Data events (mirrors avpush-codec-mpeg's reader test against the same engine).
        assert_eq!(statuses.iter().filter(|s| **s == Status::Data).count(), 2);
    }
}
