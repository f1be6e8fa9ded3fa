// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental ADTS/AAC reader built directly on [`avpush_core::framesync::FrameSyncEngine`].

use avpush_core::errors::Result;
use avpush_core::format::{Codec, Format, Reader, ReaderConf, ReaderFlags};
use avpush_core::framesync::{FrameSyncEngine, SyncOutcome};
use avpush_core::status::{ErrorInfo, FrameRecord, HeaderInfo, ReadResult, Status};

use crate::header::AdtsHeader;

const GATHER_CAP: usize = 64 * 1024;

/// Incremental ADTS/AAC reader.
pub struct AdtsReader {
    engine: FrameSyncEngine<AdtsHeader>,
    header_emitted: bool,
    whole_frames: bool,
    sample_pos: u64,
}

impl AdtsReader {
    pub fn new(conf: ReaderConf) -> Self {
        Self {
            engine: FrameSyncEngine::new(GATHER_CAP),
            header_emitted: false,
            whole_frames: conf.flags.contains(ReaderFlags::AAC_WHOLE_FRAMES),
            sample_pos: 0,
        }
    }
}

impl Reader for AdtsReader {
    fn format(&self) -> Format {
        Format::Aac
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        loop {
            match self.engine.process(input)? {
                SyncOutcome::More => {
                    if input.is_empty() {
                        return Ok(Status::More);
                    }
                    continue;
                }
                SyncOutcome::Committed(h) => {
                    if !self.header_emitted {
                        self.header_emitted = true;
                        *out = ReadResult::Header(HeaderInfo {
                            duration: 0,
                            sample_rate: h.sample_rate(),
                            sample_bits: 16,
                            sample_float: false,
                            channels: h.channels(),
                            codec: Codec::Aac,
                            real_bitrate: 0,
                            encoder_delay: 0,
                            end_padding: 0,
                        });
                        return Ok(Status::Header);
                    }
                }
                SyncOutcome::Frame { header, bytes } => {
                    let samples = header.samples();
                    let payload = if self.whole_frames {
                        bytes
                    }
                    else {
                        bytes[header.header_len().min(bytes.len())..].to_vec()
                    };
                    let frame = FrameRecord {
                        bytes: payload,
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
                        message: "ADTS: lost sync, a frame header failed the stream-identity check".to_string(),
                        offset: None,
                    });
                    return Ok(Status::Warning);
                }
            }
        }
    }

    fn close(&mut self) {
        self.engine.reset();
    }
}
