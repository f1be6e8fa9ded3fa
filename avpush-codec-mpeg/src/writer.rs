// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental MP3 writer: frames are written through unchanged. When the caller supplies
//! `total_samples` ahead of time, a minimal Xing VBR header is synthesized as frame 0 (a
//! standalone V1 Layer III frame at a fixed 128kbps carrying only the Xing tag, no audio) with
//! its total-frame count filled in immediately and its total-byte count patched via a seek-back
//! finalize once the real size is known, the same two-phase finalize shape as the WAVE writer.

use avpush_core::errors::{unsupported, Result};
use avpush_core::format::{Codec, Format, WriteFlags, Writer, WriterInfo};
use avpush_core::status::{FrameRecord, ReadResult, Status};

const XING_BITRATE_KBPS: u32 = 128;
const XING_TAG_LEN: usize = 16; // "Xing" + flags + total_frames + total_bytes

fn sample_rate_index(rate: u32) -> u8 {
    match rate {
        48000 => 1,
        32000 => 2,
        _ => 0, // 44100, and a best-effort default for anything else
    }
}

fn build_xing_frame(sample_rate: u32, mono: bool, total_samples: u64) -> (Vec<u8>, usize) {
    let side_info_offset = if mono { 4 + 17 } else { 4 + 32 };
    let frame_size = (144 * XING_BITRATE_KBPS * 1000 / sample_rate) as usize;
    let frame_size = frame_size.max(side_info_offset + XING_TAG_LEN);

    let mut frame = vec![0u8; frame_size];
    frame[0] = 0xFF;
    frame[1] = 0xFB; // MPEG-1, Layer III, no CRC
    frame[2] = (9 << 4) | (sample_rate_index(sample_rate) << 2); // bitrate idx 9 = 128kbps
    frame[3] = if mono { 3 << 6 } else { 0 };

    let total_frames = total_samples.div_ceil(1152) as u32;
    let tag_off = side_info_offset;
    frame[tag_off..tag_off + 4].copy_from_slice(b"Xing");
    frame[tag_off + 4..tag_off + 8].copy_from_slice(&0x0003u32.to_be_bytes()); // frames + bytes flags
    frame[tag_off + 8..tag_off + 12].copy_from_slice(&total_frames.to_be_bytes());
    // total_bytes field left zeroed; patched at finalize once the real size is known.

    (frame, tag_off + 12)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    NeedSeekXingBytes,
    EmitXingBytes,
    Done,
}

pub struct Mp3Writer {
    state: State,
    pending: Vec<u8>,
    bytes_written: u64,
    xing_bytes_offset: Option<u64>,
}

impl Default for Mp3Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mp3Writer {
    pub fn new() -> Self {
        Self { state: State::Streaming, pending: Vec::new(), bytes_written: 0, xing_bytes_offset: None }
    }
}

impl Writer for Mp3Writer {
    fn format(&self) -> Format {
        Format::Mp3
    }

    fn create(&mut self, info: &WriterInfo) -> Result<()> {
        if info.codec != Codec::Mp3 {
            return unsupported("MP3 writer only emits MPEG Layer III frames");
        }

        if info.total_samples > 0 {
            let (frame, bytes_field_off) = build_xing_frame(info.sample_rate, info.channels == 1, info.total_samples);
            self.xing_bytes_offset = Some(bytes_field_off as u64);
            self.bytes_written = frame.len() as u64;
            self.pending = frame;
        }
        Ok(())
    }

    fn tag_add(&mut self, _id: avpush_core::tag::NormalizedTag, _name: &str, _value: &str) -> Result<()> {
        // Tail ID3v1/APEv2 tags are written by the caller after this writer has finished (they
        // are simple appends, not something MP3 framing itself needs to know about).
        unsupported("MP3 writer does not support tag_add; append ID3v1/APEv2 after close")
    }

    fn process(&mut self, frame: &[u8], flags: WriteFlags, out: &mut ReadResult) -> Result<Status> {
        match self.state {
            State::Streaming => {
                let mut bytes = std::mem::take(&mut self.pending);
                bytes.extend_from_slice(frame);
                self.bytes_written += frame.len() as u64;

                if flags.contains(WriteFlags::LAST) {
                    self.state =
                        if self.xing_bytes_offset.is_some() { State::NeedSeekXingBytes } else { State::Done };
                }

                *out = ReadResult::Frame(FrameRecord { bytes, pos: None, end_pos: None, duration: None });
                Ok(Status::Data)
            }
            State::NeedSeekXingBytes => {
                self.state = State::EmitXingBytes;
                *out = ReadResult::SeekOffset(self.xing_bytes_offset.unwrap_or(0));
                Ok(Status::Seek)
            }
            State::EmitXingBytes => {
                self.state = State::Done;
                *out = ReadResult::Frame(FrameRecord {
                    bytes: (self.bytes_written as u32).to_be_bytes().to_vec(),
                    pos: None,
                    end_pos: None,
                    duration: None,
                });
                Ok(Status::Data)
            }
            State::Done => Ok(Status::Fin),
        }
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_frame_unmodified_without_xing() {
        let mut writer = Mp3Writer::new();
        writer
            .create(&WriterInfo {
                codec: Codec::Mp3,
                sample_rate: 44100,
                channels: 2,
                sample_bits: 0,
                sample_float: false,
                total_samples: 0,
                encoder_delay: 0,
                end_padding: 0,
            })
            .unwrap();

        let mut result = ReadResult::default();
        let status = writer.process(b"frame-bytes", WriteFlags::LAST, &mut result).unwrap();
        assert_eq!(status, Status::Data);
        if let ReadResult::Frame(f) = result {
            assert_eq!(f.bytes, b"frame-bytes");
        }
        else {
            panic!("expected a frame");
        }

        let mut result = ReadResult::default();
        assert_eq!(writer.process(&[], WriteFlags::empty(), &mut result).unwrap(), Status::Fin);
    }

    #[test]
    fn prepends_xing_header_when_total_samples_known() {
        let mut writer = Mp3Writer::new();
        writer
            .create(&WriterInfo {
                codec: Codec::Mp3,
                sample_rate: 44100,
                channels: 2,
                sample_bits: 0,
                sample_float: false,
                total_samples: 1152 * 10,
                encoder_delay: 0,
                end_padding: 0,
            })
            .unwrap();

        let mut result = ReadResult::default();
        let status = writer.process(b"frame1", WriteFlags::LAST, &mut result).unwrap();
        assert_eq!(status, Status::Data);
        let ReadResult::Frame(f) = result
        else {
            panic!("expected a frame");
        };
        assert!(f.bytes.starts_with(&[0xFF, 0xFB]));
        assert!(f.bytes.ends_with(b"frame1"));

        let mut result = ReadResult::default();
        assert_eq!(writer.process(&[], WriteFlags::empty(), &mut result).unwrap(), Status::Seek);

        let mut result = ReadResult::default();
        let status = writer.process(&[], WriteFlags::empty(), &mut result).unwrap();
        assert_eq!(status, Status::Data);
        if let ReadResult::Frame(f) = result {
            assert_eq!(f.bytes.len(), 4);
        }
    }
}
