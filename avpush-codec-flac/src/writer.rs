// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental FLAC writer: `fLaC` + STREAMINFO (+ VORBIS_COMMENT, when tags were added before
//! the first frame) is buffered at `create`/`tag_add` and flushed ahead of the first frame, the
//! same pending-bytes idiom the WAVE and MP3 writers use. Frames are passed through unchanged;
//! each frame's own header is parsed to accumulate the total sample count, patched into
//! STREAMINFO via a seek-back finalize when the caller didn't supply it up front. The STREAMINFO
//! MD5 signature field is left zeroed: computing it would mean buffering and hashing the entire
//! decoded signal, which this writer (a frame pass-through, not a codec) never has access to.

use avpush_core::errors::{unsupported, Result};
use avpush_core::format::{Codec, Format, WriteFlags, Writer, WriterInfo};
use avpush_core::status::{FrameRecord, ReadResult, Status};
use avpush_metadata::vorbis::VorbisTagWriter;

use crate::header;
use crate::streaminfo::StreamInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    NeedSeekStreamInfo,
    EmitStreamInfo,
    Done,
}

pub struct FlacWriter {
    state: State,
    pending: Vec<u8>,
    streaminfo: StreamInfo,
    streaminfo_offset: u64,
    total_samples_written: u64,
    tags: Vec<(String, String)>,
    header_built: bool,
}

impl Default for FlacWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FlacWriter {
    pub fn new() -> Self {
        Self {
            state: State::Streaming,
            pending: Vec::new(),
            streaminfo: StreamInfo {
                min_block_size: 0,
                max_block_size: 0,
                min_frame_size: 0,
                max_frame_size: 0,
                sample_rate: 0,
                channels: 0,
                bits_per_sample: 0,
                total_samples: 0,
                md5: [0; 16],
            },
            streaminfo_offset: 0,
            total_samples_written: 0,
            tags: Vec::new(),
            header_built: false,
        }
    }

    fn build_header(&mut self) -> Vec<u8> {
        let mut out = b"fLaC".to_vec();
        let has_tags = !self.tags.is_empty();
        let streaminfo_bytes = self.streaminfo.to_bytes();

        out.push(if has_tags { 0x00 } else { 0x80 });
        out.extend_from_slice(&(streaminfo_bytes.len() as u32).to_be_bytes()[1..4]);
        self.streaminfo_offset = out.len() as u64;
        out.extend_from_slice(&streaminfo_bytes);

        if has_tags {
            let mut writer = VorbisTagWriter::new();
            writer.add_vendor("avpush");
            for (name, value) in &self.tags {
                writer.add(name, value);
            }
            let comment_bytes = writer.finish();
            out.push(0x80 | 0x04); // last block, type 4 = VORBIS_COMMENT
            out.extend_from_slice(&(comment_bytes.len() as u32).to_be_bytes()[1..4]);
            out.extend_from_slice(&comment_bytes);
        }

        self.header_built = true;
        out
    }
}

impl Writer for FlacWriter {
    fn format(&self) -> Format {
        Format::Flac
    }

    fn create(&mut self, info: &WriterInfo) -> Result<()> {
        if info.codec != Codec::Flac {
            return unsupported("FLAC writer only emits native FLAC frames");
        }
        self.streaminfo = StreamInfo {
            min_block_size: 0,
            max_block_size: 0,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: info.sample_rate,
            channels: info.channels as u8,
            bits_per_sample: info.sample_bits as u8,
            total_samples: info.total_samples,
            md5: [0; 16],
        };
        Ok(())
    }

    fn tag_add(&mut self, _id: avpush_core::tag::NormalizedTag, name: &str, value: &str) -> Result<()> {
        if self.header_built {
            return unsupported("FLAC writer: tags must be added before the first frame");
        }
        self.tags.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn process(&mut self, frame: &[u8], flags: WriteFlags, out: &mut ReadResult) -> Result<Status> {
        match self.state {
            State::Streaming => {
                let mut bytes = if self.header_built { Vec::new() } else { self.build_header() };

                if let Some(h) = header::try_parse(frame, &self.streaminfo) {
                    self.total_samples_written += h.block_size as u64;
                }
                bytes.extend_from_slice(frame);

                if flags.contains(WriteFlags::LAST) {
                    self.state = if self.streaminfo.total_samples == 0 {
                        State::NeedSeekStreamInfo
                    }
                    else {
                        State::Done
                    };
                }

                *out = ReadResult::Frame(FrameRecord { bytes, pos: None, end_pos: None, duration: None });
                Ok(Status::Data)
            }
            State::NeedSeekStreamInfo => {
                self.state = State::EmitStreamInfo;
                *out = ReadResult::SeekOffset(self.streaminfo_offset);
                Ok(Status::Seek)
            }
            State::EmitStreamInfo => {
                self.state = State::Done;
                self.streaminfo.total_samples = self.total_samples_written;
                *out = ReadResult::Frame(FrameRecord {
                    bytes: self.streaminfo.to_bytes().to_vec(),
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

    fn flac_frame(frame_number: u8) -> Vec<u8> {
        let mut h = vec![0xFF, 0xF8];
        h.push((0x8 << 4) | 0x9);
        h.push((0x1 << 4) | (0x4 << 1));
        h.push(frame_number);
        let crc = crc8(&h);
        h.push(crc);
        h.extend_from_slice(&[0u8; 20]);
        h
    }

    fn info(total_samples: u64) -> WriterInfo {
        WriterInfo {
            codec: Codec::Flac,
            sample_rate: 44100,
            channels: 2,
            sample_bits: 16,
            sample_float: false,
            total_samples,
            encoder_delay: 0,
            end_padding: 0,
        }
    }

    #[test]
    fn writes_flac_magic_and_streaminfo_once() {
        let mut writer = FlacWriter::new();
        writer.create(&info(512)).unwrap();

        let mut result = ReadResult::default();
        let status = writer.process(&flac_frame(0), WriteFlags::empty(), &mut result).unwrap();
        assert_eq!(status, Status::Data);
        let ReadResult::Frame(f) = result
        else {
            panic!("expected a frame");
        };
        assert!(f.bytes.starts_with(b"fLaC"));

        let mut result = ReadResult::default();
        let status = writer.process(&flac_frame(1), WriteFlags::LAST, &mut result).unwrap();
        assert_eq!(status, Status::Data);
        assert_eq!(writer.state, State::Done);
    }

    #[test]
    fn patches_total_samples_when_unknown_up_front() {
        let mut writer = FlacWriter::new();
        writer.create(&info(0)).unwrap();

        let mut result = ReadResult::default();
        writer.process(&flac_frame(0), WriteFlags::empty(), &mut result).unwrap();

        let mut result = ReadResult::default();
        let status = writer.process(&flac_frame(1), WriteFlags::LAST, &mut result).unwrap();
        assert_eq!(status, Status::Seek);

        let mut result = ReadResult::default();
        let status = writer.process(&[], WriteFlags::empty(), &mut result).unwrap();
        assert_eq!(status, Status::Data);
        let ReadResult::Frame(f) = result
        else {
            panic!("expected a frame");
        };
        assert_eq!(f.bytes.len(), 34);
        assert_eq!(writer.total_samples_written, 512);
    }

    #[test]
    fn tags_added_before_first_frame_become_vorbis_comment() {
        let mut writer = FlacWriter::new();
        writer.create(&info(256)).unwrap();
        writer.tag_add(avpush_core::tag::NormalizedTag::Artist, "ARTIST", "Test Artist").unwrap();

        let mut result = ReadResult::default();
        writer.process(&flac_frame(0), WriteFlags::LAST, &mut result).unwrap();
        let ReadResult::Frame(f) = result
        else {
            panic!("expected a frame");
        };
        assert!(f.bytes.windows(4).any(|w| w == b"ARTI" || w == b"Test"));
    }
}
