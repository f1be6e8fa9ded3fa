// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental MP4/MOV writer (AAC only): `ftyp` + a streamed `mdat` whose per-sample
//! offsets/sizes are accumulated as frames arrive, followed by a single `moov` buffered and
//! emitted once the whole stream is known. Offsets into `stco` aren't known until `mdat`'s final
//! length is, so `moov` is always written at the tail rather than patched piecemeal — the only
//! backward seek this writer issues is to patch `mdat`'s own declared size once streaming ends.

use avpush_core::errors::{unsupported, Result};
use avpush_core::format::{Codec, Format, WriteFlags, Writer, WriterInfo};
use avpush_core::status::{FrameRecord, ReadResult, Status};
use avpush_core::tag::NormalizedTag;
use avpush_metadata::mp4_ilst::encode_ilst;

/// AAC LC's default samples-per-frame. Raw (ADTS-less) MP4 audio access units carry no framing
/// of their own, so every sample's duration in `stts` is assumed to be this constant; a trailing
/// partial frame (stream length not a multiple of 1024 samples) is not distinguished.
const FRAME_DURATION: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    NeedSeekMdatSize,
    EmitMdatSize,
    NeedSeekEnd,
    EmitMoov,
    Done,
}

/// Incremental MP4/MOV writer.
pub struct Mp4Writer {
    state: State,
    sample_rate: u32,
    channels: u8,
    sample_bits: u8,
    tags: Vec<(NormalizedTag, String)>,
    sample_sizes: Vec<u32>,
    sample_offsets: Vec<u64>,
    mdat_header_offset: u64,
    bytes_in_mdat: u64,
    header_written: bool,
}

impl Default for Mp4Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mp4Writer {
    pub fn new() -> Self {
        Self {
            state: State::Streaming,
            sample_rate: 0,
            channels: 0,
            sample_bits: 0,
            tags: Vec::new(),
            sample_sizes: Vec::new(),
            sample_offsets: Vec::new(),
            mdat_header_offset: 0,
            bytes_in_mdat: 0,
            header_written: false,
        }
    }

    fn build_moov(&self) -> Vec<u8> {
        let total_samples = self.sample_sizes.len() as u32;
        let duration = (total_samples as u64 * FRAME_DURATION as u64).min(u32::MAX as u64) as u32;

        let mvhd = full_box(0, &{
            let mut b = Vec::with_capacity(96);
            b.extend_from_slice(&0u32.to_be_bytes()); // creation_time
            b.extend_from_slice(&0u32.to_be_bytes()); // modification_time
            b.extend_from_slice(&self.sample_rate.to_be_bytes()); // timescale
            b.extend_from_slice(&duration.to_be_bytes());
            b.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
            b.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
            b.extend_from_slice(&[0u8; 2]); // reserved
            b.extend_from_slice(&[0u8; 8]); // reserved
            // unity transform matrix
            b.extend_from_slice(&0x0001_0000u32.to_be_bytes());
            b.extend_from_slice(&0u32.to_be_bytes());
            b.extend_from_slice(&0u32.to_be_bytes());
            b.extend_from_slice(&0u32.to_be_bytes());
            b.extend_from_slice(&0x0001_0000u32.to_be_bytes());
            b.extend_from_slice(&0u32.to_be_bytes());
            b.extend_from_slice(&0u32.to_be_bytes());
            b.extend_from_slice(&0u32.to_be_bytes());
            b.extend_from_slice(&0x4000_0000u32.to_be_bytes());
            b.extend_from_slice(&[0u8; 24]); // pre_defined
            b.extend_from_slice(&2u32.to_be_bytes()); // next_track_ID
            b
        });

        let hdlr = full_box(0, &{
            let mut h = 0u32.to_be_bytes().to_vec(); // pre_defined
            h.extend_from_slice(b"soun");
            h.extend_from_slice(&[0u8; 12]);
            h
        });

        let stsd = full_box(0, &{
            let entry = {
                let mut e = Vec::new();
                e.extend_from_slice(&[0u8; 8]); // reserved + data_reference_index placeholder
                e.extend_from_slice(&0u16.to_be_bytes()); // version
                e.extend_from_slice(&[0u8; 6]); // reserved
                e.extend_from_slice(&(self.channels as u16).to_be_bytes());
                e.extend_from_slice(&(self.sample_bits as u16).to_be_bytes());
                e.extend_from_slice(&0u32.to_be_bytes()); // unused2
                e.extend_from_slice(&(self.sample_rate.min(u16::MAX as u32) as u16).to_be_bytes());
                e.extend_from_slice(&0u16.to_be_bytes()); // rate_res
                e
            };
            let entry_box = box_(b"mp4a", &entry);
            let mut out = 1u32.to_be_bytes().to_vec(); // entry_count
            out.extend_from_slice(&entry_box);
            out
        });

        let stts = full_box(0, &{
            let mut b = 1u32.to_be_bytes().to_vec(); // one run: every sample shares one duration
            b.extend_from_slice(&total_samples.to_be_bytes());
            b.extend_from_slice(&FRAME_DURATION.to_be_bytes());
            b
        });

        let stsc = full_box(0, &{
            let mut b = 1u32.to_be_bytes().to_vec();
            b.extend_from_slice(&1u32.to_be_bytes()); // first_chunk
            b.extend_from_slice(&1u32.to_be_bytes()); // samples_per_chunk: one sample per chunk
            b.extend_from_slice(&1u32.to_be_bytes()); // sample_description_index
            b
        });

        let stsz = full_box(0, &{
            let mut b = 0u32.to_be_bytes().to_vec(); // sample_size 0 -> per-sample table follows
            b.extend_from_slice(&total_samples.to_be_bytes());
            for &size in &self.sample_sizes {
                b.extend_from_slice(&size.to_be_bytes());
            }
            b
        });

        let stco = full_box(0, &{
            let mut b = total_samples.to_be_bytes().to_vec();
            for &offset in &self.sample_offsets {
                b.extend_from_slice(&(offset as u32).to_be_bytes());
            }
            b
        });

        let stbl = box_(
            b"stbl",
            &[box_(b"stsd", &stsd), box_(b"stts", &stts), box_(b"stsc", &stsc), box_(b"stsz", &stsz), box_(b"stco", &stco)]
                .concat(),
        );
        let minf = box_(b"minf", &stbl);
        let mdia = box_(b"mdia", &[box_(b"hdlr", &hdlr), minf].concat());
        let trak = box_(b"trak", &mdia);

        let mut moov_body = box_(b"mvhd", &mvhd);
        moov_body.extend_from_slice(&trak);

        if !self.tags.is_empty() {
            let ilst = box_(b"ilst", &encode_ilst(&self.tags));
            let meta = box_(b"meta", &[full_box(0, &[]), ilst].concat());
            let udta = box_(b"udta", &meta);
            moov_body.extend_from_slice(&udta);
        }

        box_(b"moov", &moov_body)
    }
}

fn box_(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
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

impl Writer for Mp4Writer {
    fn format(&self) -> Format {
        Format::Mp4
    }

    fn create(&mut self, info: &WriterInfo) -> Result<()> {
        if info.codec != Codec::Aac {
            return unsupported("MP4 writer only emits AAC");
        }
        self.sample_rate = info.sample_rate;
        self.channels = info.channels;
        self.sample_bits = info.sample_bits;
        Ok(())
    }

    fn tag_add(&mut self, id: NormalizedTag, _name: &str, value: &str) -> Result<()> {
        self.tags.push((id, value.to_string()));
        Ok(())
    }

    fn process(&mut self, frame: &[u8], flags: WriteFlags, out: &mut ReadResult) -> Result<Status> {
        match self.state {
            State::Streaming => {
                let mut bytes = Vec::new();
                if !self.header_written {
                    self.header_written = true;
                    let ftyp = box_(b"ftyp", b"isomiso2mp41");
                    self.mdat_header_offset = ftyp.len() as u64;
                    bytes.extend_from_slice(&ftyp);
                    bytes.extend_from_slice(&0u32.to_be_bytes()); // mdat size, patched at finalize
                    bytes.extend_from_slice(b"mdat");
                }

                self.sample_offsets.push(self.mdat_header_offset + 8 + self.bytes_in_mdat);
                self.sample_sizes.push(frame.len() as u32);
                bytes.extend_from_slice(frame);
                self.bytes_in_mdat += frame.len() as u64;

                if flags.contains(WriteFlags::LAST) {
                    self.state = State::NeedSeekMdatSize;
                }

                *out = ReadResult::Frame(FrameRecord { bytes, pos: None, end_pos: None, duration: None });
                Ok(Status::Data)
            }
            State::NeedSeekMdatSize => {
                self.state = State::EmitMdatSize;
                *out = ReadResult::SeekOffset(self.mdat_header_offset);
                Ok(Status::Seek)
            }
            State::EmitMdatSize => {
                let mdat_size = 8 + self.bytes_in_mdat;
                self.state = State::NeedSeekEnd;
                *out = ReadResult::Frame(FrameRecord {
                    bytes: (mdat_size as u32).to_be_bytes().to_vec(),
                    pos: None,
                    end_pos: None,
                    duration: None,
                });
                Ok(Status::Data)
            }
            State::NeedSeekEnd => {
                self.state = State::EmitMoov;
                *out = ReadResult::SeekOffset(self.mdat_header_offset + 8 + self.bytes_in_mdat);
                Ok(Status::Seek)
            }
            State::EmitMoov => {
                self.state = State::Done;
                let moov = self.build_moov();
                *out = ReadResult::Frame(FrameRecord { bytes: moov, pos: None, end_pos: None, duration: None });
                Ok(Status::Data)
            }
            State::Done => Ok(Status::Fin),
        }
    }

    fn close(&mut self) {
        self.sample_sizes.clear();
        self.sample_offsets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> WriterInfo {
        WriterInfo {
            codec: Codec::Aac,
            sample_rate: 48000,
            channels: 2,
            sample_bits: 16,
            sample_float: false,
            total_samples: 0,
            encoder_delay: 0,
            end_padding: 0,
        }
    }

    fn drain_finalize(writer: &mut Mp4Writer) -> Vec<u8> {
        let mut moov_bytes = Vec::new();
        loop {
            let mut result = ReadResult::default();
            let status = writer.process(&[], WriteFlags::empty(), &mut result).unwrap();
            match status {
                Status::Seek => continue,
                Status::Data => {
                    if let ReadResult::Frame(f) = result {
                        moov_bytes = f.bytes;
                    }
                }
                Status::Fin => break,
                _ => {}
            }
            if matches!(writer.state, State::Done) {
                break;
            }
        }
        moov_bytes
    }

    #[test]
    fn writes_ftyp_then_streams_frames_into_mdat() {
        let mut writer = Mp4Writer::new();
        writer.create(&info()).unwrap();

        let mut result = ReadResult::default();
        let status = writer.process(b"aacframe1", WriteFlags::empty(), &mut result).unwrap();
        assert_eq!(status, Status::Data);
        let ReadResult::Frame(f) = result
        else {
            panic!("expected a frame");
        };
        assert!(f.bytes.starts_with(b"\x00\x00\x00\x14ftypisom"));
        assert!(f.bytes.windows(4).any(|w| w == b"mdat"));
        assert!(f.bytes.ends_with(b"aacframe1"));
    }

    #[test]
    fn finalize_emits_moov_with_matching_sample_count() {
        let mut writer = Mp4Writer::new();
        writer.create(&info()).unwrap();
        writer.tag_add(NormalizedTag::Title, "\u{a9}nam", "Test Title").unwrap();

        let mut result = ReadResult::default();
        writer.process(b"aacframe1", WriteFlags::empty(), &mut result).unwrap();
        let mut result = ReadResult::default();
        let status = writer.process(b"aacframe2", WriteFlags::LAST, &mut result).unwrap();
        assert_eq!(status, Status::Data);

        let moov = drain_finalize(&mut writer);
        assert!(moov.windows(4).any(|w| w == b"moov"));
        assert!(moov.windows(4).any(|w| w == b"stsz"));
        assert!(moov.windows(9).any(|w| w == "Test Title".as_bytes()));
    }
}
