// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental MPEG transport stream reader.
//!
//! Every TS packet is a fixed 188 bytes, so unlike every other format in this library the gather
//! loop here never has to cope with a variable-length header: a sync byte check and a fixed
//! `gather(..., 188, ...)` call is the entire framing layer. What varies is what the payload
//! means, which is resolved by a PID registry built up as PAT and PMT packets are seen.
//!
//! PSI section reassembly across multiple TS packets is out of scope: PAT and PMT are each
//! assumed to fit in the single packet that starts them, true of every real-world
//! single-program transport stream this library targets. A PAT/PMT spanning packets is treated
//! as corrupt rather than reassembled.
//!
//! This reader surfaces only framing and position, not individual codec frames: a PES packet's
//! payload is hchunked into one [`avpush_core::status::FrameRecord`] per TS packet it spans, not
//! split at elementary-stream frame boundaries (TS's own framing doesn't carry those; recovering
//! them means running the payload through the matching `avpush-codec-*` frame-sync engine
//! downstream). Only the chunk that starts a PES packet carries a position, decoded from the PES
//! header's 33-bit PTS as milliseconds (`pts / 90`, since PTS ticks a 90 kHz clock).

use std::collections::{HashMap, VecDeque};

use avpush_core::errors::{corrupt, Result};
use avpush_core::format::{Codec, Format, Reader, ReaderConf};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status};

const PACKET_LEN: usize = 188;
const SYNC_BYTE: u8 = 0x47;
const PAT_PID: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PidKind {
    Pat,
    Pmt,
    Pes(Codec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Packet,
    Done,
}

pub struct TsReader {
    conf: ReaderConf,
    gather: ByteGatherer,
    state: State,
    abs_pos: u64,

    pids: HashMap<u16, PidKind>,
    pmt_pid: Option<u16>,
    selected_pid: Option<u16>,

    pending_header: Option<HeaderInfo>,
    pending_frames: VecDeque<FrameRecord>,
    /// Elementary-stream bytes left in the PES packet currently being reassembled, bounding
    /// continuation chunks so trailing TS stuffing bytes aren't mistaken for payload. `None`
    /// once a PES packet declared `PES_packet_length == 0` ("unbounded"; take everything).
    pes_remaining: Option<usize>,
}

impl TsReader {
    pub fn new(conf: ReaderConf) -> Self {
        let mut pids = HashMap::new();
        pids.insert(PAT_PID, PidKind::Pat);
        Self {
            conf,
            gather: ByteGatherer::new(),
            state: State::Packet,
            abs_pos: 0,
            pids,
            pmt_pid: None,
            selected_pid: None,
            pes_remaining: Some(0),
            pending_header: None,
            pending_frames: VecDeque::new(),
        }
    }

    fn near_tail(&self) -> bool {
        self.conf.total_size > 0 && self.abs_pos + PACKET_LEN as u64 > self.conf.total_size
    }

    fn handle_packet(&mut self, data: &[u8]) -> Result<()> {
        if data[0] != SYNC_BYTE {
            return corrupt("ts: packet missing 0x47 sync byte");
        }

        let payload_unit_start = data[1] & 0x40 != 0;
        let pid = (((data[1] & 0x1F) as u16) << 8) | data[2] as u16;
        let adaptation_field_control = (data[3] >> 4) & 0x3;

        let mut offset = 4usize;
        if adaptation_field_control & 0x2 != 0 {
            let af_len = data[4] as usize;
            offset = 5 + af_len;
        }
        let has_payload = adaptation_field_control & 0x1 != 0;
        if !has_payload || offset >= PACKET_LEN {
            return Ok(());
        }
        let payload = &data[offset..PACKET_LEN];

        match self.pids.get(&pid).copied() {
            Some(PidKind::Pat) => self.handle_pat(payload, payload_unit_start),
            Some(PidKind::Pmt) => self.handle_pmt(payload, payload_unit_start),
            Some(PidKind::Pes(codec)) => self.handle_pes(payload, payload_unit_start, codec),
            None => Ok(()),
        }
    }

    fn handle_pat(&mut self, payload: &[u8], payload_unit_start: bool) -> Result<()> {
        if !payload_unit_start || payload.is_empty() {
            return Ok(());
        }
        let pointer = payload[0] as usize;
        let section = payload.get(1 + pointer..).unwrap_or(&[]);
        if section.len() < 8 {
            return corrupt("ts: PAT section shorter than its fixed header");
        }
        let section_length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
        // section_length counts everything after itself, including the trailing 4-byte CRC.
        let programs_end = (3 + section_length).saturating_sub(4).min(section.len());
        let mut i = 8;
        while i + 4 <= programs_end {
            let program_number = u16::from_be_bytes([section[i], section[i + 1]]);
            let entry_pid = (((section[i + 2] & 0x1F) as u16) << 8) | section[i + 3] as u16;
            if program_number != 0 && self.pmt_pid.is_none() {
                self.pmt_pid = Some(entry_pid);
                self.pids.insert(entry_pid, PidKind::Pmt);
            }
            i += 4;
        }
        Ok(())
    }

    fn handle_pmt(&mut self, payload: &[u8], payload_unit_start: bool) -> Result<()> {
        if !payload_unit_start || payload.is_empty() || self.selected_pid.is_some() {
            return Ok(());
        }
        let pointer = payload[0] as usize;
        let section = payload.get(1 + pointer..).unwrap_or(&[]);
        if section.len() < 12 {
            return corrupt("ts: PMT section shorter than its fixed header");
        }
        let section_length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
        let section_end = (3 + section_length).saturating_sub(4).min(section.len());
        let program_info_length = (((section[10] & 0x0F) as usize) << 8) | section[11] as usize;
        let mut i = 12 + program_info_length;

        while i + 5 <= section_end {
            let stream_type = section[i];
            let elementary_pid = (((section[i + 1] & 0x1F) as u16) << 8) | section[i + 2] as u16;
            let es_info_length = (((section[i + 3] & 0x0F) as usize) << 8) | section[i + 4] as usize;
            i += 5 + es_info_length;

            if let Some(codec) = audio_codec_for_stream_type(stream_type) {
                if self.selected_pid.is_none() {
                    self.selected_pid = Some(elementary_pid);
                    self.pids.insert(elementary_pid, PidKind::Pes(codec));
                    self.pending_header = Some(HeaderInfo {
                        duration: 0,
                        sample_rate: 0,
                        sample_bits: 0,
                        sample_float: false,
                        channels: 0,
                        codec,
                        real_bitrate: 0,
                        encoder_delay: 0,
                        end_padding: 0,
                    });
                }
            }
        }
        Ok(())
    }

    fn handle_pes(&mut self, payload: &[u8], payload_unit_start: bool, _codec: Codec) -> Result<()> {
        if !payload_unit_start {
            let take = match self.pes_remaining {
                Some(remaining) => remaining.min(payload.len()),
                None => payload.len(),
            };
            if take == 0 {
                return Ok(());
            }
            self.pending_frames.push_back(FrameRecord {
                bytes: payload[..take].to_vec(),
                pos: None,
                end_pos: None,
                duration: None,
            });
            if let Some(remaining) = &mut self.pes_remaining {
                *remaining -= take;
            }
            return Ok(());
        }

        if payload.len() < 9 || payload[0..3] != [0x00, 0x00, 0x01] {
            return corrupt("ts: PES packet missing start code prefix");
        }
        let packet_length = u16::from_be_bytes([payload[4], payload[5]]) as usize;
        let pts_dts_flags_byte = payload[7];
        let header_data_length = payload[8] as usize;
        let pts_dts_flags = (pts_dts_flags_byte >> 6) & 0x3;
        let header_end = 9 + header_data_length;
        if header_end > payload.len() {
            return corrupt("ts: PES optional header longer than its packet");
        }

        let pos = if pts_dts_flags & 0x2 != 0 && header_data_length >= 5 {
            let b = &payload[9..14];
            let pts: u64 = (((b[0] as u64 >> 1) & 0x07) << 30)
                | ((b[1] as u64) << 22)
                | (((b[2] as u64 >> 1) & 0x7F) << 15)
                | ((b[3] as u64) << 7)
                | ((b[4] as u64 >> 1) & 0x7F);
            Some(pts / 90)
        }
        else {
            None
        };

        // `packet_length` counts everything after the two length bytes: the flag bytes, the
        // optional header, and the elementary payload.
        let es_total_len = packet_length.checked_sub(3 + header_data_length);
        let available = payload.len() - header_end;
        let take = match es_total_len {
            Some(len) if packet_length != 0 => len.min(available),
            _ => available,
        };
        self.pes_remaining = if packet_length != 0 { es_total_len.map(|len| len.saturating_sub(take)) } else { None };

        let bytes = payload[header_end..header_end + take].to_vec();
        self.pending_frames.push_back(FrameRecord { bytes, pos, end_pos: None, duration: None });
        Ok(())
    }
}

fn audio_codec_for_stream_type(stream_type: u8) -> Option<Codec> {
    match stream_type {
        0x03 | 0x04 => Some(Codec::Mp3),
        0x0F | 0x11 => Some(Codec::Aac),
        0x81 => Some(Codec::Ac3),
        _ => None,
    }
}

impl Reader for TsReader {
    fn format(&self) -> Format {
        Format::Ts
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        loop {
            if let Some(header) = self.pending_header.take() {
                *out = ReadResult::Header(header);
                return Ok(Status::Header);
            }
            if let Some(frame) = self.pending_frames.pop_front() {
                *out = ReadResult::Frame(frame);
                return Ok(Status::Data);
            }

            match self.state {
                State::Packet => {
                    if self.near_tail() {
                        self.state = State::Done;
                        continue;
                    }

                    let before = input.len();
                    let (consumed, view) = self.gather.gather(*input, PACKET_LEN, PACKET_LEN)?;
                    *input = &input[consumed..];
                    self.abs_pos += (before - input.len()) as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let packet = view.as_slice().to_vec();
                    self.gather.consume(PACKET_LEN);
                    self.handle_packet(&packet)?;
                }
                State::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.gather.reset();
    }
}
