// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental Matroska/WebM reader.
//!
//! EBML element ids and sizes are fully variable-length (1-8 octets, determined by the leading
//! bit pattern of the first octet), so unlike the fixed 8-byte headers MP4/RIFF/CAF share, this
//! reader gathers an element header in two always-disjoint stages per field (first octet, then
//! the remaining `width - 1` octets it announces) rather than one fixed-size gather — see
//! `ebml::vint_width`. The box-stack bookkeeping is otherwise the same hand-rolled shape as
//! `avpush-format-isomp4`'s: Matroska's "any sibling still open" nesting (an unknown-size
//! `Segment`/`Cluster`, closed only implicitly) doesn't fit the generic, size-accounted
//! `avpush_core::container::ContainerStack` any better than MP4's stateful sample-table
//! accumulation did.
//!
//! Only a single audio track is selected (the first one whose `TrackType` is audio); video
//! tracks and their `BlockGroup`/`SimpleBlock` payloads are skipped. `Cluster`/`Segment` elements
//! with an EBML "unknown size" marker are treated as open until the stream itself ends — this
//! library has no sibling-boundary lookahead to close them earlier, which matches how most
//! writers never actually use unknown sizes for anything but the outermost `Segment` anyway.

use std::collections::VecDeque;

use avpush_core::errors::{corrupt, limit_exceeded, Result};
use avpush_core::format::{Codec, Format, Reader, ReaderConf};
use avpush_core::gather::ByteGatherer;
use avpush_core::status::{FrameRecord, HeaderInfo, ReadResult, Status};
use avpush_metadata::simpletag::{decode_entry, SimpleTagValue};
use avpush_metadata::DecodedTag;

use crate::ebml::{decode_id, decode_signed, decode_size, vint_width};

const GATHER_CAP: usize = 1024 * 1024;
const MAX_DEPTH: usize = 16;

const ID_EBML: u32 = 0x1A45_DFA3;
const ID_SEGMENT: u32 = 0x1853_8067;
const ID_INFO: u32 = 0x1549_A966;
const ID_TIMESTAMP_SCALE: u32 = 0x2AD7_B1;
const ID_TRACKS: u32 = 0x1654_AE6B;
const ID_TRACK_ENTRY: u32 = 0xAE;
const ID_TRACK_NUMBER: u32 = 0xD7;
const ID_TRACK_TYPE: u32 = 0x83;
const ID_CODEC_ID: u32 = 0x86;
const ID_DEFAULT_DURATION: u32 = 0x23E3_83;
const ID_CODEC_DELAY: u32 = 0x56AA;
const ID_SEEK_PRE_ROLL: u32 = 0x56BB;
const ID_AUDIO: u32 = 0xE1;
const ID_SAMPLING_FREQUENCY: u32 = 0xB5;
const ID_CHANNELS: u32 = 0x9F;
const ID_BIT_DEPTH: u32 = 0x6264;
const ID_TAGS: u32 = 0x1254_C367;
const ID_TAG: u32 = 0x7373;
const ID_SIMPLE_TAG: u32 = 0x67C8;
const ID_TAG_NAME: u32 = 0x45A3;
const ID_TAG_STRING: u32 = 0x4487;
const ID_TAG_BINARY: u32 = 0x4485;
const ID_CLUSTER: u32 = 0x1F43_B675;
const ID_TIMESTAMP: u32 = 0xE7;
const ID_SIMPLE_BLOCK: u32 = 0xA3;
const ID_BLOCK_GROUP: u32 = 0xA0;
const ID_BLOCK: u32 = 0xA1;
const ID_BLOCK_DURATION: u32 = 0x9B;

const TRACK_TYPE_AUDIO: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Ebml,
    Segment,
    Info,
    Tracks,
    TrackEntry,
    Audio,
    Tags,
    Tag,
    SimpleTag,
    Cluster,
    BlockGroup,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    kind: NodeKind,
    /// Bytes still unread under this element, or `None` for an EBML "unknown size" element
    /// (open until end of stream).
    remaining: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Descend(NodeKind),
    GatherLeaf,
    Skip,
}

#[derive(Debug, Clone)]
enum State {
    IdByte1,
    IdRest { first: u8, width: u32 },
    SizeByte1 { id: u32 },
    SizeRest { id: u32, first: u8, width: u32 },
    Dispatch { id: u32, size: Option<u64> },
    GatherLeaf { id: u32, size: u64 },
    Skip { remaining: u64 },
    Done,
}

#[derive(Debug, Default, Clone)]
struct TrackBuilder {
    number: u64,
    is_audio: bool,
    codec_id: String,
    sample_rate: u32,
    channels: u8,
    bit_depth: u8,
    default_duration_ns: u64,
    codec_delay_ns: u64,
}

#[derive(Debug, Default, Clone)]
struct TagBuilder {
    name: Option<String>,
    value: Option<String>,
    is_binary: bool,
}

/// Incremental Matroska/WebM reader.
pub struct MkvReader {
    gather: ByteGatherer,
    state: State,
    stack: Vec<Node>,
    abs_pos: u64,

    timestamp_scale: u64,
    current_track: TrackBuilder,
    selected_track: Option<u64>,
    selected_default_duration_ns: u64,
    header: HeaderInfo,
    header_ready: bool,
    header_emitted: bool,
    tracks_seen: bool,
    segment_closed: bool,

    tag_stack: Vec<TagBuilder>,
    pending_tags: VecDeque<DecodedTag>,

    cluster_timestamp: u64,
    pending_block_duration: Option<u64>,
    pending_frames: VecDeque<FrameRecord>,
}

impl MkvReader {
    pub fn new(_conf: ReaderConf) -> Self {
        Self {
            gather: ByteGatherer::new(),
            state: State::IdByte1,
            stack: Vec::new(),
            abs_pos: 0,
            timestamp_scale: 1_000_000, // 1ms, the Matroska default absent an explicit Info field
            current_track: TrackBuilder::default(),
            selected_track: None,
            selected_default_duration_ns: 0,
            header: HeaderInfo::default(),
            header_ready: false,
            header_emitted: false,
            tracks_seen: false,
            segment_closed: false,
            tag_stack: Vec::new(),
            pending_tags: VecDeque::new(),
            cluster_timestamp: 0,
            pending_block_duration: None,
            pending_frames: VecDeque::new(),
        }
    }

    fn parent_kind(&self) -> Option<NodeKind> {
        self.stack.last().map(|n| n.kind)
    }

    fn consume_stack(&mut self, n: u64) {
        for node in self.stack.iter_mut() {
            if let Some(r) = node.remaining.as_mut() {
                *r = r.saturating_sub(n);
            }
        }
    }

    fn action_for(parent: Option<NodeKind>, id: u32) -> Action {
        use NodeKind::*;
        match (parent, id) {
            (None, ID_EBML) => Action::Skip,
            (None, ID_SEGMENT) => Action::Descend(Segment),
            (Some(Segment), ID_INFO) => Action::Descend(Info),
            (Some(Segment), ID_TRACKS) => Action::Descend(Tracks),
            (Some(Segment), ID_TAGS) => Action::Descend(Tags),
            (Some(Segment), ID_CLUSTER) => Action::Descend(Cluster),
            (Some(Info), ID_TIMESTAMP_SCALE) => Action::GatherLeaf,
            (Some(Tracks), ID_TRACK_ENTRY) => Action::Descend(TrackEntry),
            (Some(TrackEntry), ID_TRACK_NUMBER | ID_TRACK_TYPE | ID_CODEC_ID | ID_DEFAULT_DURATION
             | ID_CODEC_DELAY | ID_SEEK_PRE_ROLL) => Action::GatherLeaf,
            (Some(TrackEntry), ID_AUDIO) => Action::Descend(Audio),
            (Some(Audio), ID_SAMPLING_FREQUENCY | ID_CHANNELS | ID_BIT_DEPTH) => Action::GatherLeaf,
            (Some(Tags), ID_TAG) => Action::Descend(Tag),
            (Some(Tag), ID_SIMPLE_TAG) => Action::Descend(SimpleTag),
            (Some(SimpleTag), ID_TAG_NAME | ID_TAG_STRING | ID_TAG_BINARY) => Action::GatherLeaf,
            (Some(Cluster), ID_TIMESTAMP | ID_BLOCK_DURATION) => Action::GatherLeaf,
            (Some(Cluster), ID_SIMPLE_BLOCK) => Action::GatherLeaf,
            (Some(Cluster), ID_BLOCK_GROUP) => Action::Descend(BlockGroup),
            (Some(BlockGroup), ID_BLOCK) => Action::GatherLeaf,
            (Some(BlockGroup), ID_BLOCK_DURATION) => Action::GatherLeaf,
            _ => Action::Skip,
        }
    }

    fn codec_for(codec_id: &str) -> Codec {
        match codec_id {
            "A_AAC" => Codec::Aac,
            "A_OPUS" => Codec::Opus,
            "A_VORBIS" => Codec::Vorbis,
            "A_FLAC" => Codec::Flac,
            "A_MPEG/L3" => Codec::Mp3,
            "A_WAVPACK4" => Codec::WavPack,
            s if s.starts_with("A_PCM") => Codec::Pcm,
            _ => Codec::Unknown,
        }
    }

    fn finalize_track_entry(&mut self) {
        let track = std::mem::take(&mut self.current_track);
        if !track.is_audio || self.selected_track.is_some() {
            return;
        }
        self.selected_track = Some(track.number);
        self.selected_default_duration_ns = track.default_duration_ns;
        let encoder_delay = (track.codec_delay_ns * track.sample_rate.max(1) as u64 / 1_000_000_000) as u32;
        self.header = HeaderInfo {
            duration: 0,
            sample_rate: track.sample_rate,
            sample_bits: track.bit_depth,
            sample_float: false,
            channels: track.channels,
            codec: Self::codec_for(&track.codec_id),
            real_bitrate: 0,
            encoder_delay,
            end_padding: 0,
        };
        self.header_ready = true;
    }

    fn finalize_simple_tag(&mut self) {
        let Some(builder) = self.tag_stack.pop()
        else {
            return;
        };
        let Some(name) = builder.name
        else {
            return;
        };
        let value = if builder.is_binary {
            SimpleTagValue::Binary
        }
        else {
            SimpleTagValue::Text(builder.value.as_deref().unwrap_or(""))
        };
        self.pending_tags.push_back(decode_entry(&name, value));
    }

    fn handle_leaf(&mut self, id: u32, body: &[u8]) -> Result<()> {
        match id {
            ID_TIMESTAMP_SCALE => self.timestamp_scale = be_unsigned(body).max(1),
            ID_TRACK_NUMBER => self.current_track.number = be_unsigned(body),
            ID_TRACK_TYPE => self.current_track.is_audio = be_unsigned(body) == TRACK_TYPE_AUDIO,
            ID_CODEC_ID => self.current_track.codec_id = String::from_utf8_lossy(body).into_owned(),
            ID_DEFAULT_DURATION => self.current_track.default_duration_ns = be_unsigned(body),
            ID_CODEC_DELAY => self.current_track.codec_delay_ns = be_unsigned(body),
            ID_SEEK_PRE_ROLL => {}
            ID_SAMPLING_FREQUENCY => self.current_track.sample_rate = be_float(body) as u32,
            ID_CHANNELS => self.current_track.channels = be_unsigned(body) as u8,
            ID_BIT_DEPTH => self.current_track.bit_depth = be_unsigned(body) as u8,
            ID_TAG_NAME => {
                if let Some(top) = self.tag_stack.last_mut() {
                    top.name = Some(String::from_utf8_lossy(body).into_owned());
                }
            }
            ID_TAG_STRING => {
                if let Some(top) = self.tag_stack.last_mut() {
                    top.value = Some(String::from_utf8_lossy(body).into_owned());
                }
            }
            ID_TAG_BINARY => {
                if let Some(top) = self.tag_stack.last_mut() {
                    top.is_binary = true;
                }
            }
            ID_TIMESTAMP => self.cluster_timestamp = be_unsigned(body),
            ID_BLOCK_DURATION => self.pending_block_duration = Some(be_unsigned(body)),
            ID_SIMPLE_BLOCK | ID_BLOCK => self.expand_block(body)?,
            _ => {}
        }
        Ok(())
    }

    /// Splits one `SimpleBlock`/`Block` payload into its constituent laced frames and queues
    /// them for delivery, converting relative-to-cluster timestamps into absolute sample
    /// positions via the selected track's sample rate. Frames belonging to a track other than
    /// the selected one are dropped.
    fn expand_block(&mut self, block: &[u8]) -> Result<()> {
        let mut pos = 0usize;
        let (track_number, id_width) = read_vint_track(block)?;
        pos += id_width;
        if block.len() < pos + 3 {
            return corrupt("mkv: block payload shorter than its fixed timestamp/flags header");
        }
        let rel_ts = i16::from_be_bytes([block[pos], block[pos + 1]]);
        let flags = block[pos + 2];
        pos += 3;

        let block_duration = self.pending_block_duration.take();

        if Some(track_number) != self.selected_track {
            return Ok(());
        }

        let sizes: Vec<usize> = match (flags >> 1) & 0b11 {
            0b00 => vec![block.len() - pos],
            0b10 => {
                let count = block[pos] as usize + 1;
                pos += 1;
                if (block.len() - pos) % count != 0 {
                    return corrupt("mkv: fixed-size lacing body not evenly divisible");
                }
                vec![(block.len() - pos) / count; count]
            }
            0b01 => {
                let count = block[pos] as usize + 1;
                pos += 1;
                let mut sizes = Vec::with_capacity(count);
                let mut prefix_sum = 0usize;
                while sizes.len() + 1 < count {
                    let mut size = 0usize;
                    loop {
                        if pos >= block.len() {
                            return corrupt("mkv: xiph lacing size ran past block end");
                        }
                        let b = block[pos] as usize;
                        pos += 1;
                        size += b;
                        if b != 255 {
                            break;
                        }
                    }
                    prefix_sum += size;
                    sizes.push(size);
                }
                sizes.push(0); // placeholder for the last (implicit) frame, fixed up below
                let known: usize = sizes.iter().sum();
                let last = (block.len() - pos).saturating_sub(known - prefix_sum.min(known));
                *sizes.last_mut().unwrap() = last;
                sizes
            }
            0b11 => {
                let count = block[pos] as usize + 1;
                pos += 1;
                let mut sizes = Vec::with_capacity(count);
                let mut last_size: Option<i64> = None;
                while sizes.len() + 1 < count {
                    let first = block[pos];
                    let width = vint_width(first)? as usize;
                    if pos + width > block.len() {
                        return corrupt("mkv: ebml lacing size ran past block end");
                    }
                    let field = &block[pos..pos + width];
                    pos += width;
                    let size = match last_size {
                        None => {
                            // First entry in EBML lacing is an unsigned vint, not a delta.
                            let v = decode_size(field)?.unwrap_or(0) as i64;
                            v
                        }
                        Some(prev) => prev + decode_signed(field)?,
                    };
                    last_size = Some(size);
                    sizes.push(size.max(0) as usize);
                }
                let known: usize = sizes.iter().sum();
                sizes.push((block.len() - pos).saturating_sub(known));
                sizes
            }
            _ => unreachable!(),
        };

        let frame_count = sizes.len().max(1);
        let per_frame_duration_ns = block_duration
            .map(|d| d * self.timestamp_scale / frame_count as u64)
            .unwrap_or(self.current_track_default_duration_ns());

        let sample_rate = self.header.sample_rate.max(1) as u64;
        let base_ns = (self.cluster_timestamp as i64 + rel_ts as i64).max(0) as u64 * self.timestamp_scale;
        let mut sample_pos = base_ns * sample_rate / 1_000_000_000;
        let frame_duration_samples = (per_frame_duration_ns * sample_rate / 1_000_000_000) as u32;

        for (i, size) in sizes.iter().enumerate() {
            if pos + size > block.len() {
                return corrupt("mkv: laced frame size ran past block end");
            }
            let bytes = block[pos..pos + size].to_vec();
            pos += size;
            let duration = if frame_duration_samples > 0 { Some(frame_duration_samples) } else { None };
            self.pending_frames.push_back(FrameRecord {
                bytes,
                pos: Some(sample_pos),
                end_pos: duration.map(|d| sample_pos + d as u64),
                duration,
            });
            if i + 1 < sizes.len() {
                sample_pos += frame_duration_samples as u64;
            }
        }
        Ok(())
    }

    fn current_track_default_duration_ns(&self) -> u64 {
        self.selected_default_duration_ns
    }

    fn dispatch(&mut self, id: u32, size: Option<u64>) -> Result<()> {
        match Self::action_for(self.parent_kind(), id) {
            Action::Descend(kind) => {
                if self.stack.len() >= MAX_DEPTH {
                    return limit_exceeded("mkv: element nesting exceeds the configured ceiling");
                }
                match kind {
                    NodeKind::TrackEntry => self.current_track = TrackBuilder::default(),
                    NodeKind::SimpleTag => self.tag_stack.push(TagBuilder::default()),
                    _ => {}
                }
                self.stack.push(Node { kind, remaining: size });
                self.state = State::IdByte1;
            }
            Action::GatherLeaf => {
                let Some(size) = size
                else {
                    return corrupt("mkv: leaf element declared with unknown size");
                };
                if size > GATHER_CAP as u64 {
                    return limit_exceeded("mkv: leaf element exceeds the configured ceiling");
                }
                self.state = State::GatherLeaf { id, size };
            }
            Action::Skip => {
                self.state = match size {
                    Some(size) => State::Skip { remaining: size },
                    None => State::Skip { remaining: u64::MAX },
                };
            }
        }
        Ok(())
    }
}

/// Reads the leading track-number vint off a (Simple)Block payload, returning its value and
/// the number of octets it occupied.
fn read_vint_track(block: &[u8]) -> Result<(u64, usize)> {
    if block.is_empty() {
        return corrupt("mkv: empty block payload");
    }
    let width = vint_width(block[0])? as usize;
    if block.len() < width {
        return corrupt("mkv: block payload shorter than its track-number vint");
    }
    let value = decode_size(&block[..width])?.unwrap_or(0);
    Ok((value, width))
}

fn be_unsigned(body: &[u8]) -> u64 {
    let mut v = 0u64;
    for &b in body {
        v = (v << 8) | b as u64;
    }
    v
}

fn be_float(body: &[u8]) -> f64 {
    match body.len() {
        4 => f32::from_be_bytes(body.try_into().unwrap()) as f64,
        8 => f64::from_be_bytes(body.try_into().unwrap()),
        _ => 0.0,
    }
}

impl Reader for MkvReader {
    fn format(&self) -> Format {
        Format::Mkv
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        loop {
            match self.state.clone() {
                State::IdByte1 => {
                    // Drain anything a just-parsed leaf queued before reading further bytes:
                    // lacing can yield several frames from one `SimpleBlock`, and only one is
                    // handed back per `process` call.
                    if let Some(frame) = self.pending_frames.pop_front() {
                        *out = ReadResult::Frame(frame);
                        return Ok(Status::Data);
                    }
                    if let Some(tag) = self.pending_tags.pop_front() {
                        *out = ReadResult::Tag(avpush_core::status::Tag {
                            id: tag.id,
                            name: tag.name,
                            value: tag.value,
                        });
                        return Ok(Status::Meta);
                    }

                    // Pop any fully-consumed elements (and run their close hooks) before
                    // reading the next sibling's id. The header is handed back the moment
                    // `Tracks` itself closes, not when the whole `Segment` does: Tags and
                    // Clusters are still siblings waiting on the stack at that point, and the
                    // header must precede any tag or frame delivered from them.
                    while let Some(top) = self.stack.last() {
                        if top.remaining != Some(0) {
                            break;
                        }
                        let finished = self.stack.pop().unwrap();
                        match finished.kind {
                            NodeKind::TrackEntry => self.finalize_track_entry(),
                            NodeKind::SimpleTag => self.finalize_simple_tag(),
                            NodeKind::Tracks => self.tracks_seen = true,
                            NodeKind::Segment => self.segment_closed = true,
                            _ => {}
                        }
                        if self.tracks_seen && self.header_ready && !self.header_emitted {
                            self.header_emitted = true;
                            *out = ReadResult::Header(self.header.clone());
                            return Ok(Status::Header);
                        }
                    }

                    if self.stack.is_empty() && self.segment_closed && self.gather.is_empty() {
                        self.state = State::Done;
                        return Ok(Status::Fin);
                    }

                    if input.is_empty() {
                        return Ok(Status::More);
                    }

                    let (consumed, view) = self.gather.gather(*input, 1, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let first = view.as_slice()[0];
                    self.gather.consume(1);
                    self.consume_stack(1);
                    let width = vint_width(first)?;
                    self.state = State::IdRest { first, width };
                }
                State::IdRest { first, width } => {
                    if width == 1 {
                        self.state = State::SizeByte1 { id: first as u32 };
                        continue;
                    }
                    let need = (width - 1) as usize;
                    let (consumed, view) = self.gather.gather(*input, need, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let mut bytes = vec![first];
                    bytes.extend_from_slice(view.as_slice());
                    self.gather.consume(need);
                    self.consume_stack(need as u64);
                    let id = decode_id(&bytes);
                    self.state = State::SizeByte1 { id };
                }
                State::SizeByte1 { id } => {
                    let (consumed, view) = self.gather.gather(*input, 1, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let first = view.as_slice()[0];
                    self.gather.consume(1);
                    self.consume_stack(1);
                    let width = vint_width(first)?;
                    self.state = State::SizeRest { id, first, width };
                }
                State::SizeRest { id, first, width } => {
                    if width == 1 {
                        let size = decode_size(&[first])?;
                        self.state = State::Dispatch { id, size };
                        continue;
                    }
                    let need = (width - 1) as usize;
                    let (consumed, view) = self.gather.gather(*input, need, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let mut bytes = vec![first];
                    bytes.extend_from_slice(view.as_slice());
                    self.gather.consume(need);
                    self.consume_stack(need as u64);
                    let size = decode_size(&bytes)?;
                    self.state = State::Dispatch { id, size };
                }
                State::Dispatch { id, size } => {
                    if let (Some(parent), Some(size)) = (self.stack.last(), size) {
                        if let Some(parent_remaining) = parent.remaining {
                            if size > parent_remaining {
                                return corrupt("mkv: element size exceeds parent's remaining size");
                            }
                        }
                    }
                    self.dispatch(id, size)?;
                }
                State::GatherLeaf { id, size } => {
                    let size = size as usize;
                    let (consumed, view) = self.gather.gather(*input, size, GATHER_CAP)?;
                    *input = &input[consumed..];
                    self.abs_pos += consumed as u64;
                    let Some(view) = view
                    else {
                        return Ok(Status::More);
                    };
                    let body = view.as_slice().to_vec();
                    self.gather.consume(size);
                    self.consume_stack(size as u64);
                    self.handle_leaf(id, &body)?;
                    self.state = State::IdByte1;
                }
                State::Skip { remaining } => {
                    if remaining == 0 {
                        self.state = State::IdByte1;
                        continue;
                    }
                    if input.is_empty() {
                        if remaining == u64::MAX {
                            // Unknown-size element still open at end of stream; treat as closed.
                            self.state = State::Done;
                            return Ok(Status::Fin);
                        }
                        return Ok(Status::More);
                    }
                    let take = if remaining == u64::MAX {
                        input.len() as u64
                    }
                    else {
                        (input.len() as u64).min(remaining)
                    };
                    let take = take as usize;
                    *input = &input[take..];
                    self.abs_pos += take as u64;
                    self.consume_stack(take as u64);
                    self.state = State::Skip {
                        remaining: if remaining == u64::MAX { u64::MAX } else { remaining - take as u64 },
                    };
                }
                State::Done => return Ok(Status::Fin),
            }
        }
    }

    fn close(&mut self) {
        self.gather.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vint_encode(mut value: u64, width: usize) -> Vec<u8> {
        let marker = 1u64 << (7 * width);
        value |= marker;
        let mut bytes = Vec::with_capacity(width);
        for i in (0..width).rev() {
            bytes.push(((value >> (8 * i)) & 0xFF) as u8);
        }
        bytes
    }

    fn elem(id: &[u8], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&vint_encode(body.len() as u64, 4));
        out.extend_from_slice(body);
        out
    }

    fn build_minimal_mkv(frame: &[u8]) -> Vec<u8> {
        let sampling_freq = 44100.0f64.to_be_bytes();
        let audio = elem(&[0xE1], &{
            let mut b = Vec::new();
            b.extend_from_slice(&elem(&[0xB5], &sampling_freq));
            b.extend_from_slice(&elem(&[0x9F], &[2]));
            b
        });
        let track_entry = elem(&[0xAE], &{
            let mut b = Vec::new();
            b.extend_from_slice(&elem(&[0xD7], &[1]));
            b.extend_from_slice(&elem(&[0x83], &[2]));
            b.extend_from_slice(&elem(&[0x86], b"A_VORBIS"));
            b.extend_from_slice(&audio);
            b
        });
        let tracks = elem(&[0x16, 0x54, 0xAE, 0x6B], &track_entry);

        let simple_tag = elem(&[0x67, 0xC8], &{
            let mut b = Vec::new();
            b.extend_from_slice(&elem(&[0x45, 0xA3], b"TITLE"));
            b.extend_from_slice(&elem(&[0x44, 0x87], b"My Track"));
            b
        });
        let tag = elem(&[0x73, 0x73], &simple_tag);
        let tags = elem(&[0x12, 0x54, 0xC3, 0x67], &tag);

        let mut block_payload = vint_encode(1, 1);
        block_payload.extend_from_slice(&0i16.to_be_bytes());
        block_payload.push(0x00);
        block_payload.extend_from_slice(frame);
        let simple_block = elem(&[0xA3], &block_payload);
        let cluster = elem(&[0x1F, 0x43, 0xB6, 0x75], &{
            let mut b = Vec::new();
            b.extend_from_slice(&elem(&[0xE7], &[0]));
            b.extend_from_slice(&simple_block);
            b
        });

        let info = elem(&[0x15, 0x49, 0xA9, 0x66], &elem(&[0x2A, 0xD7, 0xB1], &1_000_000u32.to_be_bytes()));

        let segment_body = [info, tracks, tags, cluster].concat();
        let segment = elem(&[0x18, 0x53, 0x80, 0x67], &segment_body);
        let ebml_header = elem(&[0x1A, 0x45, 0xDF, 0xA3], b"");
        [ebml_header, segment].concat()
    }

    fn drain(reader: &mut MkvReader, data: &[u8]) -> Vec<(Status, ReadResult)> {
        let mut out = Vec::new();
        let mut input = data;
        loop {
            let mut result = ReadResult::default();
            let status = reader.process(&mut input, &mut result).unwrap();
            match status {
                Status::More => break,
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
    fn reads_header_tag_and_frame() {
        let mkv = build_minimal_mkv(b"oggframe1");
        let mut reader = MkvReader::new(ReaderConf::default());
        let events = drain(&mut reader, &mkv);

        let header = events.iter().find_map(|(s, r)| {
            if *s == Status::Header {
                if let ReadResult::Header(h) = r {
                    return Some(h.clone());
                }
            }
            None
        });
        let header = header.expect("expected a Header event");
        assert_eq!(header.codec, Codec::Vorbis);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 44100);

        let tag_value = events.iter().find_map(|(s, r)| {
            if *s == Status::Meta {
                if let ReadResult::Tag(t) = r {
                    return Some(t.value.clone());
                }
            }
            None
        });
        assert_eq!(tag_value.unwrap(), "My Track");

        let frame = events.iter().find_map(|(s, r)| {
            if *s == Status::Data {
                if let ReadResult::Frame(f) = r {
                    return Some(f.bytes.clone());
                }
            }
            None
        });
        assert_eq!(frame.unwrap(), b"oggframe1".to_vec());
    }

    #[test]
    fn chunking_invariance_at_three_bytes() {
        let mkv = build_minimal_mkv(b"oggframe1");
        let mut whole = MkvReader::new(ReaderConf::default());
        let whole_events = drain(&mut whole, &mkv);

        let mut chunked = MkvReader::new(ReaderConf::default());
        let mut out = Vec::new();
        let mut remaining = &mkv[..];
        loop {
            let take = remaining.len().min(3);
            let mut input = &remaining[..take];
            loop {
                let mut result = ReadResult::default();
                let status = chunked.process(&mut input, &mut result).unwrap();
                if status == Status::More {
                    break;
                }
                out.push((status, result));
                if status == Status::Fin {
                    break;
                }
            }
            remaining = &remaining[take..];
            if remaining.is_empty() {
                break;
            }
        }

        let frames = |events: &[(Status, ReadResult)]| -> Vec<Vec<u8>> {
            events
                .iter()
                .filter_map(|(s, r)| {
                    if *s == Status::Data {
                        if let ReadResult::Frame(f) = r {
                            return Some(f.bytes.clone());
                        }
                    }
                    None
                })
                .collect()
        };
        assert_eq!(frames(&whole_events), frames(&out));
    }
}
