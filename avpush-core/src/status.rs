// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The chunked streaming protocol's result types.
//!
//! Every reader/writer `process` call returns a [`Status`] paired with a [`ReadResult`] (for
//! readers) describing what, if anything, was produced. The protocol never blocks: a call either
//! produces output, asks for more input ([`Status::More`]), asks the caller to reposition the
//! source ([`Status::Seek`]), or terminates the stream ([`Status::Fin`]).

use crate::tag::{NormalizedTag, TagRecord};

/// Decoded stream-level information, emitted once as `Status::Header`.
#[derive(Debug, Clone, Default)]
pub struct HeaderInfo {
    /// Total duration in samples, or 0 if unknown ahead of time.
    pub duration: u64,
    pub sample_rate: u32,
    pub sample_bits: u8,
    pub sample_float: bool,
    pub channels: u8,
    pub codec: crate::format::Codec,
    /// Computed from `total_size * 8 * sample_rate / duration` when the format does not carry
    /// an explicit bitrate field and both total size and duration are known.
    pub real_bitrate: u32,
    /// Encoder delay in samples (e.g. from MP4 `iTunSMPB` or a Xing/LAME header).
    pub encoder_delay: u32,
    /// Trailing padding in samples.
    pub end_padding: u32,
}

/// A single decoded, normalized tag, emitted as `Status::Meta`.
///
/// Carries an owned copy of the underlying [`TagRecord`] so a `ReadResult` can outlive the
/// reader's internal buffer view it was built from.
#[derive(Debug, Clone)]
pub struct Tag {
    pub id: NormalizedTag,
    pub name: String,
    pub value: String,
}

impl From<TagRecord<'_>> for Tag {
    fn from(r: TagRecord<'_>) -> Self {
        Tag { id: r.id, name: r.name.to_string(), value: r.value.to_string() }
    }
}

/// A single compressed frame's payload and position, emitted as `Status::Data`.
///
/// `bytes` is the owned copy of a view into the reader's internal gather buffer; callers must
/// not assume the reader's own buffer remains valid past the `process` call that produced it,
/// which is why this type copies rather than borrows (see crate-level docs on lifetimes in the
/// wider design for why per-format readers may instead expose zero-copy borrowing APIs for the
/// hot path).
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub bytes: Vec<u8>,
    /// Sample position of the first sample in this frame, or `None` if undefined (OGG header
    /// packets).
    pub pos: Option<u64>,
    /// Sample position one past the last sample in this frame.
    pub end_pos: Option<u64>,
    /// Duration of this frame in samples, or `None` if undefined.
    pub duration: Option<u32>,
}

/// Error detail attached to `Status::Error` and `Status::Warning`.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub message: String,
    /// Absolute stream offset the error was detected at, if meaningful.
    pub offset: Option<u64>,
}

/// The tagged union written into by `process`. Only the field matching the returned [`Status`]
/// is meaningful after a call.
#[derive(Debug, Clone, Default)]
pub enum ReadResult {
    #[default]
    None,
    Header(HeaderInfo),
    Tag(Tag),
    Frame(FrameRecord),
    SeekOffset(u64),
    Error(ErrorInfo),
}

/// The set of values `process` can return. See the module docs for the overall protocol shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Stream-level header information is available in the result.
    Header,
    /// A normalized tag is available in the result.
    Meta,
    /// A compressed frame is available in the result.
    Data,
    /// The caller must reposition the source to the absolute offset in the result and resume
    /// feeding bytes from there.
    Seek,
    /// More input is required before progress can be made; no bytes beyond what was already
    /// consumed were interpreted.
    More,
    /// The logical stream has ended; only `close` may be called hereafter.
    Fin,
    /// A non-fatal problem was found (lost sync, bad tag, bad page checksum, duplicate box);
    /// the reader has returned to a safe state and accepts further `process` calls.
    Warning,
    /// A fatal problem was found; the reader accepts only `close` hereafter.
    Error,
}
