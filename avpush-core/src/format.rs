// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The capability-set polymorphism every format reader/writer implements.
//!
//! The reference implementation dispatches formats through a vtable of function pointers. This
//! crate represents that as a pair of traits (`Reader`, `Writer`); `seek` is a separate,
//! optional trait (`Seekable`) rather than a required method that errors out when unsupported,
//! so "not seekable" is visible at the type level instead of at call time.

use crate::errors::Result;
use crate::status::{ReadResult, Status};
use bitflags::bitflags;

/// The container/codec identity a reader or writer implements. Used by the façade's format
/// sniffer and by callers that need to branch on format without downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Format {
    #[default]
    Unknown,
    Aac,
    Ape,
    Avi,
    Caf,
    Flac,
    Mkv,
    Mp3,
    Mp4,
    Mpc,
    Ogg,
    Ts,
    Wav,
    WavPack,
    M3u,
    Pls,
    Id3,
}

/// The compressed-audio codec a track's frames are encoded with. This is a codec *identity*
/// only: this library never decodes samples, it only classifies and frames compressed payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Codec {
    #[default]
    Unknown,
    Aac,
    Ac3,
    Alac,
    Ape,
    Flac,
    Mp3,
    Mpc,
    Opus,
    Pcm,
    Vorbis,
    WavPack,
}

bitflags! {
    /// Per-open flags, mirrored from the reference's `AVPKR_F` bitset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReaderFlags: u32 {
        /// Never request a backward `Seek`, even to read a trailing ID3v1/APEv2 tag.
        const NO_SEEK = 1 << 0;
        /// Deliver whole ADTS frames, including the 7/9-byte header, rather than raw AAC
        /// payloads.
        const AAC_WHOLE_FRAMES = 1 << 1;
    }
}

/// Per-instance open-time configuration. There is no global or environment-derived
/// configuration anywhere in this library; every setting flows through this struct.
#[derive(Debug, Clone, Default)]
pub struct ReaderConf {
    /// Total stream size in bytes, or 0 if unknown / the source is not seekable.
    pub total_size: u64,
    /// 8-bit codepage used to decode legacy (non-UTF-8, non-declared-encoding) ID3v1 text when
    /// it is not valid UTF-8. `None` falls back to Latin-1/ISO-8859-1.
    pub code_page: Option<CodePage>,
    pub flags: ReaderFlags,
}

/// A minimal 8-bit codepage table used only as a fallback for legacy ID3v1 text that is not
/// valid UTF-8. Anything beyond Latin-1/Windows-1252 is out of scope (see the crate-level
/// non-goals on charset conversion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodePage {
    #[default]
    Latin1,
    Windows1252,
}

/// Information supplied to a writer at creation time.
#[derive(Debug, Clone, Default)]
pub struct WriterInfo {
    pub codec: Codec,
    pub sample_rate: u32,
    pub channels: u8,
    pub sample_bits: u8,
    pub sample_float: bool,
    /// Total sample count if known ahead of time; 0 otherwise (the writer then finalizes it at
    /// `close`, seeking back to patch the header if the format requires it).
    pub total_samples: u64,
    pub encoder_delay: u32,
    pub end_padding: u32,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WriteFlags: u32 {
        /// This is the last frame of the stream; the writer should finalize.
        const LAST = 1 << 0;
        /// Force an OGG page flush after this frame.
        const OGG_FLUSH = 1 << 1;
    }
}

/// The reader capability set every format implementation provides.
///
/// `process` is the only method on the hot path: it is handed a slice of newly-available input,
/// consumes some prefix of it (communicated by shrinking `*input`), and returns a [`Status`]
/// describing what, if anything, it produced into `out`. No method here performs I/O; the
/// caller owns the byte source.
pub trait Reader {
    /// Stable identity of the format this reader implements.
    fn format(&self) -> Format;

    /// Feed `input`; on return, `*input` has been advanced past every byte this call consumed.
    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status>;

    /// Release internal buffers. After `close`, no further calls are valid.
    fn close(&mut self) {}
}

/// Optional seek capability. Implemented only by readers over a seekable, known-size source;
/// its absence (rather than an error returned from a universal `seek` method) is how "this
/// stream cannot be seeked" is expressed.
pub trait Seekable: Reader {
    /// Record a deferred seek request to the given sample index. It takes effect at the next
    /// `process` call, which will return `Status::Seek` with the byte offset to reposition to.
    fn seek(&mut self, sample_index: u64);
}

/// The writer capability set every format implementation provides.
pub trait Writer {
    fn format(&self) -> Format;

    fn create(&mut self, info: &WriterInfo) -> Result<()>;

    fn tag_add(&mut self, id: crate::tag::NormalizedTag, name: &str, value: &str) -> Result<()>;

    /// Feed one compressed frame; returns bytes to write via `out` the same way a reader's
    /// `process` returns bytes to interpret. A `Status::Seek` asks the caller to reposition the
    /// sink (to patch a previously-written header) before calling `process` again.
    fn process(
        &mut self,
        frame: &[u8],
        flags: WriteFlags,
        out: &mut ReadResult,
    ) -> Result<Status>;

    fn close(&mut self) {}
}
