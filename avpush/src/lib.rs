// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unified façade over every container/codec reader and writer in this workspace: a format enum,
//! a sniffer, and a pair of `open_*` constructors that hide which crate actually implements a
//! given [`Format`].
//!
//! [`Reader`] and [`Seekable`] can't be combined into one trait object (`dyn Reader + Seekable`
//! isn't valid Rust), so seek capability is recovered through [`AnyReader::as_seekable`] instead
//! of a downcast on the trait object itself.

use avpush_core::errors::{unsupported, Result};
use avpush_core::format::{Format, Reader, ReaderConf, Seekable, WriteFlags, Writer, WriterInfo};
use avpush_core::status::{ReadResult, Status};

pub use avpush_core::sniff::detect;

/// Every concrete reader this façade can open, behind one `Reader` impl.
pub enum AnyReader {
    Wav(avpush_format_riff::WavReader),
    Avi(avpush_format_riff::AviReader),
    Mp4(avpush_format_isomp4::Mp4Reader),
    Mkv(avpush_format_mkv::MkvReader),
    Caf(avpush_format_caf::CafReader),
    Ogg(avpush_format_ogg::OggReader),
    Ts(avpush_format_ts::TsReader),
    Flac(avpush_codec_flac::FlacReader),
    Mp3(avpush_codec_mpeg::Mp3Reader),
    Aac(avpush_codec_aac::AdtsReader),
    WavPack(avpush_codec_wavpack::WavPackReader),
    Ape(avpush_codec_ape::ApeReader),
    Mpc(avpush_codec_mpc::MpcReader),
}

impl Reader for AnyReader {
    fn format(&self) -> Format {
        match self {
            AnyReader::Wav(r) => r.format(),
            AnyReader::Avi(r) => r.format(),
            AnyReader::Mp4(r) => r.format(),
            AnyReader::Mkv(r) => r.format(),
            AnyReader::Caf(r) => r.format(),
            AnyReader::Ogg(r) => r.format(),
            AnyReader::Ts(r) => r.format(),
            AnyReader::Flac(r) => r.format(),
            AnyReader::Mp3(r) => r.format(),
            AnyReader::Aac(r) => r.format(),
            AnyReader::WavPack(r) => r.format(),
            AnyReader::Ape(r) => r.format(),
            AnyReader::Mpc(r) => r.format(),
        }
    }

    fn process(&mut self, input: &mut &[u8], out: &mut ReadResult) -> Result<Status> {
        match self {
            AnyReader::Wav(r) => r.process(input, out),
            AnyReader::Avi(r) => r.process(input, out),
            AnyReader::Mp4(r) => r.process(input, out),
            AnyReader::Mkv(r) => r.process(input, out),
            AnyReader::Caf(r) => r.process(input, out),
            AnyReader::Ogg(r) => r.process(input, out),
            AnyReader::Ts(r) => r.process(input, out),
            AnyReader::Flac(r) => r.process(input, out),
            AnyReader::Mp3(r) => r.process(input, out),
            AnyReader::Aac(r) => r.process(input, out),
            AnyReader::WavPack(r) => r.process(input, out),
            AnyReader::Ape(r) => r.process(input, out),
            AnyReader::Mpc(r) => r.process(input, out),
        }
    }

    fn close(&mut self) {
        match self {
            AnyReader::Wav(r) => r.close(),
            AnyReader::Avi(r) => r.close(),
            AnyReader::Mp4(r) => r.close(),
            AnyReader::Mkv(r) => r.close(),
            AnyReader::Caf(r) => r.close(),
            AnyReader::Ogg(r) => r.close(),
            AnyReader::Ts(r) => r.close(),
            AnyReader::Flac(r) => r.close(),
            AnyReader::Mp3(r) => r.close(),
            AnyReader::Aac(r) => r.close(),
            AnyReader::WavPack(r) => r.close(),
            AnyReader::Ape(r) => r.close(),
            AnyReader::Mpc(r) => r.close(),
        }
    }
}

impl AnyReader {
    /// Returns a `Seekable` handle when the underlying reader supports deferred sample seeking.
    /// Containers that hand frames off to a separate bisecting-seek codec engine (FLAC, MP3,
    /// WavPack, APE, Musepack) implement it directly; the remaining container readers do not.
    pub fn as_seekable(&mut self) -> Option<&mut dyn Seekable> {
        match self {
            AnyReader::Flac(r) => Some(r),
            AnyReader::Mp3(r) => Some(r),
            AnyReader::WavPack(r) => Some(r),
            AnyReader::Ape(r) => Some(r),
            AnyReader::Mpc(r) => Some(r),
            AnyReader::Wav(_)
            | AnyReader::Avi(_)
            | AnyReader::Mp4(_)
            | AnyReader::Mkv(_)
            | AnyReader::Caf(_)
            | AnyReader::Ogg(_)
            | AnyReader::Ts(_)
            | AnyReader::Aac(_) => None,
        }
    }
}

/// Opens a reader for `format`, or `None` for formats this façade has no `Reader` impl for
/// (playlists and bare ID3 tags are parsed as standalone utilities, not push-model readers).
pub fn open_reader(format: Format, conf: ReaderConf) -> Option<AnyReader> {
    Some(match format {
        Format::Wav => AnyReader::Wav(avpush_format_riff::WavReader::new(conf)),
        Format::Avi => AnyReader::Avi(avpush_format_riff::AviReader::new(conf)),
        Format::Mp4 => AnyReader::Mp4(avpush_format_isomp4::Mp4Reader::new(conf)),
        Format::Mkv => AnyReader::Mkv(avpush_format_mkv::MkvReader::new(conf)),
        Format::Caf => AnyReader::Caf(avpush_format_caf::CafReader::new(conf)),
        Format::Ogg => AnyReader::Ogg(avpush_format_ogg::OggReader::new(conf)),
        Format::Ts => AnyReader::Ts(avpush_format_ts::TsReader::new(conf)),
        Format::Flac => AnyReader::Flac(avpush_codec_flac::FlacReader::new(conf)),
        Format::Mp3 => AnyReader::Mp3(avpush_codec_mpeg::Mp3Reader::new(conf)),
        Format::Aac => AnyReader::Aac(avpush_codec_aac::AdtsReader::new(conf)),
        Format::WavPack => AnyReader::WavPack(avpush_codec_wavpack::WavPackReader::new(conf)),
        Format::Ape => AnyReader::Ape(avpush_codec_ape::ApeReader::new(conf)),
        Format::Mpc => AnyReader::Mpc(avpush_codec_mpc::MpcReader::new(conf)),
        Format::M3u | Format::Pls | Format::Id3 | Format::Unknown => return None,
        _ => return None,
    })
}

/// Every concrete writer this façade can open, behind one `Writer` impl.
pub enum AnyWriter {
    Wav(avpush_format_riff::WavWriter),
    Mp4(avpush_format_isomp4::Mp4Writer),
    Flac(avpush_codec_flac::FlacWriter),
    Ogg(avpush_format_ogg::OggWriter),
    Mp3(avpush_codec_mpeg::Mp3Writer),
}

impl Writer for AnyWriter {
    fn format(&self) -> Format {
        match self {
            AnyWriter::Wav(w) => w.format(),
            AnyWriter::Mp4(w) => w.format(),
            AnyWriter::Flac(w) => w.format(),
            AnyWriter::Ogg(w) => w.format(),
            AnyWriter::Mp3(w) => w.format(),
        }
    }

    fn create(&mut self, info: &WriterInfo) -> Result<()> {
        match self {
            AnyWriter::Wav(w) => w.create(info),
            AnyWriter::Mp4(w) => w.create(info),
            AnyWriter::Flac(w) => w.create(info),
            AnyWriter::Ogg(w) => w.create(info),
            AnyWriter::Mp3(w) => w.create(info),
        }
    }

    fn tag_add(&mut self, id: avpush_core::tag::NormalizedTag, name: &str, value: &str) -> Result<()> {
        match self {
            AnyWriter::Wav(w) => w.tag_add(id, name, value),
            AnyWriter::Mp4(w) => w.tag_add(id, name, value),
            AnyWriter::Flac(w) => w.tag_add(id, name, value),
            AnyWriter::Ogg(w) => w.tag_add(id, name, value),
            AnyWriter::Mp3(w) => w.tag_add(id, name, value),
        }
    }

    fn process(&mut self, frame: &[u8], flags: WriteFlags, out: &mut ReadResult) -> Result<Status> {
        match self {
            AnyWriter::Wav(w) => w.process(frame, flags, out),
            AnyWriter::Mp4(w) => w.process(frame, flags, out),
            AnyWriter::Flac(w) => w.process(frame, flags, out),
            AnyWriter::Ogg(w) => w.process(frame, flags, out),
            AnyWriter::Mp3(w) => w.process(frame, flags, out),
        }
    }

    fn close(&mut self) {
        match self {
            AnyWriter::Wav(w) => w.close(),
            AnyWriter::Mp4(w) => w.close(),
            AnyWriter::Flac(w) => w.close(),
            AnyWriter::Ogg(w) => w.close(),
            AnyWriter::Mp3(w) => w.close(),
        }
    }
}

/// Opens and initializes (`create`) a writer for `format`. Formats with no writer in this
/// workspace (every container/codec this library only ever reads) return `Unsupported`.
pub fn open_writer(format: Format, info: &WriterInfo) -> Result<AnyWriter> {
    let mut writer = match format {
        Format::Wav => AnyWriter::Wav(avpush_format_riff::WavWriter::new()),
        Format::Mp4 => AnyWriter::Mp4(avpush_format_isomp4::Mp4Writer::new()),
        Format::Flac => AnyWriter::Flac(avpush_codec_flac::FlacWriter::new()),
        Format::Ogg => AnyWriter::Ogg(avpush_format_ogg::OggWriter::new()),
        Format::Mp3 => AnyWriter::Mp3(avpush_codec_mpeg::Mp3Writer::new()),
        _ => return unsupported("avpush: no writer registered for this format"),
    };
    writer.create(info)?;
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avpush_core::format::Codec;

    #[test]
    fn opens_a_reader_for_every_registered_format() {
        let conf = ReaderConf::default();
        assert!(matches!(open_reader(Format::Wav, conf.clone()), Some(AnyReader::Wav(_))));
        assert!(matches!(open_reader(Format::Flac, conf.clone()), Some(AnyReader::Flac(_))));
        assert!(matches!(open_reader(Format::Mpc, conf.clone()), Some(AnyReader::Mpc(_))));
        assert!(open_reader(Format::M3u, conf).is_none());
    }

    #[test]
    fn as_seekable_distinguishes_bisecting_codecs_from_containers() {
        let conf = ReaderConf::default();
        let mut flac = open_reader(Format::Flac, conf.clone()).unwrap();
        assert!(flac.as_seekable().is_some());
        let mut mkv = open_reader(Format::Mkv, conf).unwrap();
        assert!(mkv.as_seekable().is_none());
    }

    #[test]
    fn opens_and_initializes_a_writer() {
        let info = WriterInfo {
            codec: Codec::Flac,
            sample_rate: 44100,
            channels: 2,
            sample_bits: 16,
            sample_float: false,
            total_samples: 0,
            encoder_delay: 0,
            end_padding: 0,
        };
        let writer = open_writer(Format::Flac, &info).unwrap();
        assert_eq!(writer.format(), Format::Flac);
        assert!(open_writer(Format::Mkv, &info).is_err());
    }

    #[test]
    fn detect_is_reexported() {
        assert_eq!(detect(&[0x1a, 0x45, 0xdf, 0xa3, 0, 0, 0, 0]), Some(Format::Mkv));
    }
}
