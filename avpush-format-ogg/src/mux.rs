// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The OGG codec multiplexer: inspects the first packet of a logical stream and recognizes one
//! of the three embeddings this library understands (Vorbis, Opus, FLAC-in-OGG), each
//! identified by a fixed magic prefix. Everything past identification (subsequent Tags/comment
//! packets, FLAC's chained metadata blocks) is handled by `reader`, which redispatches the
//! comment payload to [`avpush_metadata::vorbis`] the same way the native FLAC and Vorbis
//! readers do.

use avpush_core::errors::{corrupt, Result};
use avpush_core::format::Codec;
use avpush_core::status::HeaderInfo;
use avpush_codec_flac::StreamInfo;

/// What kind of embedding a logical stream's first packet identified as, plus the stream-level
/// info it carried and how many more header packets precede audio data.
#[derive(Debug, Clone)]
pub struct Identification {
    pub codec: Codec,
    pub header: HeaderInfo,
    /// Packets remaining after this one before audio data begins. For Vorbis this is 2 (comment,
    /// then setup); for Opus it is 1 (comment only); for FLAC-in-OGG it is the wrapper's own
    /// `num_header_packets` field.
    pub extra_header_packets: u32,
}

const VORBIS_MAGIC: &[u8] = b"\x01vorbis";
const OPUS_MAGIC: &[u8] = b"OpusHead";
const FLAC_MAGIC: u8 = 0x7F;

pub fn identify(data: &[u8]) -> Option<Identification> {
    if data.starts_with(VORBIS_MAGIC) {
        return parse_vorbis_id(data).ok();
    }
    if data.starts_with(OPUS_MAGIC) {
        return parse_opus_id(data).ok();
    }
    if data.first() == Some(&FLAC_MAGIC) && data.len() >= 5 && &data[1..5] == b"FLAC" {
        return parse_flac_id(data).ok();
    }
    None
}

fn parse_vorbis_id(data: &[u8]) -> Result<Identification> {
    if data.len() < 30 {
        return corrupt("ogg: vorbis identification header shorter than 30 bytes");
    }
    let version = u32::from_le_bytes(data[7..11].try_into().unwrap());
    if version != 0 {
        return corrupt("ogg: unrecognized vorbis identification header version");
    }
    let channels = data[11];
    let sample_rate = u32::from_le_bytes(data[12..16].try_into().unwrap());
    let bitrate_nominal = i32::from_le_bytes(data[20..24].try_into().unwrap());
    Ok(Identification {
        codec: Codec::Vorbis,
        header: HeaderInfo {
            duration: 0,
            sample_rate,
            sample_bits: 0,
            sample_float: true,
            channels,
            codec: Codec::Vorbis,
            real_bitrate: bitrate_nominal.max(0) as u32,
            encoder_delay: 0,
            end_padding: 0,
        },
        // Vorbis I carries three header packets: identification, comment, setup.
        extra_header_packets: 2,
    })
}

fn parse_opus_id(data: &[u8]) -> Result<Identification> {
    if data.len() < 19 {
        return corrupt("ogg: OpusHead shorter than 19 bytes");
    }
    let channels = data[9];
    let pre_skip = u16::from_le_bytes(data[10..12].try_into().unwrap());
    Ok(Identification {
        codec: Codec::Opus,
        header: HeaderInfo {
            duration: 0,
            // Opus decodes at a fixed 48kHz regardless of the input rate carried here.
            sample_rate: 48_000,
            sample_bits: 0,
            sample_float: true,
            channels,
            codec: Codec::Opus,
            real_bitrate: 0,
            encoder_delay: pre_skip as u32,
            end_padding: 0,
        },
        extra_header_packets: 1,
    })
}

fn parse_flac_id(data: &[u8]) -> Result<Identification> {
    if data.len() < 17 {
        return corrupt("ogg: FLAC-in-OGG wrapper shorter than 17 bytes");
    }
    let num_header_packets = u16::from_be_bytes(data[7..9].try_into().unwrap());
    if &data[9..13] != b"fLaC" {
        return corrupt("ogg: FLAC-in-OGG wrapper missing native fLaC signature");
    }
    let block_type = data[13] & 0x7F;
    let len = u32::from_be_bytes([0, data[14], data[15], data[16]]) as usize;
    if block_type != 0 {
        return corrupt("ogg: FLAC-in-OGG first metadata block is not STREAMINFO");
    }
    if data.len() < 17 + len {
        return corrupt("ogg: FLAC-in-OGG STREAMINFO block truncated");
    }
    let info = StreamInfo::parse(&data[17..17 + len])?;
    Ok(Identification {
        codec: Codec::Flac,
        header: HeaderInfo {
            duration: info.total_samples,
            sample_rate: info.sample_rate,
            sample_bits: info.bits_per_sample,
            sample_float: false,
            channels: info.channels,
            codec: Codec::Flac,
            real_bitrate: 0,
            encoder_delay: 0,
            end_padding: 0,
        },
        extra_header_packets: num_header_packets as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vorbis_id_packet() -> Vec<u8> {
        let mut p = VORBIS_MAGIC.to_vec();
        p.extend_from_slice(&0u32.to_le_bytes());
        p.push(2); // channels
        p.extend_from_slice(&44100u32.to_le_bytes());
        p.extend_from_slice(&0i32.to_le_bytes());
        p.extend_from_slice(&128_000i32.to_le_bytes());
        p.extend_from_slice(&0i32.to_le_bytes());
        p.push(0);
        p.push(1);
        p
    }

    #[test]
    fn identifies_vorbis() {
        let id = identify(&vorbis_id_packet()).unwrap();
        assert_eq!(id.codec, Codec::Vorbis);
        assert_eq!(id.header.sample_rate, 44100);
        assert_eq!(id.header.channels, 2);
        assert_eq!(id.extra_header_packets, 2);
    }

    #[test]
    fn identifies_opus() {
        let mut p = OPUS_MAGIC.to_vec();
        p.push(1); // version
        p.push(2); // channels
        p.extend_from_slice(&312u16.to_le_bytes()); // pre-skip
        p.extend_from_slice(&48000u32.to_le_bytes());
        p.extend_from_slice(&0i16.to_le_bytes());
        p.push(0);
        let id = identify(&p).unwrap();
        assert_eq!(id.codec, Codec::Opus);
        assert_eq!(id.header.sample_rate, 48_000);
        assert_eq!(id.header.encoder_delay, 312);
    }

    #[test]
    fn rejects_unrecognized_magic() {
        assert!(identify(b"unknowncodecmagic").is_none());
    }
}
