//! Opus header parsing and granule tracking
//!
//! An Opus stream opens with two header packets: "OpusHead" with the
//! channel/pre-skip/gain fields and "OpusTags" with a Vorbis-style
//! comment block. Unlike Vorbis there is no per-packet mode lookup;
//! packet durations come straight from the TOC byte, and timestamps
//! are tracked as a running 48 kHz granule counter re-anchored from
//! the page granule whenever a page boundary supplies one.
//!
//! Streams are allowed to start at a nonzero granule (live captures
//! cut mid-broadcast). The start granule is not recorded anywhere in
//! the headers, so it is recovered once, lazily, by summing packet
//! durations across the first data page and subtracting from that
//! page's granule position.

use crate::clock::{GranuleClock, OpusClock, OPUS_SAMPLE_RATE};
use crate::codec::comment::{self, CommentHeader};
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::reader::PageStream;
use crate::source::ByteSource;
use crate::util::{Buffer, Timestamp};
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

const OPUS_HEAD_MAGIC: &[u8; 8] = b"OpusHead";
const OPUS_TAGS_MAGIC: &[u8; 8] = b"OpusTags";

/// Frame duration in microseconds for each of the 32 TOC configs
const FRAME_DURATION_US: [u64; 32] = [
    // SILK NB, MB, WB
    10_000, 20_000, 40_000, 60_000, //
    10_000, 20_000, 40_000, 60_000, //
    10_000, 20_000, 40_000, 60_000, //
    // Hybrid SWB, FB
    10_000, 20_000, //
    10_000, 20_000, //
    // CELT NB, WB, SWB, FB
    2_500, 5_000, 10_000, 20_000, //
    2_500, 5_000, 10_000, 20_000, //
    2_500, 5_000, 10_000, 20_000, //
    2_500, 5_000, 10_000, 20_000,
];

/// Fields of the "OpusHead" identification header
#[derive(Debug, Clone, Copy)]
pub struct OpusIdHeader {
    /// Channel count
    pub channels: u8,
    /// Pre-skip (codec delay) in samples at 48 kHz
    pub pre_skip: u16,
    /// Sample rate of the original input, informational only
    pub input_sample_rate: u32,
    /// Output gain in Q7.8 dB
    pub output_gain: i16,
    /// Channel mapping family
    pub mapping_family: u8,
}

/// Parse the "OpusHead" identification header
pub fn parse_id_header(data: &[u8]) -> Result<OpusIdHeader> {
    if data.len() < 19 || &data[..8] != OPUS_HEAD_MAGIC {
        return Err(Error::malformed("not an OpusHead packet"));
    }
    // Major version must be 0; minor bumps stay decodable
    if data[8] >> 4 != 0 {
        return Err(Error::malformed(format!(
            "unsupported Opus version {}",
            data[8]
        )));
    }
    let channels = data[9];
    if channels == 0 {
        return Err(Error::malformed("invalid channel count"));
    }
    let mapping_family = data[18];
    // Family 0 is mono/stereo only
    if mapping_family == 0 && channels > 2 {
        return Err(Error::malformed(format!(
            "mapping family 0 with {} channels",
            channels
        )));
    }
    Ok(OpusIdHeader {
        channels,
        pre_skip: LittleEndian::read_u16(&data[10..12]),
        input_sample_rate: LittleEndian::read_u32(&data[12..16]),
        output_gain: LittleEndian::read_i16(&data[16..18]),
        mapping_family,
    })
}

/// Parse the "OpusTags" comment header
pub fn parse_comment_header(data: &[u8]) -> Result<CommentHeader> {
    if data.len() < 8 || &data[..8] != OPUS_TAGS_MAGIC {
        return Err(Error::malformed("not an OpusTags packet"));
    }
    comment::parse_comments(&data[8..], false)
}

/// Sample count of an Opus packet at 48 kHz, from the TOC byte
pub fn packet_sample_count(packet: &[u8]) -> Result<u64> {
    if packet.is_empty() {
        return Err(Error::malformed("empty Opus packet"));
    }
    let toc = packet[0];
    let frames: u64 = match toc & 0x03 {
        0 => 1,
        1 | 2 => 2,
        _ => {
            if packet.len() < 2 {
                return Err(Error::malformed("code 3 packet missing frame count"));
            }
            (packet[1] & 0x3F) as u64
        }
    };
    let frame_us = FRAME_DURATION_US[(toc >> 3) as usize];
    Ok(frames * frame_us * OPUS_SAMPLE_RATE / 1_000_000)
}

/// An Opus logical bitstream: parsed headers plus granule state
pub struct OpusTrack {
    info: OpusIdHeader,
    comments: CommentHeader,
    id_data: Buffer,
    /// Granule position the stream starts at; resolved on first read
    start_granule: Option<u64>,
    /// Granule position of the next packet to be returned
    cur_granule: u64,
}

impl OpusTrack {
    /// Read and parse the two Opus header packets from the start of the
    /// stream; on success the engine is positioned at the first data
    /// page.
    pub fn init<S: ByteSource>(stream: &mut PageStream<S>) -> Result<Self> {
        let id_packet = stream.read_next_packet()?;
        let info = parse_id_header(id_packet.data.as_slice())?;

        let comment_packet = stream.read_next_packet()?;
        let comments = parse_comment_header(comment_packet.data.as_slice())?;

        stream.mark_first_data_offset();
        debug!(
            channels = info.channels,
            pre_skip = info.pre_skip,
            mapping_family = info.mapping_family,
            "Opus headers parsed"
        );

        Ok(OpusTrack {
            info,
            comments,
            id_data: id_packet.data,
            start_granule: None,
            cur_granule: 0,
        })
    }

    /// Identification header fields
    pub fn info(&self) -> &OpusIdHeader {
        &self.info
    }

    /// Parsed comment header
    pub fn comments(&self) -> &CommentHeader {
        &self.comments
    }

    /// Codec setup packet a decoder needs: the identification header
    pub fn extradata(&self) -> &Buffer {
        &self.id_data
    }

    /// Granule clock for this stream
    pub fn clock(&self) -> OpusClock {
        OpusClock {
            codec_delay: self.info.pre_skip as u64,
        }
    }

    /// Sum packet durations across the first data page and subtract
    /// from its granule position; a stream that starts at granule 0
    /// resolves to 0. Rewinds to the first data page afterwards.
    fn resolve_start_granule<S: ByteSource>(&mut self, stream: &mut PageStream<S>) -> Result<()> {
        let mut samples = 0u64;
        let mut last_granule = 0u64;
        loop {
            let raw = match stream.read_next_packet() {
                Ok(raw) => raw,
                Err(Error::EndOfStream) => break,
                Err(e) => return Err(e),
            };
            if raw.page_sequence > 2 {
                break;
            }
            samples += packet_sample_count(raw.data.as_slice())?;
            last_granule = raw.page_granule;
        }
        let start = last_granule.saturating_sub(samples);
        debug!(start, "resolved Opus start granule");
        self.start_granule = Some(start);
        stream.seek_to_offset(0)
    }

    /// Read the next audio packet with its presentation timestamp.
    ///
    /// The granule counter re-anchors from the page granule whenever
    /// the engine reports a valid-sample count, and otherwise advances
    /// by each packet's own duration.
    pub fn read_packet<S: ByteSource>(&mut self, stream: &mut PageStream<S>) -> Result<Packet> {
        if self.start_granule.is_none() && stream.offset() <= stream.first_data_offset() {
            self.resolve_start_granule(stream)?;
        }

        let raw = stream.read_next_packet()?;
        let mut valid_samples = raw.valid_samples;
        if raw.page_offset == stream.first_data_offset() {
            // The first data page's granule delta still counts the
            // samples before the stream's start granule
            let start = self.start_granule.unwrap_or(0);
            valid_samples = valid_samples.map(|v| v.saturating_sub(start));
        }
        if let Some(valid) = valid_samples {
            self.cur_granule = raw.page_granule.saturating_sub(valid);
        }

        let mut packet = Packet::new(raw.data);
        packet.pts = Timestamp::from_micros(self.clock().time_us_of_granule(self.cur_granule));
        packet.valid_samples = valid_samples;
        packet.position = raw.page_offset as i64;
        self.cur_granule += packet_sample_count(packet.data.as_slice())?;
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_header(channels: u8, pre_skip: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(OPUS_HEAD_MAGIC);
        data.push(1); // version
        data.push(channels);
        data.extend_from_slice(&pre_skip.to_le_bytes());
        data.extend_from_slice(&48_000u32.to_le_bytes());
        data.extend_from_slice(&0i16.to_le_bytes());
        data.push(0); // mapping family
        data
    }

    #[test]
    fn test_parse_id_header() {
        let header = parse_id_header(&id_header(2, 312)).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.pre_skip, 312);
        assert_eq!(header.input_sample_rate, 48_000);
        assert_eq!(header.mapping_family, 0);
    }

    #[test]
    fn test_id_header_rejects_bad_input() {
        assert!(parse_id_header(b"OpusHeaX").is_err());
        let mut data = id_header(2, 0);
        data[8] = 0x10; // major version 1
        assert!(parse_id_header(&data).is_err());
        let data = id_header(0, 0);
        assert!(parse_id_header(&data).is_err());
        // family 0 cannot carry 3 channels
        assert!(parse_id_header(&id_header(3, 0)).is_err());
    }

    #[test]
    fn test_packet_sample_count_code_0() {
        // Config 14 (hybrid FB 20 ms), one frame
        let toc = 14u8 << 3;
        assert_eq!(packet_sample_count(&[toc]).unwrap(), 960);
    }

    #[test]
    fn test_packet_sample_count_code_1_and_2() {
        // Config 16 (CELT 2.5 ms), two frames
        let toc = (16u8 << 3) | 1;
        assert_eq!(packet_sample_count(&[toc]).unwrap(), 240);
        let toc = (16u8 << 3) | 2;
        assert_eq!(packet_sample_count(&[toc]).unwrap(), 240);
    }

    #[test]
    fn test_packet_sample_count_code_3() {
        // Config 3 (SILK NB 60 ms), five frames
        let toc = (3u8 << 3) | 3;
        assert_eq!(packet_sample_count(&[toc, 5]).unwrap(), 5 * 2880);
        assert!(packet_sample_count(&[toc]).is_err());
    }

    #[test]
    fn test_empty_packet_is_malformed() {
        assert!(matches!(
            packet_sample_count(&[]),
            Err(Error::Malformed(_))
        ));
    }
}
