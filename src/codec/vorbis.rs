//! Vorbis bitstream headers and timestamping
//!
//! A Vorbis stream opens with three header packets: identification
//! (type 1), comments (type 3), and setup (type 5). The identification
//! header carries the rate/channel/bitrate fields; the setup header is
//! skip-parsed down to its mode list, whose per-mode block flags are
//! the only setup state the demuxer needs — they decide each audio
//! packet's block size, which in turn drives sample-accurate
//! timestamps (consecutive MDCT windows overlap, so a packet advances
//! time by half the average of its own and the previous block size).

use crate::clock::VorbisClock;
use crate::codec::bits::{ilog, BitReader};
use crate::codec::comment::{self, CommentHeader};
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::reader::PageStream;
use crate::source::ByteSource;
use crate::util::{Buffer, Timestamp};
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

/// Header packet type: identification
pub const HEADER_ID: u8 = 1;
/// Header packet type: comments
pub const HEADER_COMMENT: u8 = 3;
/// Header packet type: setup
pub const HEADER_SETUP: u8 = 5;

const VORBIS_TAG: &[u8; 6] = b"vorbis";

/// Fields of the Vorbis identification header
#[derive(Debug, Clone, Copy)]
pub struct VorbisIdHeader {
    /// Channel count
    pub channels: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Upper bitrate bound in bits/s, 0 if unset
    pub bitrate_upper: u32,
    /// Nominal bitrate in bits/s, 0 if unset
    pub bitrate_nominal: u32,
    /// Lower bitrate bound in bits/s, 0 if unset
    pub bitrate_lower: u32,
    /// Short block size in samples
    pub blocksize_0: u32,
    /// Long block size in samples
    pub blocksize_1: u32,
}

/// Mode list extracted from the setup header
#[derive(Debug, Clone)]
pub struct VorbisModes {
    /// Per-mode block flag: true selects the long block size
    pub block_flags: Vec<bool>,
}

/// Verify the 7-byte header prelude: packet type plus "vorbis" tag
pub fn verify_header(data: &[u8], header_type: u8) -> Result<()> {
    if data.len() < 7 || data[0] != header_type || &data[1..7] != VORBIS_TAG {
        return Err(Error::malformed(format!(
            "not a Vorbis type {} header",
            header_type
        )));
    }
    Ok(())
}

/// Parse the identification header (packet type 1)
pub fn parse_id_header(data: &[u8]) -> Result<VorbisIdHeader> {
    verify_header(data, HEADER_ID)?;
    let body = &data[7..];
    if body.len() < 23 {
        return Err(Error::malformed("identification header truncated"));
    }

    let version = LittleEndian::read_u32(&body[0..4]);
    if version != 0 {
        return Err(Error::malformed(format!(
            "unsupported Vorbis version {}",
            version
        )));
    }

    let channels = body[4];
    let sample_rate = LittleEndian::read_u32(&body[5..9]);
    if channels == 0 || sample_rate == 0 {
        return Err(Error::malformed("invalid channel count or sample rate"));
    }

    // Bitrate fields are signed; negative means unset
    let bitrate_upper = LittleEndian::read_i32(&body[9..13]).max(0) as u32;
    let bitrate_nominal = LittleEndian::read_i32(&body[13..17]).max(0) as u32;
    let bitrate_lower = LittleEndian::read_i32(&body[17..21]).max(0) as u32;

    let blocksizes = body[21];
    let blocksize_0 = 1u32 << (blocksizes & 0x0F);
    let blocksize_1 = 1u32 << (blocksizes >> 4);
    if !(64..=8192).contains(&blocksize_0)
        || !(64..=8192).contains(&blocksize_1)
        || blocksize_0 > blocksize_1
    {
        return Err(Error::malformed("invalid block sizes"));
    }

    if body[22] & 1 == 0 {
        return Err(Error::malformed("identification header framing bit missing"));
    }

    Ok(VorbisIdHeader {
        channels,
        sample_rate,
        bitrate_upper,
        bitrate_nominal,
        bitrate_lower,
        blocksize_0,
        blocksize_1,
    })
}

/// Parse the comment header (packet type 3)
pub fn parse_comment_header(data: &[u8]) -> Result<CommentHeader> {
    verify_header(data, HEADER_COMMENT)?;
    comment::parse_comments(&data[7..], true)
}

/// Parse the setup header (packet type 5) down to its mode list.
///
/// Codebooks, time transforms, floors, residues and mappings are
/// walked at the bit level purely to reach the modes; their contents
/// are discarded.
pub fn parse_setup_header(data: &[u8], channels: u8) -> Result<VorbisModes> {
    verify_header(data, HEADER_SETUP)?;
    let mut bits = BitReader::new(&data[7..]);

    let book_count = bits.read(8)? + 1;
    for _ in 0..book_count {
        skip_codebook(&mut bits)?;
    }

    let time_count = bits.read(6)? + 1;
    for _ in 0..time_count {
        if bits.read(16)? != 0 {
            return Err(Error::malformed("nonzero time transform"));
        }
    }

    skip_floors(&mut bits)?;
    skip_residues(&mut bits)?;
    skip_mappings(&mut bits, channels)?;

    let mode_count = bits.read(6)? as usize + 1;
    let mut block_flags = Vec::with_capacity(mode_count);
    for _ in 0..mode_count {
        block_flags.push(bits.read_bit()?);
        if bits.read(16)? != 0 {
            return Err(Error::malformed("nonzero mode window type"));
        }
        if bits.read(16)? != 0 {
            return Err(Error::malformed("nonzero mode transform type"));
        }
        bits.read(8)?; // mapping number
    }
    if !bits.read_bit()? {
        return Err(Error::malformed("setup header framing bit missing"));
    }

    Ok(VorbisModes { block_flags })
}

fn skip_codebook(bits: &mut BitReader) -> Result<()> {
    if bits.read(24)? != 0x564342 {
        return Err(Error::malformed("codebook sync pattern missing"));
    }
    let dimensions = bits.read(16)?;
    let entries = bits.read(24)?;

    let ordered = bits.read_bit()?;
    if !ordered {
        let sparse = bits.read_bit()?;
        for _ in 0..entries {
            if sparse {
                if bits.read_bit()? {
                    bits.read(5)?;
                }
            } else {
                bits.read(5)?;
            }
        }
    } else {
        bits.read(5)?; // length of the first entry
        let mut current = 0u32;
        while current < entries {
            let number = bits.read(ilog(entries - current))?;
            current = current
                .checked_add(number)
                .ok_or_else(|| Error::malformed("codebook entry count overflow"))?;
        }
    }

    match bits.read(4)? {
        0 => {}
        lookup @ (1 | 2) => {
            bits.read(32)?; // minimum value
            bits.read(32)?; // delta value
            let value_bits = bits.read(4)? + 1;
            bits.read_bit()?; // sequence-p
            let lookup_values = if lookup == 1 {
                lookup1_values(entries, dimensions)
            } else {
                entries as u64 * dimensions as u64
            };
            bits.skip((lookup_values * value_bits as u64) as usize)?;
        }
        other => {
            return Err(Error::malformed(format!(
                "reserved codebook lookup type {}",
                other
            )));
        }
    }
    Ok(())
}

/// Largest integer v such that v^dimensions <= entries
fn lookup1_values(entries: u32, dimensions: u32) -> u64 {
    if dimensions == 0 {
        return 0;
    }
    let mut v = (entries as f64).powf(1.0 / dimensions as f64).floor() as u64;
    // Guard against float rounding in either direction
    while (v + 1).checked_pow(dimensions).map_or(false, |p| p <= entries as u64) {
        v += 1;
    }
    while v > 0 && v.checked_pow(dimensions).map_or(true, |p| p > entries as u64) {
        v -= 1;
    }
    v
}

fn skip_floors(bits: &mut BitReader) -> Result<()> {
    let floor_count = bits.read(6)? + 1;
    for _ in 0..floor_count {
        match bits.read(16)? {
            0 => {
                bits.read(8)?; // order
                bits.read(16)?; // rate
                bits.read(16)?; // bark map size
                bits.read(6)?; // amplitude bits
                bits.read(8)?; // amplitude offset
                let num_books = bits.read(4)? + 1;
                for _ in 0..num_books {
                    bits.read(8)?;
                }
            }
            1 => {
                let partitions = bits.read(5)?;
                let mut class_list = Vec::with_capacity(partitions as usize);
                let mut max_class = 0i64;
                for _ in 0..partitions {
                    let class = bits.read(4)?;
                    max_class = max_class.max(class as i64 + 1);
                    class_list.push(class);
                }
                let mut class_dimensions = vec![0u32; max_class as usize];
                for dim in class_dimensions.iter_mut() {
                    *dim = bits.read(3)? + 1;
                    let subclasses = bits.read(2)?;
                    if subclasses > 0 {
                        bits.read(8)?; // master book
                    }
                    for _ in 0..(1u32 << subclasses) {
                        bits.read(8)?; // subclass book
                    }
                }
                bits.read(2)?; // multiplier
                let range_bits = bits.read(4)?;
                for &class in &class_list {
                    for _ in 0..class_dimensions[class as usize] {
                        bits.read(range_bits)?;
                    }
                }
            }
            other => {
                return Err(Error::malformed(format!("reserved floor type {}", other)));
            }
        }
    }
    Ok(())
}

fn skip_residues(bits: &mut BitReader) -> Result<()> {
    let residue_count = bits.read(6)? + 1;
    for _ in 0..residue_count {
        let residue_type = bits.read(16)?;
        if residue_type > 2 {
            return Err(Error::malformed(format!(
                "reserved residue type {}",
                residue_type
            )));
        }
        bits.read(24)?; // begin
        bits.read(24)?; // end
        bits.read(24)?; // partition size - 1
        let classifications = bits.read(6)? + 1;
        bits.read(8)?; // classbook

        let mut cascades = Vec::with_capacity(classifications as usize);
        for _ in 0..classifications {
            let low = bits.read(3)?;
            let high = if bits.read_bit()? { bits.read(5)? } else { 0 };
            cascades.push(high * 8 + low);
        }
        for cascade in cascades {
            for bit in 0..8 {
                if cascade & (1 << bit) != 0 {
                    bits.read(8)?; // residue book
                }
            }
        }
    }
    Ok(())
}

fn skip_mappings(bits: &mut BitReader, channels: u8) -> Result<()> {
    let mapping_count = bits.read(6)? + 1;
    for _ in 0..mapping_count {
        if bits.read(16)? != 0 {
            return Err(Error::malformed("reserved mapping type"));
        }
        let submaps = if bits.read_bit()? { bits.read(4)? + 1 } else { 1 };
        if bits.read_bit()? {
            let coupling_steps = bits.read(8)? + 1;
            let channel_bits = ilog(channels as u32 - 1);
            for _ in 0..coupling_steps {
                bits.read(channel_bits)?; // magnitude
                bits.read(channel_bits)?; // angle
            }
        }
        if bits.read(2)? != 0 {
            return Err(Error::malformed("reserved mapping field"));
        }
        if submaps > 1 {
            for _ in 0..channels {
                bits.read(4)?; // mux
            }
        }
        for _ in 0..submaps {
            bits.read(8)?; // discarded time config
            bits.read(8)?; // floor number
            bits.read(8)?; // residue number
        }
    }
    Ok(())
}

/// A Vorbis logical bitstream: parsed headers plus pts state
pub struct VorbisTrack {
    info: VorbisIdHeader,
    modes: VorbisModes,
    comments: CommentHeader,
    id_data: Buffer,
    setup_data: Buffer,
    /// Block size of the previously returned packet, if any
    prev_block_size: Option<u32>,
    /// Absolute sample position of the previously returned packet
    position: u64,
}

impl VorbisTrack {
    /// Read and parse the three Vorbis header packets from the start of
    /// the stream; on success the engine is positioned at the first
    /// data page.
    pub fn init<S: ByteSource>(stream: &mut PageStream<S>) -> Result<Self> {
        let id_packet = stream.read_next_packet()?;
        let info = parse_id_header(id_packet.data.as_slice())?;

        let comment_packet = stream.read_next_packet()?;
        let comments = parse_comment_header(comment_packet.data.as_slice())?;

        let setup_packet = stream.read_next_packet()?;
        let modes = parse_setup_header(setup_packet.data.as_slice(), info.channels)?;

        stream.mark_first_data_offset();
        debug!(
            sample_rate = info.sample_rate,
            channels = info.channels,
            modes = modes.block_flags.len(),
            "Vorbis headers parsed"
        );

        Ok(VorbisTrack {
            info,
            modes,
            comments,
            id_data: id_packet.data,
            setup_data: setup_packet.data,
            prev_block_size: None,
            position: 0,
        })
    }

    /// Identification header fields
    pub fn info(&self) -> &VorbisIdHeader {
        &self.info
    }

    /// Parsed comment header
    pub fn comments(&self) -> &CommentHeader {
        &self.comments
    }

    /// Codec setup packets a decoder needs: identification then setup
    pub fn extradata(&self) -> [&Buffer; 2] {
        [&self.id_data, &self.setup_data]
    }

    /// Granule clock for this stream
    pub fn clock(&self) -> VorbisClock {
        VorbisClock {
            sample_rate: self.info.sample_rate,
            bitrate_nominal: self.info.bitrate_nominal,
            bitrate_lower: self.info.bitrate_lower,
            bitrate_upper: self.info.bitrate_upper,
        }
    }

    /// Block size in samples of an audio packet
    pub fn block_size_of(&self, packet: &[u8]) -> Result<u32> {
        let mut bits = BitReader::new(packet);
        if bits.read_bit()? {
            return Err(Error::malformed("not an audio packet"));
        }
        let mode_count = self.modes.block_flags.len() as u32;
        let mode = bits.read(ilog(mode_count - 1))? as usize;
        let long = *self
            .modes
            .block_flags
            .get(mode)
            .ok_or_else(|| Error::malformed("mode number out of range"))?;
        Ok(if long {
            self.info.blocksize_1
        } else {
            self.info.blocksize_0
        })
    }

    /// Read the next audio packet with a sample-accurate timestamp.
    ///
    /// The first packet after construction or a seek anchors the sample
    /// position at the granule of its page's start; each following
    /// packet advances it by half the average of the two overlapping
    /// block sizes.
    pub fn read_packet<S: ByteSource>(&mut self, stream: &mut PageStream<S>) -> Result<Packet> {
        use crate::clock::GranuleClock;

        let raw = stream.read_next_packet()?;
        let cur = match self.block_size_of(raw.data.as_slice()) {
            Ok(size) => size,
            Err(_) => {
                debug!("unparseable audio packet, assuming short block");
                self.info.blocksize_0
            }
        };

        self.position = match self.prev_block_size {
            None => raw.page_granule.saturating_sub(raw.page_samples),
            Some(prev) => self.position + ((prev + cur) / 4) as u64,
        };
        self.prev_block_size = Some(cur);

        let mut packet = Packet::new(raw.data);
        packet.pts = Timestamp::from_micros(self.clock().time_us_of_granule(self.position));
        packet.valid_samples = raw.valid_samples;
        packet.position = raw.page_offset as i64;
        Ok(packet)
    }

    /// Drop pts state so the next packet re-anchors from its page
    pub fn reset_after_seek(&mut self) {
        self.prev_block_size = None;
    }
}
