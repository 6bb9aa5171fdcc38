//! Shared helpers for fabricating synthetic Ogg streams
#![allow(dead_code)]

use ogg_demux::page::{FLAG_BOS, PAGE_MAGIC};
use ogg_demux::MemorySource;

/// LSB-first bit writer, the packing Vorbis headers use
pub struct BitWriter {
    bytes: Vec<u8>,
    nbits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            nbits: 0,
        }
    }

    pub fn write(&mut self, value: u32, count: u32) {
        for i in 0..count {
            if self.nbits % 8 == 0 {
                self.bytes.push(0);
            }
            if value >> i & 1 != 0 {
                let idx = self.nbits / 8;
                self.bytes[idx] |= 1 << (self.nbits % 8);
            }
            self.nbits += 1;
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Serialize one page holding the given packets, all terminated
pub fn build_page(granule: u64, sequence: u32, flags: u8, packets: &[&[u8]]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(PAGE_MAGIC);
    data.push(0); // version
    data.push(flags);
    data.extend_from_slice(&granule.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes()); // serial
    data.extend_from_slice(&sequence.to_le_bytes());
    data.extend_from_slice(&[0u8; 4]); // checksum, unchecked
    let mut laces = Vec::new();
    for packet in packets {
        let mut len = packet.len();
        while len >= 255 {
            laces.push(255u8);
            len -= 255;
        }
        laces.push(len as u8);
    }
    data.push(laces.len() as u8);
    data.extend_from_slice(&laces);
    for packet in packets {
        data.extend_from_slice(packet);
    }
    data
}

/// Vorbis identification header: block sizes 256/2048
pub fn vorbis_id_header(sample_rate: u32, channels: u8, bitrate_nominal: i32) -> Vec<u8> {
    let mut data = vec![1u8];
    data.extend_from_slice(b"vorbis");
    data.extend_from_slice(&0u32.to_le_bytes()); // version
    data.push(channels);
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&(-1i32).to_le_bytes()); // upper
    data.extend_from_slice(&bitrate_nominal.to_le_bytes());
    data.extend_from_slice(&(-1i32).to_le_bytes()); // lower
    data.push(0xB8); // blocksizes 2^8 / 2^11
    data.push(1); // framing
    data
}

pub fn vorbis_comment_header(vendor: &str) -> Vec<u8> {
    let mut data = vec![3u8];
    data.extend_from_slice(b"vorbis");
    data.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    data.extend_from_slice(vendor.as_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // no tags
    data.push(1); // framing
    data
}

/// Minimal valid Vorbis setup header: one empty codebook, one time
/// transform, one type-0 floor, one type-0 residue, one mapping, and
/// two modes (short block, then long block)
pub fn vorbis_setup_header() -> Vec<u8> {
    let mut w = BitWriter::new();
    // one codebook
    w.write(0, 8);
    w.write(0x564342, 24); // sync
    w.write(1, 16); // dimensions
    w.write(1, 24); // entries
    w.write(0, 1); // not ordered
    w.write(0, 1); // not sparse
    w.write(0, 5); // codeword length
    w.write(0, 4); // no lookup table
    // one time transform
    w.write(0, 6);
    w.write(0, 16);
    // one type-0 floor
    w.write(0, 6);
    w.write(0, 16); // floor type
    w.write(1, 8); // order
    w.write(0, 16); // rate
    w.write(0, 16); // bark map size
    w.write(0, 6); // amplitude bits
    w.write(0, 8); // amplitude offset
    w.write(0, 4); // one book
    w.write(0, 8);
    // one type-0 residue
    w.write(0, 6);
    w.write(0, 16); // residue type
    w.write(0, 24); // begin
    w.write(0, 24); // end
    w.write(0, 24); // partition size
    w.write(0, 6); // one classification
    w.write(0, 8); // classbook
    w.write(0, 3); // cascade low bits
    w.write(0, 1); // no high bits
    // one mapping
    w.write(0, 6);
    w.write(0, 16); // mapping type
    w.write(0, 1); // one submap
    w.write(0, 1); // no coupling
    w.write(0, 2); // reserved
    w.write(0, 8); // time configuration
    w.write(0, 8); // floor number
    w.write(0, 8); // residue number
    // two modes: short block, then long block
    w.write(1, 6);
    w.write(0, 1);
    w.write(0, 16);
    w.write(0, 16);
    w.write(0, 8);
    w.write(1, 1);
    w.write(0, 16);
    w.write(0, 16);
    w.write(0, 8);
    w.write(1, 1); // framing

    let mut data = vec![5u8];
    data.extend_from_slice(b"vorbis");
    data.extend(w.finish());
    data
}

/// An audio packet selecting the short or long block mode
pub fn vorbis_audio_packet(long_block: bool) -> Vec<u8> {
    vec![if long_block { 0x02 } else { 0x00 }, 0, 0, 0]
}

/// Complete Vorbis stream: two header pages plus the given data pages,
/// each `(granule, packets)`
pub fn vorbis_stream(
    sample_rate: u32,
    bitrate_nominal: i32,
    data_pages: &[(u64, Vec<Vec<u8>>)],
) -> Vec<u8> {
    let mut data = build_page(
        0,
        0,
        FLAG_BOS,
        &[&vorbis_id_header(sample_rate, 2, bitrate_nominal)],
    );
    data.extend(build_page(
        0,
        1,
        0,
        &[&vorbis_comment_header("synthetic"), &vorbis_setup_header()],
    ));
    for (i, (granule, packets)) in data_pages.iter().enumerate() {
        let refs: Vec<&[u8]> = packets.iter().map(|p| p.as_slice()).collect();
        data.extend(build_page(*granule, 2 + i as u32, 0, &refs));
    }
    data
}

pub fn opus_head(channels: u8, pre_skip: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"OpusHead");
    data.push(1); // version
    data.push(channels);
    data.extend_from_slice(&pre_skip.to_le_bytes());
    data.extend_from_slice(&48_000u32.to_le_bytes());
    data.extend_from_slice(&0i16.to_le_bytes()); // gain
    data.push(0); // mapping family
    data
}

pub fn opus_tags(vendor: &str) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"OpusTags");
    data.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    data.extend_from_slice(vendor.as_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data
}

/// A one-frame 20 ms Opus packet (960 samples at 48 kHz)
pub fn opus_packet_20ms() -> Vec<u8> {
    vec![14 << 3]
}

/// Complete Opus stream: two header pages plus the given data pages,
/// each `(granule, packets)`
pub fn opus_stream(pre_skip: u16, data_pages: &[(u64, Vec<Vec<u8>>)]) -> Vec<u8> {
    let mut data = build_page(0, 0, FLAG_BOS, &[&opus_head(2, pre_skip)]);
    data.extend(build_page(0, 1, 0, &[&opus_tags("libopus")]));
    for (i, (granule, packets)) in data_pages.iter().enumerate() {
        let refs: Vec<&[u8]> = packets.iter().map(|p| p.as_slice()).collect();
        data.extend(build_page(*granule, 2 + i as u32, 0, &refs));
    }
    data
}

pub fn memory_source(data: Vec<u8>) -> MemorySource {
    MemorySource::new(data)
}

/// Install a test subscriber so failures print the demuxer's traces
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
