//! Ogg page framing
//!
//! An Ogg page is a 27-byte fixed header ("OggS" magic, version, flags,
//! granule position, serial, sequence, CRC, segment count) followed by
//! the segment (lacing) table and the raw packet data the laces
//! describe. `read_page` validates and parses one page header at a
//! given offset; `find_next_page` resynchronizes to the next page
//! boundary by scanning for the magic.

use crate::error::{Error, Result};
use crate::source::ByteSource;
use byteorder::{ByteOrder, LittleEndian};

/// Magic bytes at the start of every Ogg page
pub const PAGE_MAGIC: &[u8; 4] = b"OggS";

/// Size of the fixed page header in bytes
pub const PAGE_HEADER_SIZE: usize = 27;

/// Page flag: first packet on this page continues a packet from the previous page
pub const FLAG_CONTINUATION: u8 = 0x01;
/// Page flag: beginning of stream
pub const FLAG_BOS: u8 = 0x02;
/// Page flag: end of stream
pub const FLAG_EOS: u8 = 0x04;

/// A parsed Ogg page header plus its segment table
#[derive(Debug, Clone)]
pub struct Page {
    /// Granule position stamped on this page (codec-defined sample counter)
    pub granule_position: u64,
    /// Logical bitstream serial number
    pub serial_number: u32,
    /// Page sequence number within the logical bitstream
    pub sequence_number: u32,
    /// Header type flags (continuation / begin-of-stream / end-of-stream)
    pub flags: u8,
    /// Number of entries in the segment table
    pub segment_count: u8,
    /// Segment (lacing) table; only the first `segment_count` entries are valid
    pub lace: [u8; 255],
    /// Total page size in bytes: header + segment table + payload
    pub size: u64,
}

impl Page {
    /// An empty placeholder page (no segments, zero size)
    pub fn empty() -> Self {
        Page {
            granule_position: 0,
            serial_number: 0,
            sequence_number: 0,
            flags: 0,
            segment_count: 0,
            lace: [0; 255],
            size: 0,
        }
    }

    /// Whether the first packet on this page continues one from the previous page
    pub fn is_continuation(&self) -> bool {
        self.flags & FLAG_CONTINUATION != 0
    }

    /// Whether this is the first page of the logical bitstream
    pub fn is_bos(&self) -> bool {
        self.flags & FLAG_BOS != 0
    }

    /// Whether this is the last page of the logical bitstream
    pub fn is_eos(&self) -> bool {
        self.flags & FLAG_EOS != 0
    }

    /// Byte offset of the payload relative to the page start
    pub fn payload_offset(&self) -> u64 {
        PAGE_HEADER_SIZE as u64 + self.segment_count as u64
    }
}

/// Read and validate one page header (plus segment table) at `offset`.
///
/// Returns `EndOfStream` if no bytes are available at `offset`, an IO
/// error on a short read, and `Malformed` on a bad magic, a non-zero
/// version byte, or undefined flag bits.
pub fn read_page<S: ByteSource>(source: &mut S, offset: u64) -> Result<Page> {
    let mut header = [0u8; PAGE_HEADER_SIZE];
    let n = source.read_at(offset, &mut header)?;
    if n == 0 {
        return Err(Error::EndOfStream);
    }
    if n < PAGE_HEADER_SIZE {
        return Err(Error::short_read(PAGE_HEADER_SIZE, n));
    }

    if &header[0..4] != PAGE_MAGIC {
        return Err(Error::malformed(format!(
            "no page magic at offset {}",
            offset
        )));
    }
    if header[4] != 0 {
        return Err(Error::malformed(format!(
            "unsupported page version {}",
            header[4]
        )));
    }

    let flags = header[5];
    if flags & !(FLAG_CONTINUATION | FLAG_BOS | FLAG_EOS) != 0 {
        return Err(Error::malformed(format!("invalid page flags {:#04x}", flags)));
    }

    let mut page = Page {
        granule_position: LittleEndian::read_u64(&header[6..14]),
        serial_number: LittleEndian::read_u32(&header[14..18]),
        sequence_number: LittleEndian::read_u32(&header[18..22]),
        flags,
        segment_count: header[26],
        lace: [0; 255],
        size: 0,
    };

    let count = page.segment_count as usize;
    if count > 0 {
        let table = &mut page.lace[..count];
        let n = source.read_at(offset + PAGE_HEADER_SIZE as u64, table)?;
        if n < count {
            return Err(Error::short_read(count, n));
        }
    }

    let payload: u64 = page.lace[..count].iter().map(|&l| l as u64).sum();
    page.size = PAGE_HEADER_SIZE as u64 + count as u64 + payload;

    Ok(page)
}

/// Scan forward from `start_offset` for the next page boundary.
///
/// Returns the offset of the first "OggS" magic at or after
/// `start_offset`, or `EndOfStream` if fewer than 4 bytes remain
/// without a match. The scan is byte-granular; reads are batched
/// internally.
pub fn find_next_page<S: ByteSource>(source: &mut S, start_offset: u64) -> Result<u64> {
    const CHUNK_SIZE: usize = 4096;

    let mut buf = [0u8; CHUNK_SIZE];
    let mut offset = start_offset;
    loop {
        let n = source.read_at(offset, &mut buf)?;
        if n < PAGE_MAGIC.len() {
            return Err(Error::EndOfStream);
        }
        for i in 0..=(n - PAGE_MAGIC.len()) {
            if buf[i..i + PAGE_MAGIC.len()] == PAGE_MAGIC[..] {
                return Ok(offset + i as u64);
            }
        }
        // Overlap by 3 bytes so a magic spanning the chunk edge is found
        offset += (n - (PAGE_MAGIC.len() - 1)) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn build_header(granule: u64, serial: u32, sequence: u32, flags: u8, laces: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(PAGE_MAGIC);
        data.push(0); // version
        data.push(flags);
        data.extend_from_slice(&granule.to_le_bytes());
        data.extend_from_slice(&serial.to_le_bytes());
        data.extend_from_slice(&sequence.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]); // CRC (not checked)
        data.push(laces.len() as u8);
        data.extend_from_slice(laces);
        data
    }

    #[test]
    fn test_read_page_basic() {
        let mut data = build_header(4096, 0xabcd, 7, FLAG_EOS, &[100, 50]);
        data.extend_from_slice(&vec![0u8; 150]);
        let mut src = MemorySource::new(data);

        let page = read_page(&mut src, 0).unwrap();
        assert_eq!(page.granule_position, 4096);
        assert_eq!(page.serial_number, 0xabcd);
        assert_eq!(page.sequence_number, 7);
        assert!(page.is_eos());
        assert!(!page.is_continuation());
        assert_eq!(page.segment_count, 2);
        assert_eq!(page.size, 27 + 2 + 150);
    }

    #[test]
    fn test_read_page_bad_magic() {
        let mut data = build_header(0, 0, 0, 0, &[]);
        data[3] = b'X'; // "OggX"
        let mut src = MemorySource::new(data);

        assert!(matches!(read_page(&mut src, 0), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_read_page_bad_version() {
        let mut data = build_header(0, 0, 0, 0, &[]);
        data[4] = 1;
        let mut src = MemorySource::new(data);

        assert!(matches!(read_page(&mut src, 0), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_read_page_bad_flags() {
        let data = build_header(0, 0, 0, 0x08, &[]);
        let mut src = MemorySource::new(data);

        assert!(matches!(read_page(&mut src, 0), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_read_page_at_end_of_stream() {
        let mut src = MemorySource::new(vec![]);
        assert!(matches!(read_page(&mut src, 0), Err(Error::EndOfStream)));
    }

    #[test]
    fn test_read_page_truncated_header() {
        let data = build_header(0, 0, 0, 0, &[10]);
        let mut src = MemorySource::new(data[..20].to_vec());
        assert!(matches!(read_page(&mut src, 0), Err(Error::Io(_))));
    }

    #[test]
    fn test_find_next_page() {
        let mut data = vec![0u8; 1000];
        data.extend_from_slice(PAGE_MAGIC);
        data.extend_from_slice(&[0u8; 30]);
        let mut src = MemorySource::new(data);

        assert_eq!(find_next_page(&mut src, 0).unwrap(), 1000);
        assert_eq!(find_next_page(&mut src, 1000).unwrap(), 1000);
        assert!(matches!(
            find_next_page(&mut src, 1001),
            Err(Error::EndOfStream)
        ));
    }

    #[test]
    fn test_find_next_page_spanning_chunk_boundary() {
        // Magic straddles the 4096-byte internal chunk edge
        let mut data = vec![0u8; 4094];
        data.extend_from_slice(PAGE_MAGIC);
        data.extend_from_slice(&[0u8; 10]);
        let mut src = MemorySource::new(data);

        assert_eq!(find_next_page(&mut src, 0).unwrap(), 4094);
    }

    #[test]
    fn test_page_size_round_trip() {
        // Two back-to-back pages: reading at offset + size lands exactly
        // on the next header
        let mut data = build_header(100, 1, 0, 0, &[20]);
        data.extend_from_slice(&vec![7u8; 20]);
        let second_offset = data.len() as u64;
        data.extend_from_slice(&build_header(200, 1, 1, 0, &[5]));
        data.extend_from_slice(&[8u8; 5]);
        let mut src = MemorySource::new(data);

        let first = read_page(&mut src, 0).unwrap();
        assert_eq!(first.size, second_offset);
        let second = read_page(&mut src, first.size).unwrap();
        assert_eq!(second.granule_position, 200);
        assert_eq!(second.sequence_number, 1);
    }
}
