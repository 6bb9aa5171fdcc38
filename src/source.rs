//! Random-access byte source abstraction
//!
//! The demuxer reads pages at arbitrary offsets, so it consumes a
//! positioned-read interface rather than a sequential `Read`. Sources
//! that cannot report a size (or flag themselves as caching/live)
//! disable table-of-contents construction and exact-duration probing.

use crate::error::Result;
use std::io::{Read, Seek, SeekFrom};

/// Random-access byte source consumed by the demuxer
pub trait ByteSource {
    /// Read up to `buf.len()` bytes at the given absolute offset.
    ///
    /// Returns the number of bytes read; 0 signals end of stream.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total size in bytes, if known
    fn size(&self) -> Option<u64>;

    /// Whether this is a caching/live source.
    ///
    /// When true, the demuxer skips the full-stream scans (table of
    /// contents, exact duration) that would defeat progressive caching.
    fn is_caching(&self) -> bool {
        false
    }
}

/// In-memory byte source
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    /// Create a source over an owned byte vector
    pub fn new(data: Vec<u8>) -> Self {
        MemorySource { data }
    }
}

impl ByteSource for MemorySource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.data.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// Byte source backed by any `Read + Seek` reader (files, cursors)
pub struct SeekSource<R: Read + Seek> {
    reader: R,
    size: Option<u64>,
    caching: bool,
}

impl<R: Read + Seek> SeekSource<R> {
    /// Create a source, probing the total size once up front
    pub fn new(mut reader: R) -> Result<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(SeekSource {
            reader,
            size: Some(size),
            caching: false,
        })
    }

    /// Create a source whose size is unknown (e.g. an unbounded stream)
    pub fn with_unknown_size(reader: R) -> Self {
        SeekSource {
            reader,
            size: None,
            caching: false,
        }
    }

    /// Mark this source as caching/live
    pub fn caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }
}

impl<R: Read + Seek> ByteSource for SeekSource<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if let Some(size) = self.size {
            if offset >= size {
                return Ok(0);
            }
        }
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match self.reader.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_caching(&self) -> bool {
        self.caching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_memory_source_reads() {
        let mut src = MemorySource::new(vec![0, 1, 2, 3, 4]);
        let mut buf = [0u8; 3];
        assert_eq!(src.read_at(1, &mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(src.size(), Some(5));
        assert!(!src.is_caching());
    }

    #[test]
    fn test_memory_source_past_end() {
        let mut src = MemorySource::new(vec![0, 1, 2]);
        let mut buf = [0u8; 4];
        assert_eq!(src.read_at(3, &mut buf).unwrap(), 0);
        assert_eq!(src.read_at(1, &mut buf).unwrap(), 2);
    }

    #[test]
    fn test_seek_source_size_probe() {
        let mut src = SeekSource::new(Cursor::new(vec![9u8; 100])).unwrap();
        assert_eq!(src.size(), Some(100));
        let mut buf = [0u8; 10];
        assert_eq!(src.read_at(95, &mut buf).unwrap(), 5);
    }

    #[test]
    fn test_seek_source_caching_flag() {
        let src = SeekSource::new(Cursor::new(vec![0u8; 8]))
            .unwrap()
            .caching(true);
        assert!(src.is_caching());
    }
}
