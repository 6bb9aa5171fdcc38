//! LSB-first bit reader
//!
//! Vorbis packs its headers least-significant-bit first within each
//! byte, unlike most container formats. This reader only needs to
//! support forward reads and skips; all overruns are malformed input,
//! not IO errors, because the packet is already in memory.

use crate::error::{Error, Result};

/// Bit reader over an in-memory packet, LSB-first
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Read position in bits from the start of `data`
    position: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader over a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, position: 0 }
    }

    /// Bits remaining
    pub fn remaining(&self) -> usize {
        self.data.len() * 8 - self.position
    }

    /// Read a single bit
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.remaining() < 1 {
            return Err(Error::malformed("bitstream truncated"));
        }
        let byte = self.data[self.position / 8];
        let bit = (byte >> (self.position % 8)) & 1;
        self.position += 1;
        Ok(bit != 0)
    }

    /// Read up to 32 bits, least significant first
    pub fn read(&mut self, count: u32) -> Result<u32> {
        debug_assert!(count <= 32);
        if self.remaining() < count as usize {
            return Err(Error::malformed("bitstream truncated"));
        }
        let mut value: u32 = 0;
        for i in 0..count {
            if self.read_bit()? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    /// Skip `count` bits
    pub fn skip(&mut self, count: usize) -> Result<()> {
        if self.remaining() < count {
            return Err(Error::malformed("bitstream truncated"));
        }
        self.position += count;
        Ok(())
    }
}

/// Number of bits needed to represent `x` (Vorbis `ilog`): 0 for 0,
/// 1 for 1, 2 for 2..=3, 3 for 4..=7, ...
pub fn ilog(x: u32) -> u32 {
    32 - x.leading_zeros()
}
