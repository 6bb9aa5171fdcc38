//! Packet representation for demuxed codec data

use crate::util::{Buffer, Timestamp};
use std::fmt;

/// One logical packet of codec data, possibly reassembled across pages.
///
/// Once returned by the demuxer the packet is exclusively owned by the
/// caller; the demuxer keeps no reference to it.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Compressed codec data
    pub data: Buffer,

    /// Presentation timestamp
    pub pts: Timestamp,

    /// Number of valid samples on the page this packet completed.
    ///
    /// Set only on the first packet completed from a page; a decoder
    /// uses it to trim partial samples at stream edges.
    pub valid_samples: Option<u64>,

    /// Whether this packet is independently decodable.
    ///
    /// Always true for the audio packets this demuxer produces.
    pub keyframe: bool,

    /// Byte offset of the page this packet completed on (-1 if unknown)
    pub position: i64,
}

impl Packet {
    /// Create a new packet with no timestamp
    pub fn new(data: Buffer) -> Self {
        Packet {
            data,
            pts: Timestamp::none(),
            valid_samples: None,
            keyframe: true,
            position: -1,
        }
    }

    /// Get the size of the packet data
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet(size={}, pts={}, valid_samples={:?})",
            self.size(),
            self.pts,
            self.valid_samples
        )
    }
}
