//! Codec-specific header parsing and timestamp bookkeeping
//!
//! The page/packet engine is codec-agnostic; everything that depends
//! on the carried codec (header verification, block sizes, packet
//! sample counts, pts accumulation) lives here.

pub mod bits;
pub mod comment;
pub mod opus;
pub mod vorbis;

pub use comment::CommentHeader;
pub use opus::OpusTrack;
pub use vorbis::VorbisTrack;
