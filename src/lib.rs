//! Ogg container demultiplexer for Vorbis and Opus audio
//!
//! Given a random-access byte source holding an Ogg bitstream, this
//! crate identifies pages, reassembles the logical packets they carry,
//! parses the codec headers, computes presentation timestamps from
//! granule positions, and seeks by time.
//!
//! # Architecture
//!
//! - `page`: page header parsing and page-boundary scanning
//! - `reader`: packet assembly across pages and byte-level positioning
//! - `codec`: Vorbis/Opus header parsing and timestamp bookkeeping
//! - `clock`: granule-position-to-time mapping per codec
//! - `toc`: bounded page index used to accelerate seeking
//! - `demuxer`: the facade tying it all together
//! - `source`: the byte-source abstraction the demuxer reads through
//! - `util`: buffers and timestamps
//!
//! # Example
//!
//! ```no_run
//! use ogg_demux::{OggDemuxer, SeekSource};
//! use std::fs::File;
//!
//! # fn main() -> ogg_demux::Result<()> {
//! let file = File::open("audio.ogg")?;
//! let mut demuxer = OggDemuxer::open(SeekSource::new(file)?)?;
//! println!("track: {:?}", demuxer.track_info());
//! while let Ok(packet) = demuxer.read_packet() {
//!     println!("{}", packet);
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod codec;
pub mod demuxer;
pub mod error;
pub mod packet;
pub mod page;
pub mod reader;
pub mod source;
pub mod toc;
pub mod util;

pub use demuxer::{CodecId, OggDemuxer, TrackInfo};
pub use error::{Error, Result};
pub use packet::Packet;
pub use source::{ByteSource, MemorySource, SeekSource};
pub use util::{Buffer, Timestamp};
