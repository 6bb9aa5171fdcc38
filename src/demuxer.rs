//! Demuxer facade: codec probing, metadata, reads and time seeks
//!
//! `OggDemuxer` owns the page engine and exactly one codec track
//! (single logical bitstream per instance). Construction probes the
//! header packets as Vorbis first, then Opus; when the source is fully
//! seekable the final granule position is probed for a duration and a
//! table of contents is built. Both degrade gracefully when they fail,
//! leaving a stream that still plays linearly.

use crate::clock::{GranuleClock, OPUS_SAMPLE_RATE, OPUS_SEEK_PREROLL_US};
use crate::codec::{CommentHeader, OpusTrack, VorbisTrack};
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::reader::PageStream;
use crate::source::ByteSource;
use crate::util::Buffer;
use tracing::{debug, warn};

/// Codec carried by the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    Vorbis,
    Opus,
}

/// Decoder-facing description of the single audio track
#[derive(Debug, Clone)]
pub struct TrackInfo {
    /// Carried codec
    pub codec: CodecId,
    /// Output sample rate in Hz (always 48000 for Opus)
    pub sample_rate: u32,
    /// Channel count
    pub channels: u8,
    /// Average bitrate estimate in bits/s, 0 if unknown
    pub bit_rate: u64,
    /// Stream duration in microseconds, if probed
    pub duration_us: Option<i64>,
    /// Decoder delay in samples at the output rate (Opus pre-skip)
    pub codec_delay: u64,
    /// Pre-roll a decoder needs after a seek, in microseconds
    pub seek_preroll_us: i64,
    /// Codec setup packets, in the order a decoder expects them
    pub extradata: Vec<Buffer>,
}

enum Track {
    Vorbis(VorbisTrack),
    Opus(OpusTrack),
}

impl Track {
    fn with_clock<R>(&self, f: impl FnOnce(&dyn GranuleClock) -> R) -> R {
        match self {
            Track::Vorbis(track) => f(&track.clock()),
            Track::Opus(track) => f(&track.clock()),
        }
    }

    fn comments(&self) -> &CommentHeader {
        match self {
            Track::Vorbis(track) => track.comments(),
            Track::Opus(track) => track.comments(),
        }
    }
}

/// Demuxer over one Ogg logical bitstream carrying Vorbis or Opus
pub struct OggDemuxer<S: ByteSource> {
    stream: PageStream<S>,
    track: Track,
    duration_us: Option<i64>,
}

impl<S: ByteSource> OggDemuxer<S> {
    /// Open a stream: probe the codec headers, then (for fully
    /// seekable sources) the duration and seek table.
    ///
    /// Fails with [`Error::Unsupported`] when the headers parse as
    /// neither Vorbis nor Opus; IO errors from the first probe
    /// propagate instead of being retried as the other codec.
    pub fn open(source: S) -> Result<Self> {
        let mut stream = PageStream::new(source);
        let track = match VorbisTrack::init(&mut stream) {
            Ok(track) => Track::Vorbis(track),
            Err(e @ Error::Io(_)) => return Err(e),
            Err(_) => {
                debug!("headers are not Vorbis, probing Opus");
                stream.reset();
                match OpusTrack::init(&mut stream) {
                    Ok(track) => Track::Opus(track),
                    Err(e @ Error::Io(_)) => return Err(e),
                    Err(_) => {
                        return Err(Error::unsupported("stream is neither Vorbis nor Opus"));
                    }
                }
            }
        };

        let mut demuxer = OggDemuxer {
            stream,
            track,
            duration_us: None,
        };
        demuxer.probe_duration();
        Ok(demuxer)
    }

    /// Probe the final page's granule for a duration and build the
    /// seek table. Skipped for caching/unsized sources; failures leave
    /// the stream playable without a duration or seek table.
    fn probe_duration(&mut self) {
        if self.stream.is_caching_source() {
            debug!("caching source, skipping duration probe");
            return;
        }
        let Some(size) = self.stream.source_size() else {
            return;
        };

        let clock: Box<dyn GranuleClock> = match &self.track {
            Track::Vorbis(track) => Box::new(track.clock()),
            Track::Opus(track) => Box::new(track.clock()),
        };
        match self.stream.find_prev_granule_position(size) {
            Ok(granule) => {
                self.duration_us = Some(clock.time_us_of_granule(granule));
                if let Err(e) = self.stream.build_toc(clock.as_ref()) {
                    warn!(error = %e, "seek table scan failed, seeks will estimate by bitrate");
                }
            }
            Err(e) => warn!(error = %e, "duration probe failed"),
        }
    }

    /// Number of tracks (always 1 once open succeeds)
    pub fn track_count(&self) -> usize {
        1
    }

    /// Description of the audio track
    pub fn track_info(&self) -> TrackInfo {
        match &self.track {
            Track::Vorbis(track) => {
                let info = track.info();
                TrackInfo {
                    codec: CodecId::Vorbis,
                    sample_rate: info.sample_rate,
                    channels: info.channels,
                    bit_rate: track.clock().approx_bitrate(),
                    duration_us: self.duration_us,
                    codec_delay: 0,
                    seek_preroll_us: 0,
                    extradata: track.extradata().into_iter().cloned().collect(),
                }
            }
            Track::Opus(track) => {
                let info = track.info();
                TrackInfo {
                    codec: CodecId::Opus,
                    sample_rate: OPUS_SAMPLE_RATE as u32,
                    channels: info.channels,
                    bit_rate: 0,
                    duration_us: self.duration_us,
                    codec_delay: info.pre_skip as u64,
                    seek_preroll_us: OPUS_SEEK_PREROLL_US,
                    extradata: vec![track.extradata().clone()],
                }
            }
        }
    }

    /// Stream duration in microseconds, if it could be probed
    pub fn duration_us(&self) -> Option<i64> {
        self.duration_us
    }

    /// Vendor string and tag pairs from the comment header
    pub fn metadata(&self) -> &CommentHeader {
        self.track.comments()
    }

    /// Read the next audio packet with its presentation timestamp
    pub fn read_packet(&mut self) -> Result<Packet> {
        match &mut self.track {
            Track::Vorbis(track) => track.read_packet(&mut self.stream),
            Track::Opus(track) => track.read_packet(&mut self.stream),
        }
    }

    /// Seek so the next packet read decodes at or before `time_us`.
    ///
    /// The codec's pre-roll is subtracted from the target first. With a
    /// seek table the landing page comes from binary search; without
    /// one the offset is estimated from the average bitrate, and the
    /// seek fails with [`Error::InvalidState`] when no bitrate is known
    /// either.
    pub fn seek_to_time(&mut self, time_us: i64) -> Result<()> {
        let preroll = self.track.with_clock(|c| c.seek_preroll_us());
        let target = (time_us.saturating_sub(preroll)).max(0);

        let offset = match self.stream.toc().entry_for_time(target) {
            Some(entry) => entry.page_offset,
            None => {
                let bps = self.track.with_clock(|c| c.approx_bitrate());
                if bps == 0 {
                    return Err(Error::invalid_state(
                        "seek requires a seek table or a known bitrate",
                    ));
                }
                (target as u128 * bps as u128 / 8_000_000) as u64
            }
        };

        self.stream.seek_to_offset(offset)?;
        if let Track::Vorbis(track) = &mut self.track {
            track.reset_after_seek();
        }
        debug!(time_us, target, offset, "seek complete");
        Ok(())
    }
}
