//! Granule-position clocks
//!
//! A granule position is a codec-defined monotonic counter stamped on
//! each page. The mapping from granule to presentation time differs
//! between Vorbis and Opus, as do the seek pre-roll and the bitrate
//! estimate used for table-less seeking; this trait is the capability
//! seam between the shared page engine and the two codecs.

/// Sample rate every Opus stream is timed against
pub const OPUS_SAMPLE_RATE: u64 = 48_000;

/// Seek pre-roll for Opus streams (decoder warm-up), in microseconds
pub const OPUS_SEEK_PREROLL_US: i64 = 80_000;

/// Codec-specific mapping from granule positions to presentation time
pub trait GranuleClock {
    /// Presentation time in microseconds for a granule position,
    /// saturating at `i64::MAX` on overflow
    fn time_us_of_granule(&self, granule: u64) -> i64;

    /// Pre-roll subtracted from seek targets, in microseconds
    fn seek_preroll_us(&self) -> i64 {
        0
    }

    /// Average bitrate estimate in bits per second; 0 if unavailable
    fn approx_bitrate(&self) -> u64 {
        0
    }
}

/// Vorbis granule clock: granules are PCM sample counts at the stream rate
#[derive(Debug, Clone, Copy)]
pub struct VorbisClock {
    /// Sample rate from the identification header
    pub sample_rate: u32,
    /// Nominal bitrate, 0 if unset
    pub bitrate_nominal: u32,
    /// Lower bitrate bound, 0 if unset
    pub bitrate_lower: u32,
    /// Upper bitrate bound, 0 if unset
    pub bitrate_upper: u32,
}

impl GranuleClock for VorbisClock {
    fn time_us_of_granule(&self, granule: u64) -> i64 {
        if granule > (i64::MAX / 1_000_000) as u64 {
            return i64::MAX;
        }
        granule as i64 * 1_000_000 / self.sample_rate as i64
    }

    fn approx_bitrate(&self) -> u64 {
        if self.bitrate_nominal > 0 {
            return self.bitrate_nominal as u64;
        }
        if self.bitrate_lower > 0 && self.bitrate_upper > 0 {
            return (self.bitrate_lower as u64 + self.bitrate_upper as u64) / 2;
        }
        0
    }
}

/// Opus granule clock: granules count 48 kHz samples including the
/// encoder lookahead, which is trimmed off before timing
#[derive(Debug, Clone, Copy)]
pub struct OpusClock {
    /// Codec delay (pre-skip) in samples at 48 kHz
    pub codec_delay: u64,
}

impl GranuleClock for OpusClock {
    fn time_us_of_granule(&self, granule: u64) -> i64 {
        let trimmed = granule.saturating_sub(self.codec_delay);
        if trimmed > (i64::MAX / 1_000_000) as u64 {
            return i64::MAX;
        }
        trimmed as i64 * 1_000_000 / OPUS_SAMPLE_RATE as i64
    }

    fn seek_preroll_us(&self) -> i64 {
        OPUS_SEEK_PREROLL_US
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vorbis_time_mapping() {
        let clock = VorbisClock {
            sample_rate: 44_100,
            bitrate_nominal: 0,
            bitrate_lower: 0,
            bitrate_upper: 0,
        };
        assert_eq!(clock.time_us_of_granule(0), 0);
        assert_eq!(clock.time_us_of_granule(44_100), 1_000_000);
        assert_eq!(clock.time_us_of_granule(4096), 4096 * 1_000_000 / 44_100);
    }

    #[test]
    fn test_vorbis_overflow_saturates() {
        let clock = VorbisClock {
            sample_rate: 48_000,
            bitrate_nominal: 0,
            bitrate_lower: 0,
            bitrate_upper: 0,
        };
        assert_eq!(clock.time_us_of_granule(u64::MAX), i64::MAX);
        assert_eq!(
            clock.time_us_of_granule((i64::MAX / 1_000_000) as u64 + 1),
            i64::MAX
        );
    }

    #[test]
    fn test_vorbis_bitrate_estimate() {
        let mut clock = VorbisClock {
            sample_rate: 44_100,
            bitrate_nominal: 128_000,
            bitrate_lower: 96_000,
            bitrate_upper: 160_000,
        };
        assert_eq!(clock.approx_bitrate(), 128_000);
        clock.bitrate_nominal = 0;
        assert_eq!(clock.approx_bitrate(), 128_000);
        clock.bitrate_lower = 0;
        assert_eq!(clock.approx_bitrate(), 0);
    }

    #[test]
    fn test_opus_time_mapping_trims_delay() {
        let clock = OpusClock { codec_delay: 312 };
        assert_eq!(clock.time_us_of_granule(0), 0);
        assert_eq!(clock.time_us_of_granule(312), 0);
        assert_eq!(clock.time_us_of_granule(48_312), 1_000_000);
        assert_eq!(clock.seek_preroll_us(), 80_000);
        assert_eq!(clock.approx_bitrate(), 0);
    }
}
