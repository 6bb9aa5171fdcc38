//! Timestamp handling for demuxed packets

use std::fmt;

/// A presentation timestamp in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// Timestamp value in microseconds
    pub value: i64,
}

impl Timestamp {
    /// Create a new timestamp from microseconds
    pub fn from_micros(value: i64) -> Self {
        Timestamp { value }
    }

    /// No timestamp / unknown timestamp
    pub fn none() -> Self {
        Timestamp { value: i64::MIN }
    }

    /// Check if timestamp is valid
    pub fn is_valid(&self) -> bool {
        self.value != i64::MIN
    }

    /// Microsecond value, `None` if the timestamp is unset
    pub fn as_micros(&self) -> Option<i64> {
        if self.is_valid() {
            Some(self.value)
        } else {
            None
        }
    }

    /// Convert timestamp to seconds
    pub fn to_seconds(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        self.value as f64 / 1_000_000.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::none()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}us", self.value)
        } else {
            write!(f, "NOPTS")
        }
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Timestamp::from_micros(value)
    }
}
