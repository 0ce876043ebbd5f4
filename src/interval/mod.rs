//! Millisecond time intervals and `HH:MM:SS.cc` timestamp parsing

use std::fmt;
use std::ops::Add;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FramexError, FramexResult};

/// Timestamp pattern: two digits each for hours, minutes and seconds,
/// exactly two digits of centiseconds
static INTERVAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<hours>\d{2}):(?P<minutes>\d{2}):(?P<seconds>\d{2})\.(?P<centiseconds>\d{2})")
        .expect("interval pattern is valid")
});

/// A non-negative time interval in milliseconds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Interval(u64);

impl Interval {
    /// Create an interval from a millisecond count
    pub fn from_millis(millis: u64) -> Self {
        Interval(millis)
    }

    /// The interval length in milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Parse a timestamp of up to 99 hours in `HH:MM:SS.cc` format.
    ///
    /// The timestamp may be embedded in surrounding text, as FFmpeg emits it
    /// inside its progress lines. Fails with [`FramexError::Format`] when no
    /// well-formed timestamp is present.
    pub fn parse(text: &str) -> FramexResult<Interval> {
        let captures = INTERVAL_PATTERN
            .captures(text)
            .ok_or_else(|| FramexError::Format {
                text: text.to_string(),
            })?;

        // Two-digit capture groups always hold a valid number
        let field = |name: &str| -> u64 { captures[name].parse().expect("two-digit capture") };

        let mut millis = 3_600_000 * field("hours");
        millis += 60_000 * field("minutes");
        millis += 1_000 * field("seconds");
        millis += 10 * field("centiseconds");

        Ok(Interval(millis))
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, other: Interval) -> Interval {
        Interval(self.0 + other.0)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
