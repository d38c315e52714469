pub mod clock;

use std::fmt;
use std::ops::{Add, Neg, Sub};

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Nanoseconds since the Unix epoch.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub i64);

/// Signed span of nanoseconds.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(pub i64);

impl Time {
    pub const MIN: Time = Time(i64::min_value());
    pub const MAX: Time = Time(i64::max_value());

    pub fn nanos(self) -> i64 {
        self.0
    }

    pub fn from_secs(secs: i64) -> Time {
        Time(secs.saturating_mul(NANOS_PER_SECOND))
    }
}

impl Duration {
    pub fn nanos(self) -> i64 {
        self.0
    }

    pub fn from_secs(secs: i64) -> Duration {
        Duration(secs.saturating_mul(NANOS_PER_SECOND))
    }
}

// Shifting saturates at the ends of the representable range.
impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, d: Duration) -> Time {
        Time(self.0.saturating_add(d.0))
    }
}

impl Sub<Time> for Time {
    type Output = Duration;

    fn sub(self, other: Time) -> Duration {
        Duration(self.0.saturating_sub(other.0))
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration(self.0.saturating_neg())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
