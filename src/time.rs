//! # Time
//!
//! Timestamps used by the clock, the scheduler and every node.
//!
//! [`NanoTime`] is a count of nanoseconds since the Unix epoch. Historical runs
//! usually start at [`NanoTime::ZERO`] and advance synthetically; real-time runs
//! stamp each tick with the wall clock. A [`Tick`] pairs a timestamp with the
//! index of the cycle it drives, and [`Timestamped<T>`] attaches a timestamp to
//! a payload (the read adapter uses it to tag each row with its time column).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Nanoseconds since the Unix epoch.
#[derive(
  Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NanoTime(u64);

impl NanoTime {
  /// The epoch itself; the default start of a historical run.
  pub const ZERO: NanoTime = NanoTime(0);
  /// The largest representable time.
  pub const MAX: NanoTime = NanoTime(u64::MAX);

  /// Creates a time from raw nanoseconds.
  #[inline]
  pub const fn new(nanos: u64) -> Self {
    Self(nanos)
  }

  /// Creates a span of whole milliseconds.
  #[inline]
  pub const fn from_millis(millis: u64) -> Self {
    Self(millis.saturating_mul(NANOS_PER_MILLI))
  }

  /// Creates a span of whole seconds.
  #[inline]
  pub const fn from_secs(secs: u64) -> Self {
    Self(secs.saturating_mul(NANOS_PER_SEC))
  }

  /// Creates a span from fractional seconds. Negative and NaN inputs clamp to zero.
  pub fn from_secs_f64(secs: f64) -> Self {
    if secs.is_nan() || secs <= 0.0 {
      return Self::ZERO;
    }
    let nanos = (secs * NANOS_PER_SEC as f64).round();
    if nanos >= u64::MAX as f64 {
      Self::MAX
    } else {
      Self(nanos as u64)
    }
  }

  /// Reads the wall clock.
  pub fn now() -> Self {
    SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(Self::from)
      .unwrap_or(Self::ZERO)
  }

  /// Raw nanoseconds.
  #[inline]
  pub const fn as_nanos(self) -> u64 {
    self.0
  }

  /// Fractional seconds.
  pub fn as_secs_f64(self) -> f64 {
    self.0 as f64 / NANOS_PER_SEC as f64
  }

  /// Difference clamped at zero.
  #[inline]
  pub const fn saturating_sub(self, other: NanoTime) -> NanoTime {
    NanoTime(self.0.saturating_sub(other.0))
  }

  /// Sum clamped at [`NanoTime::MAX`].
  #[inline]
  pub const fn saturating_add(self, other: NanoTime) -> NanoTime {
    NanoTime(self.0.saturating_add(other.0))
  }

  /// Converts to a UTC date-time.
  pub fn to_datetime(self) -> DateTime<Utc> {
    let secs = (self.0 / NANOS_PER_SEC) as i64;
    let nanos = (self.0 % NANOS_PER_SEC) as u32;
    Utc
      .timestamp_opt(secs, nanos)
      .single()
      .unwrap_or(DateTime::<Utc>::MIN_UTC)
  }
}

impl From<Duration> for NanoTime {
  fn from(duration: Duration) -> Self {
    Self(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
  }
}

impl From<NanoTime> for Duration {
  fn from(time: NanoTime) -> Self {
    Duration::from_nanos(time.0)
  }
}

impl From<DateTime<Utc>> for NanoTime {
  fn from(datetime: DateTime<Utc>) -> Self {
    datetime
      .timestamp_nanos_opt()
      .and_then(|nanos| u64::try_from(nanos).ok())
      .map(Self)
      .unwrap_or(Self::ZERO)
  }
}

impl Add for NanoTime {
  type Output = NanoTime;

  fn add(self, rhs: NanoTime) -> NanoTime {
    self.saturating_add(rhs)
  }
}

impl AddAssign for NanoTime {
  fn add_assign(&mut self, rhs: NanoTime) {
    *self = self.saturating_add(rhs);
  }
}

impl Sub for NanoTime {
  type Output = NanoTime;

  fn sub(self, rhs: NanoTime) -> NanoTime {
    self.saturating_sub(rhs)
  }
}

impl fmt::Display for NanoTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Small values are spans or synthetic historical times; print them as seconds.
    if self.0 < 365 * 24 * 3600 * NANOS_PER_SEC {
      write!(f, "{:.9}s", self.as_secs_f64())
    } else {
      write!(f, "{}", self.to_datetime().format("%Y-%m-%dT%H:%M:%S%.9fZ"))
    }
  }
}

/// One scheduling instant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Tick {
  /// Logical timestamp of the cycle.
  pub time: NanoTime,
  /// Zero-based, strictly increasing cycle index.
  pub cycle: u64,
}

impl Tick {
  /// Creates a tick.
  pub const fn new(time: NanoTime, cycle: u64) -> Self {
    Self { time, cycle }
  }
}

/// A payload tagged with the time it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
  /// Timestamp of the payload.
  pub time: NanoTime,
  /// The payload.
  pub payload: T,
}

impl<T> Timestamped<T> {
  /// Tags `payload` with `time`.
  pub fn new(time: NanoTime, payload: T) -> Self {
    Self { time, payload }
  }

  /// Maps the payload, keeping the time.
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Timestamped<U> {
    Timestamped {
      time: self.time,
      payload: f(self.payload),
    }
  }
}
