//! # Clock
//!
//! Produces the sequence of [`Tick`]s that drive a run.
//!
//! - [`HistoricalClock`] emits ticks back-to-back without suspending. Each tick
//!   is the earlier of the next synthetic step (`start + k * period`, when the
//!   graph has sources firing on every tick or none that report their own times)
//!   and the earliest time reported by the graph's sources. The sequence ends
//!   when neither remains.
//! - [`RealTimeClock`] suspends until the previous tick's timestamp plus the
//!   period. When a cycle overruns, the next tick is emitted immediately with the
//!   current wall-clock time; missed ticks are never replayed.
//!
//! Timestamps never decrease within a run.

use crate::time::{NanoTime, Tick};
use std::time::{Duration, Instant};
use tracing::warn;

/// Source of ticks for the scheduler.
pub trait Clock {
  /// Advances to the next tick.
  ///
  /// `next_event` is the earliest pending timestamp reported by externally timed
  /// sources, if any. Returns `None` when the sequence is exhausted.
  fn next_tick(&mut self, next_event: Option<NanoTime>) -> Option<Tick>;
}

/// Virtual-time clock for replays.
#[derive(Debug, Clone)]
pub struct HistoricalClock {
  start: NanoTime,
  period: NanoTime,
  synthetic: bool,
  step: u64,
  cycle: u64,
  last: Option<NanoTime>,
}

impl HistoricalClock {
  /// Creates a clock starting at `start`.
  ///
  /// With `synthetic` set, the clock steps by `period` on its own; otherwise it
  /// only follows the external event times it is handed.
  pub fn new(start: NanoTime, period: NanoTime, synthetic: bool) -> Self {
    Self {
      start,
      period,
      synthetic,
      step: 0,
      cycle: 0,
      last: None,
    }
  }

  fn synthetic_time(&self) -> Option<NanoTime> {
    if !self.synthetic {
      return None;
    }
    let offset = self.period.as_nanos().checked_mul(self.step)?;
    self.start.as_nanos().checked_add(offset).map(NanoTime::new)
  }
}

impl Clock for HistoricalClock {
  fn next_tick(&mut self, next_event: Option<NanoTime>) -> Option<Tick> {
    let synthetic = self.synthetic_time();
    let time = match (synthetic, next_event) {
      (Some(s), Some(e)) => s.min(e),
      (Some(s), None) => s,
      (None, Some(e)) => e,
      (None, None) => return None,
    };
    if synthetic.is_some_and(|s| s <= time) {
      self.step += 1;
    }
    let time = match self.last {
      Some(last) => time.max(last),
      None => time.max(self.start),
    };
    self.last = Some(time);
    let tick = Tick::new(time, self.cycle);
    self.cycle += 1;
    Some(tick)
  }
}

/// Wall-clock driven clock.
#[derive(Debug)]
pub struct RealTimeClock {
  period: Duration,
  cycle: u64,
  last: Option<(Instant, NanoTime)>,
}

impl RealTimeClock {
  /// Creates a clock ticking every `period`.
  pub fn new(period: NanoTime) -> Self {
    Self {
      period: period.into(),
      cycle: 0,
      last: None,
    }
  }
}

impl Clock for RealTimeClock {
  fn next_tick(&mut self, _next_event: Option<NanoTime>) -> Option<Tick> {
    let (instant, time) = match self.last {
      None => (Instant::now(), NanoTime::now()),
      Some((previous, previous_time)) => {
        let due = previous + self.period;
        let now = Instant::now();
        if now < due {
          std::thread::sleep(due - now);
          (due, previous_time + NanoTime::from(self.period))
        } else {
          let late = now - due;
          if late >= self.period {
            warn!(cycle = self.cycle, late = ?late, "cycle overran the clock period, coalescing ticks");
          }
          (now, NanoTime::now().max(previous_time))
        }
      }
    };
    self.last = Some((instant, time));
    let tick = Tick::new(time, self.cycle);
    self.cycle += 1;
    Some(tick)
  }
}
