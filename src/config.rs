//! # Run Configuration
//!
//! [`RunConfig`] selects the clock and the stop conditions of one run:
//!
//! | option | effect |
//! |---|---|
//! | `realtime` | wall-clock ticking instead of historical replay |
//! | `cycles` | stop after N ticks have been evaluated |
//! | `duration` | stop once elapsed logical (or wall) time reaches T |
//! | neither | run until a source is exhausted |
//!
//! When both `cycles` and `duration` are set the run stops at whichever is
//! reached first.

use crate::time::NanoTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Clock period used when the graph has no ticker and none is configured.
pub const DEFAULT_PERIOD: NanoTime = NanoTime::from_millis(1);

/// Options for [`Graph::run`](crate::Graph::run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
  /// Follow the wall clock instead of replaying virtual time.
  pub realtime: bool,
  /// Stop after this many cycles.
  pub cycles: Option<u64>,
  /// Stop once this much time has elapsed since the first tick.
  pub duration: Option<NanoTime>,
  /// First timestamp of a historical run. Ignored in real time.
  pub start: NanoTime,
  /// Clock period. Defaults to the fastest ticker in the graph.
  pub period: Option<NanoTime>,
  /// Longest wait for an adapter's background data before the run fails.
  pub fetch_timeout: Duration,
  /// Collect `logged` records into [`Graph::diagnostics`](crate::Graph::diagnostics).
  pub capture_logged: bool,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      realtime: false,
      cycles: None,
      duration: None,
      start: NanoTime::ZERO,
      period: None,
      fetch_timeout: Duration::from_secs(30),
      capture_logged: false,
    }
  }
}

impl RunConfig {
  /// Historical replay (the default).
  pub fn historical() -> Self {
    Self::default()
  }

  /// Wall-clock run.
  pub fn realtime() -> Self {
    Self {
      realtime: true,
      ..Self::default()
    }
  }

  /// Sets the cycle limit.
  #[must_use]
  pub fn with_cycles(mut self, cycles: u64) -> Self {
    self.cycles = Some(cycles);
    self
  }

  /// Sets the duration limit.
  #[must_use]
  pub fn with_duration(mut self, duration: NanoTime) -> Self {
    self.duration = Some(duration);
    self
  }

  /// Sets the historical start time.
  #[must_use]
  pub fn with_start(mut self, start: NanoTime) -> Self {
    self.start = start;
    self
  }

  /// Overrides the clock period. Historical runs then also step at this period
  /// between the times their sources report.
  #[must_use]
  pub fn with_period(mut self, period: NanoTime) -> Self {
    self.period = Some(period);
    self
  }

  /// Sets the adapter fetch timeout.
  #[must_use]
  pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
    self.fetch_timeout = timeout;
    self
  }

  /// Enables capture of `logged` records.
  #[must_use]
  pub fn with_capture_logged(mut self, capture: bool) -> Self {
    self.capture_logged = capture;
    self
  }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  /// The configured number of cycles was evaluated.
  CyclesComplete,
  /// The configured duration elapsed.
  DurationComplete,
  /// A source finished, or the clock ran out of ticks.
  Exhausted,
}
