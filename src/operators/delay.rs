//! # Delay
//!
//! Re-emits each produced value a fixed span after the tick it arrived on.
//! Pending values wait in a bounded FIFO; at most one is released per cycle,
//! oldest first. The node reports the release time of the oldest pending value
//! to the scheduler, so a historical run steps to it even without a ticker.

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::time::NanoTime;
use crate::Element;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Pending values held by a delay unless configured otherwise.
pub const DEFAULT_DELAY_CAPACITY: usize = 10_000;

/// What happens when a value arrives and the delay buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
  /// Abort the run.
  #[default]
  Fail,
  /// Discard the oldest pending value.
  DropOldest,
}

/// Delay span, buffer bound and overflow policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayConfig {
  /// How long each value is held.
  pub delay: NanoTime,
  /// Maximum number of pending values.
  pub capacity: usize,
  /// Behavior when `capacity` is reached.
  pub overflow: OverflowPolicy,
}

impl DelayConfig {
  /// A delay of `delay` with the default bound and [`OverflowPolicy::Fail`].
  pub fn new(delay: NanoTime) -> Self {
    Self {
      delay,
      capacity: DEFAULT_DELAY_CAPACITY,
      overflow: OverflowPolicy::Fail,
    }
  }

  /// Sets the buffer bound.
  #[must_use]
  pub fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Sets the overflow policy.
  #[must_use]
  pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
    self.overflow = overflow;
    self
  }
}

/// The delay buffer was full under [`OverflowPolicy::Fail`].
#[derive(Error, Debug)]
#[error("delay buffer is full ({capacity} pending values)")]
pub struct DelayOverflow {
  /// The configured bound.
  pub capacity: usize,
}

/// Delays values by a fixed span.
pub struct Delay<T> {
  input: Input<T>,
  config: DelayConfig,
  pending: VecDeque<(NanoTime, T)>,
}

impl<T: Element> Delay<T> {
  /// Creates the operator.
  pub fn new(input: Input<T>, config: DelayConfig) -> Self {
    Self {
      input,
      config,
      pending: VecDeque::new(),
    }
  }
}

impl<T: Element> Operator for Delay<T> {
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    let now = ctx.time();
    if let Some(value) = ctx.fresh(self.input) {
      if self.pending.len() >= self.config.capacity {
        match self.config.overflow {
          OverflowPolicy::Fail => {
            return Err(NodeError::failed(DelayOverflow {
              capacity: self.config.capacity,
            }));
          }
          OverflowPolicy::DropOldest => {
            self.pending.pop_front();
          }
        }
      }
      self.pending.push_back((now, value.clone()));
    }
    match self.pending.front() {
      Some((time, _)) if *time + self.config.delay <= now => {
        *out = self.pending.pop_front().map(|(_, value)| value);
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  fn next_event(&mut self) -> Result<Option<NanoTime>, NodeError> {
    Ok(
      self
        .pending
        .front()
        .map(|(time, _)| *time + self.config.delay),
    )
  }
}
