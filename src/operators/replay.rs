//! # Replay
//!
//! Time-bearing source fed from an in-memory sequence of timestamped values.
//! Each event is emitted on a tick at its own timestamp, one per cycle; events
//! sharing a timestamp are emitted on consecutive cycles at that time.

use crate::error::NodeError;
use crate::node::{CycleContext, Operator, Schedule};
use crate::time::{NanoTime, Timestamped};
use crate::Element;
use std::collections::VecDeque;
use thiserror::Error;

/// An event's timestamp is earlier than the one before it.
#[derive(Error, Debug)]
#[error("event at {time} follows an event at {previous}")]
pub struct OutOfOrder {
  /// Time of the offending event.
  pub time: NanoTime,
  /// Time of the event before it.
  pub previous: NanoTime,
}

/// Replays recorded events.
pub struct Replay<T> {
  events: VecDeque<Timestamped<T>>,
  previous: Option<NanoTime>,
}

impl<T: Element> Replay<T> {
  /// Creates the operator.
  pub fn new(events: impl IntoIterator<Item = Timestamped<T>>) -> Self {
    Self {
      events: events.into_iter().collect(),
      previous: None,
    }
  }
}

impl<T: Element> Operator for Replay<T> {
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    let due = self
      .events
      .front()
      .is_some_and(|event| event.time <= ctx.time());
    if !due {
      return Ok(false);
    }
    let Some(event) = self.events.pop_front() else {
      return Ok(false);
    };
    if let Some(previous) = self.previous.filter(|previous| event.time < *previous) {
      return Err(NodeError::failed(OutOfOrder {
        time: event.time,
        previous,
      }));
    }
    self.previous = Some(event.time);
    *out = Some(event.payload);
    Ok(true)
  }

  fn schedule(&self) -> Schedule {
    Schedule::Timed
  }

  fn next_event(&mut self) -> Result<Option<NanoTime>, NodeError> {
    Ok(self.events.front().map(|event| event.time))
  }

  fn exhausted(&self) -> bool {
    self.events.is_empty()
  }
}
