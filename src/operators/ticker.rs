//! # Ticker

use crate::error::NodeError;
use crate::node::{CycleContext, Operator, Schedule, StartContext};
use crate::time::NanoTime;

/// Periodic source whose value is the time of the tick it fired on.
///
/// Due times are `start + k * period`. The ticker reports its next due time
/// through [`Operator::next_event`], so a historical run lands on exactly those
/// times and tickers of different periods each fire on their own schedule. It
/// fires on the first tick at or after a due time; after a gap (real time) the
/// next due time is the first one past the current tick, so missed periods are
/// not replayed.
pub struct Ticker {
  period: NanoTime,
  next_due: Option<NanoTime>,
}

impl Ticker {
  /// Creates the operator.
  pub fn new(period: NanoTime) -> Self {
    Self {
      period,
      next_due: None,
    }
  }
}

impl Operator for Ticker {
  type Output = NanoTime;

  fn cycle(
    &mut self,
    ctx: &CycleContext<'_>,
    out: &mut Option<NanoTime>,
  ) -> Result<bool, NodeError> {
    let now = ctx.time();
    let due = self.next_due.unwrap_or(now);
    if now < due {
      return Ok(false);
    }
    let period = self.period.as_nanos().max(1);
    let periods = (now - due).as_nanos() / period + 1;
    self.next_due = Some(due + NanoTime::new(periods.saturating_mul(period)));
    *out = Some(now);
    Ok(true)
  }

  fn schedule(&self) -> Schedule {
    Schedule::Periodic(Some(self.period))
  }

  fn next_event(&mut self) -> Result<Option<NanoTime>, NodeError> {
    Ok(self.next_due)
  }

  fn start(&mut self, ctx: &StartContext) -> Result<(), NodeError> {
    self.next_due = Some(ctx.start());
    Ok(())
  }
}
