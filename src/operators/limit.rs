//! # Limit

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;

/// Passes the first `n` produced values, signalling exhaustion on the last.
///
/// `limit(0)` never produces and is exhausted from its first evaluation.
pub struct Limit<T> {
  input: Input<T>,
  limit: u64,
  seen: u64,
  exhausted: bool,
}

impl<T: Element> Limit<T> {
  /// Creates the operator.
  pub fn new(input: Input<T>, limit: u64) -> Self {
    Self {
      input,
      limit,
      seen: 0,
      exhausted: false,
    }
  }
}

impl<T: Element> Operator for Limit<T> {
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    if self.seen >= self.limit {
      self.exhausted = true;
      return Ok(false);
    }
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    *out = Some(value.clone());
    self.seen += 1;
    self.exhausted = self.seen >= self.limit;
    Ok(true)
  }

  fn exhausted(&self) -> bool {
    self.exhausted
  }
}
