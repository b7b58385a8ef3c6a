//! # Count

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;

/// Numbers the upstream's produced values 0, 1, 2, ...
pub struct Count<T> {
  input: Input<T>,
  next: u64,
}

impl<T: Element> Count<T> {
  /// Creates the operator.
  pub fn new(input: Input<T>) -> Self {
    Self { input, next: 0 }
  }
}

impl<T: Element> Operator for Count<T> {
  type Output = u64;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<u64>) -> Result<bool, NodeError> {
    if !ctx.ticked(self.input) {
      return Ok(false);
    }
    *out = Some(self.next);
    self.next += 1;
    Ok(true)
  }
}
