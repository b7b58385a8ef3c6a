//! # Buffer

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;
use std::collections::VecDeque;

/// Sliding window over the last `size` produced values.
///
/// Silent until `size` values have been seen, then emits the whole window,
/// oldest first, on every produced upstream value.
pub struct Buffer<T> {
  input: Input<T>,
  size: usize,
  window: VecDeque<T>,
}

impl<T: Element> Buffer<T> {
  /// Creates the operator.
  pub fn new(input: Input<T>, size: usize) -> Self {
    Self {
      input,
      size,
      window: VecDeque::with_capacity(size),
    }
  }
}

impl<T: Element> Operator for Buffer<T> {
  type Output = Vec<T>;

  fn cycle(
    &mut self,
    ctx: &CycleContext<'_>,
    out: &mut Option<Vec<T>>,
  ) -> Result<bool, NodeError> {
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    self.window.push_back(value.clone());
    while self.window.len() > self.size {
      self.window.pop_front();
    }
    if self.size == 0 || self.window.len() < self.size {
      return Ok(false);
    }
    *out = Some(self.window.iter().cloned().collect());
    Ok(true)
  }
}
