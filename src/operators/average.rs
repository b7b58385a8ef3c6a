//! # Average

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;
use num_traits::ToPrimitive;

/// Running arithmetic mean of the produced values.
pub struct Average<T> {
  input: Input<T>,
  sum: f64,
  count: u64,
}

impl<T: Element + ToPrimitive> Average<T> {
  /// Creates the operator.
  pub fn new(input: Input<T>) -> Self {
    Self {
      input,
      sum: 0.0,
      count: 0,
    }
  }
}

impl<T: Element + ToPrimitive> Operator for Average<T> {
  type Output = f64;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<f64>) -> Result<bool, NodeError> {
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    let x = value
      .to_f64()
      .ok_or_else(|| NodeError::failed(format!("{value:?} is not representable as f64")))?;
    self.sum += x;
    self.count += 1;
    *out = Some(self.sum / self.count as f64);
    Ok(true)
  }
}
