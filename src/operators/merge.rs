//! # Merge

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;

/// Propagates the value of the first input, in declaration order, that
/// produced this cycle.
pub struct Merge<T> {
  inputs: Vec<Input<T>>,
}

impl<T: Element> Merge<T> {
  /// Creates the operator.
  pub fn new(inputs: Vec<Input<T>>) -> Self {
    Self { inputs }
  }
}

impl<T: Element> Operator for Merge<T> {
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    match self.inputs.iter().find_map(|input| ctx.fresh(*input)) {
      Some(value) => {
        *out = Some(value.clone());
        Ok(true)
      }
      None => Ok(false),
    }
  }
}
