//! # Collect

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;

/// Appends every produced upstream value to a growing sequence.
pub struct Collect<T> {
  input: Input<T>,
}

impl<T: Element> Collect<T> {
  /// Creates the operator.
  pub fn new(input: Input<T>) -> Self {
    Self { input }
  }
}

impl<T: Element> Operator for Collect<T> {
  type Output = Vec<T>;

  fn cycle(
    &mut self,
    ctx: &CycleContext<'_>,
    out: &mut Option<Vec<T>>,
  ) -> Result<bool, NodeError> {
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    out.get_or_insert_with(Vec::new).push(value.clone());
    Ok(true)
  }
}
