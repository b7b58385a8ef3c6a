//! # Distinct

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;

/// Suppresses produced values equal to the last propagated one.
///
/// The first value always propagates.
pub struct Distinct<T> {
  input: Input<T>,
}

impl<T: Element + PartialEq> Distinct<T> {
  /// Creates the operator.
  pub fn new(input: Input<T>) -> Self {
    Self { input }
  }
}

impl<T: Element + PartialEq> Operator for Distinct<T> {
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    if out.as_ref() == Some(value) {
      return Ok(false);
    }
    *out = Some(value.clone());
    Ok(true)
  }
}
