//! # Filter

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;

/// Propagates produced values that satisfy a predicate.
pub struct Filter<T, P> {
  input: Input<T>,
  predicate: P,
}

impl<T, P> Filter<T, P>
where
  T: Element,
  P: FnMut(&T) -> bool + 'static,
{
  /// Creates the operator.
  pub fn new(input: Input<T>, predicate: P) -> Self {
    Self { input, predicate }
  }
}

impl<T, P> Operator for Filter<T, P>
where
  T: Element,
  P: FnMut(&T) -> bool + 'static,
{
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    match ctx.fresh(self.input) {
      Some(value) if (self.predicate)(value) => {
        *out = Some(value.clone());
        Ok(true)
      }
      _ => Ok(false),
    }
  }
}
