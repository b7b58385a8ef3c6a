//! # Sample

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;

/// Emits the sampled stream's latest value whenever the trigger produces.
///
/// The value is emitted even if it has not changed since the last trigger.
/// Nothing is emitted until the sampled stream has produced at least once.
pub struct Sample<T, U> {
  source: Input<T>,
  trigger: Input<U>,
}

impl<T: Element, U: Element> Sample<T, U> {
  /// Creates the operator.
  pub fn new(source: Input<T>, trigger: Input<U>) -> Self {
    Self { source, trigger }
  }
}

impl<T: Element, U: Element> Operator for Sample<T, U> {
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    if !ctx.ticked(self.trigger) {
      return Ok(false);
    }
    match ctx.get(self.source) {
      Some(value) => {
        *out = Some(value.clone());
        Ok(true)
      }
      None => Ok(false),
    }
  }
}
