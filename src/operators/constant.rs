//! # Constant

use crate::error::NodeError;
use crate::node::{CycleContext, Operator, Schedule};
use crate::Element;

/// Source that produces the same value on every cycle.
pub struct Constant<T> {
  value: T,
}

impl<T: Element> Constant<T> {
  /// Creates the operator.
  pub fn new(value: T) -> Self {
    Self { value }
  }
}

impl<T: Element> Operator for Constant<T> {
  type Output = T;

  fn cycle(&mut self, _ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    if out.is_none() {
      *out = Some(self.value.clone());
    }
    Ok(true)
  }

  fn schedule(&self) -> Schedule {
    Schedule::Periodic(None)
  }
}
