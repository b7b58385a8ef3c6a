//! # Finally

use crate::error::NodeError;
use crate::node::{CommitContext, CycleContext, Input, Operator};
use crate::Element;

/// Pass-through that hands the last committed value to a callback when the run
/// ends.
///
/// The callback runs once, from [`Operator::stop`], so only after a successful
/// run. It receives `None` if upstream never produced.
pub struct Finally<T, F> {
  input: Input<T>,
  last: Option<T>,
  f: Option<F>,
}

impl<T, F> Finally<T, F>
where
  T: Element,
  F: FnOnce(Option<T>) + 'static,
{
  /// Creates the operator.
  pub fn new(input: Input<T>, f: F) -> Self {
    Self {
      input,
      last: None,
      f: Some(f),
    }
  }
}

impl<T, F> Operator for Finally<T, F>
where
  T: Element,
  F: FnOnce(Option<T>) + 'static,
{
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    *out = Some(value.clone());
    Ok(true)
  }

  fn commit(&mut self, ctx: &mut CommitContext<'_>, value: Option<&T>) -> Result<(), NodeError> {
    if ctx.produced() {
      self.last = value.cloned();
    }
    Ok(())
  }

  fn stop(&mut self) -> Result<(), NodeError> {
    if let Some(f) = self.f.take() {
      f(self.last.take());
    }
    Ok(())
  }
}
