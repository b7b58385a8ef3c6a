//! # Map

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;
use std::marker::PhantomData;

/// Transforms each produced upstream value.
pub struct Map<T, U, F> {
  input: Input<T>,
  f: F,
  _output: PhantomData<fn() -> U>,
}

impl<T, U, F> Map<T, U, F>
where
  T: Element,
  U: Element,
  F: FnMut(&T) -> Result<U, NodeError> + 'static,
{
  /// Creates the operator. Errors returned by `f` abort the run.
  pub fn new(input: Input<T>, f: F) -> Self {
    Self {
      input,
      f,
      _output: PhantomData,
    }
  }
}

impl<T, U, F> Operator for Map<T, U, F>
where
  T: Element,
  U: Element,
  F: FnMut(&T) -> Result<U, NodeError> + 'static,
{
  type Output = U;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<U>) -> Result<bool, NodeError> {
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    *out = Some((self.f)(value)?);
    Ok(true)
  }
}
