//! # Fold and ForEach

use crate::error::NodeError;
use crate::node::{CommitContext, CycleContext, Input, Operator};
use crate::time::NanoTime;
use crate::Element;

/// Running accumulation over the produced values.
pub struct Fold<T, A, F> {
  input: Input<T>,
  init: A,
  f: F,
}

impl<T, A, F> Fold<T, A, F>
where
  T: Element,
  A: Element,
  F: FnMut(&mut A, &T) + 'static,
{
  /// Creates the operator; the accumulator starts as `init`.
  pub fn new(input: Input<T>, init: A, f: F) -> Self {
    Self { input, init, f }
  }
}

impl<T, A, F> Operator for Fold<T, A, F>
where
  T: Element,
  A: Element,
  F: FnMut(&mut A, &T) + 'static,
{
  type Output = A;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<A>) -> Result<bool, NodeError> {
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    let acc = out.get_or_insert_with(|| self.init.clone());
    (self.f)(acc, value);
    Ok(true)
  }
}

/// Pass-through whose callback runs at commit, after the whole cycle succeeded.
pub struct ForEach<T, F> {
  input: Input<T>,
  f: F,
}

impl<T, F> ForEach<T, F>
where
  T: Element,
  F: FnMut(&T, NanoTime) + 'static,
{
  /// Creates the operator.
  pub fn new(input: Input<T>, f: F) -> Self {
    Self { input, f }
  }
}

impl<T, F> Operator for ForEach<T, F>
where
  T: Element,
  F: FnMut(&T, NanoTime) + 'static,
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
    if let (true, Some(value)) = (ctx.produced(), value) {
      (self.f)(value, ctx.tick().time);
    }
    Ok(())
  }
}
