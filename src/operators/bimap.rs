//! # Bimap

use crate::error::NodeError;
use crate::node::{CycleContext, Input, Operator};
use crate::Element;
use std::marker::PhantomData;

/// Combines two streams whenever either side produces.
///
/// The side that did not produce contributes its latest cached value. Nothing
/// is emitted until both sides have produced at least once.
pub struct Bimap<A, B, V, F> {
  left: Input<A>,
  right: Input<B>,
  f: F,
  _output: PhantomData<fn() -> V>,
}

impl<A, B, V, F> Bimap<A, B, V, F>
where
  A: Element,
  B: Element,
  V: Element,
  F: FnMut(&A, &B) -> V + 'static,
{
  /// Creates the operator.
  pub fn new(left: Input<A>, right: Input<B>, f: F) -> Self {
    Self {
      left,
      right,
      f,
      _output: PhantomData,
    }
  }
}

impl<A, B, V, F> Operator for Bimap<A, B, V, F>
where
  A: Element,
  B: Element,
  V: Element,
  F: FnMut(&A, &B) -> V + 'static,
{
  type Output = V;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<V>) -> Result<bool, NodeError> {
    if !ctx.ticked(self.left) && !ctx.ticked(self.right) {
      return Ok(false);
    }
    match (ctx.get(self.left), ctx.get(self.right)) {
      (Some(a), Some(b)) => {
        *out = Some((self.f)(a, b));
        Ok(true)
      }
      _ => Ok(false),
    }
  }
}
