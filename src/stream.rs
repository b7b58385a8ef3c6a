//! # Stream Handles
//!
//! A [`Stream`] is a typed handle to one node of a graph under construction.
//! Every chaining method adds a node downstream of the handle and returns the
//! new node's handle; the original stays usable, so one stream can feed many
//! consumers.

use crate::error::{BoxError, GraphError, NodeError};
use crate::graph_builder::GraphBuilder;
use crate::node::{Input, NodeId};
use crate::operators::{
  Average, Bimap, Buffer, Collect, Count, Delay, DelayConfig, Distinct, Filter, Finally, Fold,
  ForEach, Limit, Logged, Map, Sample,
};
use crate::time::NanoTime;
use crate::Element;
use num_traits::ToPrimitive;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Not;

/// Handle to a node producing values of type `T`.
pub struct Stream<'g, T> {
  builder: &'g GraphBuilder,
  id: NodeId,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Stream<'_, T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Stream<'_, T> {}

impl<T> fmt::Debug for Stream<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Stream").field(&self.id).finish()
  }
}

impl<'g, T> Stream<'g, T> {
  pub(crate) fn new(builder: &'g GraphBuilder, id: NodeId) -> Self {
    Self {
      builder,
      id,
      _marker: PhantomData,
    }
  }

  /// Identity of the node.
  pub fn id(&self) -> NodeId {
    self.id
  }

  /// Lifetime-free reference for reading this node from another node.
  pub fn input(&self) -> Input<T> {
    Input::new(self.id)
  }

  /// The builder this node belongs to.
  pub fn builder(&self) -> &'g GraphBuilder {
    self.builder
  }
}

impl<'g, T: Element> Stream<'g, T> {
  /// Applies `f` to each produced value.
  pub fn map<U: Element>(&self, mut f: impl FnMut(&T) -> U + 'static) -> Stream<'g, U> {
    let op = Map::new(self.input(), move |value: &T| Ok(f(value)));
    self.builder.add("map", vec![self.id], op)
  }

  /// Applies a fallible `f` to each produced value. An error aborts the run.
  pub fn try_map<U: Element, E: Into<BoxError>>(
    &self,
    mut f: impl FnMut(&T) -> Result<U, E> + 'static,
  ) -> Stream<'g, U> {
    let op = Map::new(self.input(), move |value: &T| {
      f(value).map_err(NodeError::failed)
    });
    self.builder.add("try_map", vec![self.id], op)
  }

  /// Propagates produced values for which `predicate` holds.
  pub fn filter(&self, predicate: impl FnMut(&T) -> bool + 'static) -> Stream<'g, T> {
    self
      .builder
      .add("filter", vec![self.id], Filter::new(self.input(), predicate))
  }

  /// Propagates a produced value only when it differs from the last one propagated.
  pub fn distinct(&self) -> Stream<'g, T>
  where
    T: PartialEq,
  {
    self
      .builder
      .add("distinct", vec![self.id], Distinct::new(self.input()))
  }

  /// Re-emits each value `delay` after the tick it was produced on.
  pub fn delay(&self, delay: NanoTime) -> Stream<'g, T> {
    self.delay_with(DelayConfig::new(delay))
  }

  /// [`delay`](Self::delay) with an explicit buffer bound and overflow policy.
  pub fn delay_with(&self, config: DelayConfig) -> Stream<'g, T> {
    if config.capacity == 0 {
      self.builder.fail(GraphError::InvalidArgument {
        operator: "delay",
        reason: "capacity must be positive".to_string(),
      });
    }
    self
      .builder
      .add("delay", vec![self.id], Delay::new(self.input(), config))
  }

  /// Sliding window of the last `size` values, emitted once full.
  pub fn buffer(&self, size: usize) -> Stream<'g, Vec<T>> {
    if size == 0 {
      self.builder.fail(GraphError::InvalidArgument {
        operator: "buffer",
        reason: "size must be positive".to_string(),
      });
    }
    self
      .builder
      .add("buffer", vec![self.id], Buffer::new(self.input(), size))
  }

  /// Emits this stream's latest value on every cycle in which `trigger` produces.
  pub fn sample<U: Element>(&self, trigger: &Stream<'g, U>) -> Stream<'g, T> {
    self.builder.add(
      "sample",
      vec![self.id, trigger.id],
      Sample::new(self.input(), trigger.input()),
    )
  }

  /// Propagates the first `n` produced values, then signals exhaustion.
  pub fn limit(&self, n: u64) -> Stream<'g, T> {
    self
      .builder
      .add("limit", vec![self.id], Limit::new(self.input(), n))
  }

  /// Accumulates every produced value.
  pub fn collect(&self) -> Stream<'g, Vec<T>> {
    self
      .builder
      .add("collect", vec![self.id], Collect::new(self.input()))
  }

  /// Combines this stream with `other` whenever either produces, once both have
  /// a value.
  pub fn bimap<U: Element, V: Element>(
    &self,
    other: &Stream<'g, U>,
    f: impl FnMut(&T, &U) -> V + 'static,
  ) -> Stream<'g, V> {
    self.builder.add(
      "bimap",
      vec![self.id, other.id],
      Bimap::new(self.input(), other.input(), f),
    )
  }

  /// Running mean of the produced values.
  pub fn average(&self) -> Stream<'g, f64>
  where
    T: ToPrimitive,
  {
    self
      .builder
      .add("average", vec![self.id], Average::new(self.input()))
  }

  /// Pass-through that emits a diagnostic record for every produced value.
  pub fn logged(&self, label: impl Into<String>) -> Stream<'g, T> {
    let label = label.into();
    self.builder.add(
      format!("logged({label})"),
      vec![self.id],
      Logged::new(self.input(), label),
    )
  }

  /// 0, 1, 2, ... one per produced value.
  pub fn count(&self) -> Stream<'g, u64> {
    self
      .builder
      .add("count", vec![self.id], Count::new(self.input()))
  }

  /// Running accumulation starting from `init`.
  pub fn fold<A: Element>(
    &self,
    init: A,
    f: impl FnMut(&mut A, &T) + 'static,
  ) -> Stream<'g, A> {
    self
      .builder
      .add("fold", vec![self.id], Fold::new(self.input(), init, f))
  }

  /// Pass-through that calls `f` with each produced value and its tick time once
  /// the cycle has committed.
  pub fn for_each(&self, f: impl FnMut(&T, NanoTime) + 'static) -> Stream<'g, T> {
    self
      .builder
      .add("for_each", vec![self.id], ForEach::new(self.input(), f))
  }

  /// Pass-through that calls `f` once with the last value it committed when the
  /// run stops successfully (`None` if upstream never produced).
  pub fn finally(&self, f: impl FnOnce(Option<T>) + 'static) -> Stream<'g, T> {
    self
      .builder
      .add("finally", vec![self.id], Finally::new(self.input(), f))
  }

  /// Merges this stream with `others`; earlier streams win ties.
  pub fn merge(&self, others: &[Stream<'g, T>]) -> Stream<'g, T> {
    let mut streams = Vec::with_capacity(others.len() + 1);
    streams.push(*self);
    streams.extend_from_slice(others);
    self.builder.merge(&streams)
  }
}

/// Logical negation, produced whenever the upstream produces.
impl<'g> Not for Stream<'g, bool> {
  type Output = Stream<'g, bool>;

  fn not(self) -> Stream<'g, bool> {
    self.builder.add(
      "not",
      vec![self.id],
      Map::new(self.input(), |value: &bool| Ok(!*value)),
    )
  }
}
