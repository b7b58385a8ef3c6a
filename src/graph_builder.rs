//! # GraphBuilder
//!
//! Incremental construction of a dataflow graph.
//!
//! Sources are created on the builder and every operator is chained from a
//! [`Stream`] handle, which returns a new handle for the node it adds. Handles
//! borrow the builder, so a graph cannot be wired to nodes of another builder
//! by accident, and they stay usable after [`GraphBuilder::build`] to read the
//! run's results with [`Graph::peek`].
//!
//! Construction errors (an empty merge, a zero-sized buffer, a foreign
//! upstream) are recorded as they happen and reported by `build`, so chaining
//! never needs `?` in the middle of an expression.
//!
//! `build` consumes the nodes added so far. A node chained afterwards belongs
//! to no graph: the builder logs a warning and hands back a detached handle
//! that every [`Graph`] accessor treats as unknown.
//!
//! ## Example
//!
//! ```rust
//! use cycleweave::{GraphBuilder, NanoTime, RunConfig, RunStatus};
//!
//! let builder = GraphBuilder::new();
//! let counts = builder
//!   .ticker(NanoTime::from_millis(100))
//!   .count()
//!   .limit(5)
//!   .collect();
//! let mut graph = builder.build().unwrap();
//! assert_eq!(graph.run(RunConfig::historical()).unwrap(), RunStatus::Exhausted);
//! assert_eq!(graph.peek(&counts), Some(&vec![0, 1, 2, 3, 4]));
//! ```

use crate::error::GraphError;
use crate::extension::{self, CustomNode};
use crate::graph::Graph;
use crate::node::{ErasedNode, NodeCell, NodeId, Operator};
use crate::operators::{Constant, Merge, Replay, Ticker};
use crate::stream::Stream;
use crate::time::{NanoTime, Timestamped};
use crate::Element;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// A node waiting to be placed into evaluation order.
pub(crate) struct PendingNode {
  pub(crate) label: String,
  pub(crate) upstreams: Vec<NodeId>,
  pub(crate) node: Box<dyn ErasedNode>,
}

#[derive(Default)]
struct BuilderState {
  nodes: Vec<PendingNode>,
  errors: Vec<GraphError>,
  built: bool,
}

/// Assembles nodes into a [`Graph`].
pub struct GraphBuilder {
  id: u64,
  state: RefCell<BuilderState>,
}

impl Default for GraphBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl GraphBuilder {
  /// Creates an empty builder.
  pub fn new() -> Self {
    Self {
      id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
      state: RefCell::new(BuilderState::default()),
    }
  }

  /// Number of nodes added so far.
  pub fn len(&self) -> usize {
    self.state.borrow().nodes.len()
  }

  /// Whether no node has been added.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Adds a built-in operator reading from `upstreams`.
  pub(crate) fn add<O: Operator>(
    &self,
    label: impl Into<String>,
    upstreams: Vec<NodeId>,
    op: O,
  ) -> Stream<'_, O::Output> {
    self.insert(label.into(), upstreams, NodeCell::boxed(op))
  }

  pub(crate) fn insert<T>(
    &self,
    label: String,
    upstreams: Vec<NodeId>,
    node: Box<dyn ErasedNode>,
  ) -> Stream<'_, T> {
    let mut state = self.state.borrow_mut();
    if state.built {
      warn!(graph = self.id, label = %label, "node added after build is not part of any graph");
      return Stream::new(self, NodeId::new(self.id, usize::MAX));
    }
    let id = NodeId::new(self.id, state.nodes.len());
    for upstream in &upstreams {
      if upstream.graph != self.id || upstream.index >= state.nodes.len() {
        state.errors.push(GraphError::UnknownUpstream {
          node: id,
          upstream: *upstream,
        });
      }
    }
    state.nodes.push(PendingNode {
      label,
      upstreams,
      node,
    });
    Stream::new(self, id)
  }

  /// Records a construction error to be reported by [`build`](Self::build).
  pub(crate) fn fail(&self, error: GraphError) {
    self.state.borrow_mut().errors.push(error);
  }

  /// A source that produces `value` on every cycle.
  pub fn constant<T: Element>(&self, value: T) -> Stream<'_, T> {
    self.add("constant", Vec::new(), Constant::new(value))
  }

  /// A source that fires every `period`; its value is the tick time.
  ///
  /// In a historical run the clock lands on every ticker's own due times
  /// (`start + k * period`), so tickers of different periods each fire exactly
  /// on schedule. In real time the clock ticks at the fastest period and a
  /// slower ticker fires on the first tick at or after each due time.
  pub fn ticker(&self, period: NanoTime) -> Stream<'_, NanoTime> {
    if period == NanoTime::ZERO {
      self.fail(GraphError::InvalidArgument {
        operator: "ticker",
        reason: "period must be positive".to_string(),
      });
    }
    self.add("ticker", Vec::new(), Ticker::new(period))
  }

  /// A time-bearing source that replays `events` at their timestamps.
  ///
  /// Events must be sorted by time; an out-of-order event fails the run.
  pub fn replay<T: Element>(
    &self,
    events: impl IntoIterator<Item = Timestamped<T>>,
  ) -> Stream<'_, T> {
    self.add("replay", Vec::new(), Replay::new(events))
  }

  /// Propagates the value of the first input (in argument order) that produced
  /// this cycle.
  pub fn merge<'g, T: Element>(&'g self, streams: &[Stream<'g, T>]) -> Stream<'g, T> {
    if streams.is_empty() {
      self.fail(GraphError::EmptyInput { operator: "merge" });
    }
    let inputs: Vec<_> = streams.iter().map(Stream::input).collect();
    let upstreams = inputs.iter().map(|input| input.id()).collect();
    self.add("merge", upstreams, Merge::new(inputs))
  }

  /// Registers a user-defined node and returns its handle.
  ///
  /// The node's [`upstreams`](CustomNode::upstreams) are read once, here, and
  /// fixed for the lifetime of the graph.
  pub fn register<N: CustomNode>(&self, node: N) -> Stream<'_, N::Output> {
    let upstreams = node.upstreams();
    let label = node.label().to_string();
    self.insert(label, upstreams, extension::erase(node))
  }

  /// Freezes the graph and computes its evaluation order.
  ///
  /// # Errors
  ///
  /// The first construction error recorded while chaining, a dependency cycle,
  /// or [`GraphError::AlreadyBuilt`] on a second call. Nodes chained after a
  /// successful or failed `build` are detached and never evaluated.
  pub fn build(&self) -> Result<Graph, GraphError> {
    let mut state = self.state.borrow_mut();
    if state.built {
      return Err(GraphError::AlreadyBuilt);
    }
    state.built = true;
    let nodes = std::mem::take(&mut state.nodes);
    let errors = std::mem::take(&mut state.errors);
    drop(state);
    if let Some(error) = errors.into_iter().next() {
      return Err(error);
    }
    Graph::from_nodes(self.id, nodes)
  }
}
