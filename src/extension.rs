//! # Extension Protocol
//!
//! Lets user code define a node with just two operations and have it scheduled
//! exactly like a built-in: topological ordering, diamond sharing and
//! propagation suppression all apply unchanged.
//!
//! Registration is explicit and two-phase: construct the node (holding
//! [`Input`](crate::node::Input) references to its upstreams), then hand it to
//! [`GraphBuilder::register`](crate::GraphBuilder::register), which returns the
//! node's [`Stream`](crate::Stream) handle.
//!
//! ## Example
//!
//! ```rust
//! use cycleweave::{CustomNode, CycleContext, GraphBuilder, Input, NodeError, NodeId, RunConfig};
//!
//! struct Spread {
//!   bid: Input<f64>,
//!   ask: Input<f64>,
//! }
//!
//! impl CustomNode for Spread {
//!   type Output = f64;
//!
//!   fn upstreams(&self) -> Vec<NodeId> {
//!     vec![self.bid.id(), self.ask.id()]
//!   }
//!
//!   fn cycle(&mut self, ctx: &CycleContext<'_>, value: &mut Option<f64>) -> Result<bool, NodeError> {
//!     match (ctx.get(self.bid), ctx.get(self.ask)) {
//!       (Some(bid), Some(ask)) => {
//!         *value = Some(ask - bid);
//!         Ok(true)
//!       }
//!       _ => Ok(false),
//!     }
//!   }
//! }
//!
//! let builder = GraphBuilder::new();
//! let bid = builder.constant(99.5);
//! let ask = builder.constant(100.0);
//! let spread = builder.register(Spread { bid: bid.input(), ask: ask.input() });
//! let mut graph = builder.build().unwrap();
//! graph.run(RunConfig::historical().with_cycles(1)).unwrap();
//! assert_eq!(graph.peek(&spread), Some(&0.5));
//! ```

use crate::error::NodeError;
use crate::node::{CycleContext, ErasedNode, NodeCell, NodeId, Operator};
use crate::Element;

/// A user-defined node.
pub trait CustomNode: 'static {
  /// Type of the node's value.
  type Output: Element;

  /// The nodes this one reads. Queried once, at registration.
  fn upstreams(&self) -> Vec<NodeId>;

  /// Name used in errors and traces.
  fn label(&self) -> &str {
    "custom"
  }

  /// Computes the next value from the upstreams' values.
  ///
  /// Set `value` and return `Ok(true)` to propagate, or return `Ok(false)` to
  /// suppress. The default implementation fails the run: a node that does not
  /// provide its own `cycle` must never silently propagate a stale value.
  fn cycle(
    &mut self,
    ctx: &CycleContext<'_>,
    value: &mut Option<Self::Output>,
  ) -> Result<bool, NodeError> {
    let _ = (ctx, value);
    Err(NodeError::Contract(format!(
      "{} does not implement cycle()",
      self.label()
    )))
  }
}

/// Adapts a [`CustomNode`] to the built-in operator contract.
struct Custom<N>(N);

impl<N: CustomNode> Operator for Custom<N> {
  type Output = N::Output;

  fn cycle(
    &mut self,
    ctx: &CycleContext<'_>,
    out: &mut Option<N::Output>,
  ) -> Result<bool, NodeError> {
    let produced = self.0.cycle(ctx, out)?;
    if produced && out.is_none() {
      return Err(NodeError::Contract(format!(
        "{} reported a new value without setting one",
        self.0.label()
      )));
    }
    Ok(produced)
  }
}

pub(crate) fn erase<N: CustomNode>(node: N) -> Box<dyn ErasedNode> {
  NodeCell::boxed(Custom(node))
}
