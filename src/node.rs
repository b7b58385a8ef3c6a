//! # Node Contract
//!
//! Every vertex of a graph, built-in or user-defined, is an [`Operator`] held in
//! a type-erased slot owned by the graph. The scheduler evaluates slots in
//! topological order and hands each one a [`CycleContext`] with read access to
//! the slots that come before it, which always include all of its upstreams.
//!
//! ## Cycle contract
//!
//! [`Operator::cycle`] returns `Ok(true)` when the node's cached value changed this
//! cycle and must be visible downstream, and `Ok(false)` to suppress. The cached
//! value lives in the `out` slot passed to `cycle`; only the node itself writes it.
//!
//! ## Lifecycle
//!
//! 1. [`Operator::start`] once before the first cycle (adapters spawn their
//!    background I/O here).
//! 2. [`Operator::next_event`] before each clock advance, to find the next timed instant.
//! 3. [`Operator::cycle`] on every tick.
//! 4. [`Operator::commit`] after a walk in which every node succeeded. External
//!    side effects belong here so a failed cycle never leaks them.
//! 5. [`Operator::stop`] once after the last cycle of a successful run.

use crate::error::NodeError;
use crate::operators::logged::LogRecord;
use crate::time::{NanoTime, Tick};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

/// Values that can flow along an edge.
pub trait Element: Clone + fmt::Debug + 'static {}

impl<T: Clone + fmt::Debug + 'static> Element for T {}

/// Identity of a node within one graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
  pub(crate) graph: u64,
  pub(crate) index: usize,
}

impl NodeId {
  pub(crate) fn new(graph: u64, index: usize) -> Self {
    Self { graph, index }
  }

  /// Position of the node in creation order.
  pub fn index(&self) -> usize {
    self.index
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.index)
  }
}

/// Typed, lifetime-free reference to an upstream node's value.
///
/// Operators keep one `Input` per upstream and read through it with
/// [`CycleContext::get`] and [`CycleContext::ticked`].
pub struct Input<T> {
  id: NodeId,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Input<T> {
  pub(crate) fn new(id: NodeId) -> Self {
    Self {
      id,
      _marker: PhantomData,
    }
  }

  /// The referenced node.
  pub fn id(&self) -> NodeId {
    self.id
  }
}

impl<T> Clone for Input<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Input<T> {}

impl<T> fmt::Debug for Input<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Input").field(&self.id).finish()
  }
}

/// How a node relates to the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
  /// Fires only in response to upstream values.
  Derived,
  /// A source that fires on clock ticks. With a period, the node reports its
  /// due times through [`Operator::next_event`]; without one it fires on every
  /// tick and the historical clock steps on its own.
  Periodic(Option<NanoTime>),
  /// A source whose values carry their own timestamps and which reports
  /// them through [`Operator::next_event`].
  Timed,
}

/// Read access to the current cycle.
pub struct CycleContext<'a> {
  tick: Tick,
  visible: &'a [Slot],
  positions: &'a [usize],
}

impl<'a> CycleContext<'a> {
  pub(crate) fn new(tick: Tick, visible: &'a [Slot], positions: &'a [usize]) -> Self {
    Self {
      tick,
      visible,
      positions,
    }
  }

  /// The tick being evaluated.
  pub fn tick(&self) -> Tick {
    self.tick
  }

  /// Timestamp of the tick being evaluated.
  pub fn time(&self) -> NanoTime {
    self.tick.time
  }

  fn slot(&self, id: NodeId) -> Option<&'a Slot> {
    let position = *self.positions.get(id.index)?;
    let slot = self.visible.get(position)?;
    (slot.id == id).then_some(slot)
  }

  /// The upstream's cached value, or `None` if it has never produced.
  pub fn get<T: 'static>(&self, input: Input<T>) -> Option<&'a T> {
    self
      .slot(input.id)
      .and_then(|slot| slot.node.value())
      .and_then(|value| value.downcast_ref::<T>())
  }

  /// Whether the upstream produced a new value in this cycle.
  pub fn ticked<T>(&self, input: Input<T>) -> bool {
    self.slot(input.id).is_some_and(|slot| slot.produced)
  }

  /// The upstream's value, only if it produced in this cycle.
  pub fn fresh<T: 'static>(&self, input: Input<T>) -> Option<&'a T> {
    if self.ticked(input) {
      self.get(input)
    } else {
      None
    }
  }
}

/// State handed to [`Operator::commit`].
pub struct CommitContext<'a> {
  pub(crate) tick: Tick,
  pub(crate) produced: bool,
  pub(crate) records: Option<&'a mut Vec<LogRecord>>,
}

impl CommitContext<'_> {
  /// The tick that was just evaluated.
  pub fn tick(&self) -> Tick {
    self.tick
  }

  /// Whether this node produced in the committed cycle.
  pub fn produced(&self) -> bool {
    self.produced
  }

  /// Appends a diagnostic record when capture is enabled for the run.
  pub fn record(&mut self, record: LogRecord) {
    if let Some(records) = self.records.as_deref_mut() {
      records.push(record);
    }
  }
}

/// Run-wide settings handed to [`Operator::start`].
#[derive(Clone, Debug)]
pub struct StartContext {
  pub(crate) start: NanoTime,
  pub(crate) realtime: bool,
  pub(crate) fetch_timeout: Duration,
  pub(crate) runtime: Option<tokio::runtime::Handle>,
}

impl StartContext {
  /// Timestamp the run starts at.
  pub fn start(&self) -> NanoTime {
    self.start
  }

  /// Whether the run follows the wall clock.
  pub fn realtime(&self) -> bool {
    self.realtime
  }

  /// Upper bound on any wait for background data.
  pub fn fetch_timeout(&self) -> Duration {
    self.fetch_timeout
  }

  /// Runtime for background I/O. Present only for nodes whose
  /// [`Operator::needs_runtime`] returned true.
  pub fn runtime(&self) -> Result<tokio::runtime::Handle, NodeError> {
    self
      .runtime
      .clone()
      .ok_or_else(|| NodeError::Contract("node did not request a background runtime".to_string()))
  }
}

/// Behavior of a built-in node.
pub trait Operator: 'static {
  /// Type of the cached value.
  type Output: Element;

  /// Evaluates the node for the current tick.
  fn cycle(
    &mut self,
    ctx: &CycleContext<'_>,
    out: &mut Option<Self::Output>,
  ) -> Result<bool, NodeError>;

  /// How the node is driven by the clock.
  fn schedule(&self) -> Schedule {
    Schedule::Derived
  }

  /// Earliest future timestamp this node needs a cycle at, if any.
  ///
  /// [`Schedule::Timed`] sources report their next value's time here, and
  /// nodes holding timed work (such as `delay`) report when it falls due.
  /// The historical clock jumps to the earliest reported time.
  fn next_event(&mut self) -> Result<Option<NanoTime>, NodeError> {
    Ok(None)
  }

  /// Whether the node has permanently finished.
  fn exhausted(&self) -> bool {
    false
  }

  /// Whether the node needs a background runtime during the run.
  fn needs_runtime(&self) -> bool {
    false
  }

  /// Called once before the first cycle.
  fn start(&mut self, _ctx: &StartContext) -> Result<(), NodeError> {
    Ok(())
  }

  /// Called after every successful walk.
  fn commit(
    &mut self,
    _ctx: &mut CommitContext<'_>,
    _value: Option<&Self::Output>,
  ) -> Result<(), NodeError> {
    Ok(())
  }

  /// Called once after the last cycle of a successful run.
  fn stop(&mut self) -> Result<(), NodeError> {
    Ok(())
  }
}

/// Object-safe view of an operator and its cached value.
pub(crate) trait ErasedNode {
  fn cycle(&mut self, ctx: &CycleContext<'_>) -> Result<bool, NodeError>;
  fn value(&self) -> Option<&dyn Any>;
  fn schedule(&self) -> Schedule;
  fn next_event(&mut self) -> Result<Option<NanoTime>, NodeError>;
  fn exhausted(&self) -> bool;
  fn needs_runtime(&self) -> bool;
  fn start(&mut self, ctx: &StartContext) -> Result<(), NodeError>;
  fn commit(&mut self, ctx: &mut CommitContext<'_>) -> Result<(), NodeError>;
  fn stop(&mut self) -> Result<(), NodeError>;
}

pub(crate) struct NodeCell<O: Operator> {
  op: O,
  value: Option<O::Output>,
}

impl<O: Operator> NodeCell<O> {
  pub(crate) fn boxed(op: O) -> Box<dyn ErasedNode> {
    Box::new(Self { op, value: None })
  }
}

impl<O: Operator> ErasedNode for NodeCell<O> {
  fn cycle(&mut self, ctx: &CycleContext<'_>) -> Result<bool, NodeError> {
    self.op.cycle(ctx, &mut self.value)
  }

  fn value(&self) -> Option<&dyn Any> {
    self.value.as_ref().map(|v| v as &dyn Any)
  }

  fn schedule(&self) -> Schedule {
    self.op.schedule()
  }

  fn next_event(&mut self) -> Result<Option<NanoTime>, NodeError> {
    self.op.next_event()
  }

  fn exhausted(&self) -> bool {
    self.op.exhausted()
  }

  fn needs_runtime(&self) -> bool {
    self.op.needs_runtime()
  }

  fn start(&mut self, ctx: &StartContext) -> Result<(), NodeError> {
    self.op.start(ctx)
  }

  fn commit(&mut self, ctx: &mut CommitContext<'_>) -> Result<(), NodeError> {
    self.op.commit(ctx, self.value.as_ref())
  }

  fn stop(&mut self) -> Result<(), NodeError> {
    self.op.stop()
  }
}

/// A node as stored by the graph.
pub(crate) struct Slot {
  pub(crate) id: NodeId,
  pub(crate) label: String,
  pub(crate) upstreams: Vec<NodeId>,
  pub(crate) node: Box<dyn ErasedNode>,
  pub(crate) produced: bool,
}
