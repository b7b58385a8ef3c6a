//! # Graph
//!
//! An immutable DAG of nodes plus its evaluation order, and the scheduler that
//! drives it.
//!
//! ## Evaluation order
//!
//! The order is computed once, at build time, by a depth-first walk from the
//! terminal nodes (those nobody consumes) back through their upstreams. A node
//! is emitted after all of its upstreams, and a node reached along several
//! paths is emitted once, so in a diamond the shared ancestor is evaluated
//! exactly once per cycle and both branches observe the same value. A back
//! edge found during the walk is a construction error.
//!
//! ## Cycle
//!
//! 1. Ask timed sources for their next event and advance the clock.
//! 2. Evaluate every node in order. Each sees its upstreams' cached values and
//!    whether they produced this cycle, and reports whether it produced.
//! 3. Commit: release deferred side effects (store writes, logged records).
//! 4. Check the stop conditions: cycle count, then duration, then exhaustion.
//!
//! A node error aborts the run with the node's identity. The cycle is not
//! committed and the graph is poisoned, so no partially evaluated state can be
//! observed afterwards.
//!
//! [`Graph::run`] blocks the calling thread. Adapters that talk to the external
//! store get a private background runtime for the duration of the run, so `run`
//! must not be called from inside an async task (use `spawn_blocking`).

use crate::clock::{Clock, HistoricalClock, RealTimeClock};
use crate::config::{DEFAULT_PERIOD, RunConfig, RunStatus};
use crate::error::{GraphError, NodeError, RunError};
use crate::graph_builder::PendingNode;
use crate::node::{CommitContext, CycleContext, Input, NodeId, Schedule, Slot, StartContext};
use crate::operators::logged::LogRecord;
use crate::stream::Stream;
use crate::time::{NanoTime, Tick};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
  Ready,
  Finished(RunStatus),
  Poisoned,
}

/// A built dataflow graph.
pub struct Graph {
  id: u64,
  slots: Vec<Slot>,
  /// Evaluation position of each node, indexed by creation order.
  positions: Vec<usize>,
  state: GraphState,
  diagnostics: Vec<LogRecord>,
}

impl std::fmt::Debug for Graph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Graph")
      .field("id", &self.id)
      .field("nodes", &self.slots.len())
      .field("state", &self.state)
      .finish()
  }
}

/// Orders nodes so that every node follows all of its upstreams.
///
/// `upstreams[i]` lists the upstream indices of node `i`. The walk starts from
/// terminal nodes in index order, then from anything left unvisited (which can
/// only be part of, or feed, a cycle). On a cycle, returns a node on it.
pub(crate) fn topological_order(upstreams: &[Vec<usize>]) -> Result<Vec<usize>, usize> {
  #[derive(Clone, Copy, PartialEq)]
  enum Mark {
    Unvisited,
    Active,
    Done,
  }

  let n = upstreams.len();
  let mut consumed = vec![false; n];
  for ups in upstreams {
    for &up in ups {
      if up < n {
        consumed[up] = true;
      }
    }
  }
  let roots = (0..n)
    .filter(|&i| !consumed[i])
    .chain((0..n).filter(|&i| consumed[i]));

  let mut marks = vec![Mark::Unvisited; n];
  let mut order = Vec::with_capacity(n);
  let mut stack: Vec<(usize, usize)> = Vec::new();
  for root in roots {
    if marks[root] != Mark::Unvisited {
      continue;
    }
    marks[root] = Mark::Active;
    stack.push((root, 0));
    while let Some(top) = stack.last_mut() {
      let node = top.0;
      match upstreams[node].get(top.1).copied() {
        Some(up) => {
          top.1 += 1;
          match marks.get(up).copied() {
            Some(Mark::Unvisited) => {
              marks[up] = Mark::Active;
              stack.push((up, 0));
            }
            Some(Mark::Active) => return Err(up),
            _ => {}
          }
        }
        None => {
          marks[node] = Mark::Done;
          order.push(node);
          stack.pop();
        }
      }
    }
  }
  Ok(order)
}

impl Graph {
  pub(crate) fn from_nodes(id: u64, nodes: Vec<PendingNode>) -> Result<Self, GraphError> {
    let upstreams: Vec<Vec<usize>> = nodes
      .iter()
      .map(|node| node.upstreams.iter().map(NodeId::index).collect())
      .collect();
    let order = topological_order(&upstreams).map_err(|index| GraphError::Cycle {
      node: NodeId::new(id, index),
      label: nodes[index].label.clone(),
    })?;

    let mut positions = vec![0; nodes.len()];
    for (position, &index) in order.iter().enumerate() {
      positions[index] = position;
    }
    let mut pending: Vec<Option<PendingNode>> = nodes.into_iter().map(Some).collect();
    let slots = order
      .iter()
      .filter_map(|&index| {
        pending[index].take().map(|node| Slot {
          id: NodeId::new(id, index),
          label: node.label,
          upstreams: node.upstreams,
          node: node.node,
          produced: false,
        })
      })
      .collect();

    Ok(Self {
      id,
      slots,
      positions,
      state: GraphState::Ready,
      diagnostics: Vec::new(),
    })
  }

  /// Number of nodes.
  pub fn len(&self) -> usize {
    self.slots.len()
  }

  /// Whether the graph has no nodes.
  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  /// Node identities in evaluation order.
  pub fn evaluation_order(&self) -> Vec<NodeId> {
    self.slots.iter().map(|slot| slot.id).collect()
  }

  /// Upstreams of a node, in declaration order.
  pub fn upstreams(&self, node: NodeId) -> Option<&[NodeId]> {
    self.slot(node).map(|slot| slot.upstreams.as_slice())
  }

  /// Label of a node.
  pub fn label(&self, node: NodeId) -> Option<&str> {
    self.slot(node).map(|slot| slot.label.as_str())
  }

  /// Status of the completed run, if any.
  pub fn status(&self) -> Option<RunStatus> {
    match self.state {
      GraphState::Finished(status) => Some(status),
      _ => None,
    }
  }

  /// Whether a failed run left the graph unusable.
  pub fn is_poisoned(&self) -> bool {
    self.state == GraphState::Poisoned
  }

  /// Records captured from `logged` nodes when the run enabled capture.
  pub fn diagnostics(&self) -> &[LogRecord] {
    &self.diagnostics
  }

  fn slot(&self, node: NodeId) -> Option<&Slot> {
    if node.graph != self.id {
      return None;
    }
    let position = *self.positions.get(node.index)?;
    self.slots.get(position)
  }

  fn peek_input<T: 'static>(&self, input: Input<T>) -> Option<&T> {
    if self.state == GraphState::Poisoned {
      return None;
    }
    self
      .slot(input.id())?
      .node
      .value()?
      .downcast_ref::<T>()
  }

  /// Latest cached value of a node.
  ///
  /// `None` if the node never produced, the handle belongs to another graph,
  /// or the graph is poisoned.
  pub fn peek<T: 'static>(&self, stream: &Stream<'_, T>) -> Option<&T> {
    self.peek_input(stream.input())
  }

  /// Owned copy of [`peek`](Self::peek).
  pub fn peek_value<T: Clone + 'static>(&self, stream: &Stream<'_, T>) -> Option<T> {
    self.peek(stream).cloned()
  }

  /// Whether the node produced in the last evaluated cycle.
  pub fn ticked<T>(&self, stream: &Stream<'_, T>) -> bool {
    self.state != GraphState::Poisoned
      && self.slot(stream.id()).is_some_and(|slot| slot.produced)
  }

  /// Runs the graph until a stop condition holds.
  ///
  /// # Errors
  ///
  /// [`RunError::NodeFailed`] when a node fails (the graph is then poisoned),
  /// [`RunError::Poisoned`] or [`RunError::AlreadyRun`] when the graph cannot
  /// run again, and [`RunError::Runtime`] when the adapter runtime cannot start.
  pub fn run(&mut self, config: RunConfig) -> Result<RunStatus, RunError> {
    match self.state {
      GraphState::Poisoned => return Err(RunError::Poisoned),
      GraphState::Finished(_) => return Err(RunError::AlreadyRun),
      GraphState::Ready => {}
    }
    match self.execute(&config) {
      Ok(status) => {
        self.state = GraphState::Finished(status);
        Ok(status)
      }
      Err(e) => {
        error!(error = %e, "run aborted");
        self.state = GraphState::Poisoned;
        self.diagnostics.clear();
        Err(e)
      }
    }
  }

  fn execute(&mut self, config: &RunConfig) -> Result<RunStatus, RunError> {
    let runtime = if self.slots.iter().any(|slot| slot.node.needs_runtime()) {
      let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("cycleweave-io")
        .enable_all()
        .build()
        .map_err(RunError::Runtime)?;
      Some(runtime)
    } else {
      None
    };

    let start = if config.realtime {
      NanoTime::now()
    } else {
      config.start
    };
    let ctx = StartContext {
      start,
      realtime: config.realtime,
      fetch_timeout: config.fetch_timeout,
      runtime: runtime.as_ref().map(|rt| rt.handle().clone()),
    };
    for slot in &mut self.slots {
      slot
        .node
        .start(&ctx)
        .map_err(|e| node_failed(slot, e))?;
    }

    let mut ticker_period: Option<NanoTime> = None;
    let mut every_tick = false;
    let mut self_timed = false;
    for slot in &self.slots {
      match slot.node.schedule() {
        Schedule::Derived => {}
        Schedule::Periodic(None) => every_tick = true,
        Schedule::Periodic(Some(p)) => {
          self_timed = true;
          ticker_period = Some(ticker_period.map_or(p, |q| q.min(p)));
        }
        Schedule::Timed => self_timed = true,
      }
    }
    let period = config
      .period
      .or(ticker_period)
      .unwrap_or(DEFAULT_PERIOD);
    let mut clock: Box<dyn Clock> = if config.realtime {
      Box::new(RealTimeClock::new(period))
    } else {
      let synthetic = config.period.is_some() || every_tick || !self_timed;
      Box::new(HistoricalClock::new(start, period, synthetic))
    };

    info!(
      realtime = config.realtime,
      cycles = ?config.cycles,
      duration = ?config.duration,
      period = %period,
      nodes = self.slots.len(),
      "starting run"
    );
    let (status, cycles) = self.drive(clock.as_mut(), config, start)?;

    for slot in &mut self.slots {
      slot.node.stop().map_err(|e| node_failed(slot, e))?;
    }
    if let Some(runtime) = runtime {
      runtime.shutdown_timeout(Duration::from_secs(1));
    }
    info!(status = ?status, cycles, "run finished");
    Ok(status)
  }

  fn drive(
    &mut self,
    clock: &mut dyn Clock,
    config: &RunConfig,
    start: NanoTime,
  ) -> Result<(RunStatus, u64), RunError> {
    let wall_start = Instant::now();
    let mut cycles = 0u64;
    if config.cycles == Some(0) {
      return Ok((RunStatus::CyclesComplete, cycles));
    }
    loop {
      let next_event = self.next_event()?;
      let Some(tick) = clock.next_tick(next_event) else {
        return Ok((RunStatus::Exhausted, cycles));
      };
      if let Some(duration) = config.duration {
        if !config.realtime && tick.time.saturating_sub(start) > duration {
          return Ok((RunStatus::DurationComplete, cycles));
        }
      }

      debug!(cycle = tick.cycle, time = %tick.time, "cycle");
      self.walk(tick)?;
      self.commit(tick, config.capture_logged)?;
      cycles += 1;

      if config.cycles.is_some_and(|limit| cycles >= limit) {
        return Ok((RunStatus::CyclesComplete, cycles));
      }
      if let Some(duration) = config.duration {
        let elapsed = if config.realtime {
          NanoTime::from(wall_start.elapsed())
        } else {
          tick.time.saturating_sub(start)
        };
        if elapsed >= duration {
          return Ok((RunStatus::DurationComplete, cycles));
        }
      }
      if self.slots.iter().any(|slot| slot.node.exhausted()) {
        return Ok((RunStatus::Exhausted, cycles));
      }
    }
  }

  fn next_event(&mut self) -> Result<Option<NanoTime>, RunError> {
    let mut earliest: Option<NanoTime> = None;
    for slot in &mut self.slots {
      if let Some(time) = slot.node.next_event().map_err(|e| node_failed(slot, e))? {
        earliest = Some(earliest.map_or(time, |t| t.min(time)));
      }
    }
    Ok(earliest)
  }

  fn walk(&mut self, tick: Tick) -> Result<(), RunError> {
    let positions = &self.positions;
    for position in 0..self.slots.len() {
      let (visible, rest) = self.slots.split_at_mut(position);
      let slot = &mut rest[0];
      let ctx = CycleContext::new(tick, visible, positions);
      slot.produced = slot
        .node
        .cycle(&ctx)
        .map_err(|e| node_failed(slot, e))?;
      trace!(node = %slot.id, label = %slot.label, produced = slot.produced, "evaluated");
    }
    Ok(())
  }

  fn commit(&mut self, tick: Tick, capture: bool) -> Result<(), RunError> {
    let diagnostics = &mut self.diagnostics;
    for slot in &mut self.slots {
      let mut ctx = CommitContext {
        tick,
        produced: slot.produced,
        records: if capture { Some(&mut *diagnostics) } else { None },
      };
      slot
        .node
        .commit(&mut ctx)
        .map_err(|e| node_failed(slot, e))?;
    }
    Ok(())
  }
}

fn node_failed(slot: &Slot, source: NodeError) -> RunError {
  RunError::NodeFailed {
    node: slot.id,
    label: slot.label.clone(),
    source,
  }
}
