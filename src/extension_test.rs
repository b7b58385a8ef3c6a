//! # Extension Test Suite
//!
//! User-defined nodes are scheduled exactly like built-ins, and contract
//! violations fail the run instead of propagating stale values.

use crate::error::{NodeError, RunError};
use crate::{CustomNode, CycleContext, GraphBuilder, Input, NanoTime, NodeId, RunConfig};
use std::cell::Cell;
use std::rc::Rc;

fn ms(n: u64) -> NanoTime {
  NanoTime::from_millis(n)
}

/// Running maximum of one input.
struct RunningMax {
  input: Input<u64>,
}

impl CustomNode for RunningMax {
  type Output = u64;

  fn upstreams(&self) -> Vec<NodeId> {
    vec![self.input.id()]
  }

  fn label(&self) -> &str {
    "running_max"
  }

  fn cycle(&mut self, ctx: &CycleContext<'_>, value: &mut Option<u64>) -> Result<bool, NodeError> {
    let Some(next) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    if value.is_some_and(|max| max >= *next) {
      return Ok(false);
    }
    *value = Some(*next);
    Ok(true)
  }
}

/// Sums two inputs and counts its own evaluations.
struct CountingSum {
  left: Input<u64>,
  right: Input<u64>,
  evaluations: Rc<Cell<u32>>,
}

impl CustomNode for CountingSum {
  type Output = u64;

  fn upstreams(&self) -> Vec<NodeId> {
    vec![self.left.id(), self.right.id()]
  }

  fn cycle(&mut self, ctx: &CycleContext<'_>, value: &mut Option<u64>) -> Result<bool, NodeError> {
    self.evaluations.set(self.evaluations.get() + 1);
    match (ctx.get(self.left), ctx.get(self.right)) {
      (Some(l), Some(r)) => {
        *value = Some(l + r);
        Ok(true)
      }
      _ => Ok(false),
    }
  }
}

/// Declares upstreams but never provides `cycle`.
struct Unfinished {
  input: Input<u64>,
}

impl CustomNode for Unfinished {
  type Output = u64;

  fn upstreams(&self) -> Vec<NodeId> {
    vec![self.input.id()]
  }

  fn label(&self) -> &str {
    "unfinished"
  }
}

/// Claims to produce without setting a value.
struct Liar;

impl CustomNode for Liar {
  type Output = u64;

  fn upstreams(&self) -> Vec<NodeId> {
    Vec::new()
  }

  fn cycle(&mut self, _ctx: &CycleContext<'_>, _value: &mut Option<u64>) -> Result<bool, NodeError> {
    Ok(true)
  }
}

#[test]
fn test_custom_node_suppression_stops_downstream() {
  let builder = GraphBuilder::new();
  let source = builder.replay(
    [3u64, 1, 4, 1, 5]
      .into_iter()
      .enumerate()
      .map(|(i, v)| crate::Timestamped::new(ms(i as u64), v)),
  );
  let max = builder.register(RunningMax {
    input: source.input(),
  });
  let changes = max.collect();
  let mut graph = builder.build().unwrap();
  graph.run(RunConfig::historical()).unwrap();
  assert_eq!(graph.peek_value(&changes), Some(vec![3, 4, 5]));
  assert_eq!(graph.label(max.id()), Some("running_max"));
}

#[test]
fn test_custom_node_in_a_diamond_is_evaluated_once_per_cycle() {
  let evaluations = Rc::new(Cell::new(0));
  let builder = GraphBuilder::new();
  let count = builder.ticker(ms(1)).count();
  let doubled = count.map(|n| n * 2);
  let sum = builder.register(CountingSum {
    left: count.input(),
    right: doubled.input(),
    evaluations: evaluations.clone(),
  });
  let sums = sum.collect();
  let mut graph = builder.build().unwrap();
  graph.run(RunConfig::historical().with_cycles(3)).unwrap();
  assert_eq!(evaluations.get(), 3);
  assert_eq!(graph.peek_value(&sums), Some(vec![0, 3, 6]));
}

#[test]
fn test_missing_cycle_is_a_contract_violation() {
  let builder = GraphBuilder::new();
  let count = builder.ticker(ms(1)).count();
  let node = builder.register(Unfinished {
    input: count.input(),
  });
  let mut graph = builder.build().unwrap();
  match graph.run(RunConfig::historical().with_cycles(3)).unwrap_err() {
    RunError::NodeFailed {
      node: failed,
      label,
      source: NodeError::Contract(message),
    } => {
      assert_eq!(failed, node.id());
      assert_eq!(label, "unfinished");
      assert!(message.contains("cycle"));
    }
    other => panic!("unexpected error {other:?}"),
  }
  assert!(graph.is_poisoned());
}

#[test]
fn test_producing_without_a_value_is_a_contract_violation() {
  let builder = GraphBuilder::new();
  builder.register(Liar);
  let mut graph = builder.build().unwrap();
  let err = graph.run(RunConfig::historical().with_cycles(1)).unwrap_err();
  assert!(matches!(
    err,
    RunError::NodeFailed {
      source: NodeError::Contract(_),
      ..
    }
  ));
}

#[test]
fn test_custom_node_with_foreign_upstream_is_rejected() {
  let other = GraphBuilder::new();
  let foreign = other.constant(1u64);
  let builder = GraphBuilder::new();
  builder.register(RunningMax {
    input: foreign.input(),
  });
  assert!(builder.build().is_err());
}
