//! # Graph Test Suite
//!
//! Construction and scheduling of [`Graph`].
//!
//! ## Test Coverage
//!
//! - **Ordering**: topological order, cycle detection, diamond sharing
//! - **Construction errors**: empty inputs, foreign handles, double build
//! - **Stop conditions**: cycles, duration, exhaustion and their combination
//! - **Failure**: node identity in errors and poisoning of the graph

use crate::error::{GraphError, NodeError, RunError};
use crate::graph::topological_order;
use crate::{Graph, GraphBuilder, NanoTime, RunConfig, RunStatus, Timestamped};
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

fn ms(n: u64) -> NanoTime {
  NanoTime::from_millis(n)
}

fn assert_respects_edges(order: &[usize], upstreams: &[Vec<usize>]) {
  let mut position = vec![usize::MAX; upstreams.len()];
  for (p, &node) in order.iter().enumerate() {
    position[node] = p;
  }
  for (node, ups) in upstreams.iter().enumerate() {
    for &up in ups {
      assert!(
        position[up] < position[node],
        "node {node} evaluated before its upstream {up}"
      );
    }
  }
}

// ============================================================================
// Topological order
// ============================================================================

#[test]
fn test_topological_order_of_a_diamond() {
  let upstreams = vec![vec![], vec![0], vec![0], vec![1, 2]];
  let order = topological_order(&upstreams).unwrap();
  assert_eq!(order.len(), 4);
  assert_eq!(order[0], 0);
  assert_eq!(order[3], 3);
  assert_respects_edges(&order, &upstreams);
}

#[test]
fn test_topological_order_detects_cycles() {
  let upstreams = vec![vec![], vec![0, 2], vec![1]];
  let node = topological_order(&upstreams).unwrap_err();
  assert!(node == 1 || node == 2);
}

#[test]
fn test_topological_order_detects_self_loop() {
  assert_eq!(topological_order(&[vec![0]]), Err(0));
}

proptest! {
  #[test]
  fn prop_topological_order_covers_every_node_once(
    raw in prop::collection::vec(prop::collection::vec(any::<usize>(), 0..4), 1..40)
  ) {
    // Only edges to earlier nodes, so the graph is acyclic.
    let upstreams: Vec<Vec<usize>> = raw
      .iter()
      .enumerate()
      .map(|(i, ups)| if i == 0 { Vec::new() } else { ups.iter().map(|u| u % i).collect() })
      .collect();
    let order = topological_order(&upstreams).unwrap();
    let mut seen = order.clone();
    seen.sort_unstable();
    prop_assert_eq!(seen, (0..upstreams.len()).collect::<Vec<_>>());
    assert_respects_edges(&order, &upstreams);
  }
}

#[test]
fn test_evaluation_order_puts_upstreams_first() {
  let builder = GraphBuilder::new();
  let a = builder.constant(1);
  let b = a.map(|x| x + 1);
  let c = a.bimap(&b, |x, y| x + y);
  let graph = builder.build().unwrap();

  let order = graph.evaluation_order();
  let position = |id| order.iter().position(|n| *n == id).unwrap();
  assert!(position(a.id()) < position(b.id()));
  assert!(position(b.id()) < position(c.id()));
  assert_eq!(graph.upstreams(c.id()), Some(&[a.id(), b.id()][..]));
  assert_eq!(graph.label(c.id()), Some("bimap"));
}

// ============================================================================
// Diamond sharing and propagation
// ============================================================================

#[test]
fn test_diamond_evaluates_shared_node_once_per_cycle() {
  let evaluations = Rc::new(Cell::new(0u32));
  let counter = evaluations.clone();

  let builder = GraphBuilder::new();
  let shared = builder.ticker(ms(1)).count().map(move |n| {
    counter.set(counter.get() + 1);
    *n
  });
  let left = shared.map(|n| n * 10);
  let right = shared.map(|n| n + 1);
  let joined = left.bimap(&right, |l, r| (*l, *r)).collect();
  let mut graph = builder.build().unwrap();

  let status = graph.run(RunConfig::historical().with_cycles(4)).unwrap();
  assert_eq!(status, RunStatus::CyclesComplete);
  assert_eq!(evaluations.get(), 4);
  // Both branches observe the same upstream value in every cycle.
  assert_eq!(
    graph.peek_value(&joined),
    Some(vec![(0, 1), (10, 2), (20, 3), (30, 4)])
  );
}

#[test]
fn test_suppressed_values_do_not_propagate() {
  let builder = GraphBuilder::new();
  let passed = builder
    .ticker(ms(1))
    .count()
    .filter(|n| n % 3 == 0)
    .count();
  let mut graph = builder.build().unwrap();
  graph.run(RunConfig::historical().with_cycles(7)).unwrap();
  // 0, 3 and 6 pass the filter.
  assert_eq!(graph.peek_value(&passed), Some(2));
}

#[test]
fn test_one_stream_feeds_many_consumers() {
  let builder = GraphBuilder::new();
  let source = builder.ticker(ms(1)).count();
  let doubled = source.map(|n| n * 2).collect();
  let squared = source.map(|n| n * n).collect();
  let mut graph = builder.build().unwrap();
  graph.run(RunConfig::historical().with_cycles(3)).unwrap();
  assert_eq!(graph.peek_value(&doubled), Some(vec![0, 2, 4]));
  assert_eq!(graph.peek_value(&squared), Some(vec![0, 1, 4]));
}

// ============================================================================
// Construction errors
// ============================================================================

#[test]
fn test_merge_of_nothing_is_rejected() {
  let builder = GraphBuilder::new();
  let _ = builder.merge::<u64>(&[]);
  assert_eq!(
    builder.build().unwrap_err(),
    GraphError::EmptyInput { operator: "merge" }
  );
}

#[test]
fn test_handles_from_another_builder_are_rejected() {
  let other = GraphBuilder::new();
  let foreign = other.ticker(ms(1));

  let builder = GraphBuilder::new();
  let _ = builder.constant(1).sample(&foreign);
  assert!(matches!(
    builder.build(),
    Err(GraphError::UnknownUpstream { upstream, .. }) if upstream == foreign.id()
  ));
}

#[test]
fn test_build_twice_is_rejected() {
  let builder = GraphBuilder::new();
  builder.constant(1);
  assert!(builder.build().is_ok());
  assert_eq!(builder.build().unwrap_err(), GraphError::AlreadyBuilt);
}

#[test]
fn test_nodes_chained_after_build_are_detached() {
  let builder = GraphBuilder::new();
  let count = builder.ticker(ms(1)).count();
  let mut graph = builder.build().unwrap();
  let late = count.map(|n| n + 1);
  assert_eq!(graph.len(), 2);
  assert_eq!(graph.label(late.id()), None);
  assert_eq!(graph.upstreams(late.id()), None);

  graph.run(RunConfig::historical().with_cycles(2)).unwrap();
  assert_eq!(graph.peek_value(&count), Some(1));
  assert_eq!(graph.peek(&late), None);
  assert!(!graph.ticked(&late));
  assert_eq!(builder.build().unwrap_err(), GraphError::AlreadyBuilt);
}

#[test]
fn test_invalid_arguments_surface_at_build() {
  let builder = GraphBuilder::new();
  let _ = builder.ticker(NanoTime::ZERO);
  assert!(matches!(
    builder.build(),
    Err(GraphError::InvalidArgument {
      operator: "ticker",
      ..
    })
  ));

  let builder = GraphBuilder::new();
  let _ = builder.constant(1).buffer(0);
  assert!(matches!(
    builder.build(),
    Err(GraphError::InvalidArgument {
      operator: "buffer",
      ..
    })
  ));
}

#[test]
fn test_empty_graph_builds_and_runs() {
  let builder = GraphBuilder::new();
  assert!(builder.is_empty());
  let mut graph: Graph = builder.build().unwrap();
  assert!(graph.is_empty());
  assert_eq!(
    graph.run(RunConfig::historical().with_cycles(2)).unwrap(),
    RunStatus::CyclesComplete
  );
}

// ============================================================================
// Stop conditions
// ============================================================================

#[test]
fn test_zero_cycles_evaluates_nothing() {
  let builder = GraphBuilder::new();
  let count = builder.ticker(ms(1)).count();
  let mut graph = builder.build().unwrap();
  let status = graph.run(RunConfig::historical().with_cycles(0)).unwrap();
  assert_eq!(status, RunStatus::CyclesComplete);
  assert_eq!(graph.peek(&count), None);
  assert!(!graph.ticked(&count));
}

#[test]
fn test_duration_bounds_logical_time() {
  let builder = GraphBuilder::new();
  let ticks = builder.ticker(ms(100)).collect();
  let mut graph = builder.build().unwrap();
  let status = graph
    .run(RunConfig::historical().with_duration(ms(350)))
    .unwrap();
  assert_eq!(status, RunStatus::DurationComplete);
  assert_eq!(
    graph.peek_value(&ticks),
    Some(vec![ms(0), ms(100), ms(200), ms(300)])
  );
}

#[test]
fn test_cycles_and_duration_stop_at_whichever_comes_first() {
  let builder = GraphBuilder::new();
  let count = builder.ticker(ms(100)).count();
  let mut graph = builder.build().unwrap();
  let status = graph
    .run(
      RunConfig::historical()
        .with_cycles(2)
        .with_duration(ms(1_000)),
    )
    .unwrap();
  assert_eq!(status, RunStatus::CyclesComplete);
  assert_eq!(graph.peek_value(&count), Some(1));

  let builder = GraphBuilder::new();
  let count = builder.ticker(ms(100)).count();
  let mut graph = builder.build().unwrap();
  let status = graph
    .run(
      RunConfig::historical()
        .with_cycles(100)
        .with_duration(ms(200)),
    )
    .unwrap();
  assert_eq!(status, RunStatus::DurationComplete);
  assert_eq!(graph.peek_value(&count), Some(2));
}

#[test]
fn test_exhausted_source_stops_the_run() {
  let builder = GraphBuilder::new();
  let events = (1..=3).map(|n| Timestamped::new(ms(n * 10), n));
  let seen = builder.replay(events).collect();
  let mut graph = builder.build().unwrap();
  assert_eq!(graph.run(RunConfig::historical()).unwrap(), RunStatus::Exhausted);
  assert_eq!(graph.peek_value(&seen), Some(vec![1, 2, 3]));
  assert_eq!(graph.status(), Some(RunStatus::Exhausted));
}

#[test]
fn test_historical_start_offsets_tick_times() {
  let builder = GraphBuilder::new();
  let ticks = builder.ticker(ms(5)).collect();
  let mut graph = builder.build().unwrap();
  graph
    .run(RunConfig::historical().with_start(ms(1_000)).with_cycles(2))
    .unwrap();
  assert_eq!(graph.peek_value(&ticks), Some(vec![ms(1_000), ms(1_005)]));
}

#[test]
fn test_realtime_run_follows_the_wall_clock() {
  let builder = GraphBuilder::new();
  let ticks = builder.ticker(ms(5)).collect();
  let mut graph = builder.build().unwrap();
  let before = NanoTime::now();
  let status = graph.run(RunConfig::realtime().with_cycles(3)).unwrap();
  assert_eq!(status, RunStatus::CyclesComplete);
  let ticks = graph.peek_value(&ticks).unwrap();
  assert_eq!(ticks.len(), 3);
  assert!(ticks[0] >= before);
  assert!(ticks.windows(2).all(|w| w[1] > w[0]));
}

// ============================================================================
// Failure
// ============================================================================

#[test]
fn test_node_failure_names_the_node_and_poisons_the_graph() {
  let builder = GraphBuilder::new();
  let counted = builder.ticker(ms(1)).count();
  let checked = counted.try_map(|n| if *n == 2 { Err("two is not allowed") } else { Ok(*n) });
  let mut graph = builder.build().unwrap();

  let err = graph.run(RunConfig::historical().with_cycles(10)).unwrap_err();
  assert_eq!(err.node(), Some(checked.id()));
  match &err {
    RunError::NodeFailed { label, source, .. } => {
      assert_eq!(label, "try_map");
      assert!(matches!(source, NodeError::Failed(e) if e.to_string() == "two is not allowed"));
    }
    other => panic!("unexpected error {other:?}"),
  }

  assert!(graph.is_poisoned());
  assert_eq!(graph.peek(&counted), None);
  assert_eq!(graph.peek(&checked), None);
  assert!(matches!(
    graph.run(RunConfig::historical()),
    Err(RunError::Poisoned)
  ));
}

#[test]
fn test_completed_graph_cannot_run_again() {
  let builder = GraphBuilder::new();
  builder.constant(1);
  let mut graph = builder.build().unwrap();
  graph.run(RunConfig::historical().with_cycles(1)).unwrap();
  assert!(matches!(
    graph.run(RunConfig::historical().with_cycles(1)),
    Err(RunError::AlreadyRun)
  ));
}
