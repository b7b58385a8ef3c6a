//! # Operator Test Suite
//!
//! Behavior of the built-in operators inside running graphs.

use crate::error::{NodeError, RunError};
use crate::operators::{DelayOverflow, OutOfOrder};
use crate::{
  DelayConfig, Element, GraphBuilder, NanoTime, OverflowPolicy, RunConfig, RunStatus, Stream,
  Timestamped,
};
use std::cell::RefCell;
use std::rc::Rc;

fn ms(n: u64) -> NanoTime {
  NanoTime::from_millis(n)
}

fn ns(n: u64) -> NanoTime {
  NanoTime::new(n)
}

/// Runs the graph and returns everything `stream` produced.
fn run_collect<'g, T: Element>(
  builder: &'g GraphBuilder,
  stream: Stream<'g, T>,
  config: RunConfig,
) -> Vec<T> {
  let all = stream.collect();
  let mut graph = builder.build().unwrap();
  graph.run(config).unwrap();
  graph.peek_value(&all).unwrap_or_default()
}

fn events<T>(values: impl IntoIterator<Item = (u64, T)>) -> Vec<Timestamped<T>> {
  values
    .into_iter()
    .map(|(t, v)| Timestamped::new(ns(t), v))
    .collect()
}

// ============================================================================
// Sources
// ============================================================================

#[test]
fn test_count_then_filter_keeps_even_counts() {
  let builder = GraphBuilder::new();
  let evens = builder
    .ticker(ms(100))
    .count()
    .filter(|n| n % 2 == 0);
  let values = run_collect(&builder, evens, RunConfig::historical().with_cycles(7));
  assert_eq!(values, vec![0, 2, 4, 6]);
}

#[test]
fn test_constant_produces_every_cycle() {
  let builder = GraphBuilder::new();
  let values = builder.constant("x").count();
  let values = run_collect(&builder, values, RunConfig::historical().with_cycles(4));
  assert_eq!(values, vec![0, 1, 2, 3]);
}

#[test]
fn test_slower_ticker_fires_at_its_own_due_times() {
  let builder = GraphBuilder::new();
  let _fast = builder.ticker(ms(10));
  let slow = builder.ticker(ms(25));
  // Ticks: 0, 10, 20, 25, 30, 40, 50.
  let values = run_collect(&builder, slow, RunConfig::historical().with_cycles(7));
  assert_eq!(values, vec![ms(0), ms(25), ms(50)]);
}

#[test]
fn test_tickers_of_different_periods_keep_exact_times() {
  let builder = GraphBuilder::new();
  let fast = builder.ticker(ms(300)).collect();
  let slow = builder.ticker(ms(1_000)).collect();
  let mut graph = builder.build().unwrap();
  let status = graph
    .run(RunConfig::historical().with_duration(ms(3_000)))
    .unwrap();
  assert_eq!(status, RunStatus::DurationComplete);
  assert_eq!(
    graph.peek_value(&slow),
    Some(vec![ms(0), ms(1_000), ms(2_000), ms(3_000)])
  );
  let fast = graph.peek_value(&fast).unwrap();
  assert_eq!(fast.len(), 11);
  assert!(fast.iter().enumerate().all(|(k, t)| *t == ms(300 * k as u64)));
}

#[test]
fn test_ticker_only_fires_when_due() {
  let builder = GraphBuilder::new();
  let fast = builder.ticker(ms(300)).count();
  let slow = builder.ticker(ms(1_000)).count();
  let mut graph = builder.build().unwrap();
  // Ticks: 0, 300, 600, 900, 1000.
  graph.run(RunConfig::historical().with_cycles(5)).unwrap();
  assert_eq!(graph.peek_value(&fast), Some(3));
  assert_eq!(graph.peek_value(&slow), Some(1));
  assert!(graph.ticked(&slow));
  assert!(!graph.ticked(&fast));
}

#[test]
fn test_replay_emits_at_event_times() {
  let builder = GraphBuilder::new();
  let replayed = builder.replay(events([(5, 'a'), (9, 'b'), (9, 'c')]));
  let times = Rc::new(RefCell::new(Vec::new()));
  let sink = times.clone();
  let observed = replayed.for_each(move |v, t| sink.borrow_mut().push((*v, t)));
  let values = run_collect(&builder, observed, RunConfig::historical());
  assert_eq!(values, vec!['a', 'b', 'c']);
  assert_eq!(
    *times.borrow(),
    vec![('a', ns(5)), ('b', ns(9)), ('c', ns(9))]
  );
}

#[test]
fn test_replay_rejects_out_of_order_events() {
  let builder = GraphBuilder::new();
  let replayed = builder.replay(events([(5, 1), (3, 2)]));
  let _ = replayed.collect();
  let mut graph = builder.build().unwrap();
  match graph.run(RunConfig::historical()).unwrap_err() {
    RunError::NodeFailed {
      node,
      source: NodeError::Failed(e),
      ..
    } => {
      assert_eq!(node, replayed.id());
      assert!(e.downcast_ref::<OutOfOrder>().is_some());
    }
    other => panic!("unexpected error {other:?}"),
  }
}

// ============================================================================
// Transforms
// ============================================================================

#[test]
fn test_distinct_suppresses_repeats() {
  let builder = GraphBuilder::new();
  let source = builder.replay(events([(1, 1), (2, 1), (3, 2), (4, 2), (5, 2), (6, 3), (7, 1)]));
  let values = run_collect(&builder, source.distinct(), RunConfig::historical());
  assert_eq!(values, vec![1, 2, 3, 1]);
}

#[test]
fn test_limit_passes_n_values_then_exhausts() {
  let builder = GraphBuilder::new();
  let counted = builder.ticker(ms(1)).count();
  let limited = counted.limit(3).collect();
  let mut graph = builder.build().unwrap();
  assert_eq!(graph.run(RunConfig::historical()).unwrap(), RunStatus::Exhausted);
  assert_eq!(graph.peek_value(&limited), Some(vec![0, 1, 2]));
  // The run stopped in the cycle that delivered the last value.
  assert_eq!(graph.peek_value(&counted), Some(2));
}

#[test]
fn test_limit_zero_exhausts_on_first_cycle() {
  let builder = GraphBuilder::new();
  let counted = builder.ticker(ms(1)).count();
  let limited = counted.limit(0);
  let mut graph = builder.build().unwrap();
  assert_eq!(graph.run(RunConfig::historical()).unwrap(), RunStatus::Exhausted);
  assert_eq!(graph.peek(&limited), None);
  assert_eq!(graph.peek_value(&counted), Some(0));
}

#[test]
fn test_buffer_emits_a_sliding_window_once_full() {
  let builder = GraphBuilder::new();
  let windows = builder.ticker(ms(1)).count().buffer(3);
  let values = run_collect(&builder, windows, RunConfig::historical().with_cycles(5));
  assert_eq!(values, vec![vec![0, 1, 2], vec![1, 2, 3], vec![2, 3, 4]]);
}

#[test]
fn test_sample_reads_latest_value_when_trigger_fires() {
  let builder = GraphBuilder::new();
  let source = builder.ticker(ms(10)).count();
  let trigger = builder.ticker(ms(30));
  let values = run_collect(
    &builder,
    source.sample(&trigger),
    RunConfig::historical().with_cycles(7),
  );
  assert_eq!(values, vec![0, 3, 6]);
}

#[test]
fn test_bimap_pairs_latest_values_when_either_side_ticks() {
  let builder = GraphBuilder::new();
  let left = builder.replay(events([(1, 1), (3, 3)]));
  let right = builder.replay(events([(2, 10), (3, 30), (4, 40)]));
  let pairs = left.bimap(&right, |l, r| (*l, *r));
  let values = run_collect(&builder, pairs, RunConfig::historical());
  // t=1: right has no value yet; t=3: both ticked, evaluated once.
  assert_eq!(values, vec![(1, 10), (3, 30)]);
}

#[test]
fn test_average_is_a_running_mean() {
  let builder = GraphBuilder::new();
  let source = builder.replay(events([(1, 1i64), (2, 2), (3, 3), (4, 6)]));
  let values = run_collect(&builder, source.average(), RunConfig::historical());
  assert_eq!(values, vec![1.0, 1.5, 2.0, 3.0]);
}

#[test]
fn test_merge_prefers_earlier_inputs_on_ties() {
  let builder = GraphBuilder::new();
  let a = builder.replay(events([(1, "a1"), (3, "a3"), (9, "a9")]));
  let b = builder.replay(events([(2, "b2"), (3, "b3"), (9, "b9")]));
  let values = run_collect(&builder, a.merge(&[b]), RunConfig::historical());
  assert_eq!(values, vec!["a1", "b2", "a3", "a9"]);
}

#[test]
fn test_fold_accumulates() {
  let builder = GraphBuilder::new();
  let sums = builder
    .ticker(ms(1))
    .count()
    .fold(0u64, |acc, n| *acc += n);
  let values = run_collect(&builder, sums, RunConfig::historical().with_cycles(5));
  assert_eq!(values, vec![0, 1, 3, 6, 10]);
}

#[test]
fn test_not_negates_each_value() {
  let builder = GraphBuilder::new();
  let even = builder.ticker(ms(1)).count().map(|n| n % 2 == 0);
  let odd = !even;
  let values = run_collect(&builder, odd, RunConfig::historical().with_cycles(3));
  assert_eq!(values, vec![false, true, false]);
}

// ============================================================================
// Run end
// ============================================================================

#[test]
fn test_finally_receives_the_last_value_once() {
  let builder = GraphBuilder::new();
  let seen = Rc::new(RefCell::new(Vec::new()));
  let sink = seen.clone();
  let last = builder
    .ticker(ms(1))
    .count()
    .finally(move |value| sink.borrow_mut().push(value));
  let mut graph = builder.build().unwrap();
  graph.run(RunConfig::historical().with_cycles(4)).unwrap();
  assert_eq!(*seen.borrow(), vec![Some(3)]);
  assert_eq!(graph.label(last.id()), Some("finally"));
}

#[test]
fn test_finally_sees_none_when_upstream_never_produced() {
  let builder = GraphBuilder::new();
  let seen = Rc::new(RefCell::new(Vec::new()));
  let sink = seen.clone();
  let _ = builder
    .ticker(ms(1))
    .filter(|_| false)
    .finally(move |value| sink.borrow_mut().push(value));
  let mut graph = builder.build().unwrap();
  graph.run(RunConfig::historical().with_cycles(3)).unwrap();
  assert_eq!(*seen.borrow(), vec![None]);
}

#[test]
fn test_finally_is_skipped_when_the_run_fails() {
  let builder = GraphBuilder::new();
  let called = Rc::new(RefCell::new(false));
  let flag = called.clone();
  let _ = builder
    .ticker(ms(1))
    .count()
    .try_map(|n: &u64| if *n < 2 { Ok(*n) } else { Err("too large") })
    .finally(move |_| *flag.borrow_mut() = true);
  let mut graph = builder.build().unwrap();
  assert!(graph.run(RunConfig::historical().with_cycles(5)).is_err());
  assert!(!*called.borrow());
}

// ============================================================================
// Delay
// ============================================================================

#[test]
fn test_delay_reemits_values_after_the_span() {
  let builder = GraphBuilder::new();
  let delayed = builder.ticker(ns(10)).count().delay(ns(25));
  let seen = Rc::new(RefCell::new(Vec::new()));
  let sink = seen.clone();
  let _ = delayed.for_each(move |v, t| sink.borrow_mut().push((*v, t)));
  let mut graph = builder.build().unwrap();
  let status = graph
    .run(RunConfig::historical().with_duration(ns(60)))
    .unwrap();
  assert_eq!(status, RunStatus::DurationComplete);
  // The clock steps to each release time between ticker ticks.
  assert_eq!(
    *seen.borrow(),
    vec![(0, ns(25)), (1, ns(35)), (2, ns(45)), (3, ns(55))]
  );
}

#[test]
fn test_delay_overflow_fails_by_default() {
  let builder = GraphBuilder::new();
  let delayed = builder
    .ticker(ns(10))
    .count()
    .delay_with(DelayConfig::new(ns(1_000)).with_capacity(2));
  let mut graph = builder.build().unwrap();
  match graph.run(RunConfig::historical().with_cycles(5)).unwrap_err() {
    RunError::NodeFailed {
      node,
      source: NodeError::Failed(e),
      ..
    } => {
      assert_eq!(node, delayed.id());
      assert_eq!(
        e.downcast_ref::<DelayOverflow>().map(|o| o.capacity),
        Some(2)
      );
    }
    other => panic!("unexpected error {other:?}"),
  }
}

#[test]
fn test_delay_overflow_can_drop_oldest() {
  let builder = GraphBuilder::new();
  let delayed = builder
    .ticker(ns(10))
    .count()
    .filter(|n| *n < 4)
    .delay_with(
      DelayConfig::new(ns(100))
        .with_capacity(2)
        .with_overflow(OverflowPolicy::DropOldest),
    );
  let values = run_collect(
    &builder,
    delayed,
    RunConfig::historical().with_duration(ns(130)),
  );
  assert_eq!(values, vec![2, 3]);
}

#[test]
fn test_delay_with_zero_capacity_is_rejected() {
  let builder = GraphBuilder::new();
  let _ = builder
    .constant(1)
    .delay_with(DelayConfig::new(ns(1)).with_capacity(0));
  assert!(builder.build().is_err());
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_logged_records_are_captured_at_commit() {
  let builder = GraphBuilder::new();
  let logged = builder.ticker(ms(100)).count().logged("n");
  let mut graph = builder.build().unwrap();
  graph
    .run(
      RunConfig::historical()
        .with_cycles(3)
        .with_capture_logged(true),
    )
    .unwrap();
  assert_eq!(graph.label(logged.id()), Some("logged(n)"));
  let records: Vec<_> = graph
    .diagnostics()
    .iter()
    .map(|r| (r.label.as_str(), r.time, r.value.as_str()))
    .collect();
  assert_eq!(
    records,
    vec![("n", ms(0), "0"), ("n", ms(100), "1"), ("n", ms(200), "2")]
  );
}

#[test]
fn test_logged_capture_is_off_by_default() {
  let builder = GraphBuilder::new();
  builder.constant(1).logged("one");
  let mut graph = builder.build().unwrap();
  graph.run(RunConfig::historical().with_cycles(2)).unwrap();
  assert!(graph.diagnostics().is_empty());
}
