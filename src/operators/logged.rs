//! # Logged
//!
//! Identity operator with an observable side effect: every produced value is
//! emitted as a `tracing` event on the `cycleweave::logged` target, and, when
//! the run enables capture, appended to [`Graph::diagnostics`](crate::Graph::diagnostics).
//! Both happen at commit, so a cycle that fails leaves no record behind.

use crate::error::NodeError;
use crate::node::{CommitContext, CycleContext, Input, Operator};
use crate::time::NanoTime;
use crate::Element;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One value observed by a `logged` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
  /// Label given to the node.
  pub label: String,
  /// Tick time the value was produced at.
  pub time: NanoTime,
  /// `Debug` rendering of the value.
  pub value: String,
}

/// Pass-through that reports every produced value.
pub struct Logged<T> {
  input: Input<T>,
  label: String,
}

impl<T: Element> Logged<T> {
  /// Creates the operator.
  pub fn new(input: Input<T>, label: impl Into<String>) -> Self {
    Self {
      input,
      label: label.into(),
    }
  }
}

impl<T: Element> Operator for Logged<T> {
  type Output = T;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<T>) -> Result<bool, NodeError> {
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    *out = Some(value.clone());
    Ok(true)
  }

  fn commit(&mut self, ctx: &mut CommitContext<'_>, value: Option<&T>) -> Result<(), NodeError> {
    if !ctx.produced() {
      return Ok(());
    }
    let Some(value) = value else {
      return Ok(());
    };
    let time = ctx.tick().time;
    let rendered = format!("{value:?}");
    info!(target: "cycleweave::logged", label = %self.label, time = %time, value = %rendered, "logged");
    ctx.record(LogRecord {
      label: self.label.clone(),
      time,
      value: rendered,
    });
    Ok(())
  }
}
