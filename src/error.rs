//! # Errors
//!
//! Error types for the three places a graph can fail:
//!
//! - **Construction** ([`GraphError`]): detected while the graph is assembled and
//!   reported by [`GraphBuilder::build`](crate::GraphBuilder::build), before any run.
//! - **Evaluation** ([`NodeError`]): raised by a single node during a cycle. The
//!   scheduler tags it with the node's identity and aborts the run.
//! - **Run** ([`RunError`]): everything that crosses the run boundary to the caller.
//!
//! Nothing is swallowed inside the graph and nothing is retried by the engine.

use crate::node::NodeId;
use thiserror::Error;

/// Boxed error raised by user-supplied node logic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors detected while the graph is being assembled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
  /// A dependency cycle was found while ordering the graph.
  #[error("dependency cycle through node {node} ({label})")]
  Cycle {
    /// A node on the cycle.
    node: NodeId,
    /// Its label.
    label: String,
  },
  /// An operator that needs at least one input received none.
  #[error("{operator} requires at least one input stream")]
  EmptyInput {
    /// Operator name.
    operator: &'static str,
  },
  /// An operator argument is out of range.
  #[error("invalid argument to {operator}: {reason}")]
  InvalidArgument {
    /// Operator name.
    operator: &'static str,
    /// What was wrong.
    reason: String,
  },
  /// A node refers to an upstream that does not exist in this graph.
  #[error("node {node} refers to unknown upstream {upstream}")]
  UnknownUpstream {
    /// The referring node.
    node: NodeId,
    /// The unknown reference.
    upstream: NodeId,
  },
  /// `build` was called a second time on the same builder.
  #[error("graph has already been built")]
  AlreadyBuilt,
}

/// Failures talking to the external store.
#[derive(Error, Debug)]
pub enum AdapterError {
  /// Connection or socket failure.
  #[error("store i/o error: {0}")]
  Io(#[from] std::io::Error),
  /// Malformed frame or unexpected response.
  #[error("store protocol error: {0}")]
  Protocol(String),
  /// The store rejected the request.
  #[error("store returned an error: {0}")]
  Remote(String),
  /// A value does not fit the declared column mapping.
  #[error("schema mismatch: {0}")]
  Schema(String),
  /// Query results were not sorted by the time column.
  #[error("rows out of time order: {0}")]
  Unsorted(String),
  /// No data arrived within the configured fetch timeout.
  #[error("timed out after {0:?} waiting for the store")]
  Timeout(std::time::Duration),
  /// The background transfer stopped unexpectedly.
  #[error("background transfer closed: {0}")]
  Closed(String),
}

impl From<serde_json::Error> for AdapterError {
  fn from(e: serde_json::Error) -> Self {
    AdapterError::Protocol(e.to_string())
  }
}

impl From<tokio_util::codec::LinesCodecError> for AdapterError {
  fn from(e: tokio_util::codec::LinesCodecError) -> Self {
    match e {
      tokio_util::codec::LinesCodecError::Io(io) => AdapterError::Io(io),
      other => AdapterError::Protocol(other.to_string()),
    }
  }
}

/// Error raised by one node while it is being evaluated.
#[derive(Error, Debug)]
pub enum NodeError {
  /// User logic failed.
  #[error(transparent)]
  Failed(BoxError),
  /// External store failure.
  #[error(transparent)]
  Adapter(#[from] AdapterError),
  /// The node broke the evaluation contract.
  #[error("contract violation: {0}")]
  Contract(String),
}

impl NodeError {
  /// Wraps any error raised by user logic.
  pub fn failed(error: impl Into<BoxError>) -> Self {
    NodeError::Failed(error.into())
  }
}

/// Errors surfaced by [`Graph::run`](crate::Graph::run).
#[derive(Error, Debug)]
pub enum RunError {
  /// A node failed during a cycle; the run was aborted and the cycle discarded.
  #[error("node {node} ({label}) failed: {source}")]
  NodeFailed {
    /// Failing node.
    node: NodeId,
    /// Its label.
    label: String,
    /// The original error.
    #[source]
    source: NodeError,
  },
  /// A previous run failed; the graph holds no trustworthy state.
  #[error("graph is poisoned by an earlier failed run")]
  Poisoned,
  /// The graph has already been run to completion.
  #[error("graph has already run")]
  AlreadyRun,
  /// The background runtime for adapters could not be created.
  #[error("failed to start adapter runtime: {0}")]
  Runtime(#[source] std::io::Error),
}

impl RunError {
  /// Identity of the failing node, if the error came from one.
  pub fn node(&self) -> Option<NodeId> {
    match self {
      RunError::NodeFailed { node, .. } => Some(*node),
      _ => None,
    }
  }
}
