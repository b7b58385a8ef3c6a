//! # CycleWeave
//!
//! A synchronous, cycle-driven dataflow engine for time-series computation.
//!
//! A graph of typed nodes is built with [`GraphBuilder`] and then driven by a
//! clock. On every tick each node is evaluated at most once, after all of its
//! upstreams, and decides whether to propagate a new value downstream. The
//! same graph runs against virtual time (historical replay, deterministic and
//! as fast as the data allows) or against the wall clock.
//!
//! ## Key Features
//!
//! - **Cycle semantics**: topological evaluation, diamond sharing, and
//!   propagation suppression when a node has nothing new to say
//! - **Two clocks**: historical replay that jumps straight to the next event,
//!   and a real-time clock that coalesces overruns
//! - **Operator catalog**: constant, ticker, map, filter, distinct, delay,
//!   buffer, sample, limit, collect, bimap, average, logged and more
//! - **Extension protocol**: user nodes with `upstreams` and `cycle` scheduled
//!   exactly like built-ins
//! - **Store adapters**: paged time-ordered reads and batched writes against an
//!   external columnar store, with the network I/O kept off the cycle thread
//!
//! ## Quick Start
//!
//! ```rust
//! use cycleweave::{GraphBuilder, NanoTime, RunConfig};
//!
//! let builder = GraphBuilder::new();
//! let evens = builder
//!   .ticker(NanoTime::from_millis(100))
//!   .count()
//!   .filter(|n| n % 2 == 0)
//!   .collect();
//! let mut graph = builder.build().unwrap();
//! graph.run(RunConfig::historical().with_cycles(7)).unwrap();
//! assert_eq!(graph.peek_value(&evens), Some(vec![0, 2, 4, 6]));
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Background-runtime adapters to the external store.
pub mod adapters;
/// Historical and real-time clocks.
pub mod clock;
/// Run options and outcomes.
pub mod config;
/// Error types for construction, node evaluation, adapters and runs.
pub mod error;
/// User-defined nodes.
pub mod extension;
/// Built graphs and the scheduler.
pub mod graph;
/// Graph construction.
pub mod graph_builder;
/// Default `tracing` subscriber setup.
pub mod logging;
/// Node identities, contexts and the operator trait.
pub mod node;
/// Built-in operators.
pub mod operators;
/// Typed records exchanged with the store.
pub mod record;
/// The external store: protocol, client, server and in-memory backend.
pub mod store;
/// Typed stream handles and chaining operators.
pub mod stream;
/// Nanosecond timestamps and ticks.
pub mod time;

#[cfg(test)]
mod extension_test;
#[cfg(test)]
mod graph_test;
#[cfg(test)]
mod operators_test;

pub use adapters::{ReadConfig, WriteConfig};
pub use config::{RunConfig, RunStatus};
pub use error::{AdapterError, BoxError, GraphError, NodeError, RunError};
pub use extension::CustomNode;
pub use graph::Graph;
pub use graph_builder::GraphBuilder;
pub use node::{CommitContext, CycleContext, Element, Input, NodeId, Operator, Schedule, StartContext};
pub use operators::{DelayConfig, LogRecord, OverflowPolicy};
pub use record::{AsRecord, ColumnSpec, ColumnType, Record, Scalar};
pub use store::{MemoryStore, StoreClient, StoreConnection, StoreConnector, StoreServer, StoreServerConfig};
pub use stream::Stream;
pub use time::{NanoTime, Tick, Timestamped};
