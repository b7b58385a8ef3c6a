//! # Store Adapters
//!
//! Bridges between a running graph and the external store.
//!
//! Both adapters do their network I/O on the run's background runtime and
//! exchange data with the scheduler thread through bounded queues:
//!
//! - [`read`]: a timed source. A background task pages through the query
//!   result and pushes chunks into the queue; the node pops one row per cycle.
//!   When the queue is empty and more data is coming, the scheduler waits for
//!   it, bounded by the run's `fetch_timeout`.
//! - [`write`]: a chaining sink. Rows staged during a cycle are released at
//!   commit, batched, and handed to a background writer. A full queue blocks
//!   the scheduler (backpressure). Outstanding batches are drained when the
//!   run stops, and a failed write fails the run.

pub mod read;
pub mod write;

pub use read::ReadConfig;
pub use write::WriteConfig;
