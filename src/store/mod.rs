//! # External Store
//!
//! A columnar time-series store reached over TCP, plus an in-process
//! implementation used for tests and local replays.
//!
//! - [`protocol`]: newline-delimited JSON requests and responses.
//! - [`client`]: the [`StoreConnector`] and [`StoreClient`] seams, and their TCP
//!   implementation.
//! - [`memory`]: [`MemoryStore`], tables held in memory.
//! - [`server`]: [`StoreServer`], serving a `MemoryStore` over TCP.

pub mod client;
pub mod memory;
pub mod protocol;
pub mod server;

pub use client::{Credentials, StoreClient, StoreConnection, StoreConnector, TcpStoreClient};
pub use memory::{MemoryStore, StoreError};
pub use protocol::{Request, Response};
pub use server::{StoreServer, StoreServerConfig};
