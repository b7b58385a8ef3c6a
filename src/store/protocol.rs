//! # Wire Protocol
//!
//! One JSON object per line in each direction. Every request receives exactly
//! one response, in order.
//!
//! ```text
//! > {"op":"query","query":"select from trades","time_column":"time","from":null,"skip":0,"limit":2}
//! < {"status":"rows","columns":["price","time"],"rows":[[...],[...]]}
//! ```
//!
//! Queries page through results with a `(from, skip)` cursor: rows with a time
//! at or after `from`, minus the first `skip` rows whose time equals `from`.
//! Rows sharing a timestamp across a page boundary are therefore neither lost
//! nor repeated.

use crate::record::{ColumnSpec, Scalar};
use crate::time::NanoTime;
use serde::{Deserialize, Serialize};

/// Upper bound on a single frame, in bytes.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
  /// Authenticates the connection.
  Login {
    /// User name.
    username: String,
    /// Password.
    password: String,
  },
  /// Reads one page of a query's result, sorted by `time_column`.
  Query {
    /// Query text.
    query: String,
    /// Column that orders the result.
    time_column: String,
    /// Lower time bound of the page, inclusive.
    from: Option<NanoTime>,
    /// Rows at exactly `from` already seen.
    skip: usize,
    /// Maximum rows in the page.
    limit: usize,
  },
  /// Appends rows to a table, creating it on first use.
  Insert {
    /// Target table.
    table: String,
    /// Column layout of `rows`.
    columns: Vec<ColumnSpec>,
    /// Row values, in column order.
    rows: Vec<Vec<Scalar>>,
  },
  /// Liveness check.
  Ping,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
  /// A page of query results.
  Rows {
    /// Column names.
    columns: Vec<String>,
    /// Row values, in column order.
    rows: Vec<Vec<Scalar>>,
  },
  /// Rows appended by an insert.
  Inserted {
    /// Number of rows.
    count: usize,
  },
  /// Login accepted.
  LoggedIn,
  /// Reply to [`Request::Ping`].
  Pong,
  /// The request failed.
  Error {
    /// Reason.
    message: String,
  },
}
