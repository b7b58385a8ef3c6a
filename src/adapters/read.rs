//! # Store Reader
//!
//! Source node replaying a store query in time order.
//!
//! The reader is generic over a [`StoreConnector`]: a [`StoreConnection`]
//! reads over TCP, and any other connector (an in-process
//! [`MemoryStore`](crate::store::MemoryStore), a client for another wire
//! protocol) plugs in the same way.

use crate::error::{AdapterError, GraphError, NodeError};
use crate::graph_builder::GraphBuilder;
use crate::node::{CycleContext, Operator, Schedule, StartContext};
use crate::record::{Record, Scalar};
use crate::store::{StoreClient, StoreConnection, StoreConnector};
use crate::stream::Stream;
use crate::time::{NanoTime, Timestamped};
use async_stream::try_stream;
use futures::{Stream as FuturesStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::debug;

/// Rows fetched per request unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
/// Chunks buffered ahead of the graph unless configured otherwise.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// What to read and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadConfig<C = StoreConnection> {
  /// Store location.
  pub connection: C,
  /// Query text.
  pub query: String,
  /// Column giving each row's timestamp.
  pub time_column: String,
  /// Rows per request.
  pub chunk_size: usize,
  /// Chunks buffered ahead of the graph.
  pub queue_depth: usize,
}

impl<C> ReadConfig<C> {
  /// Reads `query`, ordered by `time_column`, with default chunking.
  pub fn new(
    connection: C,
    query: impl Into<String>,
    time_column: impl Into<String>,
  ) -> Self {
    Self {
      connection,
      query: query.into(),
      time_column: time_column.into(),
      chunk_size: DEFAULT_CHUNK_SIZE,
      queue_depth: DEFAULT_QUEUE_DEPTH,
    }
  }

  /// Sets the rows per request.
  #[must_use]
  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  /// Sets the number of chunks buffered ahead.
  #[must_use]
  pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
    self.queue_depth = queue_depth;
    self
  }
}

type Chunk = Result<Vec<Timestamped<Record>>, AdapterError>;

/// Resume point of a paged query.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Cursor {
  pub(crate) from: Option<NanoTime>,
  pub(crate) skip: usize,
}

impl Cursor {
  /// Turns a page into records, checks time order, and moves past it.
  pub(crate) fn advance(
    &mut self,
    columns: &[String],
    rows: Vec<Vec<Scalar>>,
    time_column: &str,
  ) -> Result<Vec<Timestamped<Record>>, AdapterError> {
    let time_index = columns
      .iter()
      .position(|c| c == time_column)
      .ok_or_else(|| AdapterError::Schema(format!("result has no column {time_column}")))?;
    let mut chunk = Vec::with_capacity(rows.len());
    for row in rows {
      if row.len() != columns.len() {
        return Err(AdapterError::Protocol(format!(
          "row has {} values for {} columns",
          row.len(),
          columns.len()
        )));
      }
      let time = row[time_index].as_time().ok_or_else(|| {
        AdapterError::Schema(format!("{time_column} value {} is not a time", row[time_index]))
      })?;
      match self.from {
        Some(from) if time < from => {
          return Err(AdapterError::Unsorted(format!("{time} after {from}")));
        }
        Some(from) if time == from => self.skip += 1,
        _ => {
          self.from = Some(time);
          self.skip = 1;
        }
      }
      let record = columns.iter().cloned().zip(row).collect();
      chunk.push(Timestamped::new(time, record));
    }
    Ok(chunk)
  }
}

fn pages<C: StoreConnector>(config: ReadConfig<C>) -> impl FuturesStream<Item = Chunk> {
  try_stream! {
    let mut client = config.connection.connect().await?;
    let mut cursor = Cursor::default();
    loop {
      let (columns, rows) = client
        .query(
          &config.query,
          &config.time_column,
          cursor.from,
          cursor.skip,
          config.chunk_size,
        )
        .await?;
      let fetched = rows.len();
      let chunk = cursor.advance(&columns, rows, &config.time_column)?;
      debug!(store = %config.connection.describe(), rows = fetched, from = ?cursor.from, "fetched chunk");
      if !chunk.is_empty() {
        yield chunk;
      }
      if fetched < config.chunk_size {
        break;
      }
    }
  }
}

async fn fetch<C: StoreConnector>(config: ReadConfig<C>, sender: mpsc::Sender<Chunk>) {
  let pages = pages(config);
  futures::pin_mut!(pages);
  while let Some(page) = pages.next().await {
    let failed = page.is_err();
    if sender.send(page).await.is_err() || failed {
      break;
    }
  }
}

/// Source node backed by a background query.
struct StoreReader<C> {
  config: ReadConfig<C>,
  runtime: Option<Handle>,
  fetch_timeout: Duration,
  receiver: Option<mpsc::Receiver<Chunk>>,
  task: Option<JoinHandle<()>>,
  rows: VecDeque<Timestamped<Record>>,
  finished: bool,
}

impl<C> StoreReader<C> {
  fn new(config: ReadConfig<C>) -> Self {
    Self {
      config,
      runtime: None,
      fetch_timeout: Duration::from_secs(30),
      receiver: None,
      task: None,
      rows: VecDeque::new(),
      finished: false,
    }
  }

  /// Ensures a row is buffered unless the result is finished.
  fn fill(&mut self) -> Result<(), NodeError> {
    while self.rows.is_empty() && !self.finished {
      let (Some(receiver), Some(runtime)) = (self.receiver.as_mut(), self.runtime.as_ref()) else {
        return Err(NodeError::Contract("store reader used before start".to_string()));
      };
      let chunk = match receiver.try_recv() {
        Ok(chunk) => Some(chunk),
        Err(TryRecvError::Disconnected) => None,
        Err(TryRecvError::Empty) => {
          let timeout = self.fetch_timeout;
          runtime
            .block_on(async { tokio::time::timeout(timeout, receiver.recv()).await })
            .map_err(|_| AdapterError::Timeout(timeout))?
        }
      };
      match chunk {
        Some(chunk) => self.rows.extend(chunk?),
        None => self.finished = true,
      }
    }
    Ok(())
  }
}

impl<C: StoreConnector> Operator for StoreReader<C> {
  type Output = Timestamped<Record>;

  fn cycle(
    &mut self,
    ctx: &CycleContext<'_>,
    out: &mut Option<Timestamped<Record>>,
  ) -> Result<bool, NodeError> {
    self.fill()?;
    let due = self.rows.front().is_some_and(|row| row.time <= ctx.time());
    if !due {
      return Ok(false);
    }
    *out = self.rows.pop_front();
    Ok(out.is_some())
  }

  fn schedule(&self) -> Schedule {
    Schedule::Timed
  }

  fn next_event(&mut self) -> Result<Option<NanoTime>, NodeError> {
    self.fill()?;
    Ok(self.rows.front().map(|row| row.time))
  }

  fn exhausted(&self) -> bool {
    self.finished && self.rows.is_empty()
  }

  fn needs_runtime(&self) -> bool {
    true
  }

  fn start(&mut self, ctx: &StartContext) -> Result<(), NodeError> {
    let runtime = ctx.runtime()?;
    let (sender, receiver) = mpsc::channel(self.config.queue_depth.max(1));
    self.task = Some(runtime.spawn(fetch(self.config.clone(), sender)));
    self.receiver = Some(receiver);
    self.runtime = Some(runtime);
    self.fetch_timeout = ctx.fetch_timeout();
    Ok(())
  }

  fn stop(&mut self) -> Result<(), NodeError> {
    // The run may stop before the result is consumed; abandon the rest.
    self.receiver = None;
    if let Some(task) = self.task.take() {
      task.abort();
    }
    Ok(())
  }
}

impl GraphBuilder {
  /// A source replaying a store query in time order, one row per cycle.
  ///
  /// Each value carries the row's time column as its timestamp. The source is
  /// exhausted once the last row has been emitted.
  pub fn read_store<C: StoreConnector>(
    &self,
    config: ReadConfig<C>,
  ) -> Stream<'_, Timestamped<Record>> {
    if config.chunk_size == 0 {
      self.fail(GraphError::InvalidArgument {
        operator: "read_store",
        reason: "chunk size must be positive".to_string(),
      });
    }
    if config.time_column.is_empty() {
      self.fail(GraphError::InvalidArgument {
        operator: "read_store",
        reason: "time column must be named".to_string(),
      });
    }
    self.add("read_store", Vec::new(), StoreReader::new(config))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn columns() -> Vec<String> {
    vec!["time".to_string(), "v".to_string()]
  }

  fn row(t: u64, v: i64) -> Vec<Scalar> {
    vec![Scalar::Timestamp(NanoTime::new(t)), Scalar::Long(v)]
  }

  #[test]
  fn cursor_counts_rows_at_the_last_timestamp() {
    let mut cursor = Cursor::default();
    let chunk = cursor
      .advance(&columns(), vec![row(1, 0), row(2, 1), row(2, 2)], "time")
      .unwrap();
    assert_eq!(chunk.len(), 3);
    assert_eq!(chunk[2].payload.get("v"), Some(&Scalar::Long(2)));
    assert_eq!(
      cursor,
      Cursor {
        from: Some(NanoTime::new(2)),
        skip: 2
      }
    );

    cursor.advance(&columns(), vec![row(2, 3), row(5, 4)], "time").unwrap();
    assert_eq!(
      cursor,
      Cursor {
        from: Some(NanoTime::new(5)),
        skip: 1
      }
    );
  }

  #[test]
  fn cursor_rejects_rows_out_of_time_order() {
    let mut cursor = Cursor::default();
    let err = cursor
      .advance(&columns(), vec![row(5, 0), row(4, 1)], "time")
      .unwrap_err();
    assert!(matches!(err, AdapterError::Unsorted(_)));
  }

  #[test]
  fn cursor_requires_the_time_column() {
    let mut cursor = Cursor::default();
    let err = cursor.advance(&columns(), vec![row(1, 0)], "ts").unwrap_err();
    assert!(matches!(err, AdapterError::Schema(_)));
  }
}
