//! # Store Writer
//!
//! Sink chained onto a stream of records. Each produced value becomes one row:
//! the tick time in the time column, followed by the configured columns read
//! from the record's fields and coerced to their declared types.
//!
//! Rows are staged during the cycle and only released at commit, so a cycle
//! that aborts never reaches the store. Like the reader, the writer works with
//! any [`StoreConnector`].

use crate::error::{AdapterError, GraphError, NodeError};
use crate::node::{CommitContext, CycleContext, Input, Operator, StartContext};
use crate::record::{AsRecord, ColumnSpec, ColumnType, Scalar};
use crate::store::{StoreClient, StoreConnection, StoreConnector};
use crate::stream::Stream;
use crate::time::NanoTime;
use crate::Element;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::mem;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Rows per insert unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;
/// Batches queued for the writer unless configured otherwise.
pub const DEFAULT_WRITE_QUEUE_DEPTH: usize = 4;

/// Where and how to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConfig<C = StoreConnection> {
  /// Store location.
  pub connection: C,
  /// Target table.
  pub table: String,
  /// Name of the leading time column.
  pub time_column: String,
  /// Record fields to store, in column order.
  pub columns: Vec<ColumnSpec>,
  /// Rows per insert.
  pub batch_size: usize,
  /// Batches queued ahead of the writer before the graph blocks.
  pub queue_depth: usize,
}

impl<C> WriteConfig<C> {
  /// Writes `columns` to `table` with default batching.
  pub fn new(connection: C, table: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
    Self {
      connection,
      table: table.into(),
      time_column: "time".to_string(),
      columns,
      batch_size: DEFAULT_BATCH_SIZE,
      queue_depth: DEFAULT_WRITE_QUEUE_DEPTH,
    }
  }

  /// Sets the time column's name.
  #[must_use]
  pub fn with_time_column(mut self, name: impl Into<String>) -> Self {
    self.time_column = name.into();
    self
  }

  /// Sets the rows per insert.
  #[must_use]
  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  /// Sets the number of queued batches.
  #[must_use]
  pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
    self.queue_depth = queue_depth;
    self
  }

  /// Full table layout: the time column, then the mapped columns.
  pub fn layout(&self) -> Vec<ColumnSpec> {
    let mut layout = Vec::with_capacity(self.columns.len() + 1);
    layout.push(ColumnSpec::new(self.time_column.clone(), ColumnType::Timestamp));
    layout.extend(self.columns.iter().cloned());
    layout
  }

  fn validate(&self) -> Result<(), String> {
    if self.table.is_empty() {
      return Err("table must be named".to_string());
    }
    if self.batch_size == 0 {
      return Err("batch size must be positive".to_string());
    }
    let layout = self.layout();
    for (index, column) in layout.iter().enumerate() {
      if layout[..index].iter().any(|c| c.name == column.name) {
        return Err(format!("column {} is mapped twice", column.name));
      }
    }
    Ok(())
  }
}

type Batch = Vec<Vec<Scalar>>;

/// Builds the row for one value.
pub(crate) fn to_row(
  time: NanoTime,
  value: &impl AsRecord,
  columns: &[ColumnSpec],
) -> Result<Vec<Scalar>, AdapterError> {
  let record = value.as_record();
  let mut row = Vec::with_capacity(columns.len() + 1);
  row.push(Scalar::Timestamp(time));
  for column in columns {
    let field = record
      .get(&column.name)
      .ok_or_else(|| AdapterError::Schema(format!("record has no field {}", column.name)))?;
    row.push(field.coerce(column.kind)?);
  }
  Ok(row)
}

async fn write_batches<K: StoreClient>(
  mut client: K,
  table: String,
  layout: Vec<ColumnSpec>,
  mut receiver: mpsc::Receiver<Batch>,
) -> Result<usize, AdapterError> {
  let mut written = 0;
  while let Some(rows) = receiver.recv().await {
    let count = client.insert(&table, &layout, rows).await?;
    debug!(table = %table, rows = count, "inserted batch");
    written += count;
  }
  Ok(written)
}

struct StoreWriter<T, C> {
  input: Input<T>,
  config: WriteConfig<C>,
  staged: Option<Vec<Scalar>>,
  batch: Batch,
  enqueued: u64,
  runtime: Option<Handle>,
  sender: Option<mpsc::Sender<Batch>>,
  task: Option<JoinHandle<Result<usize, AdapterError>>>,
  _marker: PhantomData<fn(T)>,
}

impl<T, C> StoreWriter<T, C> {
  fn new(input: Input<T>, config: WriteConfig<C>) -> Self {
    Self {
      input,
      config,
      staged: None,
      batch: Vec::new(),
      enqueued: 0,
      runtime: None,
      sender: None,
      task: None,
      _marker: PhantomData,
    }
  }

  /// Waits for the writer task and returns its outcome.
  fn join(&mut self) -> Result<usize, AdapterError> {
    let (Some(task), Some(runtime)) = (self.task.take(), self.runtime.as_ref()) else {
      return Ok(0);
    };
    runtime
      .block_on(task)
      .map_err(|e| AdapterError::Closed(format!("store writer task failed: {e}")))?
  }

  /// Hands the current batch to the writer, blocking while its queue is full.
  fn flush(&mut self) -> Result<(), NodeError> {
    if self.batch.is_empty() {
      return Ok(());
    }
    let rows = mem::take(&mut self.batch);
    let Some(sender) = self.sender.as_ref() else {
      return Err(AdapterError::Closed("store writer already stopped".to_string()).into());
    };
    if sender.blocking_send(rows).is_err() {
      // The writer only hangs up after failing.
      self.sender = None;
      self.join()?;
      return Err(AdapterError::Closed("store writer stopped unexpectedly".to_string()).into());
    }
    Ok(())
  }
}

impl<T: Element + AsRecord, C: StoreConnector> Operator for StoreWriter<T, C> {
  type Output = u64;

  fn cycle(&mut self, ctx: &CycleContext<'_>, out: &mut Option<u64>) -> Result<bool, NodeError> {
    self.staged = None;
    let Some(value) = ctx.fresh(self.input) else {
      return Ok(false);
    };
    self.staged = Some(to_row(ctx.time(), value, &self.config.columns)?);
    *out = Some(self.enqueued + 1);
    Ok(true)
  }

  fn needs_runtime(&self) -> bool {
    true
  }

  fn start(&mut self, ctx: &StartContext) -> Result<(), NodeError> {
    let runtime = ctx.runtime()?;
    let connection = self.config.connection.clone();
    let wait = ctx.fetch_timeout();
    let connected = runtime
      .block_on(async move { tokio::time::timeout(wait, connection.connect()).await });
    let client = connected.map_err(|_| AdapterError::Timeout(wait))??;
    let (sender, receiver) = mpsc::channel(self.config.queue_depth.max(1));
    self.task = Some(runtime.spawn(write_batches(
      client,
      self.config.table.clone(),
      self.config.layout(),
      receiver,
    )));
    self.sender = Some(sender);
    self.runtime = Some(runtime);
    Ok(())
  }

  fn commit(&mut self, _ctx: &mut CommitContext<'_>, _value: Option<&u64>) -> Result<(), NodeError> {
    if let Some(row) = self.staged.take() {
      self.batch.push(row);
      self.enqueued += 1;
    }
    if self.batch.len() >= self.config.batch_size {
      self.flush()?;
    }
    Ok(())
  }

  fn stop(&mut self) -> Result<(), NodeError> {
    self.flush()?;
    self.sender = None;
    let written = self.join()?;
    info!(
      store = %self.config.connection.describe(),
      table = %self.config.table,
      rows = written,
      "store writes drained"
    );
    Ok(())
  }
}

impl<'g, T: Element + AsRecord> Stream<'g, T> {
  /// Writes every produced value to the store as one row.
  ///
  /// The returned stream counts the rows handed to the store so far. Rows are
  /// sent in batches; the last partial batch is flushed when the run stops, and
  /// the run fails if any write fails.
  pub fn write_store<C: StoreConnector>(&self, config: WriteConfig<C>) -> Stream<'g, u64> {
    if let Err(reason) = config.validate() {
      self.builder().fail(GraphError::InvalidArgument {
        operator: "write_store",
        reason,
      });
    }
    self.builder().add(
      format!("write_store({})", config.table),
      vec![self.id()],
      StoreWriter::new(self.input(), config),
    )
  }
}
