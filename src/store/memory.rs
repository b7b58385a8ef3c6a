//! # In-Memory Store
//!
//! Tables held in process, answering the small query dialect the adapters use:
//!
//! ```text
//! select from <table>
//! select from <table> where <column> = <literal>
//! ```
//!
//! Literals are `` `sym `` or `'text'` (symbols), `true`/`false`, integers and
//! floats. Numeric comparisons ignore the integer/float distinction. Results
//! are stable-sorted by the requested time column.
//!
//! A [`MemoryStore`] can be served over TCP by a
//! [`StoreServer`](crate::store::StoreServer) or handed to the adapters
//! directly as an in-process connector.

use crate::error::AdapterError;
use crate::record::{ColumnSpec, Record, Scalar};
use crate::store::client::{StoreClient, StoreConnector};
use crate::store::protocol::{Request, Response};
use crate::time::NanoTime;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Why the store rejected a request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
  /// The query names a table that does not exist.
  #[error("unknown table {0}")]
  UnknownTable(String),
  /// A referenced column does not exist.
  #[error("unknown column {column} in table {table}")]
  UnknownColumn {
    /// Table name.
    table: String,
    /// Column name.
    column: String,
  },
  /// The query text is outside the supported dialect.
  #[error("unsupported query: {0}")]
  UnsupportedQuery(String),
  /// An insert's layout differs from the existing table's.
  #[error("table {table} has columns {expected:?}, insert supplied {actual:?}")]
  ColumnMismatch {
    /// Table name.
    table: String,
    /// Existing layout.
    expected: Vec<ColumnSpec>,
    /// Supplied layout.
    actual: Vec<ColumnSpec>,
  },
  /// A row's width differs from the column count.
  #[error("row {row} has {actual} values, expected {expected}")]
  RowWidth {
    /// Row index within the request.
    row: usize,
    /// Column count.
    expected: usize,
    /// Values supplied.
    actual: usize,
  },
  /// A value does not match its column's type.
  #[error("column {column}: {reason}")]
  TypeMismatch {
    /// Column name.
    column: String,
    /// Details.
    reason: String,
  },
}

struct Table {
  columns: Vec<ColumnSpec>,
  rows: Vec<Vec<Scalar>>,
}

impl Table {
  fn index_of(&self, table: &str, column: &str) -> Result<usize, StoreError> {
    self
      .columns
      .iter()
      .position(|c| c.name == column)
      .ok_or_else(|| StoreError::UnknownColumn {
        table: table.to_string(),
        column: column.to_string(),
      })
  }
}

struct Select<'q> {
  table: &'q str,
  filter: Option<(&'q str, Scalar)>,
}

fn unsupported(query: &str) -> StoreError {
  StoreError::UnsupportedQuery(query.to_string())
}

fn parse_literal(text: &str) -> Option<Scalar> {
  if let Some(symbol) = text.strip_prefix('`') {
    return Some(Scalar::Symbol(symbol.to_string()));
  }
  for quote in ['\'', '"'] {
    if let Some(inner) = text
      .strip_prefix(quote)
      .and_then(|rest| rest.strip_suffix(quote))
    {
      return Some(Scalar::Symbol(inner.to_string()));
    }
  }
  match text {
    "true" => return Some(Scalar::Bool(true)),
    "false" => return Some(Scalar::Bool(false)),
    _ => {}
  }
  if let Ok(n) = text.parse::<i64>() {
    return Some(Scalar::Long(n));
  }
  text.parse::<f64>().ok().map(Scalar::Float)
}

fn parse_select(query: &str) -> Result<Select<'_>, StoreError> {
  let rest = query
    .trim()
    .strip_prefix("select")
    .map(str::trim_start)
    .and_then(|rest| rest.strip_prefix("from"))
    .map(str::trim_start)
    .ok_or_else(|| unsupported(query))?;
  let (table, rest) = rest
    .split_once(char::is_whitespace)
    .unwrap_or((rest, ""));
  if table.is_empty() {
    return Err(unsupported(query));
  }
  let rest = rest.trim();
  if rest.is_empty() {
    return Ok(Select {
      table,
      filter: None,
    });
  }
  let (column, literal) = rest
    .strip_prefix("where")
    .and_then(|condition| condition.split_once('='))
    .ok_or_else(|| unsupported(query))?;
  let column = column.trim();
  let literal = parse_literal(literal.trim()).ok_or_else(|| unsupported(query))?;
  if column.is_empty() {
    return Err(unsupported(query));
  }
  Ok(Select {
    table,
    filter: Some((column, literal)),
  })
}

/// Shared, cloneable handle to a set of in-memory tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
  tables: Arc<Mutex<HashMap<String, Table>>>,
}

impl std::fmt::Debug for MemoryStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let tables = self.lock();
    let mut names: Vec<_> = tables.keys().collect();
    names.sort();
    f.debug_struct("MemoryStore").field("tables", &names).finish()
  }
}

impl MemoryStore {
  /// An empty store.
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Table>> {
    self.tables.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Appends rows, creating the table on first use.
  pub fn insert(
    &self,
    table: &str,
    columns: &[ColumnSpec],
    rows: Vec<Vec<Scalar>>,
  ) -> Result<usize, StoreError> {
    for (index, row) in rows.iter().enumerate() {
      if row.len() != columns.len() {
        return Err(StoreError::RowWidth {
          row: index,
          expected: columns.len(),
          actual: row.len(),
        });
      }
      for (value, column) in row.iter().zip(columns) {
        if value.kind() != column.kind {
          return Err(StoreError::TypeMismatch {
            column: column.name.clone(),
            reason: format!("expected {}, got {} value {value}", column.kind, value.kind()),
          });
        }
      }
    }

    let mut tables = self.lock();
    let entry = tables.entry(table.to_string()).or_insert_with(|| Table {
      columns: columns.to_vec(),
      rows: Vec::new(),
    });
    if entry.columns != columns {
      return Err(StoreError::ColumnMismatch {
        table: table.to_string(),
        expected: entry.columns.clone(),
        actual: columns.to_vec(),
      });
    }
    let count = rows.len();
    entry.rows.extend(rows);
    Ok(count)
  }

  /// Evaluates one page of `query`, sorted by `time_column`.
  pub fn query(
    &self,
    query: &str,
    time_column: &str,
    from: Option<NanoTime>,
    skip: usize,
    limit: usize,
  ) -> Result<(Vec<String>, Vec<Vec<Scalar>>), StoreError> {
    let select = parse_select(query)?;
    let tables = self.lock();
    let table = tables
      .get(select.table)
      .ok_or_else(|| StoreError::UnknownTable(select.table.to_string()))?;
    let time_index = table.index_of(select.table, time_column)?;
    let filter = match &select.filter {
      Some((column, literal)) => Some((table.index_of(select.table, column)?, literal)),
      None => None,
    };

    let mut matching = Vec::new();
    for row in &table.rows {
      if let Some((index, literal)) = filter {
        if !row[index].loosely_eq(literal) {
          continue;
        }
      }
      let time = row[time_index]
        .as_time()
        .ok_or_else(|| StoreError::TypeMismatch {
          column: time_column.to_string(),
          reason: format!("{} is not a time", row[time_index]),
        })?;
      matching.push((time, row));
    }
    matching.sort_by_key(|(time, _)| *time);

    let mut skipped = 0;
    let rows = matching
      .into_iter()
      .filter(|(time, _)| from.is_none_or(|from| *time >= from))
      .filter(|(time, _)| {
        if Some(*time) == from && skipped < skip {
          skipped += 1;
          false
        } else {
          true
        }
      })
      .take(limit)
      .map(|(_, row)| row.clone())
      .collect();
    let columns = table.columns.iter().map(|c| c.name.clone()).collect();
    Ok((columns, rows))
  }

  /// All rows of a table as records, in insertion order.
  pub fn records(&self, table: &str) -> Option<Vec<Record>> {
    let tables = self.lock();
    let table = tables.get(table)?;
    Some(
      table
        .rows
        .iter()
        .map(|row| {
          table
            .columns
            .iter()
            .zip(row)
            .map(|(column, value)| (column.name.clone(), value.clone()))
            .collect()
        })
        .collect(),
    )
  }

  /// Answers a protocol request.
  pub fn handle(&self, request: Request) -> Response {
    let result = match request {
      Request::Query {
        query,
        time_column,
        from,
        skip,
        limit,
      } => self
        .query(&query, &time_column, from, skip, limit)
        .map(|(columns, rows)| Response::Rows { columns, rows }),
      Request::Insert {
        table,
        columns,
        rows,
      } => self
        .insert(&table, &columns, rows)
        .map(|count| Response::Inserted { count }),
      Request::Login { .. } => Ok(Response::LoggedIn),
      Request::Ping => Ok(Response::Pong),
    };
    result.unwrap_or_else(|e| Response::Error {
      message: e.to_string(),
    })
  }
}

#[async_trait]
impl StoreConnector for MemoryStore {
  type Client = MemoryStore;

  async fn connect(&self) -> Result<MemoryStore, AdapterError> {
    Ok(self.clone())
  }

  fn describe(&self) -> String {
    "memory".to_string()
  }
}

#[async_trait]
impl StoreClient for MemoryStore {
  async fn query(
    &mut self,
    query: &str,
    time_column: &str,
    from: Option<NanoTime>,
    skip: usize,
    limit: usize,
  ) -> Result<(Vec<String>, Vec<Vec<Scalar>>), AdapterError> {
    MemoryStore::query(self, query, time_column, from, skip, limit).map_err(remote)
  }

  async fn insert(
    &mut self,
    table: &str,
    columns: &[ColumnSpec],
    rows: Vec<Vec<Scalar>>,
  ) -> Result<usize, AdapterError> {
    MemoryStore::insert(self, table, columns, rows).map_err(remote)
  }
}

fn remote(e: StoreError) -> AdapterError {
  AdapterError::Remote(e.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::ColumnType;

  fn trades() -> MemoryStore {
    let store = MemoryStore::new();
    let columns = vec![
      ColumnSpec::new("time", ColumnType::Timestamp),
      ColumnSpec::new("sym", ColumnType::Symbol),
      ColumnSpec::new("qty", ColumnType::Long),
    ];
    let row = |t: u64, sym: &str, qty: i64| {
      vec![
        Scalar::Timestamp(NanoTime::new(t)),
        Scalar::from(sym),
        Scalar::Long(qty),
      ]
    };
    store
      .insert(
        "trades",
        &columns,
        vec![row(3, "B", 30), row(1, "A", 10), row(2, "A", 20), row(2, "B", 21)],
      )
      .unwrap();
    store
  }

  #[test]
  fn select_sorts_by_time_and_filters() {
    let store = trades();
    let (columns, rows) = store
      .query("select from trades where sym = `A", "time", None, 0, 10)
      .unwrap();
    assert_eq!(columns, vec!["time", "sym", "qty"]);
    let quantities: Vec<_> = rows.iter().map(|r| r[2].clone()).collect();
    assert_eq!(quantities, vec![Scalar::Long(10), Scalar::Long(20)]);
  }

  #[test]
  fn cursor_pages_through_equal_timestamps() {
    let store = trades();
    let (_, first) = store
      .query("select from trades", "time", None, 0, 2)
      .unwrap();
    assert_eq!(first.len(), 2);
    // Second page resumes after the one row at t=2 already seen.
    let (_, second) = store
      .query("select from trades", "time", Some(NanoTime::new(2)), 1, 2)
      .unwrap();
    let quantities: Vec<_> = second.iter().map(|r| r[2].clone()).collect();
    assert_eq!(quantities, vec![Scalar::Long(21), Scalar::Long(30)]);
  }

  #[test]
  fn rejects_mismatched_inserts_and_unknown_queries() {
    let store = trades();
    let err = store
      .insert("trades", &[ColumnSpec::new("time", ColumnType::Timestamp)], vec![])
      .unwrap_err();
    assert!(matches!(err, StoreError::ColumnMismatch { .. }));
    assert!(matches!(
      store.query("delete from trades", "time", None, 0, 1),
      Err(StoreError::UnsupportedQuery(_))
    ));
    assert!(matches!(
      store.query("select from quotes", "time", None, 0, 1),
      Err(StoreError::UnknownTable(_))
    ));
  }
}
