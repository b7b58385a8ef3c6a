//! # Store Client
//!
//! [`StoreClient`] is the asynchronous seam between the adapters and a store,
//! and a [`StoreConnector`] opens one client per adapter at run start.
//!
//! - [`StoreConnection`] connects a [`TcpStoreClient`], which speaks the line
//!   protocol over one TCP connection and logs in first when credentials are
//!   configured.
//! - [`MemoryStore`](crate::store::MemoryStore) is its own connector and client,
//!   for in-process runs.
//!
//! Another store (another wire protocol) plugs in by implementing both traits.

use crate::error::AdapterError;
use crate::record::{ColumnSpec, Scalar};
use crate::store::protocol::{MAX_FRAME_LENGTH, Request, Response};
use crate::time::NanoTime;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::debug;

/// User name and password for a store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
  /// User name.
  pub username: String,
  /// Password.
  pub password: String,
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &"***")
      .finish()
  }
}

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConnection {
  /// Host name or address.
  pub host: String,
  /// TCP port.
  pub port: u16,
  /// Optional login.
  pub credentials: Option<Credentials>,
}

impl StoreConnection {
  /// A connection without credentials.
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    Self {
      host: host.into(),
      port,
      credentials: None,
    }
  }

  /// Adds credentials.
  #[must_use]
  pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
    self.credentials = Some(Credentials {
      username: username.into(),
      password: password.into(),
    });
    self
  }

  /// `host:port`.
  pub fn address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

/// Operations the adapters need from a store.
#[async_trait]
pub trait StoreClient: Send {
  /// Fetches one page of a query's result, sorted by `time_column`.
  async fn query(
    &mut self,
    query: &str,
    time_column: &str,
    from: Option<NanoTime>,
    skip: usize,
    limit: usize,
  ) -> Result<(Vec<String>, Vec<Vec<Scalar>>), AdapterError>;

  /// Appends rows to `table`.
  async fn insert(
    &mut self,
    table: &str,
    columns: &[ColumnSpec],
    rows: Vec<Vec<Scalar>>,
  ) -> Result<usize, AdapterError>;
}

/// Opens client sessions to a store.
#[async_trait]
pub trait StoreConnector: Clone + Send + Sync + 'static {
  /// Session type handed to the adapters.
  type Client: StoreClient + 'static;

  /// Opens a session.
  async fn connect(&self) -> Result<Self::Client, AdapterError>;

  /// Short description for logs.
  fn describe(&self) -> String;
}

#[async_trait]
impl StoreConnector for StoreConnection {
  type Client = TcpStoreClient;

  async fn connect(&self) -> Result<TcpStoreClient, AdapterError> {
    TcpStoreClient::connect(self).await
  }

  fn describe(&self) -> String {
    self.address()
  }
}

/// [`StoreClient`] over the line protocol.
pub struct TcpStoreClient {
  framed: Framed<TcpStream, LinesCodec>,
}

impl TcpStoreClient {
  /// Connects and, if credentials are configured, logs in.
  pub async fn connect(connection: &StoreConnection) -> Result<Self, AdapterError> {
    let address = connection.address();
    let stream = TcpStream::connect(address.as_str()).await?;
    stream.set_nodelay(true)?;
    debug!(address = %address, "connected to store");
    let mut client = Self {
      framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH)),
    };
    if let Some(credentials) = &connection.credentials {
      match client
        .call(Request::Login {
          username: credentials.username.clone(),
          password: credentials.password.clone(),
        })
        .await?
      {
        Response::LoggedIn => {}
        other => return Err(unexpected(other)),
      }
    }
    Ok(client)
  }

  /// Sends one request and waits for its response.
  pub async fn call(&mut self, request: Request) -> Result<Response, AdapterError> {
    let line = serde_json::to_string(&request)?;
    self.framed.send(line).await?;
    let line = self
      .framed
      .next()
      .await
      .ok_or_else(|| AdapterError::Closed("store closed the connection".to_string()))??;
    match serde_json::from_str::<Response>(&line)? {
      Response::Error { message } => Err(AdapterError::Remote(message)),
      response => Ok(response),
    }
  }

  /// Round-trips a ping.
  pub async fn ping(&mut self) -> Result<(), AdapterError> {
    match self.call(Request::Ping).await? {
      Response::Pong => Ok(()),
      other => Err(unexpected(other)),
    }
  }
}

fn unexpected(response: Response) -> AdapterError {
  AdapterError::Protocol(format!("unexpected response {response:?}"))
}

#[async_trait]
impl StoreClient for TcpStoreClient {
  async fn query(
    &mut self,
    query: &str,
    time_column: &str,
    from: Option<NanoTime>,
    skip: usize,
    limit: usize,
  ) -> Result<(Vec<String>, Vec<Vec<Scalar>>), AdapterError> {
    let request = Request::Query {
      query: query.to_string(),
      time_column: time_column.to_string(),
      from,
      skip,
      limit,
    };
    match self.call(request).await? {
      Response::Rows { columns, rows } => Ok((columns, rows)),
      other => Err(unexpected(other)),
    }
  }

  async fn insert(
    &mut self,
    table: &str,
    columns: &[ColumnSpec],
    rows: Vec<Vec<Scalar>>,
  ) -> Result<usize, AdapterError> {
    let request = Request::Insert {
      table: table.to_string(),
      columns: columns.to_vec(),
      rows,
    };
    match self.call(request).await? {
      Response::Inserted { count } => Ok(count),
      other => Err(unexpected(other)),
    }
  }
}
