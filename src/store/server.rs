//! # Store Server
//!
//! Serves a [`MemoryStore`] over the line protocol. Each accepted connection
//! is handled by its own task; requests on a connection are answered in order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cycleweave::store::{MemoryStore, StoreServer, StoreServerConfig};
//!
//! # async fn serve() -> Result<(), cycleweave::AdapterError> {
//! let server = StoreServer::bind(StoreServerConfig::default(), MemoryStore::new()).await?;
//! let connection = server.connection();
//! // ... point read/write adapters at `connection` ...
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::error::AdapterError;
use crate::store::client::{Credentials, StoreConnection};
use crate::store::memory::MemoryStore;
use crate::store::protocol::{MAX_FRAME_LENGTH, Request, Response};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{error, info, warn};

/// Configuration for the store server.
#[derive(Debug, Clone)]
pub struct StoreServerConfig {
  /// Address to bind to (default `127.0.0.1:0`, an ephemeral port).
  pub bind_address: String,
  /// Idle time after which a silent connection is closed (default: 30 seconds).
  pub connection_timeout: Duration,
  /// Login required before any other request, if set.
  pub credentials: Option<Credentials>,
}

impl Default for StoreServerConfig {
  fn default() -> Self {
    Self {
      bind_address: "127.0.0.1:0".to_string(),
      connection_timeout: Duration::from_secs(30),
      credentials: None,
    }
  }
}

impl StoreServerConfig {
  /// Sets the bind address.
  #[must_use]
  pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
    self.bind_address = address.into();
    self
  }

  /// Sets the idle connection timeout.
  #[must_use]
  pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
    self.connection_timeout = timeout;
    self
  }

  /// Requires a login.
  #[must_use]
  pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
    self.credentials = Some(Credentials {
      username: username.into(),
      password: password.into(),
    });
    self
  }
}

/// A running store server.
pub struct StoreServer {
  local_addr: SocketAddr,
  store: MemoryStore,
  shutdown: Option<oneshot::Sender<()>>,
  task: JoinHandle<()>,
}

impl StoreServer {
  /// Binds and starts accepting connections on the current runtime.
  ///
  /// # Errors
  ///
  /// Returns an error if the address cannot be bound.
  pub async fn bind(config: StoreServerConfig, store: MemoryStore) -> Result<Self, AdapterError> {
    let listener = TcpListener::bind(config.bind_address.as_str()).await?;
    let local_addr = listener.local_addr()?;
    info!(
      address = %local_addr,
      "store server listening"
    );
    let (shutdown, signal) = oneshot::channel();
    let task = tokio::spawn(Self::accept_loop(listener, config, store.clone(), signal));
    Ok(Self {
      local_addr,
      store,
      shutdown: Some(shutdown),
      task,
    })
  }

  /// The bound address.
  pub fn local_addr(&self) -> SocketAddr {
    self.local_addr
  }

  /// Connection settings pointing at this server.
  pub fn connection(&self) -> StoreConnection {
    StoreConnection::new(self.local_addr.ip().to_string(), self.local_addr.port())
  }

  /// The served store.
  pub fn store(&self) -> &MemoryStore {
    &self.store
  }

  /// Stops accepting connections and waits for the accept loop to end.
  pub async fn shutdown(mut self) {
    if let Some(shutdown) = self.shutdown.take() {
      let _ = shutdown.send(());
    }
    let _ = (&mut self.task).await;
  }

  async fn accept_loop(
    listener: TcpListener,
    config: StoreServerConfig,
    store: MemoryStore,
    mut signal: oneshot::Receiver<()>,
  ) {
    let mut incoming = TcpListenerStream::new(listener);
    loop {
      tokio::select! {
        _ = &mut signal => break,
        next = incoming.next() => match next {
          Some(Ok(stream)) => {
            let peer_addr = match stream.peer_addr() {
              Ok(addr) => addr,
              Err(e) => {
                warn!(error = %e, "dropping connection without peer address");
                continue;
              }
            };
            info!(
              peer = %peer_addr,
              "accepted store connection"
            );
            let config = config.clone();
            let store = store.clone();
            tokio::spawn(async move {
              if let Err(e) = Self::handle_connection(stream, peer_addr, config, store).await {
                error!(
                  peer = %peer_addr,
                  error = %e,
                  "error handling store connection"
                );
              }
            });
          }
          Some(Err(e)) => {
            warn!(
              error = %e,
              "error accepting store connection"
            );
          }
          None => break,
        },
      }
    }
    info!("store server stopped");
  }

  async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: StoreServerConfig,
    store: MemoryStore,
  ) -> Result<(), AdapterError> {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));
    let mut authenticated = config.credentials.is_none();
    loop {
      let line = match timeout(config.connection_timeout, framed.next()).await {
        Ok(Some(line)) => line?,
        Ok(None) => return Ok(()),
        Err(_) => {
          warn!(
            peer = %peer_addr,
            "store connection idle timeout"
          );
          return Ok(());
        }
      };
      let response = match serde_json::from_str::<Request>(&line) {
        Err(e) => Response::Error {
          message: format!("malformed request: {e}"),
        },
        Ok(Request::Login { username, password }) => match &config.credentials {
          Some(expected) if expected.username != username || expected.password != password => {
            Response::Error {
              message: "invalid credentials".to_string(),
            }
          }
          _ => {
            authenticated = true;
            Response::LoggedIn
          }
        },
        Ok(_) if !authenticated => Response::Error {
          message: "login required".to_string(),
        },
        Ok(request) => store.handle(request),
      };
      framed.send(serde_json::to_string(&response)?).await?;
    }
  }
}

impl Drop for StoreServer {
  fn drop(&mut self) {
    if let Some(shutdown) = self.shutdown.take() {
      let _ = shutdown.send(());
    }
  }
}
