//! Socket Client
//!
//! A fixed set of pre-opened connections to one server. Callers never
//! wait for each other: [`SocketClient::acquire`] scans the pool
//! round-robin from a shared cursor and returns [`TransportError::Busy`]
//! when every connection is held, leaving backpressure to the caller.

use crate::address::AddressSpec;
use crate::config::SocketConfig;
use crate::pipeline::{self, ClientFactory};
use crate::{Result, TransportError};
use exchange::Exchange;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

mod connection;

pub use connection::{ClientConnection, ConnectionGuard};

#[derive(Default)]
struct PoolState {
    connections: Vec<Arc<ClientConnection>>,
    cursor: usize,
    next_id: usize,
}

/// Pool membership; the cursor lives under the same lock
#[derive(Default)]
pub(crate) struct PoolShared {
    state: Mutex<PoolState>,
}

impl PoolShared {
    pub(crate) fn remove(&self, connection: &Arc<ClientConnection>) {
        let mut state = self.state.lock();
        state.connections.retain(|c| !Arc::ptr_eq(c, connection));
        if state.cursor >= state.connections.len() {
            state.cursor = 0;
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total_connections: usize,
    pub busy_connections: usize,
    pub free_connections: usize,
}

/// Client side of the transport: a pool of connections to one address
pub struct SocketClient {
    spec: AddressSpec,
    config: SocketConfig,
    factory: ClientFactory,
    shared: Arc<PoolShared>,
}

impl SocketClient {
    /// Validate `config` and resolve the pipeline; no connection is opened yet
    pub fn new(config: SocketConfig) -> Result<Self> {
        let spec = config.validate()?;
        let max_message_size = config.effective_max_message_size(spec.family());
        let factory = pipeline::client_factory(&spec, max_message_size)?;

        Ok(Self {
            spec,
            config,
            factory,
            shared: Arc::new(PoolShared::default()),
        })
    }

    /// Build a client and open `config.pool_size` connections
    pub async fn connect(config: SocketConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.start(client.config.pool_size).await?;
        Ok(client)
    }

    /// Open connections until `size` are live.
    ///
    /// A dial failure closes the connections this call opened and returns
    /// the error; a partial pool is never left behind.
    pub async fn start(&self, size: usize) -> Result<()> {
        let mut opened: Vec<Arc<ClientConnection>> = Vec::new();

        while self.len() < size {
            let id = {
                let mut state = self.shared.state.lock();
                state.next_id += 1;
                state.next_id - 1
            };

            match ClientConnection::open(id, &self.spec, &self.factory, Arc::downgrade(&self.shared)).await {
                Ok(connection) => {
                    self.shared.state.lock().connections.push(Arc::clone(&connection));
                    opened.push(connection);
                }
                Err(e) => {
                    error!(address = %self.spec, error = %e, "Failed to start client pool");
                    for connection in opened {
                        let _ = connection.close().await;
                    }
                    return Err(e);
                }
            }
        }

        info!(address = %self.spec, connections = self.len(), "Client pool started");
        Ok(())
    }

    /// Take a free connection without waiting
    pub fn acquire(&self) -> Result<ConnectionGuard> {
        let mut state = self.shared.state.lock();
        let len = state.connections.len();
        if len == 0 {
            return Err(TransportError::NotStarted);
        }

        let start = state.cursor % len;
        for step in 0..len {
            let index = (start + step) % len;
            state.cursor = (index + 1) % len;
            if let Some(guard) = state.connections[index].try_acquire() {
                return Ok(guard);
            }
        }

        debug!(address = %self.spec, connections = len, "All connections are busy");
        Err(TransportError::Busy)
    }

    /// Forward one exchange over a pooled connection
    pub async fn send_and_receive(&self, exchange: &mut Exchange) -> Result<()> {
        let mut guard = self.acquire()?;
        guard.send_and_receive(exchange).await
    }

    /// Snapshot of the live connections, in scan order
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.shared.state.lock().connections.clone()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        let busy = state.connections.iter().filter(|c| c.is_busy()).count();

        PoolStats {
            total_connections: state.connections.len(),
            busy_connections: busy,
            free_connections: state.connections.len() - busy,
        }
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn address(&self) -> &AddressSpec {
        &self.spec
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }
}
