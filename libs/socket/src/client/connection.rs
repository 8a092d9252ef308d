//! Client Connection
//!
//! One socket plus the pipeline that drives exchanges over it. A connection
//! is free or held by exactly one caller; holding it is owning the
//! [`ConnectionGuard`] returned by [`ClientConnection::try_acquire`].

use super::PoolShared;
use crate::address::AddressSpec;
use crate::pipeline::{ClientFactory, ClientPipeline};
use crate::transports::{self, Messenger};
use crate::{Result, TransportError};
use exchange::Exchange;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

struct ConnectionState {
    messenger: Option<Messenger>,
    pipeline: Box<dyn ClientPipeline>,
    closed: bool,
}

/// One pooled client connection
pub struct ClientConnection {
    id: usize,
    spec: AddressSpec,
    pool: Weak<PoolShared>,
    state: Arc<Mutex<ConnectionState>>,
    reconnects: AtomicU64,
}

impl ClientConnection {
    /// Dial `spec` and prepare a pipeline with its own request/response models
    pub(crate) async fn open(
        id: usize,
        spec: &AddressSpec,
        factory: &ClientFactory,
        pool: Weak<PoolShared>,
    ) -> Result<Arc<Self>> {
        let messenger = transports::dial(spec.family(), spec.address()).await?;
        debug!(connection = id, address = %spec, "Opened client connection");

        Ok(Arc::new(Self {
            id,
            spec: spec.clone(),
            pool,
            state: Arc::new(Mutex::new(ConnectionState {
                messenger: Some(messenger),
                pipeline: factory(),
                closed: false,
            })),
            reconnects: AtomicU64::new(0),
        }))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Reconnect attempts made so far
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Held by some caller right now
    pub fn is_busy(&self) -> bool {
        self.state.try_lock().is_err()
    }

    /// Take the connection if it is free; never waits
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        let state = Arc::clone(&self.state).try_lock_owned().ok()?;
        Some(ConnectionGuard {
            connection: Arc::clone(self),
            state,
        })
    }

    /// Leave the pool, close the socket and refuse further exchanges.
    ///
    /// Waits for a current holder to release the connection first.
    pub async fn close(self: &Arc<Self>) -> Result<()> {
        if let Some(pool) = self.pool.upgrade() {
            pool.remove(self);
        }

        let mut state = self.state.lock().await;
        state.closed = true;
        if let Some(mut messenger) = state.messenger.take() {
            messenger
                .shutdown()
                .await
                .map_err(|e| TransportError::io("Failed to close connection", e))?;
        }

        debug!(connection = self.id, "Closed client connection");
        Ok(())
    }
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("address", &self.spec.to_string())
            .field("reconnects", &self.reconnects())
            .finish()
    }
}

/// Exclusive hold on one connection; dropping it releases the connection
pub struct ConnectionGuard {
    connection: Arc<ClientConnection>,
    state: OwnedMutexGuard<ConnectionState>,
}

impl ConnectionGuard {
    pub fn connection(&self) -> &Arc<ClientConnection> {
        &self.connection
    }

    /// Run one round trip: `exchange.request` out, `exchange.response` back.
    ///
    /// A failed write is retried once on a fresh socket. A failed read
    /// reconnects but is reported, since the response is lost. A panic in
    /// any step is reported as [`TransportError::Internal`].
    pub async fn send_and_receive(&mut self, exchange: &mut Exchange) -> Result<()> {
        if self.state.closed {
            return Err(TransportError::Closed);
        }

        match AssertUnwindSafe(self.round_trip(exchange)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                // state of the socket and buffers is unknown after a panic
                self.state.messenger = None;
                self.state.pipeline.reset();
                let err = TransportError::from_panic(panic);
                error!(connection = self.connection.id, error = %err, "Exchange panicked");
                Err(err)
            }
        }
    }

    /// Hand the connection back to the pool
    pub fn release(self) {
        drop(self)
    }

    async fn round_trip(&mut self, exchange: &mut Exchange) -> Result<()> {
        self.state.pipeline.encode_request(exchange)?;

        match self.write().await {
            Ok(()) => {}
            // nothing reached the socket, it is still usable
            Err(e @ (TransportError::MessageTooLarge { .. } | TransportError::Protocol { .. })) => {
                return Err(e)
            }
            Err(e) => {
                warn!(connection = self.connection.id, error = %e, "Write failed, reconnecting");
                self.reconnect().await?;
                self.write().await?;
            }
        }

        if let Err(e) = self.read().await {
            warn!(connection = self.connection.id, error = %e, "Read failed, reconnecting");
            if let Err(dial) = self.reconnect().await {
                error!(connection = self.connection.id, error = %dial, "Reconnect failed");
            }
            return Err(e);
        }

        self.state.pipeline.decode_response(exchange)
    }

    async fn write(&mut self) -> Result<()> {
        let ConnectionState {
            messenger, pipeline, ..
        } = &mut *self.state;
        let messenger = messenger.as_mut().ok_or(TransportError::Closed)?;
        pipeline.write_request(messenger).await
    }

    async fn read(&mut self) -> Result<()> {
        let ConnectionState {
            messenger, pipeline, ..
        } = &mut *self.state;
        let messenger = messenger.as_mut().ok_or(TransportError::Closed)?;
        pipeline.read_response(messenger).await
    }

    /// Replace the socket; on dial failure the connection is left without one
    async fn reconnect(&mut self) -> Result<()> {
        if let Some(mut old) = self.state.messenger.take() {
            let _ = old.shutdown().await;
        }
        self.state.pipeline.reset();
        self.connection.reconnects.fetch_add(1, Ordering::Relaxed);

        let spec = &self.connection.spec;
        let messenger = transports::dial(spec.family(), spec.address()).await?;
        self.state.messenger = Some(messenger);

        debug!(connection = self.connection.id, "Reconnected");
        Ok(())
    }
}

impl fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("connection", &self.connection.id)
            .finish()
    }
}
