//! Socket Server
//!
//! Binds the configured address and runs one handling loop per accepted
//! connection against an external [`RequestHandler`]. Each loop keeps one
//! request/response model pair for its whole life and handles exchanges
//! strictly one at a time.
//!
//! Datagram families have no accept step: a single loop serves the bound
//! socket and replies to whoever sent the last request.

use crate::address::{AddressSpec, Family};
use crate::config::SocketConfig;
use crate::pipeline::{self, ServerFactory, ServerPipeline};
use crate::transports::{self, Endpoint, Listener, Messenger};
use crate::{Result, TransportError};
use async_trait::async_trait;
use exchange::Exchange;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept or datagram read before trying again
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Processes one exchange: reads `exchange.request`, fills `exchange.response`.
///
/// An error ends the connection the exchange arrived on.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, exchange: &mut Exchange) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> RequestHandler for F
where
    F: Fn(&mut Exchange) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn handle(&self, exchange: &mut Exchange) -> anyhow::Result<()> {
        self(exchange)
    }
}

struct Running {
    task: JoinHandle<()>,
    local_addr: String,
}

/// `Starting` is held while binding so a concurrent `start` cannot bind twice
enum State {
    Stopped,
    Starting,
    Running(Running),
}

/// Server side of the transport
pub struct SocketServer {
    spec: AddressSpec,
    config: SocketConfig,
    handler: Arc<dyn RequestHandler>,
    factory: ServerFactory,
    state: Mutex<State>,
}

impl SocketServer {
    /// Validate `config` and resolve the pipeline; nothing is bound yet
    pub fn new(handler: impl RequestHandler, config: SocketConfig) -> Result<Self> {
        let spec = config.validate()?;
        let max_message_size = config.effective_max_message_size(spec.family());
        let factory = pipeline::server_factory(&spec, max_message_size)?;

        Ok(Self {
            spec,
            config,
            handler: Arc::new(handler),
            factory,
            state: Mutex::new(State::Stopped),
        })
    }

    /// Bind and start serving in the background
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !matches!(*state, State::Stopped) {
                return Err(TransportError::configuration("server already started", None));
            }
            *state = State::Starting;
        }

        let bound = match transports::bind(
            self.spec.family(),
            self.spec.address(),
            self.config.unix_socket_permissions,
        )
        .await
        {
            Ok(bound) => bound,
            Err(e) => {
                *self.state.lock() = State::Stopped;
                return Err(e);
            }
        };

        let handler = Arc::clone(&self.handler);
        let factory = Arc::clone(&self.factory);
        let task = match bound.endpoint {
            Endpoint::Listener(listener) => {
                tokio::spawn(accept_loop(listener, handler, factory, bound.local_addr.clone()))
            }
            Endpoint::Datagram(messenger) => tokio::spawn(datagram_loop(messenger, handler, factory())),
        };

        info!(address = %self.spec, local_addr = %bound.local_addr, "Server started");
        *self.state.lock() = State::Running(Running {
            task,
            local_addr: bound.local_addr,
        });
        Ok(())
    }

    /// Stop accepting and remove the socket file of filesystem-backed families.
    ///
    /// Connection loops already running end when their peers disconnect.
    /// A server still binding counts as not started.
    pub fn stop(&self) -> Result<()> {
        let running = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Stopped) {
                State::Running(running) => running,
                other => {
                    *state = other;
                    return Err(TransportError::NotStarted);
                }
            }
        };
        running.task.abort();

        if self.spec.family().is_filesystem() {
            if let Err(e) = transports::unix::remove_stale(std::path::Path::new(&running.local_addr)) {
                warn!(address = %running.local_addr, error = %e, "Failed to remove socket file");
            }
        }

        info!(address = %self.spec, "Server stopped");
        Ok(())
    }

    /// Address actually bound, with the real port for `:0` binds
    pub fn local_addr(&self) -> Option<String> {
        match &*self.state.lock() {
            State::Running(running) => Some(running.local_addr.clone()),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running(_))
    }

    pub fn address(&self) -> &AddressSpec {
        &self.spec
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        if let State::Running(running) = self.state.get_mut() {
            running.task.abort();
        }
    }
}

async fn accept_loop(
    listener: Listener,
    handler: Arc<dyn RequestHandler>,
    factory: ServerFactory,
    address: String,
) {
    let connection_ids = AtomicU64::new(0);

    loop {
        match listener.accept().await {
            Ok(messenger) => {
                let id = connection_ids.fetch_add(1, Ordering::Relaxed);
                debug!(connection = id, address = %address, "Connection accepted");

                let pipeline = factory();
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    serve_connection(id, messenger, pipeline, handler).await;
                });
            }
            Err(e) => {
                error!(address = %address, error = %e, "Failed to accept connection");
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

/// Handle exchanges on one stream connection until it fails or closes
async fn serve_connection(
    id: u64,
    mut messenger: Messenger,
    mut pipeline: Box<dyn ServerPipeline>,
    handler: Arc<dyn RequestHandler>,
) {
    let mut exchange = Exchange::default();

    loop {
        match handle_one(&mut messenger, pipeline.as_mut(), handler.as_ref(), &mut exchange).await {
            Ok(()) => {}
            Err(e) if e.is_end_of_stream() => {
                debug!(connection = id, "Connection closed by peer");
                break;
            }
            Err(e) => {
                error!(connection = id, category = e.category(), error = %e, "Connection failed");
                break;
            }
        }
    }

    // releases the request/response models back to the pool
    drop(pipeline);
    if let Err(e) = messenger.shutdown().await {
        debug!(connection = id, error = %e, "Socket shutdown failed");
    }
}

/// Serve a bound datagram socket; a failed exchange drops only that request
async fn datagram_loop(
    mut messenger: Messenger,
    handler: Arc<dyn RequestHandler>,
    mut pipeline: Box<dyn ServerPipeline>,
) {
    let family: Family = messenger.family();
    let mut exchange = Exchange::default();

    loop {
        if let Err(e) = handle_one(&mut messenger, pipeline.as_mut(), handler.as_ref(), &mut exchange).await {
            error!(family = family.as_str(), category = e.category(), error = %e, "Datagram exchange failed");
            if matches!(e, TransportError::Io { .. }) {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

/// Read one request, run the handler, write the response
async fn handle_one(
    messenger: &mut Messenger,
    pipeline: &mut dyn ServerPipeline,
    handler: &dyn RequestHandler,
    exchange: &mut Exchange,
) -> Result<()> {
    pipeline.read_request(messenger).await?;
    exchange.reset();

    let handled = AssertUnwindSafe(async {
        pipeline.decode_request(exchange)?;
        handler.handle(exchange).await.map_err(TransportError::handler)?;
        pipeline.encode_response(exchange)
    })
    .catch_unwind()
    .await;
    handled.unwrap_or_else(|panic| Err(TransportError::from_panic(panic)))?;

    pipeline.write_response(messenger).await
}
