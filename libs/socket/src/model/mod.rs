//! Data Models
//!
//! A data model is the wire-shaped stand-in for one side of an exchange,
//! plus the codecs that convert it to and from [`Exchange`]. Model
//! instances are pooled and reused: a connection or server loop takes one
//! request/response pair and hands it back when done.
//!
//! - [`raw`]: the exchange's own HTTP/1.1 bytes as an opaque blob
//! - [`structured`]: method, URI, headers, status and body as fields

use crate::Result;
use exchange::Exchange;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub mod raw;
pub mod structured;

/// Poolable value representing one side of one exchange in wire-ready form
pub trait Transmittable: Default + Send + Sync + 'static {
    /// Clear every field back to its pristine state
    fn reset(&mut self);
}

/// Model that marshals its own bytes (required by the native serializer)
pub trait NativeModel: Transmittable {
    fn marshal(&self) -> &[u8];
    fn unmarshal(&mut self, data: &[u8]) -> Result<()>;
}

/// Model encodable through serde (required by bincode and JSON)
pub trait Model: Transmittable + Serialize + DeserializeOwned {}

impl<T: Transmittable + Serialize + DeserializeOwned> Model for T {}

/// Free list of reset model instances
pub struct ModelPool<M: Transmittable> {
    idle: Mutex<Vec<M>>,
    created: AtomicUsize,
}

impl<M: Transmittable> ModelPool<M> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        })
    }

    /// Take a reset instance, creating one only when none is idle
    pub fn get(self: &Arc<Self>) -> Pooled<M> {
        let model = self.idle.lock().pop().unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            M::default()
        });

        Pooled {
            model,
            pool: Arc::clone(self),
        }
    }

    /// Instances currently waiting for reuse
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Instances ever created by this pool
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn put(&self, mut model: M) {
        model.reset();
        self.idle.lock().push(model);
    }
}

impl<M: Transmittable> fmt::Debug for ModelPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPool")
            .field("idle", &self.idle())
            .field("created", &self.created())
            .finish()
    }
}

/// RAII guard that resets the model and returns it to its pool when dropped
pub struct Pooled<M: Transmittable> {
    model: M,
    pool: Arc<ModelPool<M>>,
}

impl<M: Transmittable> Pooled<M> {
    /// Return the model to the pool it came from
    pub fn release(self) {
        drop(self)
    }
}

impl<M: Transmittable> Deref for Pooled<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M: Transmittable> DerefMut for Pooled<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.model
    }
}

impl<M: Transmittable> Drop for Pooled<M> {
    fn drop(&mut self) {
        self.pool.put(mem::take(&mut self.model));
    }
}

impl<M: Transmittable + fmt::Debug> fmt::Debug for Pooled<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.model.fmt(f)
    }
}

/// Independent request and response pools of one data model
pub struct ModelPools<Req: Transmittable, Resp: Transmittable> {
    pub requests: Arc<ModelPool<Req>>,
    pub responses: Arc<ModelPool<Resp>>,
}

impl<Req: Transmittable, Resp: Transmittable> ModelPools<Req, Resp> {
    pub fn new() -> Self {
        Self {
            requests: ModelPool::new(),
            responses: ModelPool::new(),
        }
    }
}

impl<Req: Transmittable, Resp: Transmittable> Default for ModelPools<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req: Transmittable, Resp: Transmittable> Clone for ModelPools<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            requests: Arc::clone(&self.requests),
            responses: Arc::clone(&self.responses),
        }
    }
}

/// Client side: exchange request out, response model back into the exchange
pub trait ClientCodec: Send + 'static {
    type Request: Transmittable;
    type Response: Transmittable;

    fn pools(&self) -> &ModelPools<Self::Request, Self::Response>;

    fn get_request(&self) -> Pooled<Self::Request> {
        self.pools().requests.get()
    }

    fn get_response(&self) -> Pooled<Self::Response> {
        self.pools().responses.get()
    }

    /// Write the outgoing side of `exchange` into `request`
    fn encode(&mut self, request: &mut Self::Request, exchange: &Exchange) -> Result<()>;

    /// Overwrite the response side of `exchange` from `response`
    fn decode(&mut self, exchange: &mut Exchange, response: &Self::Response) -> Result<()>;
}

/// Server side: request model into the exchange, produced response out
pub trait ServerCodec: Send + 'static {
    type Request: Transmittable;
    type Response: Transmittable;

    fn pools(&self) -> &ModelPools<Self::Request, Self::Response>;

    fn get_request(&self) -> Pooled<Self::Request> {
        self.pools().requests.get()
    }

    fn get_response(&self) -> Pooled<Self::Response> {
        self.pools().responses.get()
    }

    /// Overwrite the request side of `exchange` from `request`
    fn decode(&mut self, exchange: &mut Exchange, request: &Self::Request) -> Result<()>;

    /// Write the produced response of `exchange` into `response`
    fn encode(&mut self, response: &mut Self::Response, exchange: &Exchange) -> Result<()>;
}
