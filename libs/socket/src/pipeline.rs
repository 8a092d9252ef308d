//! Exchange Pipelines
//!
//! A pipeline bundles the codec, the framed serializer and one pooled
//! request/response model pair for a single connection. The data model and
//! serializer tags are matched once, when the client or server is built,
//! into a factory producing boxed pipelines; every exchange afterwards goes
//! through the chosen implementation without looking at the tags again.

use crate::address::{AddressSpec, DataModelKind, SerializerKind};
use crate::model::raw::{RawClientCodec, RawPools, RawServerCodec};
use crate::model::structured::{StructuredClientCodec, StructuredPools, StructuredServerCodec};
use crate::model::{ClientCodec, Pooled, ServerCodec};
use crate::serializer::{Bincode, Json, Native, Serializer, WireFormat};
use crate::transports::Messenger;
use crate::{Result, TransportError};
use async_trait::async_trait;
use exchange::Exchange;
use std::sync::Arc;

/// Client-side steps of one round trip, in call order
#[async_trait]
pub trait ClientPipeline: Send {
    /// Codec-encode the outgoing request into the pooled request model
    fn encode_request(&mut self, exchange: &Exchange) -> Result<()>;

    /// Send the request model as one frame
    async fn write_request(&mut self, messenger: &mut Messenger) -> Result<()>;

    /// Receive one frame into the pooled response model
    async fn read_response(&mut self, messenger: &mut Messenger) -> Result<()>;

    /// Codec-decode the response model into the exchange
    fn decode_response(&mut self, exchange: &mut Exchange) -> Result<()>;

    /// Forget buffered bytes from a socket that has been replaced
    fn reset(&mut self);
}

/// Server-side steps of one round trip, in call order
#[async_trait]
pub trait ServerPipeline: Send {
    async fn read_request(&mut self, messenger: &mut Messenger) -> Result<()>;

    fn decode_request(&mut self, exchange: &mut Exchange) -> Result<()>;

    fn encode_response(&mut self, exchange: &Exchange) -> Result<()>;

    async fn write_response(&mut self, messenger: &mut Messenger) -> Result<()>;
}

pub type ClientFactory = Arc<dyn Fn() -> Box<dyn ClientPipeline> + Send + Sync>;
pub type ServerFactory = Arc<dyn Fn() -> Box<dyn ServerPipeline> + Send + Sync>;

pub struct ClientStages<C: ClientCodec, F> {
    codec: C,
    serializer: Serializer<F>,
    request: Pooled<C::Request>,
    response: Pooled<C::Response>,
}

impl<C: ClientCodec, F> ClientStages<C, F> {
    pub fn new(codec: C, format: F, max_message_size: usize) -> Self {
        Self {
            request: codec.get_request(),
            response: codec.get_response(),
            serializer: Serializer::new(format, max_message_size),
            codec,
        }
    }
}

#[async_trait]
impl<C, F> ClientPipeline for ClientStages<C, F>
where
    C: ClientCodec,
    F: WireFormat<C::Request> + WireFormat<C::Response>,
{
    fn encode_request(&mut self, exchange: &Exchange) -> Result<()> {
        self.codec.encode(&mut self.request, exchange)
    }

    async fn write_request(&mut self, messenger: &mut Messenger) -> Result<()> {
        self.serializer.encode(messenger, &*self.request).await
    }

    async fn read_response(&mut self, messenger: &mut Messenger) -> Result<()> {
        self.serializer.decode(messenger, &mut *self.response).await
    }

    fn decode_response(&mut self, exchange: &mut Exchange) -> Result<()> {
        self.codec.decode(exchange, &self.response)
    }

    fn reset(&mut self) {
        self.serializer.clear();
    }
}

pub struct ServerStages<C: ServerCodec, F> {
    codec: C,
    serializer: Serializer<F>,
    request: Pooled<C::Request>,
    response: Pooled<C::Response>,
}

impl<C: ServerCodec, F> ServerStages<C, F> {
    pub fn new(codec: C, format: F, max_message_size: usize) -> Self {
        Self {
            request: codec.get_request(),
            response: codec.get_response(),
            serializer: Serializer::new(format, max_message_size),
            codec,
        }
    }
}

#[async_trait]
impl<C, F> ServerPipeline for ServerStages<C, F>
where
    C: ServerCodec,
    F: WireFormat<C::Request> + WireFormat<C::Response>,
{
    async fn read_request(&mut self, messenger: &mut Messenger) -> Result<()> {
        self.serializer.decode(messenger, &mut *self.request).await
    }

    fn decode_request(&mut self, exchange: &mut Exchange) -> Result<()> {
        self.codec.decode(exchange, &self.request)
    }

    fn encode_response(&mut self, exchange: &Exchange) -> Result<()> {
        self.codec.encode(&mut self.response, exchange)
    }

    async fn write_response(&mut self, messenger: &mut Messenger) -> Result<()> {
        self.serializer.encode(messenger, &*self.response).await
    }
}

fn client_stages<C, F>(
    codec: impl Fn() -> C + Send + Sync + 'static,
    format: F,
    max_message_size: usize,
) -> ClientFactory
where
    C: ClientCodec,
    F: WireFormat<C::Request> + WireFormat<C::Response> + Copy,
{
    Arc::new(move || -> Box<dyn ClientPipeline> {
        Box::new(ClientStages::new(codec(), format, max_message_size))
    })
}

fn server_stages<C, F>(
    codec: impl Fn() -> C + Send + Sync + 'static,
    format: F,
    max_message_size: usize,
) -> ServerFactory
where
    C: ServerCodec,
    F: WireFormat<C::Request> + WireFormat<C::Response> + Copy,
{
    Arc::new(move || -> Box<dyn ServerPipeline> {
        Box::new(ServerStages::new(codec(), format, max_message_size))
    })
}

fn native_unsupported(spec: &AddressSpec) -> TransportError {
    TransportError::configuration(
        format!(
            "serializer {} needs models that marshal themselves, data model {} does not",
            spec.serializer().as_str(),
            spec.data_model().as_str()
        ),
        Some("address"),
    )
}

/// Resolve the client pipeline for `spec`; all pipelines share one pair of model pools
pub fn client_factory(spec: &AddressSpec, max_message_size: usize) -> Result<ClientFactory> {
    let max = max_message_size;
    let factory = match spec.data_model() {
        DataModelKind::Raw => {
            let pools = RawPools::new();
            let codec = move || RawClientCodec::new(pools.clone());
            match spec.serializer() {
                SerializerKind::Native => client_stages(codec, Native, max),
                SerializerKind::Bincode => client_stages(codec, Bincode, max),
                SerializerKind::Json => client_stages(codec, Json, max),
            }
        }
        DataModelKind::Structured => {
            let pools = StructuredPools::new();
            let codec = move || StructuredClientCodec::new(pools.clone());
            match spec.serializer() {
                SerializerKind::Native => return Err(native_unsupported(spec)),
                SerializerKind::Bincode => client_stages(codec, Bincode, max),
                SerializerKind::Json => client_stages(codec, Json, max),
            }
        }
    };
    Ok(factory)
}

/// Resolve the server pipeline for `spec`; all pipelines share one pair of model pools
pub fn server_factory(spec: &AddressSpec, max_message_size: usize) -> Result<ServerFactory> {
    let max = max_message_size;
    let factory = match spec.data_model() {
        DataModelKind::Raw => {
            let pools = RawPools::new();
            let codec = move || RawServerCodec::new(pools.clone());
            match spec.serializer() {
                SerializerKind::Native => server_stages(codec, Native, max),
                SerializerKind::Bincode => server_stages(codec, Bincode, max),
                SerializerKind::Json => server_stages(codec, Json, max),
            }
        }
        DataModelKind::Structured => {
            let pools = StructuredPools::new();
            let codec = move || StructuredServerCodec::new(pools.clone());
            match spec.serializer() {
                SerializerKind::Native => return Err(native_unsupported(spec)),
                SerializerKind::Bincode => server_stages(codec, Bincode, max),
                SerializerKind::Json => server_stages(codec, Json, max),
            }
        }
    };
    Ok(factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange::header::HOST;
    use exchange::{HeaderValue, Method, Request, StatusCode, Uri};
    use tokio::net::UnixStream;

    #[test]
    fn test_structured_native_is_configuration_error() {
        let spec = AddressSpec::parse("structured:native:tcp:127.0.0.1:1").unwrap();
        let err = client_factory(&spec, 1024).err().unwrap();
        assert!(err.is_configuration());
        assert!(server_factory(&spec, 1024).is_err());
    }

    #[tokio::test]
    async fn test_client_and_server_pipelines_interoperate() {
        for address in [
            "raw:native:unix:/unused",
            "raw:bincode:unix:/unused",
            "raw:json:unix:/unused",
            "structured:bincode:unix:/unused",
            "structured:json:unix:/unused",
        ] {
            let spec = AddressSpec::parse(address).unwrap();
            let mut client = client_factory(&spec, 4096).unwrap()();
            let mut server = server_factory(&spec, 4096).unwrap()();
            let (a, b) = UnixStream::pair().unwrap();
            let (mut a, mut b) = (Messenger::Unix(a), Messenger::Unix(b));

            let mut request = Request::new(Method::POST, Uri::from_static("/echo"));
            request.headers.insert(HOST, HeaderValue::from_static("example.com"));
            request.set_body("ping");
            let mut outgoing = Exchange::new(request);

            client.encode_request(&outgoing).unwrap();
            client.write_request(&mut a).await.unwrap();

            let mut incoming = Exchange::default();
            server.read_request(&mut b).await.unwrap();
            server.decode_request(&mut incoming).unwrap();
            assert_eq!(incoming.request, outgoing.request, "{address}");

            incoming.response.status = StatusCode::ACCEPTED;
            incoming.response.set_body("pong");
            server.encode_response(&incoming).unwrap();
            server.write_response(&mut b).await.unwrap();

            client.read_response(&mut a).await.unwrap();
            client.decode_response(&mut outgoing).unwrap();
            assert_eq!(outgoing.response, incoming.response, "{address}");
        }
    }
}
