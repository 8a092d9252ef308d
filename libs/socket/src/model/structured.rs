//! Structured data model
//!
//! The exchange broken into named fields so any serde format can carry it
//! across languages and processes. Decoding rebuilds each field through
//! the `http` constructors, so a model that could not have come from a
//! valid exchange (a header value with a line break, a four digit status)
//! is rejected instead of being reinterpreted.

use super::{ClientCodec, ModelPools, ServerCodec, Transmittable};
use crate::Result;
use bytes::Bytes;
use exchange::header::CONTENT_LENGTH;
use exchange::{
    Exchange, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, WireError, HTTP_VERSION,
};
use serde::{Deserialize, Serialize};

/// One header line; repeated names are kept as separate fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredRequest {
    pub method: String,
    pub uri: String,
    pub proto: String,
    pub headers: Vec<HeaderField>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredResponse {
    pub status: u16,
    pub reason: String,
    pub proto: String,
    pub headers: Vec<HeaderField>,
    pub body: Vec<u8>,
}

impl Transmittable for StructuredRequest {
    fn reset(&mut self) {
        self.method.clear();
        self.uri.clear();
        self.proto.clear();
        self.headers.clear();
        self.body.clear();
    }
}

impl Transmittable for StructuredResponse {
    fn reset(&mut self) {
        self.status = 0;
        self.reason.clear();
        self.proto.clear();
        self.headers.clear();
        self.body.clear();
    }
}

/// Empty means the sender left it out
fn check_proto(proto: &str) -> std::result::Result<(), WireError> {
    match proto {
        "" | "HTTP/1.0" | "HTTP/1.1" => Ok(()),
        other => Err(WireError::UnsupportedVersion {
            version: other.to_string(),
        }),
    }
}

/// Content-Length is left out; the body carries its own length
fn fill_fields(fields: &mut Vec<HeaderField>, headers: &HeaderMap) -> std::result::Result<(), WireError> {
    fields.clear();
    for (name, value) in headers {
        if name == CONTENT_LENGTH {
            continue;
        }
        let value = std::str::from_utf8(value.as_bytes()).map_err(|_| WireError::InvalidHeader {
            name: name.to_string(),
        })?;
        fields.push(HeaderField {
            name: name.as_str().to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn read_fields(fields: &[HeaderField], headers: &mut HeaderMap) -> std::result::Result<(), WireError> {
    headers.clear();
    for field in fields {
        let invalid = || WireError::InvalidHeader {
            name: field.name.clone(),
        };
        let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(|_| invalid())?;
        if name == CONTENT_LENGTH {
            continue;
        }
        let value = HeaderValue::from_bytes(field.value.as_bytes()).map_err(|_| invalid())?;
        headers.append(name, value);
    }
    Ok(())
}

impl StructuredRequest {
    fn fill(&mut self, request: &Request) -> std::result::Result<(), WireError> {
        self.method.clear();
        self.method.push_str(request.method.as_str());
        self.uri.clear();
        self.uri.push_str(&request.uri.to_string());
        self.proto.clear();
        self.proto.push_str(HTTP_VERSION);
        fill_fields(&mut self.headers, &request.headers)?;
        self.body.clear();
        self.body.extend_from_slice(&request.body);
        Ok(())
    }

    fn read_into(&self, request: &mut Request) -> std::result::Result<(), WireError> {
        check_proto(&self.proto)?;
        request.method = Method::from_bytes(self.method.as_bytes()).map_err(|_| WireError::InvalidMethod {
            value: self.method.clone(),
        })?;
        request.uri = self.uri.parse().map_err(|_| WireError::InvalidUri {
            value: self.uri.clone(),
        })?;
        read_fields(&self.headers, &mut request.headers)?;
        request.body = Bytes::copy_from_slice(&self.body);
        Ok(())
    }
}

impl StructuredResponse {
    fn fill(&mut self, response: &Response) -> std::result::Result<(), WireError> {
        self.status = response.status.as_u16();
        self.reason.clear();
        self.reason.push_str(exchange::response::reason_phrase(response.status));
        self.proto.clear();
        self.proto.push_str(HTTP_VERSION);
        fill_fields(&mut self.headers, &response.headers)?;
        self.body.clear();
        self.body.extend_from_slice(&response.body);
        Ok(())
    }

    /// The reason phrase is informational and not carried into the exchange
    fn read_into(&self, response: &mut Response) -> std::result::Result<(), WireError> {
        check_proto(&self.proto)?;
        response.status =
            StatusCode::from_u16(self.status).map_err(|_| WireError::InvalidStatus { code: self.status })?;
        read_fields(&self.headers, &mut response.headers)?;
        response.body = Bytes::copy_from_slice(&self.body);
        Ok(())
    }
}

pub type StructuredPools = ModelPools<StructuredRequest, StructuredResponse>;

#[derive(Default)]
pub struct StructuredClientCodec {
    pools: StructuredPools,
}

impl StructuredClientCodec {
    pub fn new(pools: StructuredPools) -> Self {
        Self { pools }
    }
}

impl ClientCodec for StructuredClientCodec {
    type Request = StructuredRequest;
    type Response = StructuredResponse;

    fn pools(&self) -> &StructuredPools {
        &self.pools
    }

    fn encode(&mut self, request: &mut StructuredRequest, exchange: &Exchange) -> Result<()> {
        request.fill(&exchange.request)?;
        Ok(())
    }

    fn decode(&mut self, exchange: &mut Exchange, response: &StructuredResponse) -> Result<()> {
        response.read_into(&mut exchange.response)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct StructuredServerCodec {
    pools: StructuredPools,
}

impl StructuredServerCodec {
    pub fn new(pools: StructuredPools) -> Self {
        Self { pools }
    }
}

impl ServerCodec for StructuredServerCodec {
    type Request = StructuredRequest;
    type Response = StructuredResponse;

    fn pools(&self) -> &StructuredPools {
        &self.pools
    }

    fn decode(&mut self, exchange: &mut Exchange, request: &StructuredRequest) -> Result<()> {
        request.read_into(&mut exchange.request)?;
        Ok(())
    }

    fn encode(&mut self, response: &mut StructuredResponse, exchange: &Exchange) -> Result<()> {
        response.fill(&exchange.response)?;
        Ok(())
    }
}
