//! Exchange Context
//!
//! The application-level request/response pair that `exchange-socket`
//! forwards across a socket boundary. An [`Exchange`] carries the incoming
//! side (method, URI, headers, body) and the produced side (status,
//! headers, body) of one logical call, held in the `http` crate's types so
//! every name, value and status code is valid by construction.
//!
//! Both halves know their own HTTP/1.1 wire form ([`Request::write_to`],
//! [`Request::read_from`] and the [`Response`] counterparts, parsed with
//! `httparse`). The raw data model ships exactly these bytes; the
//! structured data model carries the fields one by one.

pub mod error;
pub mod request;
pub mod response;
mod wire;

pub use error::{Result, WireError};
pub use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
pub use request::Request;
pub use response::Response;

/// Protocol version written on every request and status line
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// One in-flight call: what came in and what goes back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    pub request: Request,
    pub response: Response,
}

impl Exchange {
    /// Create an exchange around a request with a default (200, empty) response
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::default(),
        }
    }

    /// Clear both sides back to their defaults, keeping header capacity
    pub fn reset(&mut self) {
        self.request.reset();
        self.response.reset();
    }
}
