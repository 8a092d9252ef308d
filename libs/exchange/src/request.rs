//! Incoming side of an exchange

use crate::wire::{collect_headers, complete, take_body, write_headers, MAX_HEADERS};
use crate::{Result, WireError, HTTP_VERSION};
use bytes::{BufMut, Bytes};
use http::{HeaderMap, Method, Uri};

/// Method, target, headers and body of one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            ..Default::default()
        }
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Back to `GET /` with no headers and an empty body
    pub fn reset(&mut self) {
        self.method = Method::GET;
        self.uri = Uri::default();
        self.headers.clear();
        self.body = Bytes::new();
    }

    /// Write the HTTP/1.1 form of this request.
    ///
    /// Content-Length is emitted only for a non-empty body.
    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(self.method.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(self.uri.to_string().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(HTTP_VERSION.as_bytes());
        dst.put_slice(b"\r\n");
        write_headers(dst, &self.headers, &self.body, !self.body.is_empty());
    }

    /// Parse an HTTP/1.x request, fully replacing the current contents
    pub fn read_from(&mut self, src: &[u8]) -> Result<()> {
        self.reset();

        let mut fields = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut fields);
        let head_len = complete(parsed.parse(src)?)?;

        let method = parsed.method.ok_or(WireError::Incomplete)?;
        self.method = Method::from_bytes(method.as_bytes()).map_err(|_| WireError::InvalidMethod {
            value: method.to_string(),
        })?;
        let path = parsed.path.ok_or(WireError::Incomplete)?;
        self.uri = path.parse().map_err(|_| WireError::InvalidUri {
            value: path.to_string(),
        })?;

        let content_length = collect_headers(parsed.headers, &mut self.headers)?;
        // a request without Content-Length carries no body
        self.body = take_body(&src[head_len..], Some(content_length.unwrap_or(0)))?;
        Ok(())
    }
}
