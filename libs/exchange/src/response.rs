//! Produced side of an exchange

use crate::wire::{collect_headers, complete, take_body, write_headers, MAX_HEADERS};
use crate::{Result, WireError, HTTP_VERSION};
use bytes::{BufMut, Bytes};
use http::{HeaderMap, StatusCode};

/// Status, headers and body returned for one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body = Bytes::new();
    }

    /// Write the HTTP/1.1 form of this response; Content-Length is always present
    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(HTTP_VERSION.as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(self.status.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(reason_phrase(self.status).as_bytes());
        dst.put_slice(b"\r\n");
        write_headers(dst, &self.headers, &self.body, true);
    }

    /// Parse an HTTP/1.x response, fully replacing the current contents.
    ///
    /// The reason phrase is not kept. Without Content-Length the body runs
    /// to the end of `src`.
    pub fn read_from(&mut self, src: &[u8]) -> Result<()> {
        self.reset();

        let mut fields = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut fields);
        let head_len = complete(parsed.parse(src)?)?;

        let code = parsed.code.ok_or(WireError::Incomplete)?;
        self.status = StatusCode::from_u16(code).map_err(|_| WireError::InvalidStatus { code })?;

        let content_length = collect_headers(parsed.headers, &mut self.headers)?;
        self.body = take_body(&src[head_len..], content_length)?;
        Ok(())
    }
}

/// Canonical reason phrase, `"Unknown"` for unregistered codes
pub fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}
