//! HTTP/1.1 framing shared by requests and responses
//!
//! Parsing goes through `httparse`; these helpers move its borrowed
//! fields into `http` types and handle Content-Length.

use crate::{Result, WireError};
use bytes::{BufMut, Bytes};
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};

/// Header slots offered to the parser; more fields than this is an error
pub(crate) const MAX_HEADERS: usize = 64;

/// Convert a parsed head's `Status` into the head length
pub(crate) fn complete(status: httparse::Status<usize>) -> Result<usize> {
    match status {
        httparse::Status::Complete(len) => Ok(len),
        httparse::Status::Partial => Err(WireError::Incomplete),
    }
}

/// Move parsed fields into `headers`, returning the Content-Length if present.
///
/// Content-Length is consumed here; writers regenerate it from the body.
pub(crate) fn collect_headers(parsed: &[httparse::Header<'_>], headers: &mut HeaderMap) -> Result<Option<usize>> {
    let mut content_length = None;

    for field in parsed {
        let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(|_| WireError::InvalidHeader {
            name: field.name.to_string(),
        })?;

        if name == CONTENT_LENGTH {
            let value = String::from_utf8_lossy(field.value);
            let len = value
                .trim()
                .parse::<usize>()
                .map_err(|_| WireError::InvalidContentLength {
                    value: value.to_string(),
                })?;
            content_length = Some(len);
            continue;
        }

        let value = HeaderValue::from_bytes(field.value).map_err(|_| WireError::InvalidHeader {
            name: field.name.to_string(),
        })?;
        headers.append(name, value);
    }

    Ok(content_length)
}

/// Take exactly `content_length` bytes of body, or everything when absent
pub(crate) fn take_body(rest: &[u8], content_length: Option<usize>) -> Result<Bytes> {
    match content_length {
        Some(expected) if rest.len() < expected => Err(WireError::Truncated {
            expected,
            actual: rest.len(),
        }),
        Some(expected) => Ok(Bytes::copy_from_slice(&rest[..expected])),
        None => Ok(Bytes::copy_from_slice(rest)),
    }
}

pub(crate) fn write_headers<B: BufMut>(dst: &mut B, headers: &HeaderMap, body: &[u8], with_length: bool) {
    for (name, value) in headers {
        if name == CONTENT_LENGTH {
            continue;
        }
        dst.put_slice(name.as_str().as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
    if with_length {
        dst.put_slice(b"content-length: ");
        dst.put_slice(body.len().to_string().as_bytes());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
    dst.put_slice(body);
}
