//! Wire errors for HTTP/1.1 request and response messages

use thiserror::Error;

/// Failure to parse or build an HTTP/1.1 message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The header section is not terminated by an empty line
    #[error("Incomplete message: header section not terminated")]
    Incomplete,

    /// Rejected by the HTTP/1.x parser
    #[error("Malformed message: {0}")]
    Parse(#[from] httparse::Error),

    #[error("Invalid method: {value:?}")]
    InvalidMethod { value: String },

    #[error("Invalid URI: {value:?}")]
    InvalidUri { value: String },

    /// Name is not a token, or value holds bytes a header line cannot carry
    #[error("Invalid header field: {name:?}")]
    InvalidHeader { name: String },

    /// Status outside 100..=999
    #[error("Invalid status code: {code}")]
    InvalidStatus { code: u16 },

    /// Version token is not HTTP/1.x
    #[error("Unsupported protocol version: {version:?}")]
    UnsupportedVersion { version: String },

    /// Content-Length is not a decimal integer
    #[error("Invalid Content-Length: {value:?}")]
    InvalidContentLength { value: String },

    /// Fewer body bytes than the declared Content-Length
    #[error("Truncated body: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Result alias for wire operations
pub type Result<T> = std::result::Result<T, WireError>;
