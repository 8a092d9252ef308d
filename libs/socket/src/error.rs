//! Transport Error Types
//!
//! Error handling for address configuration, dialing and binding, framed
//! message I/O, model encoding, pool exhaustion and server-side handling.

use thiserror::Error;

/// Alias kept for callers that think in terms of sockets
pub type SocketError = TransportError;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// First address field names no known data model
    #[error("Unknown data model: {value:?}")]
    UnknownDataModel { value: String },

    /// Second address field names no known serializer
    #[error("Unknown serializer: {value:?}")]
    UnknownSerializer { value: String },

    /// Third address field names no known socket family
    #[error("Unknown family/transport: {value:?}")]
    UnknownFamily { value: String },

    /// Address specification does not have four colon-separated fields
    #[error(
        "Invalid address {address:?}, expected syntax \"datamodel:serializer:family:address\", \
         example \"raw:native:unix:/run/myserver.sock\""
    )]
    MalformedAddress { address: String },

    /// Any other configuration problem
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Client-side connect failed
    #[error("Cannot dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Server-side bind, listen or socket permission setup failed
    #[error("Cannot bind {address}: {message}")]
    Bind {
        address: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket read or write failed mid-exchange
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Peer closed the stream cleanly between messages
    #[error("End of stream")]
    EndOfStream,

    /// Connection has no live socket
    #[error("Connection closed")]
    Closed,

    /// Frame exceeds the configured maximum message size
    #[error("Message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Framing, serialization or model conversion failed
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every pooled connection is held by another caller
    #[error("All connections are busy")]
    Busy,

    /// Client pool or server was used before it was started
    #[error("Not started")]
    NotStarted,

    /// External request handler rejected the exchange
    #[error("Handler failed: {source}")]
    Handler {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An exchange step panicked; the panic was caught and converted
    #[error("Internal failure: {message}")]
    Internal { message: String },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Create a dial error
    pub fn dial(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Dial {
            address: address.into(),
            source,
        }
    }

    /// Create a bind error
    pub fn bind(address: impl Into<String>, message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            address: address.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Create a protocol error with source
    pub fn protocol_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Protocol {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap a handler failure
    pub fn handler(error: anyhow::Error) -> Self {
        Self::Handler {
            source: error.into(),
        }
    }

    /// Convert a caught panic payload
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            message.to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "panic during exchange".to_string()
        };
        Self::Internal { message }
    }

    /// Normal termination of a stream connection, not a failure to report
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TransportError::EndOfStream)
    }

    /// Configuration errors are fatal at startup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TransportError::UnknownDataModel { .. }
                | TransportError::UnknownSerializer { .. }
                | TransportError::UnknownFamily { .. }
                | TransportError::MalformedAddress { .. }
                | TransportError::Configuration { .. }
        )
    }

    /// Check if the caller may retry the whole exchange
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Dial { .. } => true,
            TransportError::Io { .. } => true,
            TransportError::EndOfStream => true,
            TransportError::Closed => true,
            TransportError::Busy => true,
            TransportError::Internal { .. } => true,
            TransportError::Bind { .. } => false,
            TransportError::MessageTooLarge { .. } => false,
            TransportError::Protocol { .. } => false,
            TransportError::Handler { .. } => false,
            TransportError::NotStarted => false,
            _ => false,
        }
    }

    /// Check if this is a transient error
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Io { .. }
                | TransportError::EndOfStream
                | TransportError::Closed
                | TransportError::Busy
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::UnknownDataModel { .. }
            | TransportError::UnknownSerializer { .. }
            | TransportError::UnknownFamily { .. }
            | TransportError::MalformedAddress { .. }
            | TransportError::Configuration { .. } => "configuration",
            TransportError::Dial { .. } => "dial",
            TransportError::Bind { .. } => "bind",
            TransportError::Io { .. } => "io",
            TransportError::EndOfStream => "end_of_stream",
            TransportError::Closed => "closed",
            TransportError::MessageTooLarge { .. } => "message_too_large",
            TransportError::Protocol { .. } => "protocol",
            TransportError::Busy => "busy",
            TransportError::NotStarted => "not_started",
            TransportError::Handler { .. } => "handler",
            TransportError::Internal { .. } => "internal",
        }
    }
}

/// Convert standard I/O errors to transport errors
impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io {
            message: error.to_string(),
            source: error,
        }
    }
}

/// Convert bincode errors to transport errors
impl From<bincode::Error> for TransportError {
    fn from(error: bincode::Error) -> Self {
        TransportError::protocol_with_source("Binary serialization failed", error)
    }
}

/// Convert JSON errors to transport errors
impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        TransportError::protocol_with_source("JSON serialization failed", error)
    }
}

/// Convert exchange wire errors to transport errors
impl From<exchange::WireError> for TransportError {
    fn from(error: exchange::WireError) -> Self {
        TransportError::protocol_with_source("Malformed exchange message", error)
    }
}
