//! Address specification
//!
//! `"<data-model>:<serializer>:<family>:<address>"`, for example
//! `"raw:native:unix:/run/myserver.sock"` or
//! `"structured:json:tcp:127.0.0.1:9000"`. The address field is everything
//! after the third colon, so TCP/UDP `host:port` pairs need no escaping.

use crate::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire representation scheme for an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataModelKind {
    /// HTTP/1.1 bytes carried as an opaque blob
    Raw,
    /// Field-by-field representation of method, headers, status and body
    Structured,
}

/// Byte-level encoding applied to a data model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerializerKind {
    /// The model marshals its own bytes
    Native,
    /// serde through bincode
    Bincode,
    /// serde through JSON
    Json,
}

/// Socket transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    /// Unix domain stream socket
    Unix,
    /// Unix domain datagram socket
    UnixGram,
    /// UDP datagram socket
    Udp,
    /// TCP stream socket
    Tcp,
}

impl DataModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataModelKind::Raw => "raw",
            DataModelKind::Structured => "structured",
        }
    }
}

impl SerializerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializerKind::Native => "native",
            SerializerKind::Bincode => "bincode",
            SerializerKind::Json => "json",
        }
    }
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Unix => "unix",
            Family::UnixGram => "unixgram",
            Family::Udp => "udp",
            Family::Tcp => "tcp",
        }
    }

    /// One read/write is one packet
    pub fn is_datagram(&self) -> bool {
        matches!(self, Family::UnixGram | Family::Udp)
    }

    /// Address is a filesystem path
    pub fn is_filesystem(&self) -> bool {
        matches!(self, Family::Unix | Family::UnixGram)
    }
}

impl FromStr for DataModelKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(DataModelKind::Raw),
            "structured" => Ok(DataModelKind::Structured),
            _ => Err(TransportError::UnknownDataModel {
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for SerializerKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "native" => Ok(SerializerKind::Native),
            "bincode" => Ok(SerializerKind::Bincode),
            "json" => Ok(SerializerKind::Json),
            _ => Err(TransportError::UnknownSerializer {
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Family {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unix" => Ok(Family::Unix),
            "unixgram" => Ok(Family::UnixGram),
            "udp" => Ok(Family::Udp),
            "tcp" => Ok(Family::Tcp),
            _ => Err(TransportError::UnknownFamily {
                value: s.to_string(),
            }),
        }
    }
}

/// Parsed, immutable address specification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressSpec {
    data_model: DataModelKind,
    serializer: SerializerKind,
    family: Family,
    address: String,
}

impl AddressSpec {
    /// Parse `"<data-model>:<serializer>:<family>:<address>"`.
    ///
    /// Fewer than four fields, or an empty address, is `MalformedAddress`;
    /// otherwise the first unrecognised tag decides the error kind.
    pub fn parse(spec: &str) -> Result<Self> {
        let malformed = || TransportError::MalformedAddress {
            address: spec.to_string(),
        };

        let mut words = spec.splitn(4, ':');
        let (data_model, serializer, family, address) =
            match (words.next(), words.next(), words.next(), words.next()) {
                (Some(d), Some(s), Some(f), Some(a)) => (d, s, f, a),
                _ => return Err(malformed()),
            };
        if address.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            data_model: data_model.parse()?,
            serializer: serializer.parse()?,
            family: family.parse()?,
            address: address.to_string(),
        })
    }

    pub fn data_model(&self) -> DataModelKind {
        self.data_model
    }

    pub fn serializer(&self) -> SerializerKind {
        self.serializer
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl FromStr for AddressSpec {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.data_model.as_str(),
            self.serializer.as_str(),
            self.family.as_str(),
            self.address
        )
    }
}
