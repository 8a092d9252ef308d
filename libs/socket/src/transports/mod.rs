//! Message Transport
//!
//! One `read`/`write` surface over every socket family. Datagram sockets
//! map one call to one packet (`recv`/`recv_from`, `send`/`send_to`), so
//! small packets are never coalesced. Stream sockets pass straight through
//! to the byte stream and leave message boundaries to the serializer's
//! length-prefix framing.
//!
//! The concrete socket type is a closed set of variants fixed when the
//! socket is dialed or accepted; nothing is re-resolved per call.

use crate::address::Family;
use crate::{Result, TransportError};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket, UnixDatagram, UnixListener, UnixStream};
use tracing::{debug, info, warn};

pub mod unix;

#[cfg(test)]
mod tests;

pub use unix::SocketPath;

/// A connected (or, server-side, bound) socket framed as discrete messages
#[derive(Debug)]
pub enum Messenger {
    /// TCP byte stream
    Tcp(TcpStream),
    /// Unix domain byte stream
    Unix(UnixStream),
    /// Connected UDP socket (client side)
    Udp(UdpSocket),
    /// Bound UDP socket replying to the sender of the last packet (server side)
    UdpServer {
        socket: UdpSocket,
        peer: Option<SocketAddr>,
    },
    /// Connected Unix datagram socket bound at its own path (client side)
    UnixGram {
        socket: UnixDatagram,
        _path: SocketPath,
    },
    /// Bound Unix datagram socket replying to the sender of the last packet (server side)
    UnixGramServer {
        socket: UnixDatagram,
        peer: Option<PathBuf>,
    },
}

impl Messenger {
    /// Read one packet (datagram) or whatever bytes are available (stream)
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Messenger::Tcp(stream) => stream.read(buf).await,
            Messenger::Unix(stream) => stream.read(buf).await,
            Messenger::Udp(socket) => socket.recv(buf).await,
            Messenger::UdpServer { socket, peer } => {
                let (n, from) = socket.recv_from(buf).await?;
                *peer = Some(from);
                Ok(n)
            }
            Messenger::UnixGram { socket, .. } => socket.recv(buf).await,
            Messenger::UnixGramServer { socket, peer } => {
                let (n, from) = socket.recv_from(buf).await?;
                *peer = from.as_pathname().map(|p| p.to_path_buf());
                Ok(n)
            }
        }
    }

    /// Write one packet (datagram) or all of `buf` (stream)
    pub async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Messenger::Tcp(stream) => stream.write_all(buf).await.map(|_| buf.len()),
            Messenger::Unix(stream) => stream.write_all(buf).await.map(|_| buf.len()),
            Messenger::Udp(socket) => socket.send(buf).await,
            Messenger::UdpServer { socket, peer } => {
                let peer = peer.ok_or_else(no_peer)?;
                socket.send_to(buf, peer).await
            }
            Messenger::UnixGram { socket, .. } => socket.send(buf).await,
            Messenger::UnixGramServer { socket, peer } => {
                let peer = peer.as_ref().ok_or_else(no_peer)?;
                socket.send_to(buf, peer).await
            }
        }
    }

    /// Shut down the write half of a stream; a no-op for datagrams
    pub async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Messenger::Tcp(stream) => stream.shutdown().await,
            Messenger::Unix(stream) => stream.shutdown().await,
            _ => Ok(()),
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Messenger::Tcp(_) => Family::Tcp,
            Messenger::Unix(_) => Family::Unix,
            Messenger::Udp(_) | Messenger::UdpServer { .. } => Family::Udp,
            Messenger::UnixGram { .. } | Messenger::UnixGramServer { .. } => Family::UnixGram,
        }
    }

    pub fn is_datagram(&self) -> bool {
        self.family().is_datagram()
    }
}

fn no_peer() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "no datagram peer to reply to")
}

/// Dial `address` over `family` (client side)
pub async fn dial(family: Family, address: &str) -> Result<Messenger> {
    let messenger = dial_io(family, address)
        .await
        .map_err(|e| TransportError::dial(format!("{}:{}", family.as_str(), address), e))?;

    debug!(family = family.as_str(), address, "Dialed socket");
    Ok(messenger)
}

async fn dial_io(family: Family, address: &str) -> io::Result<Messenger> {
    match family {
        Family::Tcp => {
            let stream = TcpStream::connect(address).await?;
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
            Ok(Messenger::Tcp(stream))
        }
        Family::Unix => Ok(Messenger::Unix(UnixStream::connect(address).await?)),
        Family::Udp => {
            let remote = tokio::net::lookup_host(address).await?.next().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {address}"))
            })?;
            let local: SocketAddr = if remote.is_ipv4() {
                (Ipv4Addr::UNSPECIFIED, 0).into()
            } else {
                (Ipv6Addr::UNSPECIFIED, 0).into()
            };
            let socket = UdpSocket::bind(local).await?;
            socket.connect(remote).await?;
            Ok(Messenger::Udp(socket))
        }
        Family::UnixGram => {
            let (socket, path) = unix::connect_datagram(address)?;
            Ok(Messenger::UnixGram { socket, _path: path })
        }
    }
}

/// Stream listener producing one messenger per accepted connection
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    pub async fn accept(&self) -> io::Result<Messenger> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY: {}", e);
                }
                debug!(peer = %peer, "Accepted TCP connection");
                Ok(Messenger::Tcp(stream))
            }
            Listener::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                debug!("Accepted Unix socket connection");
                Ok(Messenger::Unix(stream))
            }
        }
    }
}

/// What binding produced: a listener for streams, one socket for datagrams
#[derive(Debug)]
pub enum Endpoint {
    Listener(Listener),
    Datagram(Messenger),
}

/// Bound server socket and its resolved local address
#[derive(Debug)]
pub struct BoundSocket {
    pub endpoint: Endpoint,
    pub local_addr: String,
}

/// Bind `address` over `family` (server side).
///
/// Filesystem-backed families replace any stale socket file and get
/// `permissions` applied right after bind.
pub async fn bind(family: Family, address: &str, permissions: u32) -> Result<BoundSocket> {
    let bound = match family {
        Family::Tcp => {
            let listener = TcpListener::bind(address)
                .await
                .map_err(|e| TransportError::bind(address, "Failed to bind TCP listener", e))?;
            let local_addr = listener
                .local_addr()
                .map_err(|e| TransportError::bind(address, "Failed to get local address", e))?;
            BoundSocket {
                endpoint: Endpoint::Listener(Listener::Tcp(listener)),
                local_addr: local_addr.to_string(),
            }
        }
        Family::Unix => BoundSocket {
            endpoint: Endpoint::Listener(Listener::Unix(unix::bind_stream(address, permissions)?)),
            local_addr: address.to_string(),
        },
        Family::Udp => {
            let socket = UdpSocket::bind(address)
                .await
                .map_err(|e| TransportError::bind(address, "Failed to bind UDP socket", e))?;
            let local_addr = socket
                .local_addr()
                .map_err(|e| TransportError::bind(address, "Failed to get local address", e))?;
            BoundSocket {
                endpoint: Endpoint::Datagram(Messenger::UdpServer { socket, peer: None }),
                local_addr: local_addr.to_string(),
            }
        }
        Family::UnixGram => BoundSocket {
            endpoint: Endpoint::Datagram(Messenger::UnixGramServer {
                socket: unix::bind_datagram(address, permissions)?,
                peer: None,
            }),
            local_addr: address.to_string(),
        },
    };

    let mode = format!("{:o}", permissions);
    info!(
        family = family.as_str(),
        address = %bound.local_addr,
        permissions = %mode,
        "Started to listen"
    );
    Ok(bound)
}
