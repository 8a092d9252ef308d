//! Unix Domain Socket helpers
//!
//! Binding with stale-file removal and permission setup, plus the
//! self-bound client side of Unix datagram sockets (an unbound datagram
//! client could send but never be replied to).

use crate::{Result, TransportError};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{UnixDatagram, UnixListener};
use tracing::debug;

static CLIENT_PATH_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Socket file removed when dropped
#[derive(Debug)]
pub struct SocketPath {
    path: PathBuf,
}

impl SocketPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketPath {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Remove a leftover socket file from an earlier bind; absence is fine
pub fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Apply `mode` to the socket file at `path`
pub fn set_permissions(path: &Path, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

fn prepare(address: &str) -> Result<&Path> {
    let path = Path::new(address);

    remove_stale(path)
        .map_err(|e| TransportError::bind(address, "Failed to remove existing socket", e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| TransportError::bind(address, "Failed to create socket directory", e))?;
    }

    Ok(path)
}

fn apply_permissions(address: &str, path: &Path, mode: u32) -> Result<()> {
    set_permissions(path, mode).map_err(|e| {
        TransportError::bind(
            address,
            format!("Cannot change permission on socket to {:o}", mode),
            e,
        )
    })
}

/// Bind a Unix stream listener at `address`
pub fn bind_stream(address: &str, mode: u32) -> Result<UnixListener> {
    let path = prepare(address)?;
    let listener = UnixListener::bind(path)
        .map_err(|e| TransportError::bind(address, "Failed to bind Unix socket", e))?;
    apply_permissions(address, path, mode)?;
    Ok(listener)
}

/// Bind a Unix datagram socket at `address`
pub fn bind_datagram(address: &str, mode: u32) -> Result<UnixDatagram> {
    let path = prepare(address)?;
    let socket = UnixDatagram::bind(path)
        .map_err(|e| TransportError::bind(address, "Failed to bind Unix datagram socket", e))?;
    apply_permissions(address, path, mode)?;
    Ok(socket)
}

/// Path a datagram client binds to: next to the server's, unique per process and socket
pub fn client_path(server: &str) -> PathBuf {
    let n = CLIENT_PATH_COUNTER.fetch_add(1, Ordering::Relaxed);
    PathBuf::from(format!("{}.{}.{}", server, std::process::id(), n))
}

/// Bind a client datagram socket at its own path and connect it to `server`
pub fn connect_datagram(server: &str) -> io::Result<(UnixDatagram, SocketPath)> {
    let local = client_path(server);
    remove_stale(&local)?;

    let socket = UnixDatagram::bind(&local)?;
    let local = SocketPath::new(local);
    socket.connect(server)?;

    debug!(local = ?local.path(), server, "Connected Unix datagram socket");
    Ok((socket, local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_bind_replaces_stale_file_and_sets_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        fs::write(&path, b"leftover").unwrap();

        let address = path.to_str().unwrap();
        let _listener = bind_stream(address, 0o600).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn test_client_path_is_removed_on_drop() {
        let dir = tempdir().unwrap();
        let server_path = dir.path().join("gram.sock");
        let server = server_path.to_str().unwrap();
        let _server = bind_datagram(server, 0o700).unwrap();

        let (_socket, local) = connect_datagram(server).unwrap();
        let local_path = local.path().to_path_buf();
        assert!(local_path.exists());

        drop(local);
        assert!(!local_path.exists());
    }

    #[tokio::test]
    async fn test_connect_datagram_to_missing_server_fails() {
        let dir = tempdir().unwrap();
        let server = dir.path().join("missing.sock");
        assert!(connect_datagram(server.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_client_paths_are_unique() {
        assert_ne!(client_path("/tmp/a.sock"), client_path("/tmp/a.sock"));
    }
}
