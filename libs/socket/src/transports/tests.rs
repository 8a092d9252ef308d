//! Transport tests over real sockets

use super::*;
use tempfile::tempdir;

fn into_listener(bound: BoundSocket) -> Listener {
    match bound.endpoint {
        Endpoint::Listener(listener) => listener,
        Endpoint::Datagram(_) => panic!("expected a stream listener"),
    }
}

fn into_datagram(bound: BoundSocket) -> Messenger {
    match bound.endpoint {
        Endpoint::Datagram(messenger) => messenger,
        Endpoint::Listener(_) => panic!("expected a datagram socket"),
    }
}

mod stream {
    use super::*;

    #[tokio::test]
    async fn test_tcp_bytes_pass_through() {
        let bound = bind(Family::Tcp, "127.0.0.1:0", 0o700).await.unwrap();
        let addr = bound.local_addr.clone();
        let listener = into_listener(bound);

        let mut client = dial(Family::Tcp, &addr).await.unwrap();
        let mut server = listener.accept().await.unwrap();
        assert_eq!(server.family(), Family::Tcp);
        assert!(!server.is_datagram());

        assert_eq!(client.write(b"hello ").await.unwrap(), 6);
        assert_eq!(client.write(b"world").await.unwrap(), 5);

        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while received.len() < 11 {
            let n = server.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"hello world");
    }

    #[tokio::test]
    async fn test_unix_shutdown_reads_as_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream.sock");
        let address = path.to_str().unwrap();

        let listener = into_listener(bind(Family::Unix, address, 0o700).await.unwrap());
        let mut client = dial(Family::Unix, address).await.unwrap();
        let mut server = listener.accept().await.unwrap();

        client.shutdown().await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dial_missing_unix_socket_is_dial_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.sock");

        let err = dial(Family::Unix, path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, TransportError::Dial { .. }));
        assert!(err.is_retryable());
    }
}

mod datagram {
    use super::*;

    #[tokio::test]
    async fn test_udp_packets_are_not_coalesced() {
        let bound = bind(Family::Udp, "127.0.0.1:0", 0o700).await.unwrap();
        let addr = bound.local_addr.clone();
        let mut server = into_datagram(bound);

        let mut client = dial(Family::Udp, &addr).await.unwrap();
        assert!(client.is_datagram());
        client.write(b"one").await.unwrap();
        client.write(b"two").await.unwrap();

        let mut buf = [0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"one");
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"two");

        server.write(b"reply").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"reply");
    }

    #[tokio::test]
    async fn test_unixgram_server_replies_to_sender() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gram.sock");
        let address = path.to_str().unwrap();

        let mut server = into_datagram(bind(Family::UnixGram, address, 0o700).await.unwrap());
        let mut first = dial(Family::UnixGram, address).await.unwrap();
        let mut second = dial(Family::UnixGram, address).await.unwrap();

        let mut buf = [0u8; 64];
        second.write(b"from second").await.unwrap();
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"from second");
        server.write(b"to second").await.unwrap();
        let n = second.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"to second");

        first.write(b"from first").await.unwrap();
        server.read(&mut buf).await.unwrap();
        server.write(b"to first").await.unwrap();
        let n = first.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"to first");
    }

    #[tokio::test]
    async fn test_server_write_without_peer_fails() {
        let bound = bind(Family::Udp, "127.0.0.1:0", 0o700).await.unwrap();
        let mut server = into_datagram(bound);

        let err = server.write(b"nobody").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}

mod binding {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn test_unix_bind_applies_permissions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("perm.sock");

        let bound = bind(Family::Unix, path.to_str().unwrap(), 0o750).await.unwrap();
        assert_eq!(bound.local_addr, path.to_str().unwrap());

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o750);
    }

    #[tokio::test]
    async fn test_tcp_port_in_use_is_bind_error() {
        let first = bind(Family::Tcp, "127.0.0.1:0", 0o700).await.unwrap();
        let err = bind(Family::Tcp, &first.local_addr, 0o700).await.unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
        assert_eq!(err.category(), "bind");
    }
}
