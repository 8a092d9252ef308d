//! Client/server round trips over every socket family

mod common;

use common::{init_tracing, request, start_echo_server, unix_address, ECHO_URI};
use exchange::header::{CONTENT_TYPE, HOST};
use exchange::{Exchange, HeaderValue, Method, Request, Response, StatusCode, Uri};
use exchange_socket::{SocketClient, SocketConfig, SocketServer, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_unix_raw_native_forwards_headers_and_response() {
    init_tracing();
    let dir = tempdir().unwrap();
    let config = SocketConfig::new(unix_address("raw:native", "unix", dir.path(), "e2e.sock"));

    let seen_host = Arc::new(Mutex::new(None::<HeaderValue>));
    let seen = Arc::clone(&seen_host);
    let server = SocketServer::new(
        move |exchange: &mut Exchange| -> anyhow::Result<()> {
            *seen.lock() = exchange.request.headers.get(HOST).cloned();
            exchange.response.status = StatusCode::OK;
            exchange
                .response
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            exchange.response.set_body("hello from the other side");
            Ok(())
        },
        config.clone(),
    )
    .unwrap();
    server.start().await.unwrap();

    let client = SocketClient::connect(config).await.unwrap();
    let mut request = Request::new(Method::GET, Uri::from_static("/greeting"));
    request.headers.insert(HOST, HeaderValue::from_static("example.com"));
    let mut exchange = Exchange::new(request);

    client.send_and_receive(&mut exchange).await.unwrap();

    assert_eq!(*seen_host.lock(), Some(HeaderValue::from_static("example.com")));
    let mut expected = Response::new(StatusCode::OK);
    expected
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    expected.set_body("hello from the other side");
    assert_eq!(exchange.response, expected);
}

#[tokio::test]
async fn test_tcp_structured_json() {
    init_tracing();
    let (_server, config) = start_echo_server("structured:json:tcp:127.0.0.1:0").await;
    let client = SocketClient::connect(config).await.unwrap();

    for i in 0..3 {
        let mut exchange = request(&format!("/items/{i}"), &format!("body {i}"));
        client.send_and_receive(&mut exchange).await.unwrap();
        assert_eq!(exchange.response.status, StatusCode::OK);
        assert_eq!(exchange.response.headers[ECHO_URI], format!("/items/{i}").as_str());
        assert_eq!(exchange.response.body, format!("body {i}").as_bytes());
    }
}

#[tokio::test]
async fn test_tcp_structured_bincode() {
    init_tracing();
    let (_server, config) = start_echo_server("structured:bincode:tcp:127.0.0.1:0").await;
    let client = SocketClient::connect(config).await.unwrap();

    let mut exchange = request("/bin", "payload");
    client.send_and_receive(&mut exchange).await.unwrap();
    assert_eq!(&exchange.response.body[..], b"payload");
}

#[tokio::test]
async fn test_udp_raw_bincode() {
    init_tracing();
    let (_server, config) = start_echo_server("raw:bincode:udp:127.0.0.1:0").await;
    let client = SocketClient::connect(config).await.unwrap();

    let mut exchange = request("/udp", "datagram");
    client.send_and_receive(&mut exchange).await.unwrap();
    assert_eq!(exchange.response.headers[ECHO_URI], "/udp");
    assert_eq!(&exchange.response.body[..], b"datagram");
}

#[tokio::test]
async fn test_unixgram_raw_native_with_two_clients() {
    init_tracing();
    let dir = tempdir().unwrap();
    let (_server, config) =
        start_echo_server(&unix_address("raw:native", "unixgram", dir.path(), "gram.sock")).await;

    let first = SocketClient::connect(config.clone()).await.unwrap();
    let second = SocketClient::connect(config).await.unwrap();

    let mut a = request("/a", "first");
    let mut b = request("/b", "second");
    first.send_and_receive(&mut a).await.unwrap();
    second.send_and_receive(&mut b).await.unwrap();

    assert_eq!(&a.response.body[..], b"first");
    assert_eq!(&b.response.body[..], b"second");
}

#[tokio::test]
async fn test_concurrent_callers_share_a_small_pool() {
    init_tracing();
    let (_server, config) = start_echo_server("raw:json:tcp:127.0.0.1:0").await;
    let config = SocketConfig {
        pool_size: 4,
        ..config
    };
    let client = Arc::new(SocketClient::connect(config).await.unwrap());

    let mut tasks = Vec::new();
    for caller in 0..16 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            for round in 0..5 {
                let body = format!("{caller}-{round}");
                let mut exchange = request("/concurrent", &body);
                loop {
                    match client.send_and_receive(&mut exchange).await {
                        Ok(()) => break,
                        Err(TransportError::Busy) => tokio::task::yield_now().await,
                        Err(e) => panic!("exchange failed: {e}"),
                    }
                }
                assert_eq!(exchange.response.body, body.as_bytes());
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(client.stats().busy_connections, 0);
}

#[tokio::test]
async fn test_oversized_request_is_rejected_before_sending() {
    init_tracing();
    let (_server, config) = start_echo_server("raw:native:tcp:127.0.0.1:0").await;
    let config = SocketConfig {
        max_message_size: 128,
        ..config
    };
    let client = SocketClient::connect(config).await.unwrap();

    let mut exchange = request("/big", &"x".repeat(512));
    let err = client.send_and_receive(&mut exchange).await.unwrap_err();
    assert!(matches!(err, TransportError::MessageTooLarge { max: 128, .. }));

    let mut exchange = request("/small", "ok");
    client.send_and_receive(&mut exchange).await.unwrap();
    assert_eq!(&exchange.response.body[..], b"ok");
}

#[tokio::test]
async fn test_handler_panic_ends_only_that_connection() {
    init_tracing();
    let dir = tempdir().unwrap();
    let config = SocketConfig::new(unix_address("raw:native", "unix", dir.path(), "panic.sock"));

    let server = SocketServer::new(
        |exchange: &mut Exchange| -> anyhow::Result<()> {
            if exchange.request.uri == "/panic" {
                panic!("handler bug");
            }
            common::echo(exchange)
        },
        config.clone(),
    )
    .unwrap();
    server.start().await.unwrap();

    let client = SocketClient::connect(config).await.unwrap();
    let mut exchange = request("/panic", "");
    let err = client.send_and_receive(&mut exchange).await.unwrap_err();
    assert!(err.is_end_of_stream());

    let mut exchange = request("/fine", "still serving");
    client.send_and_receive(&mut exchange).await.unwrap();
    assert_eq!(&exchange.response.body[..], b"still serving");
}

#[tokio::test]
async fn test_stop_removes_socket_file() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("stop.sock");
    let (server, _config) = start_echo_server(&unix_address("raw:native", "unix", dir.path(), "stop.sock")).await;

    assert!(path.exists());
    assert!(server.is_running());

    server.stop().unwrap();
    assert!(!path.exists());
    assert!(!server.is_running());
    assert!(matches!(server.stop(), Err(TransportError::NotStarted)));
}

#[tokio::test]
async fn test_concurrent_start_binds_once() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("race.sock");
    let server = SocketServer::new(
        common::echo,
        SocketConfig::new(unix_address("raw:native", "unix", dir.path(), "race.sock")),
    )
    .unwrap();

    let (first, second) = tokio::join!(server.start(), server.start());
    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one start wins: {first:?} / {second:?}"
    );
    let loser = first.err().or(second.err()).unwrap();
    assert!(loser.is_configuration());

    assert!(path.exists());
    let client = SocketClient::connect(SocketConfig::new(unix_address("raw:native", "unix", dir.path(), "race.sock")))
        .await
        .unwrap();
    let mut exchange = request("/race", "one listener");
    client.send_and_receive(&mut exchange).await.unwrap();
    assert_eq!(&exchange.response.body[..], b"one listener");

    server.stop().unwrap();
    assert!(!path.exists());
    assert!(matches!(server.stop(), Err(TransportError::NotStarted)));
}

#[tokio::test]
async fn test_structured_native_is_rejected_at_configuration() {
    let err = SocketClient::new(SocketConfig::new("structured:native:tcp:127.0.0.1:1"))
        .err()
        .unwrap();
    assert!(err.is_configuration());

    let err = SocketServer::new(common::echo, SocketConfig::new("raw:native:sctp:127.0.0.1:1"))
        .err()
        .unwrap();
    assert!(matches!(err, TransportError::UnknownFamily { .. }));
}
