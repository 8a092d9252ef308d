//! Shared helpers for socket integration tests

#![allow(dead_code)]

use exchange::header::HOST;
use exchange::{Exchange, HeaderValue, Method, Request, StatusCode};
use exchange_socket::{SocketConfig, SocketServer};
use std::path::Path;

pub const ECHO_URI: &str = "x-echo-uri";

/// Initialize tracing for tests (call once per test)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Address spec for a Unix path inside a test directory
pub fn unix_address(kind: &str, family: &str, dir: &Path, name: &str) -> String {
    format!("{}:{}:{}", kind, family, dir.join(name).display())
}

/// Replies 200 with the request body echoed back and an `x-echo-uri` header
pub fn echo(exchange: &mut Exchange) -> anyhow::Result<()> {
    exchange.response.status = StatusCode::OK;
    let uri = HeaderValue::from_str(&exchange.request.uri.to_string())?;
    exchange.response.headers.insert(ECHO_URI, uri);
    exchange.response.body = exchange.request.body.clone();
    Ok(())
}

/// Start an echo server on `address`; tcp/udp `:0` addresses get the real port back
pub async fn start_echo_server(address: &str) -> (SocketServer, SocketConfig) {
    let server = SocketServer::new(echo, SocketConfig::new(address)).unwrap();
    server.start().await.unwrap();

    let spec = server.address().clone();
    let bound = server.local_addr().unwrap();
    let config = SocketConfig::new(format!(
        "{}:{}:{}:{}",
        spec.data_model().as_str(),
        spec.serializer().as_str(),
        spec.family().as_str(),
        bound
    ));
    (server, config)
}

pub fn request(uri: &str, body: &str) -> Exchange {
    let mut request = Request::new(Method::POST, uri.parse().unwrap());
    request.headers.insert(HOST, HeaderValue::from_static("example.com"));
    request.set_body(body.to_string());
    Exchange::new(request)
}
