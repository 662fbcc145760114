//! Integration tests for the buffered HTTP/1 transport
//!
//! Each test runs a small canned HTTP/1.1 server on a loopback socket, so
//! the full request path (socket connect, wire format, keep-alive reuse,
//! deadlines) is exercised without external services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tidewire::{
    ApiRequest, BufferedOptions, BufferedTransport, ClientConfig, Error, HttpRequest,
    HttpTransport, Origin, RequestExecutor, ResponseShape, Scheme, StreamSink,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Spawn a server that answers every request on every connection with the
/// given response bytes. Returns the bound port and a counter of accepted
/// connections.
async fn spawn_canned_server(response: &'static [u8]) -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = connections.clone();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut head = Vec::new();
                loop {
                    // Read until the end of the request head; requests in
                    // these tests carry no body
                    let n = match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        head.clear();
                        if stream.write_all(response).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    (port, connections)
}

fn executor(port: u16, configure: impl FnOnce(tidewire::ClientConfigBuilder) -> tidewire::ClientConfigBuilder) -> RequestExecutor {
    init_tracing();
    let builder = ClientConfig::builder("127.0.0.1")
        .scheme(Scheme::Http)
        .port(port);
    RequestExecutor::new(configure(builder).build()).expect("executor")
}

#[tokio::test]
async fn test_ping_round_trip() {
    let (port, _) = spawn_canned_server(
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nX-Txn-Time: 7\r\n\r\nok",
    )
    .await;
    let executor = executor(port, |b| b);

    let response = executor.execute(ApiRequest::get("/ping")).await.expect("ping");
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "ok");
    assert_eq!(response.header("x-txn-time"), Some("7"));
    assert_eq!(executor.watermark(), Some(7));
}

#[tokio::test]
async fn test_error_status_is_returned_not_raised() {
    let (port, _) = spawn_canned_server(
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nnot found",
    )
    .await;
    let executor = executor(port, |b| b);

    let response = executor.execute(ApiRequest::get("/missing")).await.expect("response");
    assert_eq!(response.status, 404);
    assert!(response.is_error_status());
    assert_eq!(response.body_text(), "not found");
}

#[tokio::test]
async fn test_deadline_produces_timeout_error() {
    // Accept connections but never respond
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    let executor = executor(port, |b| b);

    let err = executor
        .execute(ApiRequest::get("/slow").deadline(Duration::from_millis(100)))
        .await
        .expect_err("deadline must fire");
    assert!(err.is_timeout());
    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(100)));
}

#[tokio::test]
async fn test_connect_failure_is_not_reported_as_timeout() {
    // Bind then drop so the port is very likely refused
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    let executor = executor(port, |b| b);

    let err = executor
        .execute(ApiRequest::get("/ping"))
        .await
        .expect_err("connect must fail");
    assert!(!err.is_timeout(), "connect error misreported as timeout: {:?}", err);
}

#[tokio::test]
async fn test_keep_alive_reuses_one_connection() {
    let (port, connections) = spawn_canned_server(
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok",
    )
    .await;
    let executor = executor(port, |b| b.keep_alive(true));

    for _ in 0..3 {
        let response = executor.execute(ApiRequest::get("/ping")).await.expect("ping");
        assert_eq!(response.status, 200);
    }
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_without_keep_alive_each_call_connects() {
    let (port, connections) = spawn_canned_server(
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok",
    )
    .await;
    let executor = executor(port, |b| b.keep_alive(false));

    for _ in 0..3 {
        executor.execute(ApiRequest::get("/ping")).await.expect("ping");
    }
    assert_eq!(connections.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_keep_alive_pool_is_per_origin() {
    init_tracing();
    let (port_a, connections_a) = spawn_canned_server(
        b"HTTP/1.1 200 OK\r\nContent-Length: 13\r\n\r\nfrom-server-a",
    )
    .await;
    let (port_b, connections_b) = spawn_canned_server(
        b"HTTP/1.1 200 OK\r\nContent-Length: 13\r\n\r\nfrom-server-b",
    )
    .await;

    // One adapter instance serving requests addressed to two origins
    let transport = BufferedTransport::new(BufferedOptions {
        keep_alive: true,
        ..Default::default()
    });
    let request = |port: u16| HttpRequest {
        method: "GET".into(),
        origin: Origin::new(Scheme::Http, "127.0.0.1", port),
        path: "/ping".into(),
        query: HashMap::new(),
        headers: HashMap::new(),
        body: None,
        deadline: None,
        shape: ResponseShape::Buffered,
        sink: None,
    };

    let response = transport.execute(request(port_a)).await.expect("server a");
    assert_eq!(response.body_text(), "from-server-a");

    // A pooled connection to one server must never answer a request
    // addressed to another
    let response = transport.execute(request(port_b)).await.expect("server b");
    assert_eq!(response.body_text(), "from-server-b");
    assert_eq!(connections_b.load(Ordering::SeqCst), 1);

    // Reuse still happens, per origin
    let response = transport.execute(request(port_a)).await.expect("server a again");
    assert_eq!(response.body_text(), "from-server-a");
    assert_eq!(connections_a.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_streamed_response_reaches_sink() {
    let (port, _) = spawn_canned_server(
        b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\nhello world",
    )
    .await;
    let executor = executor(port, |b| b.streaming(true));

    let (sink, chunks) = StreamSink::channel(16);
    let response = executor
        .execute(ApiRequest::get("/feed").streamed(sink))
        .await
        .expect("streamed request");
    assert_eq!(response.status, 200);

    let text = chunks.collect_text().await.expect("stream");
    assert_eq!(text, "hello world");
}

#[tokio::test]
async fn test_streaming_disabled_rejects_streamed_shape() {
    let (port, connections) = spawn_canned_server(
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok",
    )
    .await;
    let executor = executor(port, |b| b.streaming(false));

    let (sink, _chunks) = StreamSink::channel(16);
    let err = executor
        .execute(ApiRequest::get("/feed").streamed(sink))
        .await
        .expect_err("must be rejected");
    assert!(matches!(err, Error::StreamsNotSupported(_)));
    assert_eq!(connections.load(Ordering::SeqCst), 0);
}
