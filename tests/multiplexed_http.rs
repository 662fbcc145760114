//! Integration tests for the multiplexed HTTP/2 transport
//!
//! Each test runs an in-process hyper HTTP/2 server over plain TCP (prior
//! knowledge, no TLS upgrade) and drives it through the executor, covering
//! session reuse, eviction on connection loss, and per-stream deadlines.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http2;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tidewire::{
    ApiRequest, ClientConfig, Error, MultiplexedTransport, RequestExecutor, Scheme, StreamSink,
    TransportMode,
};
use tokio::net::TcpListener;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn handler(req: hyper::Request<Incoming>) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            hyper::Response::new(Full::new(Bytes::from_static(b"late")))
        }
        "/feed" => hyper::Response::new(Full::new(Bytes::from_static(b"chunk one chunk two"))),
        _ => hyper::Response::builder()
            .header("X-Txn-Time", "11")
            .body(Full::new(Bytes::from_static(b"ok")))
            .unwrap(),
    };
    Ok(response)
}

/// Serve HTTP/2 connections until the returned task is aborted
async fn spawn_h2_server() -> (u16, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            // Serve in the accept task, so aborting it drops live
            // connections too. One connection at a time is enough here
            // because the client multiplexes over a single session.
            let _ = http2::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service_fn(handler))
                .await;
        }
    });

    (port, server)
}

fn origin(port: u16) -> tidewire::Origin {
    tidewire::Origin::new(Scheme::Http, "127.0.0.1", port)
}

fn setup(port: u16, streaming: bool) -> (RequestExecutor, Arc<MultiplexedTransport>) {
    init_tracing();
    let config = ClientConfig::builder("127.0.0.1")
        .scheme(Scheme::Http)
        .port(port)
        .transport(TransportMode::Multiplexed)
        .streaming(streaming)
        .build();
    let transport = Arc::new(MultiplexedTransport::new(tidewire::MultiplexedOptions {
        streaming,
        tls: None,
    }));
    let executor = RequestExecutor::with_transport(config, transport.clone());
    (executor, transport)
}

/// Poll until the registry reaches the expected size or the deadline passes
async fn wait_for_session_count(transport: &MultiplexedTransport, expected: usize) {
    for _ in 0..100 {
        if transport.session_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "session count never reached {} (now {})",
        expected,
        transport.session_count().await
    );
}

#[tokio::test]
async fn test_requests_share_one_session() {
    let (port, _server) = spawn_h2_server().await;
    let (executor, transport) = setup(port, false);

    let response = executor.execute(ApiRequest::get("/ping")).await.expect("first");
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "ok");
    assert_eq!(executor.watermark(), Some(11));

    let first_id = transport.session_id(&origin(port)).await.expect("session");

    executor.execute(ApiRequest::get("/ping")).await.expect("second");
    executor.execute(ApiRequest::get("/ping")).await.expect("third");

    assert_eq!(transport.session_count().await, 1);
    assert_eq!(transport.session_id(&origin(port)).await, Some(first_id));
}

#[tokio::test]
async fn test_lost_connection_evicts_session() {
    let (port, server) = spawn_h2_server().await;
    let (executor, transport) = setup(port, false);

    executor.execute(ApiRequest::get("/ping")).await.expect("ping");
    assert_eq!(transport.session_count().await, 1);

    // Kill the server; the session driver notices the closed socket and
    // removes the session from the registry
    server.abort();
    wait_for_session_count(&transport, 0).await;
}

#[tokio::test]
async fn test_new_session_after_eviction() {
    let (port, server) = spawn_h2_server().await;
    let (executor, transport) = setup(port, false);

    executor.execute(ApiRequest::get("/ping")).await.expect("ping");
    let first_id = transport.session_id(&origin(port)).await.expect("session");

    server.abort();
    wait_for_session_count(&transport, 0).await;

    // Restart on the same port and confirm a fresh session is opened
    let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("rebind");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let _ = http2::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service_fn(handler))
                .await;
        }
    });

    let response = executor.execute(ApiRequest::get("/ping")).await.expect("retry");
    assert_eq!(response.status, 200);
    let second_id = transport.session_id(&origin(port)).await.expect("session");
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn test_stream_deadline_leaves_session_usable() {
    let (port, _server) = spawn_h2_server().await;
    let (executor, transport) = setup(port, false);

    executor.execute(ApiRequest::get("/ping")).await.expect("warmup");
    let session = transport.session_id(&origin(port)).await.expect("session");

    let err = executor
        .execute(ApiRequest::get("/slow").deadline(Duration::from_millis(150)))
        .await
        .expect_err("deadline must fire");
    assert!(matches!(err, Error::Timeout(_)));

    // Only the timed-out stream was reset; the session survives and keeps
    // serving subsequent requests
    let response = executor.execute(ApiRequest::get("/ping")).await.expect("after timeout");
    assert_eq!(response.status, 200);
    assert_eq!(transport.session_id(&origin(port)).await, Some(session));
}

#[tokio::test]
async fn test_streamed_shape_over_multiplexed() {
    let (port, _server) = spawn_h2_server().await;
    let (executor, _transport) = setup(port, true);

    let (sink, chunks) = StreamSink::channel(16);
    let response = executor
        .execute(ApiRequest::get("/feed").streamed(sink))
        .await
        .expect("streamed request");
    assert_eq!(response.status, 200);

    let text = chunks.collect_text().await.expect("stream");
    assert_eq!(text, "chunk one chunk two");
}

#[tokio::test]
async fn test_concurrent_streams_on_one_session() {
    let (port, _server) = spawn_h2_server().await;
    let (executor, transport) = setup(port, false);
    let executor = Arc::new(executor);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            executor.execute(ApiRequest::get("/ping")).await
        }));
    }
    for handle in handles {
        let response = handle.await.expect("join").expect("request");
        assert_eq!(response.status, 200);
    }
    assert_eq!(transport.session_count().await, 1);
}
