//! End-to-end relay test over real sockets.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_relay_rewrites_lines_end_to_end() {
    // A bare listener stands in for the backend's carbon ingest port.
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = listener.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let relay_task = tokio::spawn(carbongate::relay::serve(
        listener,
        upstream_addr.to_string(),
        shutdown.clone(),
    ));

    let mut client = TcpStream::connect(relay_addr).await.unwrap();
    client
        .write_all(b"a.b.c 1 1\nnospaces\nx-y.z 2.5 1590249600\nsolo 3 3\n")
        .await
        .unwrap();
    // Carbon relays close after the batch; the flush rides on EOF.
    client.shutdown().await.unwrap();
    drop(client);

    let (mut backend_conn, _) = timeout(Duration::from_secs(5), upstream.accept())
        .await
        .unwrap()
        .unwrap();
    let mut received = String::new();
    timeout(Duration::from_secs(5), backend_conn.read_to_string(&mut received))
        .await
        .unwrap()
        .unwrap();

    // The malformed line and the single-segment name are dropped.
    assert_eq!(
        received,
        "a;__a_g1__=b;__a_g2__=c 1 1\nx_y;__x_y_g1__=z 2.5 1590249600\n"
    );

    shutdown.cancel();
    timeout(Duration::from_secs(5), relay_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_relay_survives_unreachable_upstream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = listener.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let relay_task = tokio::spawn(carbongate::relay::serve(
        listener,
        "127.0.0.1:1".to_string(),
        shutdown.clone(),
    ));

    // The worker fails to dial upstream and drops the connection; the
    // accept loop keeps going.
    let mut client = TcpStream::connect(relay_addr).await.unwrap();
    client.write_all(b"a.b 1 1\n").await.unwrap();
    let mut buf = Vec::new();
    let _ = timeout(Duration::from_secs(5), client.read_to_end(&mut buf)).await;

    let client2 = TcpStream::connect(relay_addr).await;
    assert!(client2.is_ok());

    shutdown.cancel();
    timeout(Duration::from_secs(5), relay_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
