//! Viewer round trips against a server bound to an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use wifi_radar_server::{
    connection_tracker, router, serve, AppState, ConnectionDrain, RadarConfig, RadarEngine,
    RadarStatus, SnapshotPublisher,
};
use wifi_radar_wifiscan::SyntheticScanner;

struct TestServer {
    addr: SocketAddr,
    publisher: SnapshotPublisher,
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
    drain: ConnectionDrain,
}

async fn start() -> TestServer {
    let config = RadarConfig::default();
    let publisher = SnapshotPublisher::new(&config.publish);
    let (connections, drain) = connection_tracker();
    let state = AppState {
        publisher: publisher.clone(),
        status: RadarStatus::shared("synthetic"),
        send_timeout: config.publish.send_timeout(),
        connections,
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(serve(listener, router(state, None), rx));
    TestServer {
        addr,
        publisher,
        shutdown,
        task,
        drain,
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn next_text<S>(ws: &mut S) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Wait until the publisher has `n` registered viewers.
async fn wait_for_viewers(publisher: &SnapshotPublisher, n: usize) {
    for _ in 0..200 {
        if publisher.viewer_count() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} viewers, have {}", publisher.viewer_count());
}

fn engine_with_cycles(n: usize) -> RadarEngine {
    let mut engine = RadarEngine::new(&RadarConfig::default());
    let scanner = SyntheticScanner::default();
    for _ in 0..n {
        engine.run_cycle(&scanner.next_scan());
    }
    engine
}

#[tokio::test]
async fn snapshot_round_trip_and_late_joiner() {
    let server = start().await;
    let engine = engine_with_cycles(8);

    let (mut first, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();
    wait_for_viewers(&server.publisher, 1).await;

    server.publisher.publish(&engine.snapshot()).unwrap();
    let value = next_text(&mut first).await;
    assert_eq!(value["type"], "radar_snapshot");
    assert_eq!(value["cycle"], 8);
    assert_eq!(value["networks"].as_array().unwrap().len(), 10);
    let position = value["networks"][0]["position"].as_array().unwrap();
    assert_eq!(position.len(), 3);

    // A viewer joining later gets the latest snapshot immediately.
    let (mut late, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();
    let value = next_text(&mut late).await;
    assert_eq!(value["cycle"], 8);

    server.shutdown.send(true).unwrap();
    server.publisher.close();
    tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn closed_viewer_does_not_block_others() {
    let server = start().await;
    let mut engine = engine_with_cycles(6);
    let scanner = SyntheticScanner::new(99, 4.0);

    let url = format!("ws://{}/ws", server.addr);
    let (mut stays, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut leaves, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    wait_for_viewers(&server.publisher, 2).await;

    leaves.close(None).await.unwrap();
    drop(leaves);
    wait_for_viewers(&server.publisher, 1).await;

    engine.run_cycle(&scanner.next_scan());
    let report = server.publisher.publish(&engine.snapshot()).unwrap();
    assert_eq!(report.delivered, 1);
    let value = next_text(&mut stays).await;
    assert_eq!(value["cycle"], 7);

    server.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn closing_the_publisher_closes_viewer_sockets() {
    let server = start().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();
    wait_for_viewers(&server.publisher, 1).await;

    server.publisher.close();
    let end = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok(), "viewer socket was not closed");

    // New viewers are turned away once closed.
    assert!(server.publisher.subscribe().is_none());
    server.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn health_and_snapshot_endpoints() {
    let server = start().await;

    let response = http_get(server.addr, "/api/v1/snapshot").await;
    assert!(response.starts_with("HTTP/1.1 204"), "{response}");

    let engine = engine_with_cycles(5);
    server.publisher.publish(&engine.snapshot()).unwrap();
    let response = http_get(server.addr, "/api/v1/snapshot").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("\"type\":\"radar_snapshot\""));

    let response = http_get(server.addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("\"status\":\"ok\""));
    assert!(response.contains("\"source\":\"synthetic\""));

    server.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn shutdown_waits_for_viewers_to_send_close() {
    let mut server = start().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();
    wait_for_viewers(&server.publisher, 1).await;

    server.shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // The HTTP server is gone but the viewer task is still streaming.
    assert!(!server.drain.wait(Duration::from_millis(50)).await);

    server.publisher.close();
    let mut closed = false;
    while let Some(msg) = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
    {
        if let Ok(Message::Close(_)) = msg {
            closed = true;
            break;
        }
    }
    assert!(closed, "viewer did not receive a Close frame");
    assert!(server.drain.wait(Duration::from_secs(5)).await);
}
