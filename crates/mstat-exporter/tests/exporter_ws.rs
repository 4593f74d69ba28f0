//! Exporter server tests with a real WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mstat_exporter::{serve, StatusCache};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

async fn start(cache: Arc<StatusCache>) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(serve(listener, cache, shutdown.clone()));
    (addr, shutdown)
}

#[tokio::test]
async fn test_each_message_gets_current_cache() {
    let cache = Arc::new(StatusCache::new());
    cache.update("gpu0 10%");
    let (addr, shutdown) = start(cache.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    ws.send(Message::Text("fetch".to_string())).await.unwrap();
    let reply = timeout(Duration::from_secs(2), ws.next()).await.unwrap();
    assert_eq!(reply.unwrap().unwrap(), Message::Text("gpu0 10%".to_string()));

    cache.update("gpu0 90%");
    ws.send(Message::Text("fetch".to_string())).await.unwrap();
    let reply = timeout(Duration::from_secs(2), ws.next()).await.unwrap();
    assert_eq!(reply.unwrap().unwrap(), Message::Text("gpu0 90%".to_string()));

    shutdown.cancel();
}

#[tokio::test]
async fn test_binary_request_gets_binary_reply() {
    let cache = Arc::new(StatusCache::new());
    cache.update("disk 71%");
    let (addr, shutdown) = start(cache).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws.send(Message::Binary(b"fetch".to_vec())).await.unwrap();

    let reply = timeout(Duration::from_secs(2), ws.next()).await.unwrap();
    assert_eq!(reply.unwrap().unwrap(), Message::Binary(b"disk 71%".to_vec()));

    shutdown.cancel();
}
