use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;
use waterfall_proto::{decode, WireMessage};
use waterfall_stream::{ClientEvent, Rgb, StreamClient, StreamConfig};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct Endpoint {
    frames: mpsc::UnboundedSender<String>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Fake visualization endpoint. `/waterfall` records every text frame;
/// `/hangup` closes the socket after the first one.
async fn spawn_endpoint() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/waterfall", get(record_handler))
        .route("/hangup", get(hangup_handler))
        .with_state(Endpoint { frames: tx });
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, rx)
}

async fn record_handler(ws: WebSocketUpgrade, State(state): State<Endpoint>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| record(socket, state, false))
}

async fn hangup_handler(ws: WebSocketUpgrade, State(state): State<Endpoint>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| record(socket, state, true))
}

async fn record(mut socket: WebSocket, state: Endpoint, hang_up: bool) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            WsMessage::Text(text) => {
                let _ = state.frames.send(text);
                if hang_up {
                    let _ = socket.send(WsMessage::Close(None)).await;
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
}

async fn next_event(events: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(WAIT, frames.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("endpoint stopped")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streams_init_and_rows_to_live_endpoint() {
    init_tracing();
    let (addr, mut frames) = spawn_endpoint().await;
    let client = StreamClient::new().expect("spawn client");
    let mut events = client.subscribe();

    client.open(&format!("ws://{addr}/waterfall"));
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    client.send_init("N0CALL", "USB", 3, 2);
    client.send_row(0, &[Rgb::new(255, 0, 0), Rgb::new(0, 255, 0), Rgb::new(0, 0, 255)]);
    client.send_row(1, &[0xFF01_0203_u32; 3]);

    assert_eq!(
        next_frame(&mut frames).await,
        r#"{"type":"init","callsign":"N0CALL","mode":"USB","width":3,"height":2}"#
    );
    let text = next_frame(&mut frames).await;
    let raw: serde_json::Value = serde_json::from_str(&text).expect("row 0 is json");
    assert_eq!(raw["type"], "line");
    assert_eq!(raw["y"], 0);
    assert_eq!(raw["colors"], "/wAAAP8AAAD/");
    assert_eq!(raw.as_object().map(|fields| fields.len()), Some(3));
    let row0 = decode(&text).expect("row 0");
    assert!(matches!(row0, WireMessage::Line { y: 0, .. }));
    assert_eq!(
        row0.row_bytes().unwrap(),
        vec![255u8, 0, 0, 0, 255, 0, 0, 0, 255]
    );
    let row1 = decode(&next_frame(&mut frames).await).expect("row 1");
    assert!(matches!(row1, WireMessage::Line { y: 1, .. }));
    assert_eq!(row1.row_bytes().unwrap(), vec![1u8, 2, 3, 1, 2, 3, 1, 2, 3]);

    client.shutdown();
    assert!(matches!(events.try_recv(), Ok(ClientEvent::Disconnected)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn endpoint_hangup_reports_disconnect() {
    init_tracing();
    let (addr, mut frames) = spawn_endpoint().await;
    let client = StreamClient::new().expect("spawn client");
    let mut events = client.subscribe();

    client.open(&format!("ws://{addr}/hangup"));
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    client.send_init("N0CALL", "FM", 16, 16);
    let _ = next_frame(&mut frames).await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);

    // Reopen against the recording route works after the hangup.
    client.open(&format!("ws://{addr}/waterfall"));
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    client.send_row(4, &[Rgb::default()]);
    let row = decode(&next_frame(&mut frames).await).expect("row");
    assert!(matches!(row, WireMessage::Line { y: 4, .. }));
    client.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_endpoint_reports_error() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let config = StreamConfig::default().with_connect_timeout(Duration::from_secs(2));
    let client = StreamClient::with_config(config).expect("spawn client");
    let mut events = client.subscribe();

    client.open(&format!("ws://{addr}/waterfall"));
    assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));
    client.shutdown();
}

#[tokio::test]
async fn non_websocket_url_reports_error() {
    let client = StreamClient::new().expect("spawn client");
    let mut events = client.subscribe();

    client.open("https://example.invalid/waterfall");
    match next_event(&mut events).await {
        ClientEvent::Error(reason) => assert!(reason.contains("scheme"), "{reason}"),
        other => panic!("expected error, got {other:?}"),
    }
    client.shutdown();
}
