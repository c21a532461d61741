use std::future::Future;

use cdp::page::{Enable, Navigate};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;

use super::*;

type ServerWs = WebSocketStream<TcpStream>;

// =============================================================================
// FAKE DEVTOOLS SERVER
// =============================================================================

async fn spawn_server<F, Fut>(handler: F) -> String
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        handler(ws).await;
    });
    format!("ws://{addr}")
}

async fn next_command(ws: &mut ServerWs) -> Option<Value> {
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Text(text) = message {
            return Some(serde_json::from_str(&text).unwrap());
        }
    }
    None
}

async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

// =============================================================================
// call
// =============================================================================

#[tokio::test]
async fn call_returns_parsed_result() {
    let url = spawn_server(|mut ws| async move {
        let command = next_command(&mut ws).await.unwrap();
        assert_eq!(command["method"], "Page.navigate");
        assert_eq!(command["sessionId"], "S1");
        let id = command["id"].clone();
        send_json(&mut ws, serde_json::json!({ "id": id, "result": { "frameId": "F1" } })).await;
        let _ = next_command(&mut ws).await;
    })
    .await;

    let connection = Connection::connect(&url, Duration::from_secs(5)).await.unwrap();
    let returns = connection
        .call(&Navigate { url: "http://127.0.0.1/export3.html".into() }, Some("S1"))
        .await
        .unwrap();
    assert_eq!(returns.frame_id, "F1");
}

#[tokio::test]
async fn call_correlates_out_of_order_replies() {
    let url = spawn_server(|mut ws| async move {
        let first = next_command(&mut ws).await.unwrap();
        let second = next_command(&mut ws).await.unwrap();
        send_json(&mut ws, serde_json::json!({ "id": second["id"], "result": { "frameId": "second" } })).await;
        send_json(&mut ws, serde_json::json!({ "id": first["id"], "result": { "frameId": "first" } })).await;
        let _ = next_command(&mut ws).await;
    })
    .await;

    let connection = Connection::connect(&url, Duration::from_secs(5)).await.unwrap();
    let a = Navigate { url: "a".into() };
    let b = Navigate { url: "b".into() };
    let (first, second) = tokio::join!(connection.call(&a, None), connection.call(&b, None));
    let mut frames = vec![first.unwrap().frame_id, second.unwrap().frame_id];
    frames.sort();
    assert_eq!(frames, vec!["first".to_owned(), "second".to_owned()]);
}

#[tokio::test]
async fn call_surfaces_protocol_errors() {
    let url = spawn_server(|mut ws| async move {
        let command = next_command(&mut ws).await.unwrap();
        send_json(
            &mut ws,
            serde_json::json!({ "id": command["id"], "error": { "code": -32601, "message": "'Page.enable' wasn't found" } }),
        )
        .await;
        let _ = next_command(&mut ws).await;
    })
    .await;

    let connection = Connection::connect(&url, Duration::from_secs(5)).await.unwrap();
    let err = connection.call(&Enable {}, None).await.unwrap_err();
    assert!(matches!(err, BrowserError::Protocol { method: "Page.enable", code: -32601, .. }));
}

#[tokio::test]
async fn call_times_out_without_reply() {
    let url = spawn_server(|mut ws| async move {
        let _ = next_command(&mut ws).await;
        let _ = next_command(&mut ws).await;
    })
    .await;

    let connection = Connection::connect(&url, Duration::from_millis(50)).await.unwrap();
    let err = connection.call(&Enable {}, None).await.unwrap_err();
    assert!(matches!(err, BrowserError::Timeout { method: "Page.enable" }));
    assert!(lock(&connection.pending).is_empty());
}

#[tokio::test]
async fn call_fails_when_socket_closes() {
    let url = spawn_server(|mut ws| async move {
        let _ = next_command(&mut ws).await;
        let _ = ws.close(None).await;
    })
    .await;

    let connection = Connection::connect(&url, Duration::from_secs(5)).await.unwrap();
    let err = connection.call(&Enable {}, None).await.unwrap_err();
    assert!(matches!(err, BrowserError::WsClosed));
}

// =============================================================================
// events
// =============================================================================

#[tokio::test]
async fn events_reach_subscribers() {
    let (go_tx, go_rx) = oneshot::channel::<()>();
    let url = spawn_server(|mut ws| async move {
        let _ = go_rx.await;
        send_json(
            &mut ws,
            serde_json::json!({
                "method": "Page.lifecycleEvent",
                "params": { "frameId": "F", "loaderId": "L", "name": "networkIdle", "timestamp": 1.0 },
                "sessionId": "S1"
            }),
        )
        .await;
        let _ = next_command(&mut ws).await;
    })
    .await;

    let connection = Connection::connect(&url, Duration::from_secs(5)).await.unwrap();
    let mut events = connection.subscribe();
    go_tx.send(()).unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.method, "Page.lifecycleEvent");
    assert_eq!(event.session_id.as_deref(), Some("S1"));
}

#[tokio::test]
async fn event_stream_closes_with_socket() {
    let url = spawn_server(|mut ws| async move {
        let _ = ws.close(None).await;
    })
    .await;

    let connection = Connection::connect(&url, Duration::from_secs(5)).await.unwrap();
    let mut events = connection.subscribe();
    let outcome = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert!(matches!(outcome, Err(broadcast::error::RecvError::Closed)));
}
