use serde_json::json;

use super::*;

fn lifecycle(name: &str, session: Option<&str>) -> cdp::Event {
    cdp::Event {
        method: LIFECYCLE_EVENT.to_owned(),
        params: json!({ "frameId": "F", "loaderId": "L", "name": name, "timestamp": 1.0 }),
        session_id: session.map(ToOwned::to_owned),
    }
}

#[tokio::test]
async fn next_lifecycle_skips_other_methods() {
    let (tx, rx) = broadcast::channel(16);
    let mut stream = EventStream::new(rx, None);

    tx.send(cdp::Event { method: "Page.frameNavigated".into(), params: json!({}), session_id: None })
        .unwrap();
    tx.send(lifecycle("load", None)).unwrap();

    let event = stream.next_lifecycle().await.unwrap();
    assert_eq!(event.name, "load");
}

#[tokio::test]
async fn next_lifecycle_filters_by_session() {
    let (tx, rx) = broadcast::channel(16);
    let mut stream = EventStream::new(rx, Some("mine".into()));

    tx.send(lifecycle("networkIdle", Some("theirs"))).unwrap();
    tx.send(lifecycle("init", Some("mine"))).unwrap();

    let event = stream.next_lifecycle().await.unwrap();
    assert_eq!(event.name, "init");
}

#[tokio::test]
async fn next_lifecycle_skips_malformed_payloads() {
    let (tx, rx) = broadcast::channel(16);
    let mut stream = EventStream::new(rx, None);

    tx.send(cdp::Event { method: LIFECYCLE_EVENT.into(), params: json!({ "name": 5 }), session_id: None })
        .unwrap();
    tx.send(lifecycle("DOMContentLoaded", None)).unwrap();

    assert_eq!(stream.next_lifecycle().await.unwrap().name, "DOMContentLoaded");
}

#[tokio::test]
async fn next_lifecycle_recovers_from_lag() {
    let (tx, rx) = broadcast::channel(2);
    let mut stream = EventStream::new(rx, None);

    for name in ["init", "load", "networkAlmostIdle", "networkIdle"] {
        tx.send(lifecycle(name, None)).unwrap();
    }

    // The two oldest events were overwritten.
    assert_eq!(stream.next_lifecycle().await.unwrap().name, "networkAlmostIdle");
    assert_eq!(stream.next_lifecycle().await.unwrap().name, "networkIdle");
}

#[tokio::test]
async fn next_lifecycle_ends_when_sender_dropped() {
    let (tx, rx) = broadcast::channel(16);
    let mut stream = EventStream::new(rx, None);

    tx.send(lifecycle("init", None)).unwrap();
    drop(tx);

    assert_eq!(stream.next_lifecycle().await.unwrap().name, "init");
    assert!(stream.next_lifecycle().await.is_none());
}
