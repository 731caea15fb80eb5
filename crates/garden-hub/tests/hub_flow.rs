#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use garden_hub::config::HubConfig;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_hub(origins: &str) -> garden_hub::Hub {
    let mut cfg = HubConfig::default();
    cfg.hub.host = "127.0.0.1".into();
    cfg.hub.port = 0;
    cfg.hub.allowed_origins = origins.into();
    garden_hub::start(cfg).await.unwrap()
}

async fn connect(hub: &garden_hub::Hub) -> Client {
    let (ws, _) = connect_async(format!("ws://{}", hub.addr)).await.unwrap();
    ws
}

async fn join(client: &mut Client, circle: &str, peer: &str) {
    send_raw(
        client,
        json!({"type": "join", "circleId": circle, "peerId": peer}).to_string(),
    )
    .await;
}

async fn send_raw(client: &mut Client, text: String) {
    client.send(Message::Text(text)).await.unwrap();
}

async fn recv_text(client: &mut Client) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("recv timed out")
            .expect("stream ended")
            .expect("stream errored");
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

async fn recv_json(client: &mut Client) -> Value {
    serde_json::from_str(&recv_text(client).await).unwrap()
}

#[tokio::test]
async fn roster_reply_and_joined_notice() {
    let hub = start_hub("*").await;
    let mut p1 = connect(&hub).await;
    join(&mut p1, "dawn", "p1").await;
    let roster = recv_json(&mut p1).await;
    assert_eq!(roster["type"], "peers");
    assert_eq!(roster["from"], "server");
    assert_eq!(roster["data"], json!([]));

    let mut p2 = connect(&hub).await;
    join(&mut p2, "dawn", "p2").await;
    let roster = recv_json(&mut p2).await;
    assert_eq!(roster["type"], "peers");
    assert_eq!(roster["data"], json!(["p1"]));

    let notice = recv_json(&mut p1).await;
    assert_eq!(notice["type"], "joined");
    assert_eq!(notice["from"], "p2");

    hub.handle.abort();
}

#[tokio::test]
async fn relay_is_verbatim_and_targeted() {
    let hub = start_hub("*").await;
    let mut p1 = connect(&hub).await;
    let mut p2 = connect(&hub).await;
    let mut p3 = connect(&hub).await;
    join(&mut p1, "dawn", "p1").await;
    recv_json(&mut p1).await;
    join(&mut p2, "dawn", "p2").await;
    recv_json(&mut p2).await;
    recv_json(&mut p1).await; // joined p2
    join(&mut p3, "dawn", "p3").await;
    recv_json(&mut p3).await;
    recv_json(&mut p1).await; // joined p3
    recv_json(&mut p2).await; // joined p3

    // Odd spacing and an extra field must survive the relay untouched.
    let raw =
        r#"{"type":"offer",  "to":"p2","from":"p1","data":{"sdp":"v=0...","type":"offer"},"x":1}"#;
    send_raw(&mut p1, raw.to_owned()).await;
    assert_eq!(recv_text(&mut p2).await, raw);

    // Only the target hears it: p3's next frame is the follow-up probe.
    send_raw(
        &mut p1,
        json!({"type": "ice", "to": "p3", "from": "p1", "data": {"candidate": "probe"}})
            .to_string(),
    )
    .await;
    let next = recv_json(&mut p3).await;
    assert_eq!(next["type"], "ice");
    assert_eq!(next["data"]["candidate"], "probe");

    hub.handle.abort();
}

#[tokio::test]
async fn slow_consumer_does_not_stall_other_relays() {
    let hub = start_hub("*").await;
    let mut p1 = connect(&hub).await;
    let mut p2 = connect(&hub).await;
    let mut p3 = connect(&hub).await;
    join(&mut p1, "dawn", "p1").await;
    recv_json(&mut p1).await;
    join(&mut p2, "dawn", "p2").await;
    recv_json(&mut p1).await; // joined p2
    join(&mut p3, "dawn", "p3").await;
    recv_json(&mut p3).await;
    recv_json(&mut p1).await; // joined p3

    // Flood p2, which never reads: its outbound queue and socket
    // buffers fill up. Frames beyond capacity are dropped, so p1's
    // session loop keeps running.
    let filler = "x".repeat(32 * 1024);
    for _ in 0..600 {
        send_raw(
            &mut p1,
            json!({"type": "offer", "to": "p2", "from": "p1", "data": {"sdp": filler}})
                .to_string(),
        )
        .await;
    }

    // A relay to a healthy peer still goes through promptly.
    send_raw(
        &mut p1,
        json!({"type": "ice", "to": "p3", "from": "p1", "data": {"candidate": "alive"}})
            .to_string(),
    )
    .await;
    let next = recv_json(&mut p3).await;
    assert_eq!(next["type"], "ice");
    assert_eq!(next["data"]["candidate"], "alive");

    drop(p2);
    hub.handle.abort();
}

#[tokio::test]
async fn relay_to_a_missing_peer_is_dropped() {
    let hub = start_hub("*").await;
    let mut p1 = connect(&hub).await;
    join(&mut p1, "dawn", "p1").await;
    recv_json(&mut p1).await;

    send_raw(
        &mut p1,
        json!({"type": "offer", "to": "ghost", "from": "p1", "data": {}}).to_string(),
    )
    .await;

    // The hub must stay healthy: a second peer can still join.
    let mut p2 = connect(&hub).await;
    join(&mut p2, "dawn", "p2").await;
    assert_eq!(recv_json(&mut p2).await["type"], "peers");

    hub.handle.abort();
}

#[tokio::test]
async fn disconnect_broadcasts_left() {
    let hub = start_hub("*").await;
    let mut p1 = connect(&hub).await;
    let mut p2 = connect(&hub).await;
    join(&mut p1, "dawn", "p1").await;
    recv_json(&mut p1).await;
    join(&mut p2, "dawn", "p2").await;
    recv_json(&mut p2).await;
    recv_json(&mut p1).await; // joined p2

    drop(p2);

    let notice = recv_json(&mut p1).await;
    assert_eq!(notice["type"], "left");
    assert_eq!(notice["from"], "p2");

    hub.handle.abort();
}

#[tokio::test]
async fn leave_departs_without_closing_the_socket() {
    let hub = start_hub("*").await;
    let mut p1 = connect(&hub).await;
    let mut p2 = connect(&hub).await;
    join(&mut p1, "dawn", "p1").await;
    recv_json(&mut p1).await;
    join(&mut p2, "dawn", "p2").await;
    recv_json(&mut p2).await;
    recv_json(&mut p1).await; // joined p2

    send_raw(&mut p2, json!({"type": "leave"}).to_string()).await;
    let notice = recv_json(&mut p1).await;
    assert_eq!(notice["type"], "left");
    assert_eq!(notice["from"], "p2");

    // The same socket can register again.
    join(&mut p2, "dusk", "p2").await;
    assert_eq!(recv_json(&mut p2).await["type"], "peers");

    hub.handle.abort();
}

#[tokio::test]
async fn disallowed_origin_is_closed_with_policy_code() {
    let hub = start_hub("https://garden.example").await;

    let mut request = format!("ws://{}", hub.addr).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://evil.example"));
    let (mut ws, _) = connect_async(request).await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("close timed out")
        .expect("stream ended")
        .expect("stream errored");
    match frame {
        Message::Close(Some(close)) => assert_eq!(u16::from(close.code), 1008),
        other => panic!("expected close frame, got {other:?}"),
    }

    // An allowed origin still gets through.
    let mut request = format!("ws://{}", hub.addr).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://garden.example"));
    let (mut ws, _) = connect_async(request).await.unwrap();
    send_raw(
        &mut ws,
        json!({"type": "join", "circleId": "dawn", "peerId": "p1"}).to_string(),
    )
    .await;
    assert_eq!(recv_json(&mut ws).await["type"], "peers");

    hub.handle.abort();
}
