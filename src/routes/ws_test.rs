use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::*;
use crate::routes::test_helpers::{spawn_relay, wait_for_subscribers};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: std::net::SocketAddr, topic: &str) -> Client {
    let (stream, _) = connect_async(format!("ws://{addr}/ws/{topic}")).await.expect("connect relay");
    stream
}

async fn send(client: &mut Client, frame: &frames::Frame) {
    let bytes = frames::encode_frame(frame);
    client.send(tungstenite::Message::Binary(bytes.into())).await.expect("send frame");
}

async fn recv(client: &mut Client) -> frames::Frame {
    loop {
        let msg = timeout(Duration::from_millis(500), client.next())
            .await
            .expect("relay receive timed out")
            .expect("relay stream ended")
            .expect("relay stream error");
        if let tungstenite::Message::Binary(bytes) = msg {
            return frames::decode_frame(&bytes).expect("decode frame");
        }
    }
}

async fn assert_silent(client: &mut Client) {
    assert!(timeout(Duration::from_millis(80), client.next()).await.is_err(), "expected no frame");
}

#[tokio::test]
async fn frames_fan_out_to_every_socket_on_the_topic() {
    let (addr, state) = spawn_relay().await;
    let topic = "board:relay-fanout";
    let mut ada = connect(addr, topic).await;
    let mut bob = connect(addr, topic).await;
    wait_for_subscribers(&state, topic, 2).await;

    let frame = frames::Frame::new(topic, "cursor_move", json!({"actorId": "actor-ada", "x": 1}));
    send(&mut ada, &frame).await;

    let at_bob = recv(&mut bob).await;
    let at_ada = recv(&mut ada).await;
    assert_eq!(at_bob.id, frame.id);
    assert_eq!(at_bob.data, frame.data);
    assert_eq!(at_ada.id, frame.id, "sender receives its own frame");
}

#[tokio::test]
async fn topics_do_not_leak() {
    let (addr, state) = spawn_relay().await;
    let mut ada = connect(addr, "board:one").await;
    let mut bob = connect(addr, "board:two").await;
    wait_for_subscribers(&state, "board:one", 1).await;
    wait_for_subscribers(&state, "board:two", 1).await;

    send(&mut ada, &frames::Frame::new("board:one", "cursor_move", json!({}))).await;

    recv(&mut ada).await;
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn frame_for_another_topic_is_dropped() {
    let (addr, state) = spawn_relay().await;
    let mut ada = connect(addr, "board:one").await;
    let mut bob = connect(addr, "board:two").await;
    wait_for_subscribers(&state, "board:one", 1).await;
    wait_for_subscribers(&state, "board:two", 1).await;

    send(&mut ada, &frames::Frame::new("board:two", "cursor_move", json!({}))).await;

    assert_silent(&mut bob).await;
    assert_silent(&mut ada).await;
}

#[tokio::test]
async fn garbage_is_ignored_and_socket_stays_open() {
    let (addr, state) = spawn_relay().await;
    let topic = "board:garbage";
    let mut ada = connect(addr, topic).await;
    wait_for_subscribers(&state, topic, 1).await;

    ada.send(tungstenite::Message::Binary(vec![0xff, 0x00, 0x13].into())).await.expect("send garbage");
    send(&mut ada, &frames::Frame::new(topic, "cursor_move", json!({}))).await;

    assert_eq!(recv(&mut ada).await.topic, topic);
}

#[tokio::test]
async fn closing_the_socket_unsubscribes() {
    let (addr, state) = spawn_relay().await;
    let topic = "board:leave";
    let mut ada = connect(addr, topic).await;
    wait_for_subscribers(&state, topic, 1).await;

    ada.close(None).await.expect("close");

    timeout(Duration::from_secs(2), async {
        while state.hub.subscriber_count(topic) > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription released");
}

#[tokio::test]
async fn non_board_topic_is_rejected() {
    let (addr, _state) = spawn_relay().await;
    assert!(connect_async(format!("ws://{addr}/ws/lobby")).await.is_err());
}
