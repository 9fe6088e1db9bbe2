//! Real WebSocket round trips against a server on an ephemeral port.
mod common;

use std::net::SocketAddr;
use std::time::Duration;

use backend_lib::ws_router::create_router;
use common::setup_test_env;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn setup_server() -> (SocketAddr, tempfile::TempDir) {
    let (state, temp_dir) = setup_test_env();
    let app = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, temp_dir)
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect");
    socket
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Next text frame as JSON, failing after five seconds
async fn next_json(socket: &mut Socket) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(_)) => continue,
                other => panic!("socket closed: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a message");
    serde_json::from_str(&frame).unwrap()
}

#[tokio::test]
async fn test_meeting_over_websocket() {
    let (addr, _temp_dir) = setup_server().await;

    let mut ada = connect(addr).await;
    send_json(&mut ada, json!({"type": "join-as-host", "hostName": "Ada"})).await;
    let joined = next_json(&mut ada).await;
    assert_eq!(joined["type"], "joined-meeting");
    let meeting_id = joined["meetingId"].as_str().unwrap().to_string();
    let ada_id = joined["selfId"].as_str().unwrap().to_string();
    assert_eq!(joined["hostId"], ada_id.as_str());

    let mut ben = connect(addr).await;
    send_json(
        &mut ben,
        json!({"type": "join-meeting", "meetingId": meeting_id, "participantName": "Ben"}),
    )
    .await;
    let joined = next_json(&mut ben).await;
    assert_eq!(joined["type"], "joined-meeting");
    assert_eq!(joined["participants"].as_array().unwrap().len(), 2);
    let ben_id = joined["selfId"].as_str().unwrap().to_string();

    let announced = next_json(&mut ada).await;
    assert_eq!(announced["type"], "participant-joined");
    assert_eq!(announced["participant"]["name"], "Ben");

    // signaling passes through untouched
    send_json(
        &mut ben,
        json!({"type": "offer", "target": ada_id, "offer": {"type": "offer", "sdp": "v=0"}}),
    )
    .await;
    let offer = next_json(&mut ada).await;
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["sender"], ben_id.as_str());
    assert_eq!(offer["offer"]["sdp"], "v=0");

    // unknown message kinds are reported, not ignored
    send_json(&mut ben, json!({"type": "draw-line", "x": 1})).await;
    let error = next_json(&mut ben).await;
    assert_eq!(error["type"], "action-error");
    assert!(error["message"]
        .as_str()
        .unwrap()
        .starts_with("Malformed message"));

    // host leaves: the meeting ends for everyone
    ada.close(None).await.unwrap();
    let ended = next_json(&mut ben).await;
    assert_eq!(ended["type"], "meeting-ended");
}
