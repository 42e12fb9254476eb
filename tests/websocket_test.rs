// End-to-end tests of the WebSocket route using warp's in-process test client

use std::sync::Arc;

use serde_json::Value;

use rusty_socketio::core::{EventRouter, Server, Socket};
use rusty_socketio::error::Result;
use rusty_socketio::handlers::{health_route, ws_route};

async fn echo(_socket: Arc<Socket>, args: Vec<Value>) -> Result<Vec<Value>> {
    Ok(args)
}

async fn join(socket: Arc<Socket>, args: Vec<Value>) -> Result<Vec<Value>> {
    let room = args[0].as_str().unwrap_or_default().to_string();
    socket.join(&room).await?;
    Ok(Vec::new())
}

fn test_server() -> Arc<Server> {
    let router = EventRouter::new().on("echo", echo).on("join", join);
    Arc::new(Server::builder().handler(Arc::new(router)).build())
}

async fn recv_text(client: &mut warp::test::WsClient) -> String {
    let message = client.recv().await.expect("message from server");
    message.to_str().expect("text frame").to_string()
}

#[tokio::test]
async fn test_handshake_event_ack_and_disconnect() {
    let server = test_server();
    let mut client = warp::test::ws()
        .path("/ws")
        .handshake(ws_route(server.clone()))
        .await
        .expect("handshake");

    assert_eq!(recv_text(&mut client).await, "0");

    client.send_text(r#"21["echo","hi",{"n":1}]"#).await;
    assert_eq!(recv_text(&mut client).await, r#"31["hi",{"n":1}]"#);

    // No id, no ack: the next frame we see answers the namespace CONNECT
    client.send_text(r#"2["echo","quiet"]"#).await;
    client.send_text("0/admin,").await;
    assert_eq!(recv_text(&mut client).await, "0/admin,");

    client.send_text(r#"2/admin,5["echo"]"#).await;
    assert_eq!(recv_text(&mut client).await, "3/admin,5[]");

    client.send_text("1/admin,").await;
    client.recv_closed().await.expect("server closes the socket");
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let server = test_server();
    let mut client = warp::test::ws()
        .path("/ws")
        .handshake(ws_route(server.clone()))
        .await
        .expect("handshake");

    assert_eq!(recv_text(&mut client).await, "0");
    client.send_text(r#"2["echo""#).await;
    client.recv_closed().await.expect("server closes the socket");
}

#[tokio::test]
async fn test_room_broadcast_reaches_websocket_client() {
    let server = test_server();
    let mut client = warp::test::ws()
        .path("/ws")
        .handshake(ws_route(server.clone()))
        .await
        .expect("handshake");

    assert_eq!(recv_text(&mut client).await, "0");
    client.send_text(r#"20["join","lobby"]"#).await;
    assert_eq!(recv_text(&mut client).await, "30[]");

    server
        .broadcast_to("lobby", "chat", vec![Value::from("hello")])
        .await
        .unwrap();
    assert_eq!(recv_text(&mut client).await, r#"2["chat","hello"]"#);
}

#[tokio::test]
async fn test_health_route() {
    let response = warp::test::request()
        .path("/health")
        .reply(&health_route())
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), "OK");
}
