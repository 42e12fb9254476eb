use log::{error, info, warn};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use rusty_socketio::config::ServerConfig;
use rusty_socketio::core::socket::Socket;
use rusty_socketio::core::{EventRouter, ServerBuilder};
use rusty_socketio::error::{Result, SocketIoError};
use rusty_socketio::handlers::{health_route, ws_route};

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Load config from env
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, max_connections={}",
        config.host, config.port, config.max_connections
    );

    let server = Arc::new(
        ServerBuilder::from_config(&config)
            .handler(Arc::new(chat_router()))
            .build(),
    );

    // Combine routes
    let routes = ws_route(server).or(health_route());

    // Build the server address
    let addr: SocketAddr = match config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    match (config.enable_tls, config.tls_cert_path, config.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            info!("Starting Rusty Socket.IO server on {} (TLS)", addr);
            warp::serve(routes)
                .tls()
                .cert_path(cert_path)
                .key_path(key_path)
                .run(addr)
                .await;
        }
        _ => {
            info!("Starting Rusty Socket.IO server on {}", addr);
            warp::serve(routes).run(addr).await;
        }
    }
}

/// Demo handlers: room membership, room chat with delivery acks, lifecycle logging
fn chat_router() -> EventRouter {
    EventRouter::new()
        .on("connection", on_connection)
        .on("disconnect", on_disconnect)
        .on("join", on_join)
        .on("leave", on_leave)
        .on("chat", on_chat)
}

async fn on_connection(socket: Arc<Socket>, _args: Vec<Value>) -> Result<Vec<Value>> {
    info!("Socket {} connected on '{}'", socket.id(), socket.namespace());
    Ok(Vec::new())
}

async fn on_disconnect(socket: Arc<Socket>, _args: Vec<Value>) -> Result<Vec<Value>> {
    info!("Socket {} left its rooms and disconnected", socket.id());
    Ok(Vec::new())
}

async fn on_join(socket: Arc<Socket>, args: Vec<Value>) -> Result<Vec<Value>> {
    let room = room_arg(&args)?;
    socket.join(&room).await?;
    Ok(vec![json!(socket.rooms())])
}

async fn on_leave(socket: Arc<Socket>, args: Vec<Value>) -> Result<Vec<Value>> {
    let room = room_arg(&args)?;
    socket.leave(&room).await?;
    Ok(vec![json!(socket.rooms())])
}

/// `chat(room, message)`: relays to the rest of the room and acks the sender
async fn on_chat(socket: Arc<Socket>, args: Vec<Value>) -> Result<Vec<Value>> {
    let room = room_arg(&args)?;
    let message = args.get(1).cloned().unwrap_or(Value::Null);
    socket
        .broadcast_to(&room, "chat", vec![json!(socket.id()), message])
        .await?;
    Ok(vec![json!("delivered")])
}

fn room_arg(args: &[Value]) -> Result<String> {
    args.first()
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SocketIoError::HandlerError("Expected a room name".to_string()))
}
