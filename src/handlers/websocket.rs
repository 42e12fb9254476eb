use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitStream, StreamExt};
use log::{debug, error};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};
use warp::Filter;

use crate::constants::{HEALTH_PATH, WS_PATH};
use crate::core::codec::{decode_packet, encode_packet};
use crate::core::packet::Packet;
use crate::core::server::SharedServer;
use crate::core::transport::Transport;
use crate::error::{Result, SocketIoError};

/// Packet transport over a warp WebSocket using the text wire format
pub struct WsTransport {
    id: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    receiver: AsyncMutex<SplitStream<WebSocket>>,
    closed: watch::Sender<bool>,
}

impl WsTransport {
    /// Split the socket and spawn the writer task
    pub fn new(ws: WebSocket) -> Self {
        let id = Uuid::new_v4().to_string();
        let (mut ws_tx, ws_rx) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        // Forward messages from our channel to the WebSocket
        let writer_id = id.clone();
        tokio::task::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = ws_tx.send(message).await {
                    error!("Failed to send WebSocket message to {}: {}", writer_id, e);
                    break;
                }
            }
            if let Err(e) = ws_tx.close().await {
                debug!("Failed to close WebSocket for {}: {}", writer_id, e);
            }
        });

        let (closed, _) = watch::channel(false);
        Self {
            id,
            sender: Mutex::new(Some(tx)),
            receiver: AsyncMutex::new(ws_rx),
            closed,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn decode(&self) -> Result<Packet> {
        let mut closed = self.closed.subscribe();
        let mut receiver = self.receiver.lock().await;

        loop {
            if *closed.borrow_and_update() {
                return Err(SocketIoError::ConnectionClosed);
            }

            let next = tokio::select! {
                _ = closed.changed() => return Err(SocketIoError::ConnectionClosed),
                next = receiver.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(SocketIoError::ConnectionError(e.to_string())),
                None => return Err(SocketIoError::ConnectionClosed),
            };

            if message.is_close() {
                return Err(SocketIoError::ConnectionClosed);
            }
            if message.is_binary() {
                return Err(SocketIoError::DecodeError(
                    "Binary frames are not supported".to_string(),
                ));
            }
            if let Ok(text) = message.to_str() {
                return decode_packet(text);
            }
            // ping/pong frames are answered by the WebSocket layer
        }
    }

    async fn encode(&self, packet: &Packet) -> Result<()> {
        let frame = encode_packet(packet)?;
        let sender = self.sender.lock()?;
        match sender.as_ref() {
            Some(tx) => tx
                .send(Message::text(frame))
                .map_err(|_| SocketIoError::ConnectionClosed),
            None => Err(SocketIoError::ConnectionClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        // Dropping the sender lets the writer task flush and close the sink
        self.sender.lock()?.take();
        self.closed.send_replace(true);
        Ok(())
    }
}

/// Serve one upgraded WebSocket until its protocol loop ends
pub async fn handle_ws_client(ws: WebSocket, server: SharedServer) {
    let transport = Arc::new(WsTransport::new(ws));
    if let Err(e) = server.serve(transport).await {
        debug!("WebSocket session ended with error: {}", e);
    }
}

/// `GET /ws` upgraded to a socket.io connection
pub fn ws_route(
    server: SharedServer,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path(WS_PATH)
        .and(warp::ws())
        .and(with_server(server))
        .map(|ws: warp::ws::Ws, server: SharedServer| {
            debug!("New websocket connection");
            ws.on_upgrade(move |socket| handle_ws_client(socket, server))
        })
}

/// `GET /health` liveness probe
pub fn health_route() -> impl Filter<Extract = (&'static str,), Error = warp::Rejection> + Clone {
    warp::path(HEALTH_PATH).map(|| "OK")
}

// Helper function to include the server in request handlers
fn with_server(
    server: SharedServer,
) -> impl Filter<Extract = (SharedServer,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}
