//! Dispatch collaborator invoked for every packet a socket sees

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use log::debug;
use serde_json::Value;

use crate::constants::{CONNECTION_EVENT, DISCONNECT_EVENT};
use crate::core::packet::{Packet, PacketType};
use crate::core::socket::Socket;
use crate::error::{Result, SocketIoError};

/// Receives every packet of a connection, including the synthetic CONNECT sent
/// at loop start and the synthetic DISCONNECT dispatched during cleanup.
///
/// The returned values become the `Data` of the ACK sent back for events that
/// carry an ack id.
#[async_trait]
pub trait PacketHandler: Send + Sync {
    async fn on_packet(&self, socket: &Arc<Socket>, packet: &Packet) -> Result<Vec<Value>>;
}

/// Boxed async event callback
pub type EventCallback =
    Arc<dyn Fn(Arc<Socket>, Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>>> + Send + Sync>;

/// Routes packets to callbacks registered by event name
#[derive(Default, Clone)]
pub struct EventRouter {
    handlers: HashMap<String, EventCallback>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event`, replacing any previous one.
    ///
    /// `connection` fires for CONNECT packets (with the connect payload as
    /// args). `disconnect` fires for every DISCONNECT the socket sees: once for
    /// the peer's own packet if it sent one, and once more for the synthetic
    /// packet dispatched during teardown.
    pub fn on<F, Fut>(mut self, event: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Arc<Socket>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
    {
        let wrapped: EventCallback = Arc::new(
            move |socket: Arc<Socket>, args: Vec<Value>| -> BoxFuture<'static, Result<Vec<Value>>> {
                Box::pin(callback(socket, args))
            },
        );
        self.handlers.insert(event.into(), wrapped);
        self
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    async fn call(&self, event: &str, socket: &Arc<Socket>, args: Vec<Value>) -> Result<Vec<Value>> {
        match self.handlers.get(event) {
            Some(callback) => callback(socket.clone(), args).await,
            None => {
                debug!("No handler for '{}' on {}", event, socket.id());
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl PacketHandler for EventRouter {
    async fn on_packet(&self, socket: &Arc<Socket>, packet: &Packet) -> Result<Vec<Value>> {
        match packet.packet_type {
            PacketType::Connect => self.call(CONNECTION_EVENT, socket, packet.data.clone()).await,
            PacketType::Disconnect => self.call(DISCONNECT_EVENT, socket, Vec::new()).await,
            PacketType::Event | PacketType::BinaryEvent => {
                let event = packet.event_name().ok_or_else(|| {
                    SocketIoError::HandlerError(format!(
                        "Event packet from {} has no event name",
                        socket.id()
                    ))
                })?;
                let args = packet.data[1..].to_vec();
                self.call(event, socket, args).await
            }
            PacketType::Ack => Ok(Vec::new()),
        }
    }
}
