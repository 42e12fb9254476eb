//! Server service that owns the adaptor and runs one protocol loop per connection

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::adaptor::{BroadcastAdaptor, MemoryAdaptor};
use crate::config::ServerConfig;
use crate::constants::DEFAULT_MAX_CONNECTIONS;
use crate::core::handler::{EventRouter, PacketHandler};
use crate::core::socket::Socket;
use crate::core::transport::{PacketLogLayer, Transport, TransportLayer};
use crate::error::{Result, SocketIoError};

/// Coordinates live sockets, the dispatch collaborator and the broadcast adaptor
pub struct Server {
    adaptor: Arc<dyn BroadcastAdaptor>,
    handler: Arc<dyn PacketHandler>,
    layers: Vec<Arc<dyn TransportLayer>>,
    sockets: RwLock<HashMap<String, Arc<Socket>>>,
    max_connections: usize,
}

/// Builder selecting the adaptor, handler and transport layers of a server
pub struct ServerBuilder {
    adaptor: Option<Arc<dyn BroadcastAdaptor>>,
    handler: Option<Arc<dyn PacketHandler>>,
    layers: Vec<Arc<dyn TransportLayer>>,
    max_connections: usize,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            adaptor: None,
            handler: None,
            layers: Vec::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Start from configuration values
    pub fn from_config(config: &ServerConfig) -> Self {
        let builder = Self::new().max_connections(config.max_connections);
        if config.log_packets {
            builder.layer(PacketLogLayer)
        } else {
            builder
        }
    }

    /// Use a specific broadcast adaptor instead of the in-memory default
    pub fn adaptor(mut self, adaptor: Arc<dyn BroadcastAdaptor>) -> Self {
        self.adaptor = Some(adaptor);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn PacketHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Append a transport layer. Earlier layers sit closer to the raw transport.
    pub fn layer(mut self, layer: impl TransportLayer + 'static) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn build(self) -> Server {
        Server {
            adaptor: self.adaptor.unwrap_or_else(MemoryAdaptor::shared),
            handler: self
                .handler
                .unwrap_or_else(|| Arc::new(EventRouter::new())),
            layers: self.layers,
            sockets: RwLock::new(HashMap::new()),
            max_connections: self.max_connections,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn adaptor(&self) -> &Arc<dyn BroadcastAdaptor> {
        &self.adaptor
    }

    /// Serve one accepted transport until its protocol loop ends
    pub async fn serve(&self, transport: Arc<dyn Transport>) -> Result<()> {
        let transport = self
            .layers
            .iter()
            .fold(transport, |inner, layer| layer.layer(inner));

        let socket = Socket::new(transport.clone(), self.handler.clone(), self.adaptor.clone());
        let socket_id = socket.id().to_string();

        let rejection = {
            let mut sockets = self.sockets.write().await;
            if sockets.contains_key(&socket_id) {
                Some(SocketIoError::ConnectionError(format!(
                    "Connection id already in use: {}",
                    socket_id
                )))
            } else if sockets.len() >= self.max_connections {
                Some(SocketIoError::ConnectionLimitReached(self.max_connections))
            } else {
                sockets.insert(socket_id.clone(), socket.clone());
                None
            }
        };
        if let Some(e) = rejection {
            warn!("Rejecting connection {}: {}", socket_id, e);
            transport.close().await?;
            return Err(e);
        }

        info!("Client connected: {}", socket_id);

        let result = socket.clone().run().await;

        let remaining = {
            let mut sockets = self.sockets.write().await;
            sockets.remove(&socket_id);
            sockets.len()
        };
        let duration = Utc::now() - socket.connected_at();

        match &result {
            Ok(()) => info!(
                "Client disconnected: {} after {}s",
                socket_id,
                duration.num_seconds()
            ),
            Err(e) => warn!(
                "Connection {} closed after {}s: {}",
                socket_id,
                duration.num_seconds(),
                e
            ),
        }
        info!("Current connections: {}", remaining);

        result
    }

    pub async fn connection_count(&self) -> usize {
        self.sockets.read().await.len()
    }

    pub async fn socket(&self, id: &str) -> Option<Arc<Socket>> {
        self.sockets.read().await.get(id).cloned()
    }

    /// Emit an event to every member of a room
    pub async fn broadcast_to(&self, room: &str, event: &str, args: Vec<Value>) -> Result<()> {
        self.adaptor.send(None, room, event, &args).await
    }

    /// Force-close a connection by id
    pub async fn disconnect(&self, id: &str) -> Result<()> {
        match self.socket(id).await {
            Some(socket) => socket.disconnect().await,
            None => Err(SocketIoError::ConnectionError(format!(
                "Connection not found: {}",
                id
            ))),
        }
    }
}

// Shared reference to the server
pub type SharedServer = Arc<Server>;
