//! Transport abstraction consumed by the protocol loop
//!
//! A transport moves whole packets: the loop decodes one inbound packet at a
//! time and encodes outbound packets from any task. Closing a transport wakes
//! a pending `decode`, which is how a connection is force-closed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::trace;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};

use crate::core::packet::Packet;
use crate::error::{Result, SocketIoError};

/// A bidirectional packet connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport-assigned identity, stable for the connection's lifetime
    fn id(&self) -> &str;

    /// Wait for the next inbound packet
    async fn decode(&self) -> Result<Packet>;

    /// Send one packet to the peer
    async fn encode(&self, packet: &Packet) -> Result<()>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&self) -> Result<()>;
}

/// Decorates a transport before a socket is built on top of it.
///
/// Layers registered on a server are applied in registration order: the first
/// layer wraps the raw transport and the last one ends up outermost.
pub trait TransportLayer: Send + Sync {
    fn layer(&self, inner: Arc<dyn Transport>) -> Arc<dyn Transport>;
}

impl<F> TransportLayer for F
where
    F: Fn(Arc<dyn Transport>) -> Arc<dyn Transport> + Send + Sync,
{
    fn layer(&self, inner: Arc<dyn Transport>) -> Arc<dyn Transport> {
        self(inner)
    }
}

/// Layer that traces every packet crossing the transport
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketLogLayer;

impl TransportLayer for PacketLogLayer {
    fn layer(&self, inner: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(LoggedTransport { inner })
    }
}

struct LoggedTransport {
    inner: Arc<dyn Transport>,
}

#[async_trait]
impl Transport for LoggedTransport {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn decode(&self) -> Result<Packet> {
        let result = self.inner.decode().await;
        match &result {
            Ok(packet) => trace!("[{}] <- {:?}", self.id(), packet),
            Err(e) => trace!("[{}] <- error: {}", self.id(), e),
        }
        result
    }

    async fn encode(&self, packet: &Packet) -> Result<()> {
        trace!("[{}] -> {:?}", self.id(), packet);
        self.inner.encode(packet).await
    }

    async fn close(&self) -> Result<()> {
        trace!("[{}] closing transport", self.id());
        self.inner.close().await
    }
}

/// In-process transport backed by channels
pub struct MemoryTransport {
    id: String,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Packet>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Packet>>>,
    closed: watch::Sender<bool>,
}

/// The remote end of a `MemoryTransport`
pub struct MemoryPeer {
    sender: mpsc::UnboundedSender<Packet>,
    receiver: mpsc::UnboundedReceiver<Packet>,
}

/// Create a connected transport/peer pair
pub fn memory_pair(id: impl Into<String>) -> (MemoryTransport, MemoryPeer) {
    let (to_server, inbound) = mpsc::unbounded_channel();
    let (outbound, from_server) = mpsc::unbounded_channel();
    let (closed, _) = watch::channel(false);

    let transport = MemoryTransport {
        id: id.into(),
        inbound: AsyncMutex::new(inbound),
        outbound: Mutex::new(Some(outbound)),
        closed,
    };
    let peer = MemoryPeer {
        sender: to_server,
        receiver: from_server,
    };
    (transport, peer)
}

impl MemoryTransport {
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn decode(&self) -> Result<Packet> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(SocketIoError::ConnectionClosed);
        }

        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = closed.changed() => Err(SocketIoError::ConnectionClosed),
            packet = inbound.recv() => packet.ok_or(SocketIoError::ConnectionClosed),
        }
    }

    async fn encode(&self, packet: &Packet) -> Result<()> {
        let outbound = self.outbound.lock()?;
        match outbound.as_ref() {
            Some(tx) => tx
                .send(packet.clone())
                .map_err(|_| SocketIoError::ConnectionClosed),
            None => Err(SocketIoError::ConnectionClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        self.outbound.lock()?.take();
        self.closed.send_replace(true);
        Ok(())
    }
}

impl MemoryPeer {
    /// Deliver a packet to the server side
    pub fn send(&self, packet: Packet) -> Result<()> {
        self.sender
            .send(packet)
            .map_err(|_| SocketIoError::ConnectionClosed)
    }

    /// Next packet written by the server; `None` once the transport is closed
    /// and everything sent before has been drained
    pub async fn recv(&mut self) -> Option<Packet> {
        self.receiver.recv().await
    }

    /// Drain everything the server wrote until it closed the transport
    pub async fn recv_all(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Some(packet) = self.receiver.recv().await {
            packets.push(packet);
        }
        packets
    }

    /// Hang up without a DISCONNECT packet
    pub fn hang_up(self) {}
}
