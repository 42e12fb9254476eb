//! Per-connection socket and its packet protocol loop
//!
//! A socket performs the CONNECT handshake, then decodes one packet at a time,
//! hands it to the dispatch collaborator and answers with CONNECT or ACK packets
//! as needed. Whatever ends the loop, the socket leaves all of its rooms and
//! dispatches a synthetic DISCONNECT exactly once before `run` returns.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::Value;

use crate::adaptor::{BroadcastAdaptor, RoomMember};
use crate::constants::DISCONNECT_EVENT;
use crate::core::ack::{AckCorrelator, PendingAck};
use crate::core::handler::PacketHandler;
use crate::core::packet::{Packet, PacketType};
use crate::core::transport::Transport;
use crate::error::{Result, SocketIoError};

/// One client connection
pub struct Socket {
    transport: Arc<dyn Transport>,
    handler: Arc<dyn PacketHandler>,
    adaptor: Arc<dyn BroadcastAdaptor>,
    namespace: RwLock<String>,
    acks: AckCorrelator,
    rooms: Mutex<HashSet<String>>,
    started: AtomicBool,
    closed: AtomicBool,
    connected_at: DateTime<Utc>,
    self_ref: Weak<Socket>,
}

impl Socket {
    /// Build a socket over an accepted transport
    pub fn new(
        transport: Arc<dyn Transport>,
        handler: Arc<dyn PacketHandler>,
        adaptor: Arc<dyn BroadcastAdaptor>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            transport,
            handler,
            adaptor,
            namespace: RwLock::new(String::new()),
            acks: AckCorrelator::new(),
            rooms: Mutex::new(HashSet::new()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            connected_at: Utc::now(),
            self_ref: self_ref.clone(),
        })
    }

    pub fn id(&self) -> &str {
        self.transport.id()
    }

    /// Namespace adopted from the last CONNECT packet (empty until then)
    pub fn namespace(&self) -> String {
        self.namespace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Whether teardown of this connection has started
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a fire-and-forget event packet
    pub async fn send(&self, args: Vec<Value>) -> Result<()> {
        let packet = Packet::event(self.namespace(), args);
        self.transport.encode(&packet).await
    }

    /// Send an event packet carrying a fresh ack id and return that id.
    /// The id stays consumed even if the write fails.
    pub async fn send_with_ack(&self, args: Vec<Value>) -> Result<i64> {
        let id = self.acks.reserve()?;
        let packet = Packet::event_with_id(id, self.namespace(), args);
        self.transport.encode(&packet).await?;
        Ok(id)
    }

    /// Emit `event` with `args`. Emitting `disconnect` closes the transport once
    /// the packet has been written.
    pub async fn emit(&self, event: &str, args: Vec<Value>) -> Result<()> {
        self.send(event_data(event, args)).await?;
        if event == DISCONNECT_EVENT {
            self.transport.close().await?;
        }
        Ok(())
    }

    /// Emit `event` and wait for the peer's acknowledgement through the returned handle
    pub async fn emit_with_ack(&self, event: &str, args: Vec<Value>) -> Result<PendingAck> {
        let id = self.acks.reserve()?;
        // Registered before writing so a fast ACK cannot be missed
        let pending = self.acks.register(id)?;
        let packet = Packet::event_with_id(id, self.namespace(), event_data(event, args));
        if let Err(e) = self.transport.encode(&packet).await {
            self.acks.forget(id)?;
            return Err(e);
        }
        Ok(pending)
    }

    /// Close the underlying transport; the loop then ends with a decode failure
    pub async fn disconnect(&self) -> Result<()> {
        self.transport.close().await
    }

    /// Join `room`. Fails with `ConnectionClosed` once teardown has started.
    pub async fn join(&self, room: &str) -> Result<()> {
        if self.is_closed() {
            return Err(SocketIoError::ConnectionClosed);
        }
        let member = self.as_member()?;
        self.adaptor.join(room, member).await?;
        self.rooms.lock()?.insert(room.to_string());

        // Teardown may have drained the room set while we were joining
        if self.is_closed() {
            self.leave(room).await?;
            return Err(SocketIoError::ConnectionClosed);
        }
        Ok(())
    }

    pub async fn leave(&self, room: &str) -> Result<()> {
        self.adaptor.leave(room, self.id()).await?;
        self.rooms.lock()?.remove(room);
        Ok(())
    }

    /// Leave every joined room, continuing past failures and reporting the first one
    pub async fn leave_all(&self) -> Result<()> {
        let rooms: Vec<String> = self.rooms.lock()?.drain().collect();
        let mut first_error = None;
        for room in rooms {
            if let Err(e) = self.adaptor.leave(&room, self.id()).await {
                warn!("Failed to remove {} from room {}: {}", self.id(), room, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Rooms this socket has joined
    pub fn rooms(&self) -> Vec<String> {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Emit to everyone in `room` except this socket
    pub async fn broadcast_to(&self, room: &str, event: &str, args: Vec<Value>) -> Result<()> {
        self.adaptor.send(Some(self.id()), room, event, &args).await
    }

    /// Run the protocol loop until the peer disconnects or an error occurs.
    /// Cleanup runs on every exit path before this returns.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SocketIoError::ConnectionError(format!(
                "Protocol loop for {} already started",
                self.id()
            )));
        }

        let result = self.serve_packets().await;
        self.close_session().await;
        result
    }

    async fn serve_packets(self: &Arc<Self>) -> Result<()> {
        let connect = Packet::connect(self.namespace());
        self.transport.encode(&connect).await?;
        self.handler.on_packet(self, &connect).await?;

        loop {
            let packet = self.transport.decode().await?;
            let result = self.handler.on_packet(self, &packet).await?;

            match packet.packet_type {
                PacketType::Connect => {
                    self.set_namespace(&packet.nsp);
                    self.transport.encode(&Packet::connect(packet.nsp)).await?;
                }
                PacketType::Event | PacketType::BinaryEvent => {
                    if packet.id >= 0 {
                        let ack = Packet::ack(packet.id, self.namespace(), result);
                        self.transport.encode(&ack).await?;
                    }
                }
                PacketType::Ack => {
                    if !self.acks.resolve(packet.id, packet.data)? {
                        debug!("Ignoring unmatched ack {} on {}", packet.id, self.id());
                    }
                }
                PacketType::Disconnect => return Ok(()),
            }
        }
    }

    async fn close_session(self: &Arc<Self>) {
        self.closed.store(true, Ordering::SeqCst);

        if let Err(e) = self.leave_all().await {
            warn!("Failed to leave rooms for {}: {}", self.id(), e);
        }

        let disconnect = Packet::disconnect(self.namespace());
        if let Err(e) = self.handler.on_packet(self, &disconnect).await {
            warn!("Disconnect handler failed for {}: {}", self.id(), e);
        }

        match self.acks.cancel_all() {
            Ok(0) => {}
            Ok(count) => debug!("Cancelled {} pending acks for {}", count, self.id()),
            Err(e) => warn!("Failed to cancel pending acks for {}: {}", self.id(), e),
        }

        if let Err(e) = self.transport.close().await {
            debug!("Failed to close transport for {}: {}", self.id(), e);
        }
    }

    fn set_namespace(&self, nsp: &str) {
        let mut namespace = self
            .namespace
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *namespace = nsp.to_string();
    }

    fn as_member(&self) -> Result<Arc<dyn RoomMember>> {
        let socket: Arc<Socket> = self
            .self_ref
            .upgrade()
            .ok_or(SocketIoError::ConnectionClosed)?;
        Ok(socket)
    }
}

#[async_trait]
impl RoomMember for Socket {
    fn id(&self) -> &str {
        Socket::id(self)
    }

    async fn emit(&self, event: &str, args: Vec<Value>) -> Result<()> {
        Socket::emit(self, event, args).await
    }
}

fn event_data(event: &str, args: Vec<Value>) -> Vec<Value> {
    let mut data = Vec::with_capacity(args.len() + 1);
    data.push(Value::String(event.to_string()));
    data.extend(args);
    data
}
