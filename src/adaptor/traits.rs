//! Abstract broadcast interfaces for pluggable room backends
//!
//! Callers only ever see `BroadcastAdaptor`, so the in-memory registry can be
//! swapped for a shared/distributed one when the server is built.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Something that can sit in a room and receive broadcast events
#[async_trait]
pub trait RoomMember: Send + Sync {
    /// Identity used as the membership key
    fn id(&self) -> &str;

    /// Deliver one event to this member
    async fn emit(&self, event: &str, args: Vec<Value>) -> Result<()>;
}

/// Room registry with fan-out delivery
#[async_trait]
pub trait BroadcastAdaptor: Send + Sync {
    /// Add a member to a room, creating the room if needed. Joining twice is a no-op.
    async fn join(&self, room: &str, member: Arc<dyn RoomMember>) -> Result<()>;

    /// Remove a member from a room. Unknown rooms or members are ignored.
    async fn leave(&self, room: &str, member_id: &str) -> Result<()>;

    /// Deliver an event to every member of `room` except `exclude`
    async fn send(
        &self,
        exclude: Option<&str>,
        room: &str,
        event: &str,
        args: &[Value],
    ) -> Result<()>;

    /// Number of members currently in `room`
    async fn member_count(&self, room: &str) -> Result<usize>;

    /// Names of every non-empty room
    async fn rooms(&self) -> Result<Vec<String>>;
}
