//! In-memory broadcast adaptor
//!
//! Keeps the whole room registry in a single process. Members are held
//! weakly: the registry never keeps a connection alive and never closes one.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::RwLock;

use super::traits::{BroadcastAdaptor, RoomMember};
use crate::error::Result;

type Members = HashMap<String, Weak<dyn RoomMember>>;

/// Room name -> member id -> member
pub struct MemoryAdaptor {
    rooms: RwLock<HashMap<String, Members>>,
}

impl MemoryAdaptor {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Create the default adaptor behind the shared trait object
    pub fn shared() -> Arc<dyn BroadcastAdaptor> {
        Arc::new(Self::new())
    }

    /// Drop members whose connection is gone and rooms left empty
    async fn prune(&self) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|room, members| {
            members.retain(|_, member| member.strong_count() > 0);
            if members.is_empty() {
                debug!("Removing room {} with no live members", room);
            }
            !members.is_empty()
        });
    }
}

impl Default for MemoryAdaptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastAdaptor for MemoryAdaptor {
    async fn join(&self, room: &str, member: Arc<dyn RoomMember>) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_default()
            .insert(member.id().to_string(), Arc::downgrade(&member));
        Ok(())
    }

    async fn leave(&self, room: &str, member_id: &str) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            members.remove(member_id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        exclude: Option<&str>,
        room: &str,
        event: &str,
        args: &[Value],
    ) -> Result<()> {
        let mut saw_dropped = false;
        {
            // Held for the whole fan-out so membership cannot change mid-iteration
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.get(room) else {
                return Ok(());
            };

            for (member_id, member) in members {
                let Some(member) = member.upgrade() else {
                    debug!("Skipping dropped member {} of room {}", member_id, room);
                    saw_dropped = true;
                    continue;
                };
                if exclude == Some(member_id.as_str()) {
                    continue;
                }
                if let Err(e) = member.emit(event, args.to_vec()).await {
                    warn!(
                        "Failed to deliver '{}' to {} in room {}: {}",
                        event, member_id, room, e
                    );
                }
            }
        }

        if saw_dropped {
            self.prune().await;
        }
        Ok(())
    }

    async fn member_count(&self, room: &str) -> Result<usize> {
        self.prune().await;
        Ok(self.rooms.read().await.get(room).map_or(0, HashMap::len))
    }

    async fn rooms(&self) -> Result<Vec<String>> {
        self.prune().await;
        Ok(self.rooms.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SocketIoError;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingMember {
        id: String,
        received: Mutex<Vec<(String, Vec<Value>)>>,
        fail: bool,
    }

    impl RecordingMember {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                received: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                received: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn events(&self) -> Vec<String> {
            self.received
                .lock()
                .unwrap()
                .iter()
                .map(|(event, _)| event.clone())
                .collect()
        }
    }

    #[async_trait]
    impl RoomMember for RecordingMember {
        fn id(&self) -> &str {
            &self.id
        }

        async fn emit(&self, event: &str, args: Vec<Value>) -> Result<()> {
            if self.fail {
                return Err(SocketIoError::ConnectionClosed);
            }
            self.received
                .lock()
                .unwrap()
                .push((event.to_string(), args));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let adaptor = MemoryAdaptor::new();
        let member = RecordingMember::new("a");

        adaptor.join("lobby", member.clone()).await.unwrap();
        adaptor.join("lobby", member.clone()).await.unwrap();
        assert_eq!(adaptor.member_count("lobby").await.unwrap(), 1);

        adaptor.send(None, "lobby", "chat", &[json!("hi")]).await.unwrap();
        assert_eq!(member.events(), vec!["chat".to_string()]);
    }

    #[tokio::test]
    async fn test_leave_non_member_is_noop() {
        let adaptor = MemoryAdaptor::new();
        assert!(adaptor.leave("nowhere", "ghost").await.is_ok());

        let member = RecordingMember::new("a");
        adaptor.join("lobby", member.clone()).await.unwrap();
        assert!(adaptor.leave("lobby", "ghost").await.is_ok());
        assert_eq!(adaptor.member_count("lobby").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_leave_removes_room() {
        let adaptor = MemoryAdaptor::new();
        let member = RecordingMember::new("a");

        adaptor.join("lobby", member.clone()).await.unwrap();
        adaptor.leave("lobby", "a").await.unwrap();

        assert!(adaptor.rooms().await.unwrap().is_empty());
        assert!(adaptor.send(None, "lobby", "chat", &[]).await.is_ok());
        assert!(member.events().is_empty());
    }

    #[tokio::test]
    async fn test_send_excludes_sender() {
        let adaptor = MemoryAdaptor::new();
        let (c1, c2, c3) = (
            RecordingMember::new("c1"),
            RecordingMember::new("c2"),
            RecordingMember::new("c3"),
        );
        for member in [&c1, &c2, &c3] {
            adaptor.join("room", member.clone()).await.unwrap();
        }

        adaptor
            .send(Some("c1"), "room", "e", &[json!(1)])
            .await
            .unwrap();

        assert!(c1.events().is_empty());
        assert_eq!(c2.events(), vec!["e".to_string()]);
        assert_eq!(c3.events(), vec!["e".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_member_does_not_block_others() {
        let adaptor = MemoryAdaptor::new();
        let broken = RecordingMember::failing("broken");
        let healthy = RecordingMember::new("healthy");
        adaptor.join("room", broken.clone()).await.unwrap();
        adaptor.join("room", healthy.clone()).await.unwrap();

        assert!(adaptor.send(None, "room", "e", &[]).await.is_ok());
        assert_eq!(healthy.events(), vec!["e".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_member_is_skipped() {
        let adaptor = MemoryAdaptor::new();
        let survivor = RecordingMember::new("survivor");
        {
            let gone = RecordingMember::new("gone");
            adaptor.join("room", gone).await.unwrap();
        }
        adaptor.join("room", survivor.clone()).await.unwrap();

        assert!(adaptor.send(None, "room", "e", &[]).await.is_ok());
        assert_eq!(survivor.events(), vec!["e".to_string()]);
        assert_eq!(adaptor.member_count("room").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_room_of_dropped_members_disappears() {
        let adaptor = MemoryAdaptor::new();
        {
            let gone = RecordingMember::new("gone");
            adaptor.join("lobby", gone).await.unwrap();
        }

        assert_eq!(adaptor.member_count("lobby").await.unwrap(), 0);
        assert!(adaptor.rooms().await.unwrap().is_empty());
        assert!(adaptor.send(None, "lobby", "chat", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_join_leave_operations() {
        let adaptor = Arc::new(MemoryAdaptor::new());
        let mut handles = Vec::new();

        for i in 0..20 {
            let adaptor = adaptor.clone();
            handles.push(tokio::spawn(async move {
                let member = RecordingMember::new(&format!("user{}", i));
                adaptor.join("busy", member.clone()).await.unwrap();
                adaptor.send(None, "busy", "tick", &[]).await.unwrap();
                adaptor.leave("busy", member.id()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(adaptor.member_count("busy").await.unwrap(), 0);
        assert!(adaptor.rooms().await.unwrap().is_empty());
    }
}
