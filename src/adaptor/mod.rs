//! Broadcast adaptors owning room membership and fan-out delivery

pub mod memory;
pub mod traits;

// Re-export the adaptor interface and the default backend
pub use memory::MemoryAdaptor;
pub use traits::{BroadcastAdaptor, RoomMember};
