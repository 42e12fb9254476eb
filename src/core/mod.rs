//! Core functionality for the socket.io server

pub mod ack;
pub mod codec;
pub mod handler;
pub mod packet;
pub mod server;
pub mod socket;
pub mod transport;

// Re-export main components for convenience
pub use ack::{AckCorrelator, PendingAck};
pub use codec::{decode_packet, encode_packet};
pub use handler::{EventRouter, PacketHandler};
pub use packet::{Packet, PacketType, NO_ACK_ID};
pub use server::{Server, ServerBuilder, SharedServer};
pub use socket::Socket;
pub use transport::{memory_pair, MemoryPeer, MemoryTransport, PacketLogLayer, Transport, TransportLayer};
