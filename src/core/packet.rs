//! Wire-level packet envelope exchanged over a connection

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SocketIoError;

/// Id carried by packets that do not expect (or answer) an acknowledgement
pub const NO_ACK_ID: i64 = -1;

/// Packet types understood by the protocol loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PacketType {
    Connect,
    Disconnect,
    Event,
    Ack,
    BinaryEvent,
}

impl PacketType {
    /// Numeric value used on the wire
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Connect => 0,
            Self::Disconnect => 1,
            Self::Event => 2,
            Self::Ack => 3,
            Self::BinaryEvent => 5,
        }
    }

    /// Whether packets of this type may carry an ack correlation id
    pub fn carries_id(self) -> bool {
        matches!(self, Self::Event | Self::BinaryEvent | Self::Ack)
    }
}

impl TryFrom<u8> for PacketType {
    type Error = SocketIoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Connect),
            1 => Ok(Self::Disconnect),
            2 => Ok(Self::Event),
            3 => Ok(Self::Ack),
            5 => Ok(Self::BinaryEvent),
            other => Err(SocketIoError::UnknownPacketType(other)),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        packet_type.as_u8()
    }
}

/// A single protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "Type")]
    pub packet_type: PacketType,
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "NSP")]
    pub nsp: String,
    #[serde(rename = "Data", default)]
    pub data: Vec<Value>,
}

impl Packet {
    pub fn connect(nsp: impl Into<String>) -> Self {
        Self {
            packet_type: PacketType::Connect,
            id: NO_ACK_ID,
            nsp: nsp.into(),
            data: Vec::new(),
        }
    }

    pub fn disconnect(nsp: impl Into<String>) -> Self {
        Self {
            packet_type: PacketType::Disconnect,
            id: NO_ACK_ID,
            nsp: nsp.into(),
            data: Vec::new(),
        }
    }

    /// Fire-and-forget event
    pub fn event(nsp: impl Into<String>, data: Vec<Value>) -> Self {
        Self::event_with_id(NO_ACK_ID, nsp, data)
    }

    /// Event correlated with a later acknowledgement
    pub fn event_with_id(id: i64, nsp: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            packet_type: PacketType::Event,
            id,
            nsp: nsp.into(),
            data,
        }
    }

    pub fn ack(id: i64, nsp: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            packet_type: PacketType::Ack,
            id,
            nsp: nsp.into(),
            data,
        }
    }

    /// True for events whose sender waits for an ACK
    pub fn expects_ack(&self) -> bool {
        matches!(
            self.packet_type,
            PacketType::Event | PacketType::BinaryEvent
        ) && self.id >= 0
    }

    /// Event name, conventionally the first data element of an event
    pub fn event_name(&self) -> Option<&str> {
        match self.packet_type {
            PacketType::Event | PacketType::BinaryEvent => {
                self.data.first().and_then(Value::as_str)
            }
            _ => None,
        }
    }
}
