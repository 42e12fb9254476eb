use std::error::Error;
use std::fmt;
use std::sync::PoisonError;

#[derive(Debug)]
pub enum SocketIoError {
    // Connection errors
    ConnectionClosed,
    ConnectionError(String),
    ConnectionLimitReached(usize),

    // Wire errors
    DecodeError(String),
    EncodeError(String),
    UnknownPacketType(u8),

    // Dispatch errors
    HandlerError(String),
    AckCancelled(i64),

    // Room errors
    AdaptorError(String),

    // System errors
    SessionLock(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for SocketIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            Self::ConnectionLimitReached(max) => {
                write!(f, "Connection limit reached: {} connections", max)
            }
            Self::DecodeError(msg) => write!(f, "Packet decode error: {}", msg),
            Self::EncodeError(msg) => write!(f, "Packet encode error: {}", msg),
            Self::UnknownPacketType(value) => write!(f, "Unknown packet type: {}", value),
            Self::HandlerError(msg) => write!(f, "Handler error: {}", msg),
            Self::AckCancelled(id) => write!(f, "Acknowledgement {} cancelled", id),
            Self::AdaptorError(msg) => write!(f, "Broadcast adaptor error: {}", msg),
            Self::SessionLock(msg) => write!(f, "Session lock error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for SocketIoError {}

// Converting from PoisonError to facilitate poisoned mutex handling
impl<T> From<PoisonError<T>> for SocketIoError {
    fn from(err: PoisonError<T>) -> Self {
        SocketIoError::SessionLock(format!("Mutex poisoned: {}", err))
    }
}

// Generic result type for the socket.io engine
pub type Result<T> = std::result::Result<T, SocketIoError>;
