// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const WS_PATH: &str = "ws";
pub const HEALTH_PATH: &str = "health";

// Connection limits
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

// Reserved event names
pub const CONNECTION_EVENT: &str = "connection";
pub const DISCONNECT_EVENT: &str = "disconnect";
