//! Rusty Socket.IO - a Socket.IO-style protocol engine implemented in Rust
//!
//! This library provides the per-connection packet protocol loop
//! (handshake, dispatch, acknowledgements, teardown) and a pluggable
//! broadcast adaptor that tracks room membership across connections.

pub mod adaptor;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;

// Re-export main components
pub use config::*;
pub use constants::*;
