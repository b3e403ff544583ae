//! Types shared between the pong server and its clients.
//!
//! Everything in here crosses the wire, so TypeScript bindings are exported
//! for the web client alongside the serde derives.

pub mod config;
pub mod protocol;
pub mod vec2;
