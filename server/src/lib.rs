//! Pong server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod config;
pub mod error;
pub mod match_state;
pub mod physics;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod simulation;
pub mod ticker;
pub mod ws;
