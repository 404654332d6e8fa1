#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Mafia Server
//!
//! Authoritative server core for real-time multiplayer Mafia.
//!
//! Owns room membership, role assignment, phase progression, night/day
//! resolution, voting, win detection, reconnection, and the voice-routing
//! permissions derived from game state. Speaks a JSON envelope protocol
//! over one WebSocket per player and mediates an external SFU through a
//! narrow signaling seam.

/// Server configuration loaded from the environment
pub mod config;

/// Game runtime: roles, phases, night/day resolution, timers
pub mod game;

/// Connection registry and per-room fan-out
pub mod hub;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// Wire protocol: envelope codec, messages, error codes
pub mod protocol;

/// Room model and thread-safe registry
pub mod room;

/// Server state, message router, and handlers
pub mod server;

/// Voice routing derivation and SFU signaling seam
pub mod voice;

/// WebSocket connection handling
pub mod websocket;
