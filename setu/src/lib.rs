//! Setu - remote-control bridge for a real-time simulation/render loop
//!
//! A single TCP client drives the simulation through a fixed binary command
//! protocol: it injects poses and mocap targets, selects cameras, pulls
//! rendered frames and triggers snapshots or raw video capture. The host
//! render loop calls [`RemoteServer::tick`] once per frame; all protocol work
//! happens inside that call.
//!
//! ## Modules
//!
//! - [`server`]: listener, session lifecycle, the per-frame tick
//! - [`dispatcher`]: per-tick command drain and handlers
//! - [`protocol`]: wire codec, command table, frame buffer
//! - [`liveness`]: non-blocking disconnect detection
//! - [`bridge`]: the only path into the engine
//! - [`capture`]: offscreen render, PNG snapshots, raw video
//! - [`engine`]: traits the physics/rendering engine implements
//! - [`sim`]: mock engine for hardware-free runs and tests

pub mod bridge;
pub mod capture;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod host;
pub mod liveness;
pub mod protocol;
pub mod server;
pub mod session;
pub mod sim;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use engine::{Engine, Renderer, Simulation};
pub use error::{Error, Result};
pub use protocol::{CommandId, ControllerState, Handshake, SaveDecision};
pub use server::{RemoteServer, TickReport};
pub use sim::MockEngine;
