//! Morris Net - Networked play over a relay
//!
//! This crate provides the turn-sync layer between two peers:
//! - Closed relay wire protocol (JSON `{type, payload}` frames)
//! - Network session state machine (pure, no I/O)
//! - Async transport over TCP or an in-process relay
//! - Relay client with keepalive and host reconnect
//! - Cancellable computer thinking delay

pub mod client;
pub mod config;
pub mod error;
pub mod pacing;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod transport;

pub use client::NetClient;
pub use config::NetConfig;
pub use error::NetError;
pub use pacing::{CancelToken, ThinkingDelay};
pub use protocol::RelayMessage;
pub use relay::LocalRelay;
pub use session::{ConnectionState, NetworkSession, Role, SessionEvent};
pub use transport::{Connection, Endpoint};
