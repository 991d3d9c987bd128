//! Channel-multiplexed message transport over pluggable socket engines.
//!
//! Oxbow sits between a tick-driven host (typically a game loop) and a
//! stream-oriented socket library, and multiplexes two logical channels over
//! each connection by appending a one-byte tag to every frame. It owns no
//! I/O: each role is backed by a [`ServerEngine`](engine::ServerEngine) or
//! [`ClientEngine`](engine::ClientEngine) supplied by the application, which
//! keeps the core deterministic and testable.
//!
//! The host drives everything through [`Transport`]: start a role, call
//! [`iterate_incoming`](Transport::iterate_incoming) and
//! [`iterate_outgoing`](Transport::iterate_outgoing) once per tick, and drain
//! [`poll_event`](Transport::poll_event) for connection changes and received
//! data. Engine threads never call back into application code; everything
//! they report is queued and folded in on the next tick.

#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![warn(clippy::use_self)]

mod client;
mod config;
pub mod engine;
mod events;
mod packet;
mod server;
mod socket;
mod state;
mod transport;

pub use crate::client::ClientSocket;
pub use crate::config::{TransportConfig, MAX_CLIENTS, MAX_MTU, MIN_MTU};
pub use crate::events::TransportEvent;
pub use crate::packet::{Channel, CHANNEL_COUNT};
pub use crate::server::ServerSocket;
pub use crate::socket::Socket;
pub use crate::state::{ConnectionState, RemoteState};
pub use crate::transport::Transport;

/// Identifier an engine assigns to one remote client connection.
pub type ConnectionId = i32;

/// Recipient id addressing every admitted client at once.
pub const BROADCAST_ID: ConnectionId = -1;
