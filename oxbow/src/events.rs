use bytes::BytesMut;

use crate::{
    packet::Channel,
    state::{ConnectionState, RemoteState},
    ConnectionId,
};

/// Application-facing notification, drained through
/// [`Transport::poll_event`](crate::Transport::poll_event).
///
/// Events are queued in the order the underlying changes were observed and
/// are only ever produced from the host's own iterate calls, never from an
/// engine thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The local client's lifecycle state changed.
    ClientState(ConnectionState),
    /// The local server's lifecycle state changed.
    ServerState(ConnectionState),
    /// A remote client connected to or disconnected from the local server.
    RemoteClientState {
        /// Engine-assigned id of the remote client.
        id: ConnectionId,
        /// New state of that client.
        state: RemoteState,
    },
    /// A message arrived on the client.
    ClientData {
        /// Channel the sender tagged the message with.
        channel: Channel,
        /// Payload with the channel tag already removed.
        payload: BytesMut,
    },
    /// A message arrived on the server.
    ServerData {
        /// Id of the sending client.
        id: ConnectionId,
        /// Channel the sender tagged the message with.
        channel: Channel,
        /// Payload with the channel tag already removed.
        payload: BytesMut,
    },
}
