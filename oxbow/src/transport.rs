use std::time::Duration;

use tracing::warn;

use crate::{
    client::ClientSocket,
    config::{TransportConfig, MAX_CLIENTS},
    engine::{ClientEngine, ServerEngine},
    events::TransportEvent,
    packet::CHANNEL_COUNT,
    server::ServerSocket,
    socket::Socket,
    state::{ConnectionState, RemoteState},
    ConnectionId,
};

/// Both endpoint roles behind one host-driven surface.
///
/// The host scheduler calls [`iterate_incoming`](Self::iterate_incoming) and
/// [`iterate_outgoing`](Self::iterate_outgoing) once per tick for each active
/// role and drains [`poll_event`](Self::poll_event) in between. Running both
/// roles at once in the same process is supported.
///
/// Dropping the transport stops both roles, blocking until the engines have
/// unwound.
pub struct Transport {
    pub(crate) config: TransportConfig,
    pub(crate) server: ServerSocket,
    pub(crate) client: ClientSocket,
    channel_count: u8,
}

impl Transport {
    /// Builds a transport from its configuration and an engine for each
    /// role.
    pub fn new(
        config: TransportConfig,
        server_engine: Box<dyn ServerEngine>,
        client_engine: Box<dyn ClientEngine>,
    ) -> Self {
        Self {
            config,
            server: ServerSocket::new(server_engine),
            client: ClientSocket::new(client_engine),
            channel_count: CHANNEL_COUNT,
        }
    }

    /// Starts the server or client role. False if that role is not Stopped
    /// or its engine refused to come up.
    pub fn start_connection(&mut self, as_server: bool) -> bool {
        if as_server {
            self.server.start(&self.config)
        } else {
            self.client.start(&self.config)
        }
    }

    /// Stops the server or client role, blocking until its engine unwinds.
    /// False if that role is already Stopped or Stopping.
    pub fn stop_connection(&mut self, as_server: bool) -> bool {
        if as_server {
            self.server.stop()
        } else {
            self.client.stop()
        }
    }

    /// Disconnects remote client `id` from the server. Deferred disconnects
    /// flush already-queued packets to `id` before closing; immediate ones
    /// close before returning.
    pub fn disconnect(&mut self, id: ConnectionId, immediate: bool) -> bool {
        self.server.disconnect(id, immediate)
    }

    /// Stops the client role, then the server role.
    pub fn shutdown(&mut self) {
        self.stop_connection(false);
        self.stop_connection(true);
    }

    /// Queues `payload` for the server on `channel`.
    pub fn send_to_server(&mut self, channel: u8, payload: &[u8]) {
        let channel = self.sanitize_channel(channel);
        self.client.send(channel, payload, crate::BROADCAST_ID);
    }

    /// Queues `payload` for client `id` on `channel`, or for every admitted
    /// client if `id` is [`BROADCAST_ID`](crate::BROADCAST_ID).
    pub fn send_to_client(&mut self, channel: u8, payload: &[u8], id: ConnectionId) {
        let channel = self.sanitize_channel(channel);
        self.server.send(channel, payload, id);
    }

    /// Drains engine events and inbound data for one role.
    pub fn iterate_incoming(&mut self, as_server: bool) {
        if as_server {
            self.server.iterate_incoming();
        } else {
            self.client.iterate_incoming();
        }
    }

    /// Flushes queued outbound data for one role.
    pub fn iterate_outgoing(&mut self, as_server: bool) {
        if as_server {
            self.server.iterate_outgoing();
        } else {
            self.client.iterate_outgoing();
        }
    }

    /// Pops the next queued event, draining the client role before the
    /// server role.
    pub fn poll_event(&mut self) -> Option<TransportEvent> {
        self.client.poll_event().or_else(|| self.server.poll_event())
    }

    /// Lifecycle state of one role.
    pub fn connection_state(&self, as_server: bool) -> ConnectionState {
        if as_server {
            self.server.state()
        } else {
            self.client.state()
        }
    }

    /// Connection state of remote client `id` on the server.
    pub fn remote_state(&self, id: ConnectionId) -> RemoteState {
        self.server.remote_state(id)
    }

    /// Resolved address of remote client `id`; empty if unknown.
    pub fn connection_address(&self, id: ConnectionId) -> String {
        self.server.connection_address(id)
    }

    /// Number of clients currently admitted by the server role.
    pub fn client_count(&self) -> usize {
        self.server.client_count()
    }

    /// Number of channels sends and receives are multiplexed over.
    pub fn channel_count(&self) -> u8 {
        self.channel_count
    }

    /// Largest payload to hand to [`send_to_server`](Self::send_to_server)
    /// or [`send_to_client`](Self::send_to_client) on `channel`.
    pub fn mtu(&self, _channel: u8) -> u16 {
        self.config.mtu
    }

    /// Inactivity timeout for one role. Liveness detection belongs to the
    /// engine, so no timeout is reported here.
    pub fn timeout(&self, _as_server: bool) -> Option<Duration> {
        None
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Sets the port used by the next start of either role.
    pub fn set_port(&mut self, port: u16) {
        self.config.port = port;
    }

    /// Address the client role connects to.
    pub fn client_address(&self) -> &str {
        &self.config.address
    }

    /// Sets the address used by the next client start.
    pub fn set_client_address(&mut self, address: impl Into<String>) {
        self.config.address = address.into();
    }

    /// Configured client limit.
    pub fn max_clients(&self) -> u16 {
        self.config.max_clients
    }

    /// Sets the client limit used by the next server start. Ignored with a
    /// warning while the server is running, since shrinking the limit under
    /// live connections has no sane meaning.
    pub fn set_max_clients(&mut self, value: u16) {
        if self.server.state() != ConnectionState::Stopped {
            warn!("cannot change max clients while the server is running");
            return;
        }
        self.config.max_clients = value.clamp(1, MAX_CLIENTS);
    }

    /// Sets whether the next start of either role uses TLS.
    pub fn set_tls(&mut self, tls: bool) {
        self.config.tls = tls;
    }

    /// Coerces out-of-range channels to reliable so a malformed channel can
    /// never silently drop a send.
    fn sanitize_channel(&self, channel: u8) -> u8 {
        if channel >= self.channel_count {
            warn!(channel, "channel out of range, defaulting to reliable");
            return 0;
        }
        channel
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
