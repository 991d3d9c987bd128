use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::{
    config::TransportConfig,
    engine::{EventSink, ServerEngine},
    events::TransportEvent,
    packet::{detach_channel, Channel},
    socket::{Common, Side, Socket},
    state::{ConnectionState, RemoteState},
    ConnectionId, BROADCAST_ID,
};

/// Record of one admitted client.
#[derive(Debug)]
struct ClientRecord {
    /// Resolved address, captured at admission; the engine may forget it
    /// before the application asks.
    address: String,
}

/// Server-role endpoint: many remote clients over one engine listener.
///
/// All methods are driven from the host thread. The engine's worker threads
/// only ever touch the [`EventSink`], whose contents are folded in during
/// [`iterate_incoming`](Socket::iterate_incoming). Dropping a started socket
/// stops it first.
pub struct ServerSocket {
    common: Common,
    engine: Box<dyn ServerEngine>,
    sink: EventSink,
    clients: FxHashMap<ConnectionId, ClientRecord>,
    /// Deferred disconnects staged this tick; promoted at the end of the
    /// next outgoing pass.
    disconnect_next: Vec<ConnectionId>,
    /// Deferred disconnects whose flush tick has passed; executed at the end
    /// of this outgoing pass.
    disconnect_now: Vec<ConnectionId>,
    max_clients: usize,
}

impl ServerSocket {
    /// Creates a stopped server endpoint fronting `engine`.
    pub fn new(engine: Box<dyn ServerEngine>) -> Self {
        Self {
            common: Common::new(Side::Server),
            engine,
            sink: EventSink::new(),
            clients: FxHashMap::default(),
            disconnect_next: Vec::new(),
            disconnect_now: Vec::new(),
            max_clients: 0,
        }
    }

    /// Connection state of remote client `id`.
    pub fn remote_state(&self, id: ConnectionId) -> RemoteState {
        if self.clients.contains_key(&id) {
            RemoteState::Started
        } else {
            RemoteState::Stopped
        }
    }

    /// Resolved address of remote client `id`; empty if unknown.
    pub fn connection_address(&self, id: ConnectionId) -> String {
        self.clients
            .get(&id)
            .map(|client| client.address.clone())
            .unwrap_or_default()
    }

    /// Number of currently admitted clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Client limit in force for the running session. Zero until the first
    /// start.
    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Disconnects remote client `id`. Returns false unless the server is
    /// Started.
    ///
    /// With `immediate` the connection is closed before this call returns.
    /// Otherwise the close is staged so packets already queued for `id` are
    /// flushed first, which costs one extra outgoing pass.
    pub fn disconnect(&mut self, id: ConnectionId, immediate: bool) -> bool {
        if self.common.state() != ConnectionState::Started {
            return false;
        }
        if immediate {
            self.remove_client(id);
        } else {
            trace!(id, "staging deferred disconnect");
            self.disconnect_next.push(id);
        }
        true
    }

    /// Removal path shared by kicks, engine disconnects and engine errors.
    ///
    /// Idempotent: ids without a record are ignored, so racing disconnect
    /// sources cannot double-emit or double-close.
    fn remove_client(&mut self, id: ConnectionId) {
        if self.clients.remove(&id).is_none() {
            trace!(id, "disconnect for unknown client ignored");
            return;
        }
        self.engine.close_one(id);
        debug!(id, "client disconnected");
        self.common.push_event(TransportEvent::RemoteClientState {
            id,
            state: RemoteState::Stopped,
        });
    }

    /// Admission control. Connections beyond the configured limit are closed
    /// at the engine and never surfaced to the application.
    fn admit(&mut self, id: ConnectionId) {
        if self.clients.len() >= self.max_clients {
            debug!(id, max_clients = self.max_clients, "rejecting client over capacity");
            self.engine.close_one(id);
            return;
        }
        let address = self.engine.address_of(id).unwrap_or_default();
        debug!(id, %address, "client connected");
        self.clients.insert(id, ClientRecord { address });
        self.common.push_event(TransportEvent::RemoteClientState {
            id,
            state: RemoteState::Started,
        });
    }

    fn drain_remote_events(&mut self) {
        while let Some(event) = self.sink.next_remote_event() {
            if event.connected {
                self.admit(event.id);
            } else {
                self.remove_client(event.id);
            }
        }
    }

    fn drain_received(&mut self) {
        while let Some((id, mut frame)) = self.sink.next_received() {
            if !self.clients.contains_key(&id) {
                // Data can only originate from a connection the engine has
                // already accepted, so its connect event may still be sitting
                // in the remote queue. Give it one chance to drain before
                // treating the frame as an orphan.
                self.drain_remote_events();
            }
            if !self.clients.contains_key(&id) {
                trace!(id, "dropping data from unadmitted client");
                continue;
            }
            if frame.is_empty() {
                warn!(id, "discarding empty frame");
                continue;
            }
            let tag = detach_channel(&mut frame);
            self.common.push_event(TransportEvent::ServerData {
                id,
                channel: Channel::from_tag_lossy(tag),
                payload: frame,
            });
        }
    }

    fn dequeue_outgoing(&mut self) {
        if self.common.state() != ConnectionState::Started {
            self.common.clear_outgoing();
            return;
        }
        let backlog = self.common.take_outgoing();
        if backlog.is_empty() {
            return;
        }
        let ids: Vec<ConnectionId> = self.clients.keys().copied().collect();
        for packet in backlog {
            let recipient = packet.recipient;
            let frame = packet.into_frame();
            if recipient == BROADCAST_ID {
                self.engine.send_all(&ids, &frame);
            } else {
                self.engine.send_one(recipient, &frame);
            }
        }
    }

    /// Executes the disconnects whose flush tick has passed, then promotes
    /// the batch staged this tick. Runs after the send pass, so everything
    /// queued for a leaving client has already been handed to the engine.
    fn dequeue_disconnects(&mut self) {
        if !self.disconnect_now.is_empty() {
            let batch = std::mem::take(&mut self.disconnect_now);
            for id in batch {
                self.remove_client(id);
            }
        }
        if !self.disconnect_next.is_empty() {
            self.disconnect_now.append(&mut self.disconnect_next);
        }
    }

    /// Clears all per-session state and hands out a fresh sink, so a
    /// lingering engine thread from the previous session cannot write into
    /// the new one's queues.
    fn reset_session(&mut self) {
        self.clients.clear();
        self.common.clear_outgoing();
        self.disconnect_next.clear();
        self.disconnect_now.clear();
        self.sink = EventSink::new();
    }

    #[cfg(test)]
    pub(crate) fn queued_outgoing(&self) -> usize {
        self.common.queued_outgoing()
    }
}

impl Socket for ServerSocket {
    fn start(&mut self, config: &TransportConfig) -> bool {
        if self.common.state() != ConnectionState::Stopped {
            return false;
        }
        self.common.transition(ConnectionState::Starting);
        self.max_clients = usize::from(config.max_clients);
        self.reset_session();
        debug!(port = config.port, max_clients = self.max_clients, "server starting");
        if let Err(error) = self.engine.start(config.port, config.tls, self.sink.clone()) {
            warn!(%error, "server engine failed to start");
            self.sink = EventSink::new();
            self.common.transition(ConnectionState::Stopped);
            return false;
        }
        self.common.transition(ConnectionState::Started);
        true
    }

    fn stop(&mut self) -> bool {
        let state = self.common.state();
        if state == ConnectionState::Stopped || state == ConnectionState::Stopping {
            return false;
        }
        self.reset_session();
        self.common.transition(ConnectionState::Stopping);
        debug!("server stopping");
        self.engine.stop();
        self.common.transition(ConnectionState::Stopped);
        true
    }

    fn send(&mut self, channel: u8, payload: &[u8], recipient: ConnectionId) {
        self.common.enqueue(channel, payload, recipient);
    }

    fn iterate_incoming(&mut self) {
        self.drain_remote_events();
        self.engine.process_queued();
        // Engines that hand connects over during process_queued still get
        // them surfaced ahead of the data that followed.
        self.drain_remote_events();
        self.drain_received();
    }

    fn iterate_outgoing(&mut self) {
        self.dequeue_outgoing();
        self.dequeue_disconnects();
    }

    fn state(&self) -> ConnectionState {
        self.common.state()
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.common.poll_event()
    }
}

impl Drop for ServerSocket {
    fn drop(&mut self) {
        self.stop();
    }
}
