use std::collections::VecDeque;
use std::mem;
use std::sync::Mutex;

use tracing::trace;

use crate::{
    config::TransportConfig,
    events::TransportEvent,
    packet::Packet,
    state::{ConnectionState, StateMachine},
    ConnectionId,
};

/// Which role an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Client,
    Server,
}

/// Lifecycle contract both endpoint roles implement.
///
/// The transport owns one endpoint per role and drives whichever ones are
/// active from the host's tick: [`iterate_incoming`](Self::iterate_incoming)
/// before the host consumes events, [`iterate_outgoing`](Self::iterate_outgoing)
/// after it has queued its sends.
pub trait Socket {
    /// Starts the endpoint using `config`. Returns false and does nothing
    /// unless the endpoint is currently Stopped.
    fn start(&mut self, config: &TransportConfig) -> bool;

    /// Stops the endpoint, blocking until its engine has unwound. Returns
    /// false if it is already Stopped or Stopping.
    fn stop(&mut self) -> bool;

    /// Queues `payload` on `channel`. Dropped unless the endpoint is
    /// Started. `recipient` is ignored by the client role.
    fn send(&mut self, channel: u8, payload: &[u8], recipient: ConnectionId);

    /// Drains engine connection events and inbound data into the event
    /// queue.
    fn iterate_incoming(&mut self);

    /// Flushes queued outbound packets to the engine.
    fn iterate_outgoing(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Pops the next queued application-facing event.
    fn poll_event(&mut self) -> Option<TransportEvent>;
}

/// State shared by both endpoint roles: the transition guard, the outbound
/// packet queue and the event queue the application drains.
#[derive(Debug)]
pub(crate) struct Common {
    side: Side,
    state: StateMachine,
    outgoing: Mutex<VecDeque<Packet>>,
    events: VecDeque<TransportEvent>,
}

impl Common {
    pub(crate) fn new(side: Side) -> Self {
        Self {
            side,
            state: StateMachine::new(),
            outgoing: Mutex::new(VecDeque::new()),
            events: VecDeque::new(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Applies a state transition, queueing the notification only on real
    /// changes.
    pub(crate) fn transition(&mut self, next: ConnectionState) {
        if let Some(state) = self.state.set(next) {
            let event = match self.side {
                Side::Client => TransportEvent::ClientState(state),
                Side::Server => TransportEvent::ServerState(state),
            };
            self.events.push_back(event);
        }
    }

    /// State-gated enqueue. Nothing is ever queued toward a socket that is
    /// not confirmed live.
    pub(crate) fn enqueue(&self, channel: u8, payload: &[u8], recipient: ConnectionId) {
        if self.state.get() != ConnectionState::Started {
            trace!(side = ?self.side, "dropping send while not started");
            return;
        }
        self.outgoing
            .lock()
            .unwrap()
            .push_back(Packet::new(recipient, channel, payload));
    }

    /// Drops every queued packet and its buffer.
    pub(crate) fn clear_outgoing(&self) {
        self.outgoing.lock().unwrap().clear();
    }

    /// Takes the whole outbound backlog for one send pass, leaving the queue
    /// empty. The lock is not held while the backlog is walked.
    pub(crate) fn take_outgoing(&self) -> VecDeque<Packet> {
        mem::take(&mut *self.outgoing.lock().unwrap())
    }

    pub(crate) fn push_event(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    #[cfg(test)]
    pub(crate) fn queued_outgoing(&self) -> usize {
        self.outgoing.lock().unwrap().len()
    }
}
