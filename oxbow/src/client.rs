use tracing::{debug, trace, warn};

use crate::{
    config::TransportConfig,
    engine::{ClientEngine, EventSink},
    events::TransportEvent,
    packet::{detach_channel, Channel},
    socket::{Common, Side, Socket},
    state::ConnectionState,
    ConnectionId, BROADCAST_ID,
};

/// Client-role endpoint: the single outbound connection to a server.
///
/// Starting only begins the connection attempt; the endpoint stays Starting
/// until the engine reports the handshake finished, then moves to Started
/// during the next incoming pass. Dropping a started socket stops it first.
pub struct ClientSocket {
    common: Common,
    engine: Box<dyn ClientEngine>,
    sink: EventSink,
}

impl ClientSocket {
    /// Creates a stopped client endpoint fronting `engine`.
    pub fn new(engine: Box<dyn ClientEngine>) -> Self {
        Self {
            common: Common::new(Side::Client),
            engine,
            sink: EventSink::new(),
        }
    }

    fn drain_remote_events(&mut self) {
        while let Some(event) = self.sink.next_remote_event() {
            if event.connected {
                debug!("connected to server");
                self.common.transition(ConnectionState::Started);
            } else {
                self.teardown();
            }
        }
    }

    /// Connection loss, engine errors and explicit stops all converge here.
    fn teardown(&mut self) {
        if self.common.state() == ConnectionState::Stopped {
            return;
        }
        self.common.clear_outgoing();
        // Events the engine queued before the stop die with the session
        // sink; nothing drained later can resurrect this endpoint.
        self.sink = EventSink::new();
        self.common.transition(ConnectionState::Stopping);
        self.engine.stop();
        self.common.transition(ConnectionState::Stopped);
        debug!("client stopped");
    }

    fn drain_received(&mut self) {
        while let Some((_, mut frame)) = self.sink.next_received() {
            if self.common.state() != ConnectionState::Started {
                // The connect event may still be queued; drain it before
                // deciding the frame is an orphan.
                self.drain_remote_events();
            }
            if self.common.state() != ConnectionState::Started {
                trace!("dropping data while not started");
                continue;
            }
            if frame.is_empty() {
                warn!("discarding empty frame");
                continue;
            }
            let tag = detach_channel(&mut frame);
            self.common.push_event(TransportEvent::ClientData {
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
        for packet in self.common.take_outgoing() {
            let frame = packet.into_frame();
            self.engine.send(&frame);
        }
    }

    #[cfg(test)]
    pub(crate) fn queued_outgoing(&self) -> usize {
        self.common.queued_outgoing()
    }
}

impl Socket for ClientSocket {
    fn start(&mut self, config: &TransportConfig) -> bool {
        if self.common.state() != ConnectionState::Stopped {
            return false;
        }
        self.common.transition(ConnectionState::Starting);
        self.common.clear_outgoing();
        self.sink = EventSink::new();
        debug!(
            address = %config.address,
            port = config.port,
            tls = config.tls,
            "client connecting"
        );
        if let Err(error) = self
            .engine
            .connect(&config.address, config.port, config.tls, self.sink.clone())
        {
            warn!(%error, "client engine failed to connect");
            self.sink = EventSink::new();
            self.common.transition(ConnectionState::Stopped);
            return false;
        }
        true
    }

    fn stop(&mut self) -> bool {
        let state = self.common.state();
        if state == ConnectionState::Stopped || state == ConnectionState::Stopping {
            return false;
        }
        self.teardown();
        true
    }

    fn send(&mut self, channel: u8, payload: &[u8], _recipient: ConnectionId) {
        // There is only one peer; the recipient id carries no meaning here.
        self.common.enqueue(channel, payload, BROADCAST_ID);
    }

    fn iterate_incoming(&mut self) {
        self.drain_remote_events();
        self.engine.process_queued();
        self.drain_remote_events();
        self.drain_received();
    }

    fn iterate_outgoing(&mut self) {
        self.dequeue_outgoing();
    }

    fn state(&self) -> ConnectionState {
        self.common.state()
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.common.poll_event()
    }
}

impl Drop for ClientSocket {
    fn drop(&mut self) {
        self.stop();
    }
}
