//! Abstraction over the socket implementations the transport drives.
//!
//! The transport owns no I/O of its own. Each role is backed by an engine the
//! application supplies at construction, typically wrapping a websocket or
//! TCP library plus its worker thread. Engines report back through the
//! [`EventSink`] handed to them on start, which is safe to invoke from any
//! thread; everything queued there is surfaced on the host's next iterate
//! call.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use thiserror::Error;
use tracing::{trace, warn};

use crate::ConnectionId;

/// Failures an engine can report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Underlying socket or listener I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// TLS negotiation failure.
    #[error("tls failure: {0}")]
    Tls(String),
    /// Anything the other variants do not cover.
    #[error("{0}")]
    Other(String),
}

/// Connect or disconnect hand-off, one per engine callback, drained in FIFO
/// order so observers see changes in the order the engine raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RemoteConnectionEvent {
    pub(crate) connected: bool,
    pub(crate) id: ConnectionId,
}

/// Thread-safe hand-off engines deliver events through.
///
/// Cheap to clone; every clone feeds the same queues. Connection events and
/// received data are locked independently, so a connect notification is never
/// blocked behind a large data backlog. Endpoints hand out a fresh sink on
/// every start and discard the old one at teardown, so deliveries from a
/// lingering engine thread land in orphaned queues instead of a past or
/// future session.
#[derive(Debug, Clone)]
pub struct EventSink {
    shared: Arc<SinkShared>,
}

#[derive(Debug, Default)]
struct SinkShared {
    remote: Mutex<VecDeque<RemoteConnectionEvent>>,
    received: Mutex<VecDeque<(ConnectionId, BytesMut)>>,
}

impl EventSink {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(SinkShared::default()),
        }
    }

    /// The engine accepted a connection (server) or finished connecting
    /// (client).
    pub fn connected(&self, id: ConnectionId) {
        trace!(id, "engine raised connect");
        self.shared
            .remote
            .lock()
            .unwrap()
            .push_back(RemoteConnectionEvent { connected: true, id });
    }

    /// The engine observed a connection close.
    pub fn disconnected(&self, id: ConnectionId) {
        trace!(id, "engine raised disconnect");
        self.shared
            .remote
            .lock()
            .unwrap()
            .push_back(RemoteConnectionEvent {
                connected: false,
                id,
            });
    }

    /// The engine received one channel-tagged frame.
    pub fn data(&self, id: ConnectionId, frame: BytesMut) {
        self.shared.received.lock().unwrap().push_back((id, frame));
    }

    /// The engine hit a per-connection error. Logged, then folded into a
    /// disconnect so callers have a single teardown path.
    pub fn error(&self, id: ConnectionId, error: &EngineError) {
        warn!(id, %error, "engine error");
        self.disconnected(id);
    }

    pub(crate) fn next_remote_event(&self) -> Option<RemoteConnectionEvent> {
        self.shared.remote.lock().unwrap().pop_front()
    }

    pub(crate) fn next_received(&self) -> Option<(ConnectionId, BytesMut)> {
        self.shared.received.lock().unwrap().pop_front()
    }
}

/// Server-role socket engine: one listener fanning out to many clients.
///
/// The engine owns its worker threads. `connected`, `disconnected` and
/// `error` may be raised on the sink from any thread at any time after
/// [`start`](Self::start) returns; data may be raised the same way or held
/// until [`process_queued`](Self::process_queued). Engines must tolerate
/// [`close_one`](Self::close_one) for ids they no longer know and must
/// support being started again after [`stop`](Self::stop).
pub trait ServerEngine: Send {
    /// Binds `port` and begins accepting connections, reporting through
    /// `sink`. Immediate failures surface here; after `Ok` the listener is
    /// live.
    fn start(&mut self, port: u16, tls: bool, sink: EventSink) -> Result<(), EngineError>;

    /// Stops listening and closes every connection, blocking until the
    /// engine's worker threads have unwound.
    fn stop(&mut self);

    /// Queues `frame` for one client. Asynchronous send failures are
    /// reported through [`EventSink::error`], not here.
    fn send_one(&mut self, id: ConnectionId, frame: &[u8]);

    /// Queues `frame` for every id in `ids`.
    fn send_all(&mut self, ids: &[ConnectionId], frame: &[u8]);

    /// Closes one client's connection. Unknown ids are ignored.
    fn close_one(&mut self, id: ConnectionId);

    /// Delivers any inbound data the engine buffered since the last call to
    /// the sink it was started with.
    fn process_queued(&mut self);

    /// Resolved address of a connected client, if the engine still knows it.
    fn address_of(&self, id: ConnectionId) -> Option<String>;
}

/// Client-role socket engine: a single outbound connection.
///
/// Threading rules match [`ServerEngine`]. The id passed to
/// [`EventSink::data`] and friends is ignored for client engines; by
/// convention they pass `0`.
pub trait ClientEngine: Send {
    /// Begins connecting to `address:port`, reporting through `sink`. An
    /// `Err` here is an immediate configuration-level failure; connection
    /// progress and loss arrive through the sink.
    fn connect(
        &mut self,
        address: &str,
        port: u16,
        tls: bool,
        sink: EventSink,
    ) -> Result<(), EngineError>;

    /// Closes the connection, blocking until the engine's worker threads
    /// have unwound.
    fn stop(&mut self);

    /// Queues `frame` for the server.
    fn send(&mut self, frame: &[u8]);

    /// Delivers any inbound data the engine buffered since the last call to
    /// the sink it was started with.
    fn process_queued(&mut self);
}
