use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use crate::engine::{ClientEngine, EngineError, EventSink, ServerEngine};
use crate::{ConnectionId, Transport, TransportConfig, TransportEvent};

pub(super) fn subscribe() -> DefaultGuard {
    let sub = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::TRACE.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .finish();
    tracing::subscriber::set_default(sub)
}

/// Operations a scripted engine records, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum EngineOp {
    Started { port: u16, tls: bool },
    Connected { address: String, port: u16, tls: bool },
    Stopped,
    SendOne { id: ConnectionId, frame: Vec<u8> },
    SendAll { ids: Vec<ConnectionId>, frame: Vec<u8> },
    Send { frame: Vec<u8> },
    Close(ConnectionId),
}

/// A delivery staged for the engine's next process_queued call, mimicking
/// engines that pump everything through an internal queue.
#[derive(Debug, Clone)]
pub(super) enum Delivery {
    Connect(ConnectionId),
    Disconnect(ConnectionId),
    Data(ConnectionId, Vec<u8>),
}

#[derive(Debug, Default)]
pub(super) struct EngineState {
    pub(super) ops: Vec<EngineOp>,
    pub(super) sink: Option<EventSink>,
    pub(super) staged: VecDeque<Delivery>,
    pub(super) addresses: Vec<(ConnectionId, String)>,
    pub(super) fail_start: bool,
}

pub(super) type EngineHandle = Arc<Mutex<EngineState>>;

fn deliver_staged(state: &mut EngineState) {
    let Some(sink) = state.sink.clone() else {
        return;
    };
    while let Some(delivery) = state.staged.pop_front() {
        match delivery {
            Delivery::Connect(id) => sink.connected(id),
            Delivery::Disconnect(id) => sink.disconnected(id),
            Delivery::Data(id, bytes) => sink.data(id, BytesMut::from(&bytes[..])),
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct MockServerEngine {
    state: EngineHandle,
}

impl MockServerEngine {
    pub(super) fn new() -> (Self, EngineHandle) {
        let engine = Self::default();
        let handle = engine.state.clone();
        (engine, handle)
    }
}

impl ServerEngine for MockServerEngine {
    fn start(&mut self, port: u16, tls: bool, sink: EventSink) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        // The sink is kept even on a scripted failure, like an engine that
        // wires itself up before refusing to come up.
        state.sink = Some(sink);
        if state.fail_start {
            return Err(EngineError::Other("scripted start failure".into()));
        }
        state.ops.push(EngineOp::Started { port, tls });
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.sink = None;
        state.staged.clear();
        state.ops.push(EngineOp::Stopped);
    }

    fn send_one(&mut self, id: ConnectionId, frame: &[u8]) {
        self.state.lock().unwrap().ops.push(EngineOp::SendOne {
            id,
            frame: frame.to_vec(),
        });
    }

    fn send_all(&mut self, ids: &[ConnectionId], frame: &[u8]) {
        self.state.lock().unwrap().ops.push(EngineOp::SendAll {
            ids: ids.to_vec(),
            frame: frame.to_vec(),
        });
    }

    fn close_one(&mut self, id: ConnectionId) {
        self.state.lock().unwrap().ops.push(EngineOp::Close(id));
    }

    fn process_queued(&mut self) {
        deliver_staged(&mut self.state.lock().unwrap());
    }

    fn address_of(&self, id: ConnectionId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .addresses
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, address)| address.clone())
    }
}

#[derive(Debug, Default)]
pub(super) struct MockClientEngine {
    state: EngineHandle,
}

impl MockClientEngine {
    pub(super) fn new() -> (Self, EngineHandle) {
        let engine = Self::default();
        let handle = engine.state.clone();
        (engine, handle)
    }
}

impl ClientEngine for MockClientEngine {
    fn connect(
        &mut self,
        address: &str,
        port: u16,
        tls: bool,
        sink: EventSink,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.sink = Some(sink);
        if state.fail_start {
            return Err(EngineError::Other("scripted connect failure".into()));
        }
        state.ops.push(EngineOp::Connected {
            address: address.into(),
            port,
            tls,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.sink = None;
        state.staged.clear();
        state.ops.push(EngineOp::Stopped);
    }

    fn send(&mut self, frame: &[u8]) {
        self.state.lock().unwrap().ops.push(EngineOp::Send {
            frame: frame.to_vec(),
        });
    }

    fn process_queued(&mut self) {
        deliver_staged(&mut self.state.lock().unwrap());
    }
}

/// A transport wired to one scripted engine per role, with handles into both
/// engines' recorded state.
pub(super) struct TestTransport {
    pub(super) transport: Transport,
    pub(super) server: EngineHandle,
    pub(super) client: EngineHandle,
}

impl TestTransport {
    pub(super) fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub(super) fn with_config(config: TransportConfig) -> Self {
        let (server_engine, server) = MockServerEngine::new();
        let (client_engine, client) = MockClientEngine::new();
        Self {
            transport: Transport::new(config, Box::new(server_engine), Box::new(client_engine)),
            server,
            client,
        }
    }

    /// Sink the server engine was started with, for simulating callbacks
    /// from the engine's worker thread.
    pub(super) fn server_sink(&self) -> EventSink {
        self.server
            .lock()
            .unwrap()
            .sink
            .clone()
            .expect("server engine not started")
    }

    pub(super) fn client_sink(&self) -> EventSink {
        self.client
            .lock()
            .unwrap()
            .sink
            .clone()
            .expect("client engine not started")
    }

    pub(super) fn server_ops(&self) -> Vec<EngineOp> {
        self.server.lock().unwrap().ops.clone()
    }

    pub(super) fn client_ops(&self) -> Vec<EngineOp> {
        self.client.lock().unwrap().ops.clone()
    }

    pub(super) fn stage_server(&self, delivery: Delivery) {
        self.server.lock().unwrap().staged.push_back(delivery);
    }

    pub(super) fn stage_client(&self, delivery: Delivery) {
        self.client.lock().unwrap().staged.push_back(delivery);
    }

    /// One full server tick: fold in engine events, then flush sends.
    pub(super) fn tick_server(&mut self) {
        self.transport.iterate_incoming(true);
        self.transport.iterate_outgoing(true);
    }

    pub(super) fn drain_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.transport.poll_event() {
            events.push(event);
        }
        events
    }

    /// Starts the server, admits `ids` through a full tick and discards the
    /// events that produced.
    pub(super) fn start_server_with_clients(&mut self, ids: &[ConnectionId]) {
        assert!(self.transport.start_connection(true));
        for &id in ids {
            self.server_sink().connected(id);
        }
        self.tick_server();
        self.drain_events();
    }
}
