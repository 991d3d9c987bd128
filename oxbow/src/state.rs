/// Lifecycle state of a local endpoint.
///
/// `start` moves Stopped through Starting, `stop` moves through Stopping
/// before Stopped. A failed start falls back to Stopped without ever
/// reaching Started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Fully stopped. The only state `start` is accepted in.
    Stopped,
    /// Start requested; the engine is coming up.
    Starting,
    /// Live. Sends are accepted only here.
    Started,
    /// Stop requested; the engine is unwinding.
    Stopping,
}

/// Connection state of a remote client as observed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    /// The client is admitted and live.
    Started,
    /// The client is unknown or has disconnected.
    Stopped,
}

/// Transition guard shared by both endpoint roles.
///
/// Same-state sets are suppressed so owners never emit duplicate
/// notifications, no matter how redundantly the engine reports.
#[derive(Debug)]
pub(crate) struct StateMachine {
    current: ConnectionState,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        Self {
            current: ConnectionState::Stopped,
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        self.current
    }

    /// Applies `next`, returning it only if this was a real transition.
    pub(crate) fn set(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(next)
    }
}
