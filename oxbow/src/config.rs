/// Smallest maximum transmission unit a configuration will accept.
pub const MIN_MTU: u16 = 576;

/// Largest maximum transmission unit a configuration will accept.
pub const MAX_MTU: u16 = u16::MAX;

/// Upper bound on [`TransportConfig::max_clients`].
pub const MAX_CLIENTS: u16 = 9999;

/// Parameters governing both endpoint roles.
///
/// Values are read when a role starts; changing them afterwards only affects
/// the next session. Out-of-range values are clamped at the setter rather
/// than rejected.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub(crate) port: u16,
    pub(crate) address: String,
    pub(crate) mtu: u16,
    pub(crate) max_clients: u16,
    pub(crate) tls: bool,
}

impl TransportConfig {
    /// Port the server binds and the client connects to.
    pub fn port(&mut self, value: u16) -> &mut Self {
        self.port = value;
        self
    }

    /// Address the client connects to. The server always binds all
    /// interfaces.
    pub fn address(&mut self, value: impl Into<String>) -> &mut Self {
        self.address = value.into();
        self
    }

    /// Largest payload handed to the engine in one frame, clamped into
    /// [`MIN_MTU`]..=[`MAX_MTU`].
    pub fn mtu(&mut self, value: u16) -> &mut Self {
        self.mtu = value.clamp(MIN_MTU, MAX_MTU);
        self
    }

    /// Number of clients the server admits at once, clamped into
    /// 1..=[`MAX_CLIENTS`]. Connections beyond the limit are closed without
    /// ever surfacing.
    pub fn max_clients(&mut self, value: u16) -> &mut Self {
        self.max_clients = value.clamp(1, MAX_CLIENTS);
        self
    }

    /// Whether the engine should secure connections with TLS.
    pub fn tls(&mut self, value: bool) -> &mut Self {
        self.tls = value;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 7770,
            address: "localhost".into(),
            mtu: 1023,
            max_clients: 2000,
            tls: false,
        }
    }
}
