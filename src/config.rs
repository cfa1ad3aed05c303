use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub listen_addr: SocketAddr,
    /// HTTP status/submit API; disabled when `None`.
    pub dashboard_addr: Option<SocketAddr>,
    /// Width of every spoke. The knob trading spoke cardinality against
    /// per-spoke heap size.
    pub spoke_span: Duration,
    /// Cadence of the status/pruning loop.
    pub status_interval: Duration,
    /// Jobs with larger bodies are rejected at the protocol boundary.
    pub max_body_bytes: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:11300".parse().unwrap(),
            dashboard_addr: None,
            spoke_span: Duration::from_secs(5),
            status_interval: Duration::from_secs(10),
            max_body_bytes: 1 << 16,
        }
    }
}

impl BrokerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_dashboard(mut self, addr: SocketAddr) -> Self {
        self.dashboard_addr = Some(addr);
        self
    }

    pub fn with_spoke_span(mut self, span: Duration) -> Self {
        self.spoke_span = span;
        self
    }
}
