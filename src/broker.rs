use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::dashboard::{run_dashboard, DashboardState};
use crate::error::Result;
use crate::protocol::Server;
use crate::scheduler::status::run_status_loop;
use crate::scheduler::Hub;

/// Main broker that wires the hub to its front-ends.
pub struct Broker {
    pub config: BrokerConfig,
    pub hub: Arc<Hub>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        let hub = Arc::new(Hub::new(config.spoke_span));
        Self { config, hub }
    }

    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// Runs the broker until the shutdown token fires.
    ///
    /// Starts the status/pruning loop and, if configured, the dashboard as
    /// spawned tasks, then blocks on the protocol server. All subsystems
    /// watch the same token and stop together.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let status_hub = self.hub();
        let status_interval = self.config.status_interval;
        let status_shutdown = shutdown.clone();
        tokio::spawn(async move {
            run_status_loop(status_hub, status_interval, status_shutdown).await;
        });

        if let Some(dashboard_addr) = self.config.dashboard_addr {
            let state = DashboardState { hub: self.hub() };
            tokio::spawn(async move {
                run_dashboard(dashboard_addr, state).await;
            });
        }

        let server = Server::new(self.config.listen_addr, self.hub(), self.config.max_body_bytes);
        server.run(shutdown).await
    }
}
