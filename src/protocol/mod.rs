use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::scheduler::Hub;

mod connection;

use connection::Connection;

/// TCP front-end speaking the line-oriented job-queue protocol.
///
/// Each accepted client is served by its own task; all clients share the
/// single hub.
pub struct Server {
    addr: SocketAddr,
    hub: Arc<Hub>,
    max_body_bytes: usize,
}

impl Server {
    pub fn new(addr: SocketAddr, hub: Arc<Hub>, max_body_bytes: usize) -> Self {
        Self {
            addr,
            hub,
            max_body_bytes,
        }
    }

    /// Accepts connections until the shutdown token fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "protocol server listening");

        let mut connection_id: u64 = 0;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("protocol server stopped");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to accept connection");
                            continue;
                        }
                    };
                    connection_id += 1;
                    let id = connection_id;
                    let hub = Arc::clone(&self.hub);
                    let max_body_bytes = self.max_body_bytes;
                    tokio::spawn(async move {
                        tracing::debug!(connection = id, peer = %peer, "client connected");
                        if let Err(err) = Connection::new(id, stream, hub, max_body_bytes).serve().await {
                            tracing::warn!(connection = id, error = %err, "connection error");
                        }
                        tracing::debug!(connection = id, "client disconnected");
                    });
                }
            }
        }
    }
}
