use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use spindle::broker::Broker;
use spindle::config::BrokerConfig;
use spindle::shutdown::shutdown_token;

#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(about = "A delayed-job broker with a hub/spoke time-ordered scheduler")]
struct Args {
    /// Port to listen on for the job-queue protocol
    #[arg(long, default_value = "11300")]
    port: u16,

    /// Port for the web dashboard (optional)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Width of each scheduling spoke in milliseconds
    #[arg(long, default_value = "5000")]
    spoke_span_ms: u64,

    /// Seconds between status/pruning sweeps
    #[arg(long, default_value = "10")]
    status_interval_secs: u64,

    /// Maximum accepted job body size in bytes
    #[arg(long, default_value = "65536")]
    max_body_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let dashboard_addr: Option<SocketAddr> = match args.dashboard_port {
        Some(port) => Some(format!("0.0.0.0:{}", port).parse()?),
        None => None,
    };

    let config = BrokerConfig {
        listen_addr,
        dashboard_addr,
        spoke_span: Duration::from_millis(args.spoke_span_ms),
        status_interval: Duration::from_secs(args.status_interval_secs),
        max_body_bytes: args.max_body_bytes,
    };

    tracing::info!(
        listen_addr = %config.listen_addr,
        dashboard_addr = ?config.dashboard_addr,
        spoke_span_ms = args.spoke_span_ms,
        "starting spindle broker"
    );

    let shutdown = shutdown_token();
    Broker::new(config).run(shutdown).await?;

    Ok(())
}
