use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use spindle::broker::Broker;
use spindle::config::BrokerConfig;
use spindle::scheduler::status::run_status_loop;
use spindle::scheduler::{Hub, Job};

#[tokio::test]
async fn test_broker_serves_protocol_and_stops_on_shutdown() {
    let addr: SocketAddr = "127.0.0.1:21711".parse().unwrap();
    let config = BrokerConfig::new(addr).with_spoke_span(Duration::from_millis(200));
    let broker = Broker::new(config);
    let hub = broker.hub();
    let shutdown = CancellationToken::new();

    let run_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { broker.run(run_shutdown).await });

    let mut stream = loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => break BufReader::new(stream),
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    };

    stream.write_all(b"put 0 0 30 2\r\nhi\r\n").await.unwrap();
    let mut line = String::new();
    stream.read_line(&mut line).await.unwrap();
    assert!(line.starts_with("INSERTED "), "got: {line}");
    assert_eq!(hub.pending_jobs_count(), 1);

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("broker should stop once the token fires")
        .expect("broker task panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_status_loop_prunes_and_stops_deterministically() {
    let hub = Arc::new(Hub::new(Duration::from_millis(100)));

    // Leave behind an empty spoke that will expire shortly.
    let job = Job::new(
        "short-lived".to_string(),
        Utc::now() + TimeDelta::milliseconds(150),
        Vec::new(),
    );
    hub.add_job(job).unwrap();
    hub.cancel_job("short-lived").unwrap();
    assert_eq!(hub.spoke_count(), 1);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(run_status_loop(
        Arc::clone(&hub),
        Duration::from_millis(50),
        shutdown.clone(),
    ));

    // The background sweep picks the spoke up once it expires.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(hub.spoke_count(), 0);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("status loop should stop once the token fires")
        .expect("status loop panicked");
}
