use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{Result, SpindleError};
use crate::scheduler::{Hub, Job};

/// How often a blocked reserve re-checks the hub for a ready job.
const RESERVE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One client session on the line protocol.
///
/// Commands are CRLF-terminated ASCII lines; a `put` is followed by one raw
/// body line the broker never inspects.
pub(super) struct Connection {
    id: u64,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    hub: Arc<Hub>,
    max_body_bytes: usize,
}

impl Connection {
    pub(super) fn new(id: u64, stream: TcpStream, hub: Arc<Hub>, max_body_bytes: usize) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            id,
            reader: BufReader::new(read_half),
            writer: write_half,
            hub,
            max_body_bytes,
        }
    }

    /// Serves commands until the client quits or disconnects.
    pub(super) async fn serve(mut self) -> Result<()> {
        loop {
            let line = match self.read_line().await? {
                Some(line) => String::from_utf8_lossy(&line).into_owned(),
                None => return Ok(()),
            };

            let parts: Vec<&str> = line.split_whitespace().collect();
            let Some(&command) = parts.first() else {
                self.write_line("BAD_FORMAT").await?;
                continue;
            };
            tracing::debug!(connection = self.id, command, "serving command");

            match command {
                "put" => self.put(&parts[1..]).await?,
                "reserve" => self.reserve(Duration::ZERO).await?,
                "reserve-with-timeout" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                    Some(secs) => self.reserve(Duration::from_secs(secs)).await?,
                    None => self.write_line("BAD_FORMAT").await?,
                },
                "delete" => self.delete(parts.get(1).copied()).await?,
                "stats" => self.stats().await?,
                "list-tubes" => self.write_data(b"---\n- default\n").await?,
                // Single-hub broker: every tube name maps to the default.
                "use" => self.write_line("USING default").await?,
                "list-tube-used" => self.write_line("USING default").await?,
                "quit" => return Ok(()),
                _ => self.write_line("UNKNOWN_COMMAND").await?,
            }
        }
    }

    /// `put <pri> <delay-sec> <ttr-sec> <bytes>` followed by one body line.
    async fn put(&mut self, args: &[&str]) -> Result<()> {
        let parsed = match args {
            [pri, delay, ttr, bytes] => (
                pri.parse::<i32>(),
                delay.parse::<u64>(),
                ttr.parse::<u64>(),
                bytes.parse::<usize>(),
            ),
            _ => {
                return self.write_line("BAD_FORMAT").await;
            }
        };
        let (Ok(priority), Ok(delay), Ok(ttr), Ok(declared_len)) = parsed else {
            return self.write_line("BAD_FORMAT").await;
        };

        let Some(body) = self.read_line().await? else {
            return Ok(());
        };
        if body.len() > self.max_body_bytes {
            return self.write_line("JOB_TOO_BIG").await;
        }
        if body.len() != declared_len {
            tracing::debug!(
                connection = self.id,
                declared_len,
                actual_len = body.len(),
                "put body length differs from declared length"
            );
        }

        let trigger_at = Utc::now() + TimeDelta::seconds(delay as i64);
        let mut job = Job::new_auto_id(trigger_at, body);
        job.set_opts(priority, Duration::from_secs(ttr));
        let job_id = job.id().to_string();

        match self.hub.add_job(job) {
            Ok(()) => self.write_line(&format!("INSERTED {job_id}")).await,
            Err(err) => {
                tracing::error!(connection = self.id, error = %err, "put failed");
                self.write_line("INTERNAL_ERROR").await
            }
        }
    }

    /// Tries the hub once, then keeps polling until the timeout elapses.
    async fn reserve(&mut self, timeout: Duration) -> Result<()> {
        let hub = Arc::clone(&self.hub);
        let reserved = poll_next(&hub, timeout).await;
        match reserved {
            Some(job) => {
                self.write_line(&format!("RESERVED {} {}", job.id(), job.body().len()))
                    .await?;
                self.write_body(job.body()).await
            }
            None => self.write_line("TIMED_OUT").await,
        }
    }

    async fn delete(&mut self, id: Option<&str>) -> Result<()> {
        let Some(id) = id else {
            return self.write_line("BAD_FORMAT").await;
        };
        match self.hub.cancel_job(id) {
            Ok(()) => self.write_line("DELETED").await,
            Err(SpindleError::JobNotFound(_)) => self.write_line("NOT_FOUND").await,
            Err(err) => {
                tracing::error!(connection = self.id, error = %err, "delete failed");
                self.write_line("INTERNAL_ERROR").await
            }
        }
    }

    async fn stats(&mut self) -> Result<()> {
        let status = self.hub.status();
        let yaml = format!(
            "---\nspokes: {}\npending-jobs: {}\nreserved-jobs: {}\nremoved-jobs: {}\npast-spoke-pending: {}\n",
            status.spoke_count,
            status.pending_jobs,
            status.reserved_jobs,
            status.removed_jobs,
            status.past_spoke_pending,
        );
        self.write_data(yaml.as_bytes()).await
    }

    /// Reads one line, stripping the trailing CRLF. `None` on EOF.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let read = self.reader.read_until(b'\n', &mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        Ok(())
    }

    /// `OK <bytes>` followed by the raw payload.
    async fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.write_line(&format!("OK {}", data.len())).await?;
        self.write_body(data).await
    }

    async fn write_body(&mut self, body: &[u8]) -> Result<()> {
        self.writer.write_all(body).await?;
        self.writer.write_all(b"\r\n").await?;
        Ok(())
    }
}

/// Non-blocking hub poll with an optional deadline, matching the broker's
/// non-blocking `next()` to the protocol's blocking reserve.
async fn poll_next(hub: &Hub, timeout: Duration) -> Option<Job> {
    if let Some(job) = hub.next() {
        return Some(job);
    }
    if timeout.is_zero() {
        return None;
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let mut poll = tokio::time::interval(RESERVE_POLL_INTERVAL);
    poll.tick().await;
    while tokio::time::Instant::now() < deadline {
        poll.tick().await;
        if let Some(job) = hub.next() {
            return Some(job);
        }
    }
    None
}
