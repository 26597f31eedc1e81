use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::{BufferConfig, Framing, NetConfig};
use crate::hub::SnapshotHub;
use crate::net::frame::{self, BINARY_FRAME_LEN};
use crate::stream::StreamRegistry;

/// Connection-level failure after the stream was established. Terminal
/// for the ingest loop; there is no mid-stream reconnect.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] std::io::Error),
}

/// Read timeout so a blocked receive still observes the shutdown flag.
const READ_TICK: Duration = Duration::from_millis(250);
const RATE_LOG_INTERVAL: Duration = Duration::from_secs(2);

/// Ingest thread entry point: connects (retrying indefinitely at a fixed
/// backoff), then reads units until the connection drops, the server
/// closes, or the GUI signals shutdown. Decoded samples land in the
/// per-stream buffers; a consistent snapshot is published on a fixed
/// cadence without ever waiting for a consumer.
///
/// Dropping the hub on return is the end-of-stream signal for both
/// consumers.
pub fn run_ingest(
    net: NetConfig,
    buffer: BufferConfig,
    hub: SnapshotHub,
    shutdown: Arc<AtomicBool>,
) -> Result<(), TransportError> {
    let mut session = IngestSession::new(buffer, hub);

    // Connecting: retry until the first success.
    let stream = loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Ingest thread received shutdown signal before connecting");
            return Ok(());
        }
        match TcpStream::connect((net.host.as_str(), net.port)) {
            Ok(stream) => break stream,
            Err(e) => {
                debug!("Connect to {}:{} failed: {e}, retrying", net.host, net.port);
                thread::sleep(Duration::from_millis(net.connect_retry_ms));
            }
        }
    };
    info!("Connected to {}:{}", net.host, net.port);
    stream
        .set_read_timeout(Some(READ_TICK))
        .map_err(TransportError::ConnectionLost)?;

    let result = match net.framing {
        Framing::Binary => stream_binary(stream, &mut session, &shutdown),
        Framing::Json => stream_json(stream, &mut session, &shutdown),
    };
    // Final publish so consumers see everything read before the close.
    session.flush();
    info!(
        "Ingest loop closed ({} snapshots dropped on full queues)",
        session.hub.dropped()
    );
    result
}

/// Streaming-state bookkeeping shared by both framings.
struct IngestSession {
    registry: StreamRegistry,
    hub: SnapshotHub,
    publish_every: Duration,
    last_publish: Instant,
    last_rate_log: Instant,
}

impl IngestSession {
    fn new(buffer: BufferConfig, hub: SnapshotHub) -> Self {
        Self {
            registry: StreamRegistry::new(buffer.window_samples),
            hub,
            publish_every: Duration::from_millis(buffer.publish_interval_ms),
            last_publish: Instant::now(),
            last_rate_log: Instant::now(),
        }
    }

    /// Publishes a snapshot if the cadence interval elapsed, and emits the
    /// periodic per-stream rate line. Called after every read, including
    /// timeout ticks, so consumers keep refreshing while data stalls.
    fn tick(&mut self) {
        if self.last_publish.elapsed() >= self.publish_every {
            self.flush();
        }

        let elapsed = self.last_rate_log.elapsed();
        if elapsed >= RATE_LOG_INTERVAL {
            let counts = self.registry.take_packet_counts();
            if counts.iter().any(|&(_, n)| n > 0) {
                let rates: Vec<String> = counts
                    .iter()
                    .map(|&(id, n)| format!("{id}: {:.1}/s", n as f64 / elapsed.as_secs_f64()))
                    .collect();
                info!("Data rate: {}", rates.join(", "));
            }
            self.last_rate_log = Instant::now();
        }
    }

    /// Unconditional publish of the current state (cadence and close).
    fn flush(&mut self) {
        if !self.registry.is_empty() {
            self.hub.publish(self.registry.snapshot_all());
        }
        self.last_publish = Instant::now();
    }
}

fn stream_binary(
    mut stream: TcpStream,
    session: &mut IngestSession,
    shutdown: &AtomicBool,
) -> Result<(), TransportError> {
    let mut unit = [0u8; BINARY_FRAME_LEN];
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Ingest thread received shutdown signal, exiting gracefully");
            return Ok(());
        }
        match stream.read(&mut unit) {
            Ok(0) => {
                info!("Server closed the connection");
                return Ok(());
            }
            Ok(n) => match frame::decode_binary(&unit[..n]) {
                Ok(sample) => session.registry.append(&sample),
                Err(e) => warn!("Skipping malformed frame: {e}"),
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                error!("Socket read failed: {e}");
                return Err(TransportError::ConnectionLost(e));
            }
        }
        session.tick();
    }
}

fn stream_json(
    stream: TcpStream,
    session: &mut IngestSession,
    shutdown: &AtomicBool,
) -> Result<(), TransportError> {
    let mut reader = BufReader::new(stream);
    // Kept across iterations: a read timeout can leave a partial line
    // here, which the next read completes.
    let mut line = String::new();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Ingest thread received shutdown signal, exiting gracefully");
            return Ok(());
        }
        match reader.read_line(&mut line) {
            Ok(0) => {
                info!("Server closed the connection");
                return Ok(());
            }
            Ok(_) => {
                match frame::decode_json_batch(line.trim_end()) {
                    Ok(samples) => {
                        for sample in &samples {
                            session.registry.append(sample);
                        }
                    }
                    Err(e) => warn!("Skipping invalid message: {e}"),
                }
                line.clear();
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                error!("Socket read failed: {e}");
                return Err(TransportError::ConnectionLost(e));
            }
        }
        session.tick();
    }
}
