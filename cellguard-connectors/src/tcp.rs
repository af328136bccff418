//! Blocking TCP ingest server
//!
//! Accepts any number of sensor clients and spawns one handler thread
//! per connection, matching the low connection counts of a single-pack
//! deployment (a handful of sensor nodes, not a public service). Every
//! handler feeds the same shared [`Monitor`], whose internal lock
//! serializes evaluation, so samples observe each other in arrival
//! order no matter which connection carried them.
//!
//! Malformed frames are rejected here, counted, and logged; they never
//! reach the engine. An I/O failure tears down its own connection only.

use std::io::{BufRead, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use cellguard_core::time::{SystemClock, TimeSource};
use cellguard_core::{Monitor, Outcome};

use crate::frame::TelemetryFrame;

/// Receiver for per-sample evaluation results
///
/// Implementations must be cheap: the engine lock is already released
/// when this runs, but the connection thread blocks on it.
pub trait OutcomeSink: Send + Sync {
    /// Called once per accepted frame with the engine's outcome
    fn outcome(&self, peer: SocketAddr, outcome: &Outcome);
}

/// Sink that reports verdicts and stale sensors through the log
pub struct LogOutcomeSink;

impl OutcomeSink for LogOutcomeSink {
    fn outcome(&self, peer: SocketAddr, outcome: &Outcome) {
        for alert in &outcome.stale_alerts {
            log::warn!("{peer}: {} stale since {}", alert.parameter.name(), alert.last_seen);
        }
        match &outcome.verdict {
            Some(v) => {
                let mut actions = String::new();
                for a in v.immediate.iter().chain(v.recovery.iter()) {
                    if !actions.is_empty() {
                        actions.push_str(", ");
                    }
                    actions.push_str(a.name());
                }
                log::warn!("{peer}: fault {} severity {} actions [{actions}]", v.fault.name(), v.severity);
            }
            None => log::debug!("{peer}: healthy"),
        }
    }
}

/// Running counters for the ingest boundary
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Frames decoded and evaluated
    pub frames_accepted: AtomicU64,
    /// Frames rejected before reaching the engine
    pub frames_rejected: AtomicU64,
    /// Connections accepted since startup
    pub connections: AtomicU64,
}

/// TCP front door of the engine
pub struct IngestServer {
    listener: TcpListener,
    monitor: Arc<Monitor>,
    clock: Arc<dyn TimeSource + Send + Sync>,
    stats: Arc<IngestStats>,
}

impl IngestServer {
    /// Bind the listen socket
    pub fn bind<A: ToSocketAddrs>(addr: A, monitor: Arc<Monitor>) -> std::io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
            monitor,
            clock: Arc::new(SystemClock),
            stats: Arc::new(IngestStats::default()),
        })
    }

    /// Replace the wall clock (tests use a fixed one)
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// The address actually bound, useful with port 0
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Accept connections forever
    ///
    /// Each connection gets its own thread; a failed accept is logged
    /// and the loop continues.
    pub fn serve(&self, sink: Arc<dyn OutcomeSink>) {
        for conn in self.listener.incoming() {
            match conn {
                Ok(stream) => self.spawn_handler(stream, Arc::clone(&sink)),
                Err(e) => log::warn!("accept failed: {e}"),
            }
        }
    }

    fn spawn_handler(&self, stream: TcpStream, sink: Arc<dyn OutcomeSink>) {
        self.stats.connections.fetch_add(1, Ordering::Relaxed);
        let monitor = Arc::clone(&self.monitor);
        let clock = Arc::clone(&self.clock);
        let stats = Arc::clone(&self.stats);
        thread::spawn(move || {
            let peer = stream
                .peer_addr()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
            log::info!("{peer}: connected");
            handle_connection(stream, peer, &monitor, &*clock, &*sink, &stats);
            log::info!("{peer}: disconnected");
        });
    }
}

fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    monitor: &Monitor,
    clock: &dyn TimeSource,
    sink: &dyn OutcomeSink,
    stats: &IngestStats,
) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("{peer}: read failed: {e}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match TelemetryFrame::decode(&line) {
            Ok(frame) => {
                let outcome = monitor.process(frame.into_sample(), clock.now());
                stats.frames_accepted.fetch_add(1, Ordering::Relaxed);
                sink.outcome(peer, &outcome);
            }
            Err(e) => {
                stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
                log::warn!("{peer}: rejected frame: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellguard_core::time::FixedClock;
    use cellguard_core::{Catalog, FaultId};
    use std::io::Write;
    use std::net::TcpStream;
    use std::sync::mpsc;
    use std::time::Duration;

    struct ChannelSink(std::sync::Mutex<mpsc::Sender<Outcome>>);

    impl OutcomeSink for ChannelSink {
        fn outcome(&self, _peer: SocketAddr, outcome: &Outcome) {
            let _ = self.0.lock().unwrap().send(outcome.clone());
        }
    }

    fn start_server() -> (SocketAddr, Arc<IngestStats>, mpsc::Receiver<Outcome>) {
        let monitor = Arc::new(Monitor::new(Catalog::builtin(), 0).unwrap());
        let server = IngestServer::bind("127.0.0.1:0", monitor)
            .unwrap()
            .with_clock(Arc::new(FixedClock::new(1_000)));
        let addr = server.local_addr().unwrap();
        let stats = server.stats();

        let (tx, rx) = mpsc::channel();
        let sink = Arc::new(ChannelSink(std::sync::Mutex::new(tx)));
        thread::spawn(move || server.serve(sink));
        (addr, stats, rx)
    }

    #[test]
    fn frames_flow_from_socket_to_verdict() {
        let (addr, stats, rx) = start_server();
        let mut client = TcpStream::connect(addr).unwrap();

        // Healthy frame, then one far over the voltage band
        writeln!(
            client,
            r#"{{"Voltage": 3.7, "Impedance": 0.03, "IntTemp": 25.0, "SurfaceTemp": 24.0, "Capacity": 0.95, "SoC": 50, "Status": 0}}"#
        )
        .unwrap();
        writeln!(
            client,
            r#"{{"Voltage": 4.4, "Impedance": 0.037, "IntTemp": 25.0, "SurfaceTemp": 24.0, "Capacity": 0.95, "SoC": 50, "Status": 1}}"#
        )
        .unwrap();
        client.flush().unwrap();

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(first.verdict.is_none());

        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let verdict = second.verdict.expect("overvoltage while charging");
        assert_eq!(verdict.fault, FaultId::OvervoltageCharging);

        assert_eq!(stats.frames_accepted.load(Ordering::Relaxed), 2);
        assert_eq!(stats.frames_rejected.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn malformed_frames_are_counted_not_fatal() {
        let (addr, stats, rx) = start_server();
        let mut client = TcpStream::connect(addr).unwrap();

        writeln!(client, "this is not json").unwrap();
        writeln!(
            client,
            r#"{{"Voltage": 3.7, "Impedance": 0.03, "IntTemp": 25.0, "SurfaceTemp": 24.0, "Capacity": 0.95, "SoC": 50, "Status": 0}}"#
        )
        .unwrap();
        client.flush().unwrap();

        // The good frame after the garbage still gets evaluated
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(outcome.verdict.is_none());
        assert_eq!(stats.frames_rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn two_connections_share_one_session() {
        let (addr, _stats, rx) = start_server();

        // Baseline 3.9 V on the first connection
        let mut a = TcpStream::connect(addr).unwrap();
        writeln!(
            a,
            r#"{{"Voltage": 3.9, "Impedance": 0.03, "IntTemp": 25.0, "SurfaceTemp": 24.0, "Capacity": 0.95, "SoC": 70, "Status": 0}}"#
        )
        .unwrap();
        a.flush().unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().verdict.is_none());

        // The drop arrives on a different connection and must still see
        // the first connection's sample as its baseline.
        let mut b = TcpStream::connect(addr).unwrap();
        writeln!(
            b,
            r#"{{"Voltage": 3.5, "Impedance": 0.03, "IntTemp": 25.0, "SurfaceTemp": 24.0, "Capacity": 0.95, "SoC": 30, "Status": 0}}"#
        )
        .unwrap();
        b.flush().unwrap();

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let verdict = outcome.verdict.expect("cross-connection drop");
        assert_eq!(verdict.fault, FaultId::SuddenVoltageDrop);
    }
}
