//! Replay a recorded telemetry session against a running ingest server.
//!
//! ```sh
//! cargo run --example replay_client -- 127.0.0.1:9000 session.csv
//! ```
//!
//! Expects CSV rows of
//! `voltage,impedance,int_temp,surface_temp,capacity,soc,status`
//! and sends one JSON frame per second, the sensor firmware's cadence.

use std::io::Write;
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use cellguard_connectors::TelemetryFrame;
use cellguard_core::stream::{Stream, StreamError};
use cellguard_core::ReplayStream;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:9000".into());
    let csv = args.next().unwrap_or_else(|| "session.csv".into());

    let mut stream = ReplayStream::from_csv(Path::new(&csv))?.with_skip_lines(1);
    let mut conn = TcpStream::connect(&addr)?;
    println!("replaying {csv} to {addr}");

    let mut sent = 0u64;
    loop {
        match stream.poll_next() {
            Ok(sample) => {
                let frame = TelemetryFrame::from(&sample);
                serde_json::to_writer(&mut conn, &frame)?;
                conn.write_all(b"\n")?;
                sent += 1;
                std::thread::sleep(Duration::from_secs(1));
            }
            Err(nb::Error::Other(StreamError::EndOfStream)) => break,
            Err(nb::Error::Other(e)) => return Err(format!("replay failed: {e:?}").into()),
            Err(nb::Error::WouldBlock) => continue,
        }
    }

    println!("done: {sent} frames sent, {} rows skipped", stream.parse_errors());
    Ok(())
}
