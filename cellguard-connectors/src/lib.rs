//! Transport connectors for CellGuard
//!
//! ## Overview
//!
//! The evaluation engine in `cellguard-core` is transport-agnostic: it
//! takes one `TelemetrySample` at a time and returns an outcome. This
//! crate supplies the network-facing glue that turns bytes on a socket
//! into those samples.
//!
//! - [`frame`]: the JSON wire frame sensor clients send, and its
//!   validation into an engine sample.
//! - [`tcp`]: a blocking TCP ingest server, one thread per client
//!   connection, all connections feeding one shared [`Monitor`].
//!
//! ## Wire protocol
//!
//! Clients send newline-delimited JSON objects:
//!
//! ```json
//! {"Voltage": 3.81, "Impedance": 0.032, "IntTemp": 26.4,
//!  "SurfaceTemp": 25.1, "Capacity": 0.93, "SoC": 64, "Status": 1}
//! ```
//!
//! `Status` is 1 while charging, anything else means discharging.
//! Missing numeric fields default to zero, which the engine treats as
//! "no reading this cycle" rather than a true measurement. A frame that
//! is not valid JSON is rejected at this boundary and never reaches the
//! engine.
//!
//! [`Monitor`]: cellguard_core::Monitor

pub mod frame;

#[cfg(feature = "tcp")]
pub mod tcp;

pub use frame::{FrameError, TelemetryFrame};

#[cfg(feature = "tcp")]
pub use tcp::{IngestServer, IngestStats, OutcomeSink};
