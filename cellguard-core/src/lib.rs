//! Fault-evaluation engine for CellGuard
//!
//! Evaluates streamed battery telemetry against charge-state-dependent
//! safety limits and reports the single highest-priority fault with its
//! recommended mitigations.
//!
//! Key constraints:
//! - Runs on small monitoring nodes (Raspberry Pi class or below)
//! - No heap allocation in the classify path
//! - One sample in, one verdict out, in well under a millisecond
//!
//! ```no_run
//! use cellguard_core::{Catalog, LimitTable, OperatingMode, TelemetrySample};
//! use cellguard_core::classify::classify;
//!
//! let catalog = Catalog::builtin();
//! let table = LimitTable::build(&catalog).unwrap();
//!
//! let sample = TelemetrySample::new(3.7, 0.03, 25.0, 24.0, 0.95, 40.0, OperatingMode::Discharging);
//! let faults = classify(&sample, None, table.row(sample.soc));
//! assert!(faults.is_empty());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod arbiter;
pub mod catalog;
pub mod classify;
pub mod errors;
pub mod faults;
pub mod monitor;
pub mod stream;
pub mod table;
pub mod telemetry;
pub mod time;

// Public API
pub use arbiter::{arbitrate, DataQualitySink, Verdict};
pub use catalog::Catalog;
pub use errors::CatalogError;
pub use faults::{FaultId, FaultSet, MitigationAction, MitigationKind};
pub use monitor::SessionState;
pub use stream::{Stream, StreamError};

#[cfg(feature = "replay-memory")]
pub use stream::MemoryStream;
#[cfg(feature = "replay-file")]
pub use stream::ReplayStream;
pub use table::{LimitRow, LimitTable};
pub use telemetry::{OperatingMode, Parameter, TelemetrySample};

#[cfg(feature = "std")]
pub use monitor::{Monitor, Outcome};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
