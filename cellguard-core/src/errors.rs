//! Error types for catalog loading and table construction
//!
//! The classify path itself is total and never returns an error; the only
//! fallible operations in the engine are the one-time catalog load and
//! limit-table build at startup. Those failures are fatal: the engine
//! must not run with empty limits, it would silently approve every
//! sample.
//!
//! Errors are small and `Copy`, with `&'static str` payloads only, so they
//! can cross the no_std boundary without allocation.

use thiserror_no_std::Error;

/// Errors from catalog validation and limit-table construction
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogError {
    /// A SoC-dependent parameter was declared but carries no calibration points
    #[error("parameter {parameter} declared with no calibration points")]
    EmptyCalibration {
        /// Catalog name of the offending parameter
        parameter: &'static str,
    },

    /// More calibration points than the fixed catalog capacity admits
    #[error("parameter {parameter} has more than {capacity} calibration points")]
    TooManyPoints {
        /// Catalog name of the offending parameter
        parameter: &'static str,
        /// Fixed capacity that was exceeded
        capacity: usize,
    },

    /// A calibration point's SoC is outside 0..=100
    #[error("calibration point for {parameter} at SoC {soc} outside 0..=100")]
    SocOutOfDomain {
        /// Catalog name of the offending parameter
        parameter: &'static str,
        /// The out-of-domain SoC value
        soc: i64,
    },

    /// A calibration bound is not a finite number
    #[error("non-finite calibration bound for {parameter}")]
    NonFiniteBound {
        /// Catalog name of the offending parameter
        parameter: &'static str,
    },
}

/// Errors from loading a persisted catalog file
#[cfg(feature = "std")]
#[derive(Error, Debug)]
pub enum CatalogLoadError {
    /// Could not read the catalog file
    #[error("catalog file unreadable: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog file is not valid JSON or misses required structure
    #[error("catalog file malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog content failed validation
    #[error(transparent)]
    Invalid(#[from] CatalogError),
}

#[cfg(feature = "defmt")]
impl defmt::Format for CatalogError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::EmptyCalibration { parameter } => {
                defmt::write!(fmt, "{} declared with no calibration points", parameter)
            }
            Self::TooManyPoints { parameter, capacity } => {
                defmt::write!(fmt, "{} exceeds {} calibration points", parameter, capacity)
            }
            Self::SocOutOfDomain { parameter, soc } => {
                defmt::write!(fmt, "{} calibrated at SoC {} outside 0..=100", parameter, soc)
            }
            Self::NonFiniteBound { parameter } => {
                defmt::write!(fmt, "non-finite bound for {}", parameter)
            }
        }
    }
}
