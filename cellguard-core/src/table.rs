//! Pre-computed limit table over the full state-of-charge domain
//!
//! ## Motivation
//!
//! The catalog authors limits at a handful of calibration SoCs. Doing the
//! interpolation per sample would put float division in the hot path and
//! make the classifier's cost depend on catalog shape. Instead the engine
//! expands the catalog once at startup into a dense table with one row per
//! integer SoC, and the classifier does a single array index per sample.
//!
//! ## Interpolation policy
//!
//! For each SoC-dependent parameter and each SoC value `s` in 0..=100:
//!
//! - A calibration point at exactly `s` is used unchanged, no rounding.
//! - Between two calibration points the bound is linearly interpolated
//!   and rounded to the parameter's calibration precision (3 decimals for
//!   voltage, 4 for impedance), so the table is reproducible bit-for-bit
//!   regardless of build order.
//! - Outside the calibrated range on one side, the conservative fallback
//!   constants apply instead of extrapolating. Extrapolated limits near
//!   the domain edges would be wider than anything the pack was actually
//!   characterized at; the fixed chemistry-level defaults are the safer
//!   bound there.
//!
//! Plateau limits (temperatures, capacity floor, the global voltage
//! rate-of-change ceiling) are copied verbatim into every row.
//!
//! The table is immutable after construction and safe to read from any
//! number of threads without locking.

use crate::catalog::{Catalog, SocLimit};
use crate::errors::CatalogError;

/// Number of rows: one per integer SoC, 0..=100 inclusive
pub const SOC_ROWS: usize = 101;

/// Conservative voltage bounds used outside the calibrated range
pub const VOLTAGE_FALLBACK: Limits = Limits { lower: 3.0, upper: 4.2 };

/// Conservative impedance bounds used outside the calibrated range
pub const IMPEDANCE_FALLBACK: Limits = Limits { lower: 0.0, upper: 0.05 };

const VOLTAGE_SCALE: f32 = 1000.0; // 3 decimals
const IMPEDANCE_SCALE: f32 = 10000.0; // 4 decimals

/// Lower/upper bound pair for one parameter at one SoC
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Lower bound
    pub lower: f32,
    /// Upper bound
    pub upper: f32,
}

/// All limits applicable at one state of charge
///
/// A `None` field means the parameter is not declared in the catalog;
/// every classifier rule touching it is vacuously non-triggering.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LimitRow {
    /// Voltage bounds (V)
    pub voltage: Option<Limits>,
    /// Impedance bounds (Ω)
    pub impedance: Option<Limits>,
    /// Voltage rate-of-change ceiling (V per sample)
    pub voltage_roc_max: Option<f32>,
    /// Internal temperature ceiling (°C)
    pub internal_temp_max: Option<f32>,
    /// Surface temperature ceiling (°C)
    pub surface_temp_max: Option<f32>,
    /// Capacity fraction floor
    pub capacity_min: Option<f32>,
}

/// Dense limit table, one row per integer SoC
#[derive(Debug, Clone, PartialEq)]
pub struct LimitTable {
    rows: [LimitRow; SOC_ROWS],
}

impl LimitTable {
    /// Expand a catalog into the dense table
    ///
    /// Fails only when the catalog is structurally malformed (a declared
    /// SoC-dependent parameter with no calibration points); this is the
    /// fatal-at-startup path.
    pub fn build(catalog: &Catalog) -> Result<Self, CatalogError> {
        catalog.validate()?;

        let mut rows = [LimitRow::default(); SOC_ROWS];
        for (soc, row) in rows.iter_mut().enumerate() {
            let soc = soc as u8;

            row.voltage = catalog
                .voltage
                .as_deref()
                .map(|pts| interpolate(pts, soc, VOLTAGE_SCALE, VOLTAGE_FALLBACK));
            row.impedance = catalog
                .impedance
                .as_deref()
                .map(|pts| interpolate(pts, soc, IMPEDANCE_SCALE, IMPEDANCE_FALLBACK));

            // Plateau limits: copied verbatim into every row
            row.voltage_roc_max = catalog.voltage_roc_max;
            row.internal_temp_max = catalog.internal_temp_max;
            row.surface_temp_max = catalog.surface_temp_max;
            row.capacity_min = catalog.capacity_min;
        }

        Ok(Self { rows })
    }

    /// Row for a state of charge, clamping to the last row above 100
    pub fn row(&self, soc: u8) -> &LimitRow {
        &self.rows[(soc as usize).min(SOC_ROWS - 1)]
    }
}

/// Interpolate bounds for one SoC from the calibration points
fn interpolate(points: &[SocLimit], soc: u8, scale: f32, fallback: Limits) -> Limits {
    // Exact calibration point: used unchanged, no rounding
    if let Some(p) = points.iter().find(|p| p.soc == soc) {
        return Limits { lower: p.min, upper: p.max };
    }

    let lo = points
        .iter()
        .filter(|p| p.soc <= soc)
        .max_by_key(|p| p.soc);
    let hi = points
        .iter()
        .filter(|p| p.soc >= soc)
        .min_by_key(|p| p.soc);

    match (lo, hi) {
        (Some(lo), Some(hi)) => {
            let ratio = (soc - lo.soc) as f32 / (hi.soc - lo.soc) as f32;
            Limits {
                lower: round_to(lo.min + (hi.min - lo.min) * ratio, scale),
                upper: round_to(lo.max + (hi.max - lo.max) * ratio, scale),
            }
        }
        // Outside the calibrated range on one side: conservative default,
        // never extrapolate
        _ => fallback,
    }
}

fn round_to(value: f32, scale: f32) -> f32 {
    libm::roundf(value * scale) / scale
}
