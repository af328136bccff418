//! Rule-based fault classifier
//!
//! ## Overview
//!
//! `classify` is a pure function: one telemetry sample, the previous
//! sample (for rate-of-change), and the limit row for the sample's state
//! of charge go in; a [`FaultSet`] comes out. It never fails, never
//! allocates, and has no side effects. Rules are evaluated independently
//! and a sample may trigger several of them at once - narrowing to a
//! single reported fault is the arbiter's job, not the classifier's.
//!
//! ## Rule independence
//!
//! The overvoltage and undervoltage rules fork on impedance so the
//! arbiter can distinguish an electrical hazard (voltage excursion with a
//! healthy cell) from aging (the same excursion with degraded internal
//! impedance). The thermal rules escalate to thermal runaway above fixed
//! chemistry thresholds; runaway and the corresponding aging label are
//! mutually exclusive per sample per temperature.
//!
//! ## Absent bounds
//!
//! A parameter missing from the catalog leaves `None` bounds in the limit
//! row; every rule that references the missing bound as its subject is
//! vacuously non-triggering. The impedance comparison inside the
//! under/overvoltage forks is the one exception: with no impedance
//! declared, impedance counts as "normal" so the voltage-only labels can
//! still fire.

use crate::faults::{FaultId, FaultSet};
use crate::table::LimitRow;
use crate::telemetry::{OperatingMode, TelemetrySample};

/// Internal temperature above this is thermal runaway, not aging (°C)
pub const INTERNAL_RUNAWAY_C: f32 = 60.0;

/// Surface temperature above this is thermal runaway, not aging (°C)
pub const SURFACE_RUNAWAY_C: f32 = 55.0;

/// Deep-drop margin below the lower voltage limit (V)
pub const DEEP_DROP_MARGIN_V: f32 = 0.5;

/// How many aging indicators must coincide for the composite label
pub const COMPOSITE_AGING_COUNT: u8 = 3;

/// Classify one sample against its limit row
///
/// `previous` is the immediately preceding sample in arrival order; the
/// rate-of-change rules are skipped when it is absent (first sample of a
/// session).
pub fn classify(
    sample: &TelemetrySample,
    previous: Option<&TelemetrySample>,
    row: &LimitRow,
) -> FaultSet {
    let mut faults = FaultSet::empty();

    let v = sample.voltage;

    // Impedance "over limit" needs a declared bound; "within limit" holds
    // vacuously without one so the voltage-only forks still apply.
    let imp_over = row
        .impedance
        .map(|l| sample.impedance > l.upper)
        .unwrap_or(false);
    let imp_within = !imp_over;

    // Overcharge detection, gated on charging mode
    if sample.mode == OperatingMode::Charging {
        if let Some(limits) = row.voltage {
            if v > limits.upper {
                faults.insert(FaultId::OvervoltageCharging);
            }
        }
    }

    // Rate-of-change rules: need a previous sample and a declared ceiling
    if let (Some(prev), Some(roc_max)) = (previous, row.voltage_roc_max) {
        let dv = v - prev.voltage;
        if dv < 0.0 && libm::fabsf(dv) > roc_max {
            faults.insert(FaultId::SuddenVoltageDrop);
        }
        if dv > roc_max {
            faults.insert(FaultId::SuddenVoltageIncrease);
        }
    }

    if let Some(limits) = row.voltage {
        // Deep drop: far below the lower limit regardless of impedance
        if v < limits.lower - DEEP_DROP_MARGIN_V {
            faults.insert(FaultId::DeepVoltageDrop);
        }

        // Undervoltage fork on impedance state
        if v < limits.lower {
            if imp_within {
                faults.insert(FaultId::UndervoltVOnly);
            }
            if imp_over {
                faults.insert(FaultId::BatteryAging);
            }
        }

        // Overvoltage fork on impedance state
        if v > limits.upper {
            if imp_within {
                faults.insert(FaultId::OvervoltageVOnly);
            }
            if imp_over {
                faults.insert(FaultId::OvervoltageVImp);
            }
        }

        // Aging via impedance alone: voltage still in band
        if imp_over && v >= limits.lower && v <= limits.upper {
            faults.insert(FaultId::BatteryAgingImpedance);
        }
    }

    // Thermal rules: runaway and aging are mutually exclusive per sample
    let int_over = row
        .internal_temp_max
        .map(|max| sample.internal_temp > max)
        .unwrap_or(false);
    if int_over {
        if sample.internal_temp > INTERNAL_RUNAWAY_C {
            faults.insert(FaultId::ThermalRunaway);
        } else {
            faults.insert(FaultId::BatteryAgingIntTemp);
        }
    }

    let surf_over = row
        .surface_temp_max
        .map(|max| sample.surface_temp > max)
        .unwrap_or(false);
    if surf_over {
        if sample.surface_temp > SURFACE_RUNAWAY_C {
            faults.insert(FaultId::ThermalRunaway);
        } else {
            faults.insert(FaultId::BatteryAgingSurfTemp);
        }
    }

    let cap_under = row
        .capacity_min
        .map(|min| sample.capacity < min)
        .unwrap_or(false);
    if cap_under {
        faults.insert(FaultId::BatteryAgingCapacity);
    }

    // Composite aging: enough indicators at once, raised in addition to
    // the individual labels
    let aging_count =
        imp_over as u8 + int_over as u8 + surf_over as u8 + cap_under as u8;
    if aging_count >= COMPOSITE_AGING_COUNT {
        faults.insert(FaultId::BatteryAgingAll);
    }

    faults
}
