//! Fault and mitigation vocabulary
//!
//! ## Overview
//!
//! The classifier raises zero or more [`FaultId`]s per sample; the arbiter
//! narrows them to one using the catalog's severity ranking and resolves
//! the mitigation actions attached to it. All of these types are plain
//! `Copy` data designed for the hot path:
//!
//! - `FaultId` is a dense `#[repr(u8)]` enum so a fault set fits in a
//!   16-bit bitmask.
//! - [`FaultSet`] mirrors the bit-flag pattern used for constraint
//!   tracking: set/test/iterate with no allocation.
//! - Mitigation actions are enumerated, not stringly typed, so a typo in
//!   the catalog cannot invent a new action at runtime.
//!
//! Severities are assigned in the catalog, not here. Lower number means
//! more urgent; the authored bands are 1-3 immediate danger to the user,
//! 4-6 electrical hazards, 7-8 property damage, 9-10 performance issues.

use crate::telemetry::OperatingMode;

/// Fault labels the classifier can raise
///
/// Discriminants are the bit positions inside [`FaultSet`] and double as
/// the declaration order used for severity tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultId {
    /// Fire or explosion risk, evacuate immediately
    ThermalRunaway = 0,
    /// Voltage above limit while charging
    OvervoltageCharging = 1,
    /// Voltage above limit with aged impedance
    OvervoltageVImp = 2,
    /// Voltage above limit, impedance normal
    OvervoltageVOnly = 3,
    /// Negative voltage step beyond the rate-of-change ceiling
    SuddenVoltageDrop = 4,
    /// Positive voltage step beyond the rate-of-change ceiling
    SuddenVoltageIncrease = 5,
    /// Voltage more than 0.5 V below the lower limit
    DeepVoltageDrop = 6,
    /// Undervoltage together with aged impedance
    BatteryAging = 7,
    /// Three or more aging indicators at once
    BatteryAgingAll = 8,
    /// Voltage below limit, impedance normal
    UndervoltVOnly = 9,
    /// Impedance over limit with voltage in band
    BatteryAgingImpedance = 10,
    /// Internal temperature over limit, below the runaway threshold
    BatteryAgingIntTemp = 11,
    /// Surface temperature over limit, below the runaway threshold
    BatteryAgingSurfTemp = 12,
    /// Capacity fraction below the lower limit
    BatteryAgingCapacity = 13,
}

/// All fault ids in declaration order
pub const FAULT_IDS: [FaultId; 14] = [
    FaultId::ThermalRunaway,
    FaultId::OvervoltageCharging,
    FaultId::OvervoltageVImp,
    FaultId::OvervoltageVOnly,
    FaultId::SuddenVoltageDrop,
    FaultId::SuddenVoltageIncrease,
    FaultId::DeepVoltageDrop,
    FaultId::BatteryAging,
    FaultId::BatteryAgingAll,
    FaultId::UndervoltVOnly,
    FaultId::BatteryAgingImpedance,
    FaultId::BatteryAgingIntTemp,
    FaultId::BatteryAgingSurfTemp,
    FaultId::BatteryAgingCapacity,
];

impl FaultId {
    /// Catalog name for this fault
    pub const fn name(&self) -> &'static str {
        match self {
            FaultId::ThermalRunaway => "Thermal_Runaway",
            FaultId::OvervoltageCharging => "Overvoltage_Charging",
            FaultId::OvervoltageVImp => "Overvoltage_V_Imp",
            FaultId::OvervoltageVOnly => "Overvoltage_V_Only",
            FaultId::SuddenVoltageDrop => "Sudden_Voltage_Drop",
            FaultId::SuddenVoltageIncrease => "Sudden_Voltage_Increase",
            FaultId::DeepVoltageDrop => "Deep_Voltage_Drop",
            FaultId::BatteryAging => "Battery_Aging",
            FaultId::BatteryAgingAll => "Battery_Aging_All",
            FaultId::UndervoltVOnly => "Undervolt_V_Only",
            FaultId::BatteryAgingImpedance => "Battery_Aging_Impedance",
            FaultId::BatteryAgingIntTemp => "Battery_Aging_IntTemp",
            FaultId::BatteryAgingSurfTemp => "Battery_Aging_SurfTemp",
            FaultId::BatteryAgingCapacity => "Battery_Aging_Capacity",
        }
    }

    /// Look up a fault id by its catalog name
    pub fn from_name(name: &str) -> Option<Self> {
        FAULT_IDS.iter().copied().find(|f| f.name() == name)
    }

    const fn bit(&self) -> u16 {
        1 << (*self as u16)
    }
}

/// Set of faults raised for one sample
///
/// A 16-bit mask indexed by `FaultId` discriminant. The classifier fills
/// it; the arbiter narrows it to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultSet(u16);

impl FaultSet {
    /// Empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add a fault to the set
    pub fn insert(&mut self, fault: FaultId) {
        self.0 |= fault.bit();
    }

    /// Test membership
    pub const fn contains(&self, fault: FaultId) -> bool {
        (self.0 & fault.bit()) != 0
    }

    /// True when no fault was raised (the common, healthy outcome)
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of faults in the set
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate members in declaration order
    pub fn iter(&self) -> impl Iterator<Item = FaultId> + '_ {
        FAULT_IDS.iter().copied().filter(|f| self.contains(*f))
    }
}

/// Whether a mitigation is an apply-now step or a follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MitigationKind {
    /// Apply immediately when the fault surfaces
    Immediate = 0,
    /// Follow-up remedial step once the immediate action took effect
    Recovery = 1,
}

/// Mitigation actions the engine can recommend
///
/// The engine only recommends; actuation belongs to whoever consumes the
/// verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MitigationAction {
    /// Cut the pack off entirely
    ImmediateShutdown = 0,
    /// Warn everyone near the pack to leave
    EvacuationWarning = 1,
    /// Stop the charger
    StopCharging = 2,
    /// Restart charging at reduced current
    ResumeReducedCharging = 3,
    /// Shed load on the discharge path
    ReduceLoad = 4,
    /// Lower the charge power ceiling
    ReduceChargingPower = 5,
    /// Flag the pack for replacement
    RecommendReplacement = 6,
    /// Sample this pack more often
    IncreaseMonitoringFrequency = 7,
    /// Notify the operator
    AlertUser = 8,
}

impl MitigationAction {
    /// Catalog name for this action
    pub const fn name(&self) -> &'static str {
        match self {
            MitigationAction::ImmediateShutdown => "Immediate_Shutdown",
            MitigationAction::EvacuationWarning => "Evacuation_Warning",
            MitigationAction::StopCharging => "Stop_Charging",
            MitigationAction::ResumeReducedCharging => "Resume_Reduced_Charging",
            MitigationAction::ReduceLoad => "Reduce_Load",
            MitigationAction::ReduceChargingPower => "Reduce_Charging_Power",
            MitigationAction::RecommendReplacement => "Recommend_Replacement",
            MitigationAction::IncreaseMonitoringFrequency => "Increase_Monitoring_Frequency",
            MitigationAction::AlertUser => "Alert_User",
        }
    }
}

/// Operating modes a mitigation applies in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSet(u8);

impl ModeSet {
    /// Applies while charging only
    pub const CHARGING: Self = Self(1 << 0);
    /// Applies while discharging only
    pub const DISCHARGING: Self = Self(1 << 1);
    /// Wildcard: applies in every mode, including unknown
    pub const ALL: Self = Self(0b11 | (1 << 2));

    /// Combine two mode sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Does this set admit the given mode?
    ///
    /// The wildcard admits everything; `Unknown` mode only matches the
    /// wildcard, so mode-specific actions are withheld when the mode bit
    /// was missing from the sample.
    pub const fn admits(&self, mode: OperatingMode) -> bool {
        match mode {
            OperatingMode::Charging => (self.0 & Self::CHARGING.0) != 0,
            OperatingMode::Discharging => (self.0 & Self::DISCHARGING.0) != 0,
            OperatingMode::Unknown => (self.0 & (1 << 2)) != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_set_roundtrip() {
        let mut set = FaultSet::empty();
        assert!(set.is_empty());

        set.insert(FaultId::ThermalRunaway);
        set.insert(FaultId::BatteryAgingCapacity);

        assert!(set.contains(FaultId::ThermalRunaway));
        assert!(!set.contains(FaultId::BatteryAging));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn fault_set_iterates_in_declaration_order() {
        let mut set = FaultSet::empty();
        set.insert(FaultId::BatteryAgingCapacity);
        set.insert(FaultId::ThermalRunaway);

        let order: heapless::Vec<FaultId, 4> = set.iter().collect();
        assert_eq!(
            &order[..],
            &[FaultId::ThermalRunaway, FaultId::BatteryAgingCapacity]
        );
    }

    #[test]
    fn fault_names_round_trip() {
        for fault in FAULT_IDS {
            assert_eq!(FaultId::from_name(fault.name()), Some(fault));
        }
        assert_eq!(FaultId::from_name("Not_A_Fault"), None);
    }

    #[test]
    fn wildcard_mode_set_admits_unknown() {
        assert!(ModeSet::ALL.admits(OperatingMode::Unknown));
        assert!(ModeSet::ALL.admits(OperatingMode::Charging));
        assert!(!ModeSet::CHARGING.admits(OperatingMode::Unknown));
        assert!(!ModeSet::CHARGING.admits(OperatingMode::Discharging));
    }
}
