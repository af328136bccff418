//! Severity-based fault arbitration
//!
//! The classifier intentionally over-reports: one bad sample can light up
//! several rules at once. The arbiter narrows that set to the single most
//! urgent fault using the catalog's severity ranking (lower number wins,
//! catalog declaration order breaks ties) and resolves the mitigation
//! actions for that one fault, filtered to the current operating mode.
//!
//! An empty fault set is the normal, healthy outcome and arbitrates to
//! `None`. A fault the catalog does not rank is an authoring gap: it is
//! dropped from arbitration and reported through the injected
//! [`DataQualitySink`] instead of crashing the evaluation.

use heapless::Vec;

use crate::catalog::Catalog;
use crate::faults::{FaultId, FaultSet, MitigationAction, MitigationKind};
use crate::telemetry::OperatingMode;

/// Maximum actions of one kind attached to a single fault
pub const MAX_ACTIONS: usize = 4;

/// Side channel for catalog data-quality findings
///
/// Injected by the caller so arbitration itself stays pure with respect
/// to any logging or metrics backend.
pub trait DataQualitySink {
    /// A raised fault has no severity entry in the catalog
    fn missing_severity(&mut self, fault: FaultId);
}

/// Sink that routes findings to the `log` facade (no-op without it)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogQualitySink;

impl DataQualitySink for LogQualitySink {
    fn missing_severity(&mut self, fault: FaultId) {
        #[cfg(feature = "log")]
        log::warn!("no severity entry for fault {}, dropped from arbitration", fault.name());
        #[cfg(not(feature = "log"))]
        let _ = fault;
    }
}

/// The arbitrated result for one sample
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// The single highest-priority fault
    pub fault: FaultId,
    /// Its catalog severity (1 = most urgent)
    pub severity: u8,
    /// Apply-now actions applicable in the current mode
    pub immediate: Vec<MitigationAction, MAX_ACTIONS>,
    /// Follow-up actions applicable in the current mode
    pub recovery: Vec<MitigationAction, MAX_ACTIONS>,
}

/// Select the highest-priority fault and resolve its mitigations
pub fn arbitrate(
    faults: FaultSet,
    mode: OperatingMode,
    catalog: &Catalog,
    sink: &mut dyn DataQualitySink,
) -> Option<Verdict> {
    if faults.is_empty() {
        return None;
    }

    // Catalog declaration order makes the min-severity scan stable, which
    // is the documented tie-break.
    let mut best: Option<(FaultId, u8)> = None;
    for def in &catalog.faults {
        if !faults.contains(def.id) {
            continue;
        }
        match best {
            Some((_, severity)) if severity <= def.severity => {}
            _ => best = Some((def.id, def.severity)),
        }
    }

    // Authoring gaps: raised but unranked faults are dropped, never fatal
    for fault in faults.iter() {
        if catalog.severity(fault).is_none() {
            sink.missing_severity(fault);
        }
    }

    let (fault, severity) = best?;

    let mut immediate = Vec::new();
    let mut recovery = Vec::new();
    for def in catalog.mitigations_for(fault) {
        if !def.modes.admits(mode) {
            continue;
        }
        let list = match def.kind {
            MitigationKind::Immediate => &mut immediate,
            MitigationKind::Recovery => &mut recovery,
        };
        // Capacity overflow only drops surplus actions for this verdict
        let _ = list.push(def.action);
    }

    Some(Verdict { fault, severity, immediate, recovery })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[derive(Default)]
    struct RecordingSink(std::vec::Vec<FaultId>);

    impl DataQualitySink for RecordingSink {
        fn missing_severity(&mut self, fault: FaultId) {
            self.0.push(fault);
        }
    }

    fn set(faults: &[FaultId]) -> FaultSet {
        let mut s = FaultSet::empty();
        for f in faults {
            s.insert(*f);
        }
        s
    }

    #[test]
    fn empty_set_is_a_clean_verdict() {
        let catalog = Catalog::builtin();
        let mut sink = RecordingSink::default();
        let verdict = arbitrate(FaultSet::empty(), OperatingMode::Charging, &catalog, &mut sink);
        assert!(verdict.is_none());
        assert!(sink.0.is_empty());
    }

    #[test]
    fn lowest_severity_number_wins() {
        let catalog = Catalog::builtin();
        let mut sink = RecordingSink::default();
        let faults = set(&[
            FaultId::BatteryAgingCapacity, // severity 10
            FaultId::ThermalRunaway,       // severity 1
            FaultId::UndervoltVOnly,       // severity 9
        ]);

        let verdict = arbitrate(faults, OperatingMode::Discharging, &catalog, &mut sink).unwrap();
        assert_eq!(verdict.fault, FaultId::ThermalRunaway);
        assert_eq!(verdict.severity, 1);
    }

    #[test]
    fn specific_aging_beats_composite_on_equal_band() {
        let catalog = Catalog::builtin();
        let mut sink = RecordingSink::default();
        // Battery_Aging and Battery_Aging_All are both severity 8; the
        // catalog declares Battery_Aging first, so it wins the tie.
        let faults = set(&[FaultId::BatteryAgingAll, FaultId::BatteryAging]);
        let verdict = arbitrate(faults, OperatingMode::Charging, &catalog, &mut sink).unwrap();
        assert_eq!(verdict.fault, FaultId::BatteryAging);
    }

    #[test]
    fn mitigations_split_by_kind_and_filtered_by_mode() {
        let catalog = Catalog::builtin();
        let mut sink = RecordingSink::default();
        let faults = set(&[FaultId::OvervoltageVOnly]);

        let charging =
            arbitrate(faults, OperatingMode::Charging, &catalog, &mut sink).unwrap();
        assert_eq!(&charging.immediate[..], &[MitigationAction::StopCharging]);
        assert_eq!(&charging.recovery[..], &[MitigationAction::ResumeReducedCharging]);

        // The same fault while discharging has no applicable actions
        let discharging =
            arbitrate(faults, OperatingMode::Discharging, &catalog, &mut sink).unwrap();
        assert!(discharging.immediate.is_empty());
        assert!(discharging.recovery.is_empty());
    }

    #[test]
    fn wildcard_actions_apply_in_unknown_mode() {
        let catalog = Catalog::builtin();
        let mut sink = RecordingSink::default();
        let faults = set(&[FaultId::BatteryAgingImpedance]);

        let verdict = arbitrate(faults, OperatingMode::Unknown, &catalog, &mut sink).unwrap();
        assert_eq!(
            &verdict.immediate[..],
            &[MitigationAction::IncreaseMonitoringFrequency]
        );
        assert_eq!(&verdict.recovery[..], &[MitigationAction::AlertUser]);
    }

    #[test]
    fn unranked_fault_is_dropped_with_warning() {
        let mut catalog = Catalog::builtin();
        catalog.faults.retain(|d| d.id != FaultId::UndervoltVOnly);
        let mut sink = RecordingSink::default();

        let faults = set(&[FaultId::UndervoltVOnly, FaultId::BatteryAgingCapacity]);
        let verdict = arbitrate(faults, OperatingMode::Discharging, &catalog, &mut sink).unwrap();
        assert_eq!(verdict.fault, FaultId::BatteryAgingCapacity);
        assert_eq!(&sink.0[..], &[FaultId::UndervoltVOnly]);
    }

    #[test]
    fn all_faults_unranked_yields_no_verdict() {
        let mut catalog = Catalog::builtin();
        catalog.faults.clear();
        let mut sink = RecordingSink::default();

        let faults = set(&[FaultId::ThermalRunaway]);
        let verdict = arbitrate(faults, OperatingMode::Charging, &catalog, &mut sink);
        assert!(verdict.is_none());
        assert_eq!(&sink.0[..], &[FaultId::ThermalRunaway]);
    }

    #[test]
    fn verdict_severity_is_minimal_over_input() {
        let catalog = Catalog::builtin();
        let mut sink = RecordingSink::default();
        let faults = set(&[
            FaultId::OvervoltageVImp,
            FaultId::SuddenVoltageDrop,
            FaultId::BatteryAgingSurfTemp,
        ]);
        let verdict = arbitrate(faults, OperatingMode::Charging, &catalog, &mut sink).unwrap();
        for fault in faults.iter() {
            assert!(verdict.severity <= catalog.severity(fault).unwrap());
        }
    }
}
