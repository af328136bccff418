//! Limit, fault, and mitigation catalog
//!
//! ## Overview
//!
//! The catalog is the static, read-only repository everything else is
//! derived from: calibration points for the SoC-dependent limits
//! (voltage, impedance), plateau limits for the SoC-independent ones
//! (temperatures, capacity, voltage rate-of-change), plus the fault
//! severity ranking and the mitigation actions attached to each fault.
//!
//! It is built exactly once before monitoring starts. The engine never
//! queries a live store afterwards: severities live in a small in-memory
//! table here, and the SoC-dependent limits are expanded into the dense
//! [`crate::table::LimitTable`] at startup.
//!
//! Two sources exist:
//!
//! - [`Catalog::builtin`] carries the authored calibration data baked
//!   into the firmware. This is the default for nodes without storage.
//! - With `std`, [`Catalog::from_json_str`] / [`Catalog::from_json_file`]
//!   load a persisted catalog. The file may omit the fault or mitigation
//!   sections, in which case the built-in ones apply; unknown fault or
//!   action names in the file are skipped with a warning rather than
//!   failing startup.
//!
//! ## Severity bands
//!
//! Lower number = higher priority. Authored bands: 1-3 immediate danger
//! to the user, 4-6 electrical hazards, 7-8 property damage, 9-10
//! performance issues. User safety is prioritized over equipment damage.

use heapless::Vec;

use crate::errors::CatalogError;
use crate::faults::{FaultId, MitigationAction, MitigationKind, ModeSet};

/// Maximum calibration points per SoC-dependent parameter
pub const MAX_CALIBRATION_POINTS: usize = 16;

/// Maximum fault definitions
pub const MAX_FAULTS: usize = 16;

/// Maximum mitigation entries across all faults
pub const MAX_MITIGATIONS: usize = 32;

/// One authored calibration point: bounds valid at exactly this SoC
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocLimit {
    /// State of charge this point is calibrated at
    pub soc: u8,
    /// Lower bound at this SoC
    pub min: f32,
    /// Upper bound at this SoC
    pub max: f32,
}

/// Bit set of parameters that can trigger a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSet(u8);

impl TriggerSet {
    /// Cell voltage
    pub const VOLTAGE: Self = Self(1 << 0);
    /// Internal impedance
    pub const IMPEDANCE: Self = Self(1 << 1);
    /// Internal temperature
    pub const INTERNAL_TEMP: Self = Self(1 << 2);
    /// Surface temperature
    pub const SURFACE_TEMP: Self = Self(1 << 3);
    /// Capacity fraction
    pub const CAPACITY: Self = Self(1 << 4);
    /// Voltage rate of change
    pub const VOLTAGE_ROC: Self = Self(1 << 5);

    /// Empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Combine trigger sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Test membership
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// Severity record for one fault
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultDef {
    /// The fault this record ranks
    pub id: FaultId,
    /// Priority rank, 1 = most urgent
    pub severity: u8,
    /// Parameters that can raise this fault
    pub triggers: TriggerSet,
}

/// One mitigation entry attached to a fault
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MitigationDef {
    /// Fault this action belongs to
    pub fault: FaultId,
    /// The recommended action
    pub action: MitigationAction,
    /// Apply-now vs follow-up
    pub kind: MitigationKind,
    /// Operating modes the action is applicable in
    pub modes: ModeSet,
}

/// The in-memory catalog
///
/// `voltage`/`impedance` distinguish "not declared" (`None`, every
/// derived bound absent) from "declared but empty" (`Some` with no
/// points, a structural authoring error that fails table construction).
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    /// Voltage calibration points, SoC-indexed
    pub voltage: Option<Vec<SocLimit, MAX_CALIBRATION_POINTS>>,
    /// Impedance calibration points, SoC-indexed
    pub impedance: Option<Vec<SocLimit, MAX_CALIBRATION_POINTS>>,
    /// Internal temperature ceiling (°C), plateau
    pub internal_temp_max: Option<f32>,
    /// Surface temperature ceiling (°C), plateau
    pub surface_temp_max: Option<f32>,
    /// Capacity fraction floor, plateau
    pub capacity_min: Option<f32>,
    /// Voltage rate-of-change ceiling (V per sample), single global constant
    pub voltage_roc_max: Option<f32>,
    /// Fault severity ranking, declaration order breaks ties
    pub faults: Vec<FaultDef, MAX_FAULTS>,
    /// Mitigation entries for all faults
    pub mitigations: Vec<MitigationDef, MAX_MITIGATIONS>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// The authored built-in catalog
    pub fn builtin() -> Self {
        // Invariant: the authored slices fit the MAX_* capacities, checked
        // by the builtin_fits_capacities test.
        let voltage = Vec::from_slice(&[
            SocLimit { soc: 0, min: 3.0, max: 3.3 },
            SocLimit { soc: 20, min: 3.3, max: 3.6 },
            SocLimit { soc: 40, min: 3.6, max: 3.8 },
            SocLimit { soc: 60, min: 3.8, max: 4.0 },
            SocLimit { soc: 80, min: 4.0, max: 4.1 },
            SocLimit { soc: 100, min: 4.1, max: 4.2 },
        ])
        .expect("builtin voltage points exceed capacity");

        let impedance = Vec::from_slice(&[
            SocLimit { soc: 0, min: 0.0, max: 0.02 },
            SocLimit { soc: 20, min: 0.02, max: 0.03 },
            SocLimit { soc: 40, min: 0.03, max: 0.035 },
            SocLimit { soc: 60, min: 0.035, max: 0.04 },
            SocLimit { soc: 80, min: 0.04, max: 0.045 },
            SocLimit { soc: 100, min: 0.045, max: 0.05 },
        ])
        .expect("builtin impedance points exceed capacity");

        Self {
            voltage: Some(voltage),
            impedance: Some(impedance),
            internal_temp_max: Some(58.0),
            surface_temp_max: Some(55.0),
            capacity_min: Some(0.8),
            voltage_roc_max: Some(0.1),
            faults: builtin_faults(),
            mitigations: builtin_mitigations(),
        }
    }

    /// Severity for a fault, if the catalog ranks it
    pub fn severity(&self, fault: FaultId) -> Option<u8> {
        self.faults.iter().find(|f| f.id == fault).map(|f| f.severity)
    }

    /// Mitigation entries for a fault, in declaration order
    pub fn mitigations_for(&self, fault: FaultId) -> impl Iterator<Item = &MitigationDef> {
        self.mitigations.iter().filter(move |m| m.fault == fault)
    }

    /// Validate the catalog's structural invariants
    ///
    /// Called by table construction; a failure here is fatal at startup.
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_points("Voltage", &self.voltage)?;
        validate_points("Impedance", &self.impedance)?;
        Ok(())
    }
}

fn validate_points(
    name: &'static str,
    points: &Option<Vec<SocLimit, MAX_CALIBRATION_POINTS>>,
) -> Result<(), CatalogError> {
    let Some(points) = points else { return Ok(()) };

    if points.is_empty() {
        return Err(CatalogError::EmptyCalibration { parameter: name });
    }
    for p in points {
        if p.soc > 100 {
            return Err(CatalogError::SocOutOfDomain {
                parameter: name,
                soc: p.soc as i64,
            });
        }
        if !p.min.is_finite() || !p.max.is_finite() {
            return Err(CatalogError::NonFiniteBound { parameter: name });
        }
    }
    Ok(())
}

fn builtin_faults() -> Vec<FaultDef, MAX_FAULTS> {
    use FaultId::*;
    use TriggerSet as T;

    Vec::from_slice(&[
        // Critical: immediate danger to the user
        FaultDef {
            id: ThermalRunaway,
            severity: 1,
            triggers: T::INTERNAL_TEMP.union(T::SURFACE_TEMP).union(T::IMPEDANCE),
        },
        // Electrical hazards
        FaultDef {
            id: OvervoltageCharging,
            severity: 4,
            triggers: T::VOLTAGE,
        },
        FaultDef {
            id: OvervoltageVImp,
            severity: 4,
            triggers: T::VOLTAGE.union(T::IMPEDANCE),
        },
        FaultDef {
            id: OvervoltageVOnly,
            severity: 5,
            triggers: T::VOLTAGE,
        },
        FaultDef {
            id: SuddenVoltageDrop,
            severity: 6,
            triggers: T::VOLTAGE_ROC,
        },
        FaultDef {
            id: SuddenVoltageIncrease,
            severity: 6,
            triggers: T::VOLTAGE_ROC,
        },
        // Property damage
        FaultDef {
            id: DeepVoltageDrop,
            severity: 7,
            triggers: T::VOLTAGE,
        },
        FaultDef {
            id: BatteryAging,
            severity: 8,
            triggers: T::CAPACITY.union(T::IMPEDANCE).union(T::INTERNAL_TEMP),
        },
        FaultDef {
            id: BatteryAgingAll,
            severity: 8,
            triggers: T::IMPEDANCE
                .union(T::INTERNAL_TEMP)
                .union(T::SURFACE_TEMP)
                .union(T::CAPACITY),
        },
        // Performance issues
        FaultDef {
            id: UndervoltVOnly,
            severity: 9,
            triggers: T::VOLTAGE,
        },
        FaultDef {
            id: BatteryAgingImpedance,
            severity: 10,
            triggers: T::IMPEDANCE,
        },
        FaultDef {
            id: BatteryAgingIntTemp,
            severity: 10,
            triggers: T::INTERNAL_TEMP,
        },
        FaultDef {
            id: BatteryAgingSurfTemp,
            severity: 10,
            triggers: T::SURFACE_TEMP,
        },
        FaultDef {
            id: BatteryAgingCapacity,
            severity: 10,
            triggers: T::CAPACITY,
        },
    ])
    .expect("builtin fault table exceeds capacity")
}

fn builtin_mitigations() -> Vec<MitigationDef, MAX_MITIGATIONS> {
    use FaultId::*;
    use MitigationAction::*;
    use MitigationKind::*;

    let charging = ModeSet::CHARGING;
    let discharging = ModeSet::DISCHARGING;
    let all = ModeSet::ALL;

    let mut defs: Vec<MitigationDef, MAX_MITIGATIONS> = Vec::new();
    let entries = [
        (ThermalRunaway, ImmediateShutdown, Immediate, all),
        (ThermalRunaway, EvacuationWarning, Recovery, all),
        (OvervoltageVImp, StopCharging, Immediate, charging),
        (OvervoltageVImp, ResumeReducedCharging, Recovery, charging),
        (OvervoltageVOnly, StopCharging, Immediate, charging),
        (OvervoltageVOnly, ResumeReducedCharging, Recovery, charging),
        (OvervoltageCharging, StopCharging, Immediate, charging),
        (OvervoltageCharging, ResumeReducedCharging, Recovery, charging),
        (SuddenVoltageDrop, ReduceLoad, Immediate, discharging),
        (DeepVoltageDrop, ReduceLoad, Immediate, discharging),
        (UndervoltVOnly, ReduceLoad, Immediate, discharging),
        (BatteryAging, ReduceChargingPower, Immediate, charging),
        (BatteryAging, RecommendReplacement, Recovery, charging),
        (BatteryAgingAll, ReduceChargingPower, Immediate, charging),
        (BatteryAgingAll, RecommendReplacement, Recovery, charging),
        (BatteryAgingImpedance, IncreaseMonitoringFrequency, Immediate, all),
        (BatteryAgingImpedance, AlertUser, Recovery, all),
        (BatteryAgingIntTemp, IncreaseMonitoringFrequency, Immediate, all),
        (BatteryAgingIntTemp, AlertUser, Recovery, all),
        (BatteryAgingSurfTemp, IncreaseMonitoringFrequency, Immediate, all),
        (BatteryAgingSurfTemp, AlertUser, Recovery, all),
        (BatteryAgingCapacity, IncreaseMonitoringFrequency, Immediate, all),
        (BatteryAgingCapacity, AlertUser, Recovery, all),
    ];
    for (fault, action, kind, modes) in entries {
        defs.push(MitigationDef { fault, action, kind, modes })
            .expect("builtin mitigation table exceeds capacity");
    }
    defs
}

#[cfg(feature = "std")]
mod file {
    //! Persisted catalog format
    //!
    //! JSON mirror of the in-memory shape. The `parameter_limits` section
    //! follows the authoring tool's export; faults and mitigations may be
    //! omitted entirely to use the built-in definitions.

    use serde::Deserialize;

    use super::*;
    use crate::errors::CatalogLoadError;

    #[derive(Deserialize)]
    struct FileCatalog {
        #[serde(default)]
        parameter_limits: FileParams,
        #[serde(default)]
        faults: std::vec::Vec<FileFault>,
        #[serde(default)]
        mitigations: std::vec::Vec<FileMitigation>,
    }

    #[derive(Deserialize, Default)]
    struct FileParams {
        #[serde(rename = "Voltage")]
        voltage: Option<FileSocLimits>,
        #[serde(rename = "Impedance")]
        impedance: Option<FileSocLimits>,
        #[serde(rename = "IntTemp")]
        int_temp: Option<FileMax>,
        #[serde(rename = "SurfaceTemp")]
        surface_temp: Option<FileMax>,
        #[serde(rename = "Capacity")]
        capacity: Option<FileMin>,
        #[serde(rename = "Voltage_RoC")]
        voltage_roc: Option<FileMax>,
    }

    #[derive(Deserialize)]
    struct FileSocLimits {
        limits_per_soc: std::vec::Vec<FilePoint>,
    }

    #[derive(Deserialize)]
    struct FilePoint {
        soc: i64,
        min: f32,
        max: f32,
    }

    #[derive(Deserialize)]
    struct FileMax {
        max: f32,
    }

    #[derive(Deserialize)]
    struct FileMin {
        min: f32,
    }

    #[derive(Deserialize)]
    struct FileFault {
        name: std::string::String,
        severity: u8,
        #[serde(default)]
        triggers: std::vec::Vec<std::string::String>,
    }

    #[derive(Deserialize)]
    struct FileMitigation {
        fault: std::string::String,
        action: std::string::String,
        kind: std::string::String,
        #[serde(default)]
        modes: std::vec::Vec<std::string::String>,
    }

    fn convert_points(
        name: &'static str,
        limits: &FileSocLimits,
    ) -> Result<Vec<SocLimit, MAX_CALIBRATION_POINTS>, CatalogError> {
        let mut out = Vec::new();
        for p in &limits.limits_per_soc {
            if !(0..=100).contains(&p.soc) {
                return Err(CatalogError::SocOutOfDomain { parameter: name, soc: p.soc });
            }
            out.push(SocLimit { soc: p.soc as u8, min: p.min, max: p.max })
                .map_err(|_| CatalogError::TooManyPoints {
                    parameter: name,
                    capacity: MAX_CALIBRATION_POINTS,
                })?;
        }
        Ok(out)
    }

    fn trigger_set(names: &[std::string::String]) -> TriggerSet {
        let mut set = TriggerSet::empty();
        for n in names {
            set = match n.as_str() {
                "Voltage" => set.union(TriggerSet::VOLTAGE),
                "Impedance" => set.union(TriggerSet::IMPEDANCE),
                "IntTemp" => set.union(TriggerSet::INTERNAL_TEMP),
                "SurfaceTemp" => set.union(TriggerSet::SURFACE_TEMP),
                "Capacity" => set.union(TriggerSet::CAPACITY),
                "Voltage_RoC" => set.union(TriggerSet::VOLTAGE_ROC),
                other => {
                    log::warn!("catalog: unknown trigger parameter {other:?} ignored");
                    set
                }
            };
        }
        set
    }

    fn mode_set(names: &[std::string::String]) -> ModeSet {
        let mut set = None;
        for n in names {
            let bit = match n.as_str() {
                "Charging" => ModeSet::CHARGING,
                "Discharging" => ModeSet::DISCHARGING,
                "All" => ModeSet::ALL,
                other => {
                    log::warn!("catalog: unknown operating mode {other:?} ignored");
                    continue;
                }
            };
            set = Some(match set {
                Some(s) => ModeSet::union(s, bit),
                None => bit,
            });
        }
        // An entry with no recognizable mode defaults to the wildcard so an
        // authoring slip cannot silence a mitigation entirely.
        set.unwrap_or(ModeSet::ALL)
    }

    impl Catalog {
        /// Load a catalog from a JSON string
        pub fn from_json_str(json: &str) -> Result<Self, CatalogLoadError> {
            let file: FileCatalog = serde_json::from_str(json)?;

            let mut catalog = Catalog {
                voltage: None,
                impedance: None,
                internal_temp_max: file.parameter_limits.int_temp.map(|m| m.max),
                surface_temp_max: file.parameter_limits.surface_temp.map(|m| m.max),
                capacity_min: file.parameter_limits.capacity.map(|m| m.min),
                voltage_roc_max: file.parameter_limits.voltage_roc.map(|m| m.max),
                faults: heapless::Vec::new(),
                mitigations: heapless::Vec::new(),
            };

            if let Some(v) = &file.parameter_limits.voltage {
                catalog.voltage = Some(convert_points("Voltage", v)?);
            }
            if let Some(i) = &file.parameter_limits.impedance {
                catalog.impedance = Some(convert_points("Impedance", i)?);
            }

            if file.faults.is_empty() {
                catalog.faults = builtin_faults();
            } else {
                for f in &file.faults {
                    let Some(id) = FaultId::from_name(&f.name) else {
                        log::warn!("catalog: unknown fault {:?} skipped", f.name);
                        continue;
                    };
                    let def = FaultDef {
                        id,
                        severity: f.severity,
                        triggers: trigger_set(&f.triggers),
                    };
                    if catalog.faults.push(def).is_err() {
                        log::warn!("catalog: fault table full, {:?} dropped", f.name);
                    }
                }
            }

            if file.mitigations.is_empty() {
                catalog.mitigations = builtin_mitigations();
            } else {
                for m in &file.mitigations {
                    let (Some(fault), Some(action)) =
                        (FaultId::from_name(&m.fault), action_from_name(&m.action))
                    else {
                        log::warn!(
                            "catalog: unknown fault/action {:?}/{:?} skipped",
                            m.fault,
                            m.action
                        );
                        continue;
                    };
                    let kind = match m.kind.as_str() {
                        "Immediate" => MitigationKind::Immediate,
                        "Recovery" => MitigationKind::Recovery,
                        other => {
                            log::warn!("catalog: unknown mitigation kind {other:?} skipped");
                            continue;
                        }
                    };
                    let def = MitigationDef { fault, action, kind, modes: mode_set(&m.modes) };
                    if catalog.mitigations.push(def).is_err() {
                        log::warn!("catalog: mitigation table full, entry dropped");
                    }
                }
            }

            catalog.validate()?;
            Ok(catalog)
        }

        /// Load a catalog from a JSON file on disk
        pub fn from_json_file(path: &std::path::Path) -> Result<Self, CatalogLoadError> {
            let json = std::fs::read_to_string(path)?;
            Self::from_json_str(&json)
        }
    }

    fn action_from_name(name: &str) -> Option<MitigationAction> {
        use MitigationAction::*;
        const ALL: [MitigationAction; 9] = [
            ImmediateShutdown,
            EvacuationWarning,
            StopCharging,
            ResumeReducedCharging,
            ReduceLoad,
            ReduceChargingPower,
            RecommendReplacement,
            IncreaseMonitoringFrequency,
            AlertUser,
        ];
        ALL.iter().copied().find(|a| a.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_fits_capacities() {
        let c = Catalog::builtin();
        assert_eq!(c.voltage.as_ref().unwrap().len(), 6);
        assert_eq!(c.impedance.as_ref().unwrap().len(), 6);
        assert_eq!(c.faults.len(), 14);
        assert!(c.mitigations.len() <= MAX_MITIGATIONS);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn builtin_severity_ranking() {
        let c = Catalog::builtin();
        assert_eq!(c.severity(FaultId::ThermalRunaway), Some(1));
        assert_eq!(c.severity(FaultId::OvervoltageVImp), Some(4));
        assert_eq!(c.severity(FaultId::BatteryAgingCapacity), Some(10));
    }

    #[test]
    fn every_fault_has_mitigations() {
        let c = Catalog::builtin();
        for def in &c.faults {
            // Sudden_Voltage_Increase is the one authored fault with no
            // mitigation entry (as in the source data).
            if def.id == FaultId::SuddenVoltageIncrease {
                continue;
            }
            assert!(
                c.mitigations_for(def.id).next().is_some(),
                "no mitigation for {}",
                def.id.name()
            );
        }
    }

    #[test]
    fn empty_declared_parameter_fails_validation() {
        let mut c = Catalog::builtin();
        c.voltage = Some(Vec::new());
        assert_eq!(
            c.validate(),
            Err(CatalogError::EmptyCalibration { parameter: "Voltage" })
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn json_catalog_round_trips_builtin_limits() {
        let json = r#"{
            "parameter_limits": {
                "Voltage": {"limits_per_soc": [
                    {"soc": 0, "min": 3.0, "max": 3.3},
                    {"soc": 100, "min": 4.1, "max": 4.2}
                ]},
                "IntTemp": {"max": 58.0},
                "Capacity": {"min": 0.8},
                "Voltage_RoC": {"max": 0.1}
            }
        }"#;
        let c = Catalog::from_json_str(json).unwrap();
        assert_eq!(c.voltage.as_ref().unwrap().len(), 2);
        assert!(c.impedance.is_none());
        assert_eq!(c.internal_temp_max, Some(58.0));
        // Missing sections fall back to the builtin definitions
        assert_eq!(c.faults.len(), 14);
        assert!(!c.mitigations.is_empty());
    }

    #[cfg(feature = "std")]
    #[test]
    fn json_catalog_skips_unknown_names() {
        let json = r#"{
            "faults": [
                {"name": "Thermal_Runaway", "severity": 1},
                {"name": "Made_Up_Fault", "severity": 2}
            ]
        }"#;
        let c = Catalog::from_json_str(json).unwrap();
        assert_eq!(c.faults.len(), 1);
        assert_eq!(c.faults[0].id, FaultId::ThermalRunaway);
    }

    #[cfg(feature = "std")]
    #[test]
    fn json_catalog_rejects_out_of_domain_soc() {
        let json = r#"{
            "parameter_limits": {
                "Voltage": {"limits_per_soc": [{"soc": 140, "min": 3.0, "max": 3.3}]}
            }
        }"#;
        assert!(Catalog::from_json_str(json).is_err());
    }
}
