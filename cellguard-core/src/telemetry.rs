//! Telemetry sample types shared across the engine
//!
//! A sample is one decoded reading of every monitored battery parameter
//! plus the state of charge and the operating mode. Samples are immutable
//! once constructed; all out-of-domain input is clamped at construction
//! so the classifier downstream is total over any sample it receives.

/// Battery operating mode reported by the pack controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperatingMode {
    /// Pack is being charged
    Charging = 0,
    /// Pack is supplying load
    Discharging = 1,
    /// Mode bit missing or unrecognized
    Unknown = 2,
}

impl OperatingMode {
    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            OperatingMode::Charging => "Charging",
            OperatingMode::Discharging => "Discharging",
            OperatingMode::Unknown => "Unknown",
        }
    }

    /// Decode the wire status flag (1 = charging, anything else = discharging)
    pub const fn from_status_flag(status: i64) -> Self {
        if status == 1 {
            OperatingMode::Charging
        } else {
            OperatingMode::Discharging
        }
    }
}

/// Monitored battery parameters, one staleness clock each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Parameter {
    /// Cell voltage (V)
    Voltage = 0,
    /// Internal impedance (Ω)
    Impedance = 1,
    /// Internal cell temperature (°C)
    InternalTemp = 2,
    /// Pack surface temperature (°C)
    SurfaceTemp = 3,
    /// Remaining capacity as a fraction of rated capacity
    Capacity = 4,
}

/// Number of monitored parameters
pub const PARAMETER_COUNT: usize = 5;

/// All monitored parameters in declaration order
pub const PARAMETERS: [Parameter; PARAMETER_COUNT] = [
    Parameter::Voltage,
    Parameter::Impedance,
    Parameter::InternalTemp,
    Parameter::SurfaceTemp,
    Parameter::Capacity,
];

impl Parameter {
    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Parameter::Voltage => "Voltage",
            Parameter::Impedance => "Impedance",
            Parameter::InternalTemp => "IntTemp",
            Parameter::SurfaceTemp => "SurfaceTemp",
            Parameter::Capacity => "Capacity",
        }
    }

    /// Get unit of measurement
    pub const fn unit(&self) -> &'static str {
        match self {
            Parameter::Voltage => "V",
            Parameter::Impedance => "Ω",
            Parameter::InternalTemp => "°C",
            Parameter::SurfaceTemp => "°C",
            Parameter::Capacity => "",
        }
    }

    /// Index into per-parameter state arrays
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

/// One decoded telemetry sample
///
/// Physical quantities are clamped to their valid domain by [`TelemetrySample::new`];
/// a zero reading means "no data this cycle" and is handled by the session
/// state, not by the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Cell voltage in volts
    pub voltage: f32,
    /// Internal impedance in ohms
    pub impedance: f32,
    /// Internal temperature in °C
    pub internal_temp: f32,
    /// Surface temperature in °C
    pub surface_temp: f32,
    /// Capacity fraction (1.0 = rated capacity)
    pub capacity: f32,
    /// State of charge, 0..=100
    pub soc: u8,
    /// Operating mode at sampling time
    pub mode: OperatingMode,
}

impl TelemetrySample {
    /// Build a sample from raw transport values, clamping out-of-domain input
    ///
    /// Negative or non-finite physical quantities become 0.0 (treated as a
    /// missing reading downstream) and the state of charge is clamped to
    /// 0..=100. Never fails: the transport boundary may hand us anything
    /// numeric and the engine must stay total.
    pub fn new(
        voltage: f32,
        impedance: f32,
        internal_temp: f32,
        surface_temp: f32,
        capacity: f32,
        soc: f32,
        mode: OperatingMode,
    ) -> Self {
        Self {
            voltage: clamp_reading(voltage),
            impedance: clamp_reading(impedance),
            internal_temp: clamp_reading(internal_temp),
            surface_temp: clamp_reading(surface_temp),
            capacity: clamp_reading(capacity),
            soc: clamp_soc(soc),
            mode,
        }
    }

    /// Read the value of one monitored parameter
    pub fn value(&self, parameter: Parameter) -> f32 {
        match parameter {
            Parameter::Voltage => self.voltage,
            Parameter::Impedance => self.impedance,
            Parameter::InternalTemp => self.internal_temp,
            Parameter::SurfaceTemp => self.surface_temp,
            Parameter::Capacity => self.capacity,
        }
    }

    /// Overwrite the value of one monitored parameter
    pub(crate) fn set_value(&mut self, parameter: Parameter, value: f32) {
        match parameter {
            Parameter::Voltage => self.voltage = value,
            Parameter::Impedance => self.impedance = value,
            Parameter::InternalTemp => self.internal_temp = value,
            Parameter::SurfaceTemp => self.surface_temp = value,
            Parameter::Capacity => self.capacity = value,
        }
    }
}

fn clamp_reading(value: f32) -> f32 {
    if !value.is_finite() || value < 0.0 {
        0.0
    } else {
        value
    }
}

fn clamp_soc(soc: f32) -> u8 {
    if !soc.is_finite() || soc < 0.0 {
        0
    } else if soc > 100.0 {
        100
    } else {
        soc as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_clamps_out_of_domain_input() {
        let s = TelemetrySample::new(
            -0.5,
            f32::NAN,
            25.0,
            24.0,
            0.9,
            130.0,
            OperatingMode::Discharging,
        );
        assert_eq!(s.voltage, 0.0);
        assert_eq!(s.impedance, 0.0);
        assert_eq!(s.soc, 100);
    }

    #[test]
    fn soc_clamps_below_zero() {
        let s = TelemetrySample::new(3.7, 0.03, 25.0, 24.0, 0.9, -3.0, OperatingMode::Charging);
        assert_eq!(s.soc, 0);
    }

    #[test]
    fn status_flag_decoding() {
        assert_eq!(OperatingMode::from_status_flag(1), OperatingMode::Charging);
        assert_eq!(OperatingMode::from_status_flag(0), OperatingMode::Discharging);
        assert_eq!(OperatingMode::from_status_flag(7), OperatingMode::Discharging);
    }

    #[test]
    fn parameter_indices_are_dense() {
        for (i, p) in PARAMETERS.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }
}
