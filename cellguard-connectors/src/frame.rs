//! Wire frame for telemetry ingest
//!
//! One frame is one JSON object per sample. Field names follow the
//! sensor firmware's capitalized convention, so they are mapped onto
//! Rust naming here and nowhere else.

use cellguard_core::{OperatingMode, TelemetrySample};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frame rejection reasons
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload was not a valid JSON frame
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One telemetry reading as sent over the wire
///
/// Numeric fields default to zero when absent; the engine reads a zero
/// as a missing measurement and handles substitution and staleness
/// itself, so a sparse frame is legal at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Cell voltage in volts
    #[serde(rename = "Voltage", default)]
    pub voltage: f32,
    /// Internal impedance in ohms
    #[serde(rename = "Impedance", default)]
    pub impedance: f32,
    /// Internal cell temperature in degrees Celsius
    #[serde(rename = "IntTemp", default)]
    pub internal_temp: f32,
    /// Surface temperature in degrees Celsius
    #[serde(rename = "SurfaceTemp", default)]
    pub surface_temp: f32,
    /// Remaining capacity as a fraction of nominal
    #[serde(rename = "Capacity", default)]
    pub capacity: f32,
    /// State of charge in percent
    #[serde(rename = "SoC", default)]
    pub soc: f32,
    /// Charge status flag, 1 while charging
    #[serde(rename = "Status", default)]
    pub status: i64,
}

impl TelemetryFrame {
    /// Parse one frame from its JSON text
    pub fn decode(payload: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Convert into an engine sample
    ///
    /// Out-of-range values are clamped by the sample constructor, so a
    /// hostile or buggy client cannot push a NaN or a 300% SoC past
    /// this point.
    pub fn into_sample(self) -> TelemetrySample {
        TelemetrySample::new(
            self.voltage,
            self.impedance,
            self.internal_temp,
            self.surface_temp,
            self.capacity,
            self.soc,
            OperatingMode::from_status_flag(self.status),
        )
    }
}

impl From<&TelemetrySample> for TelemetryFrame {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            voltage: sample.voltage,
            impedance: sample.impedance,
            internal_temp: sample.internal_temp,
            surface_temp: sample.surface_temp,
            capacity: sample.capacity,
            soc: sample.soc as f32,
            status: match sample.mode {
                OperatingMode::Charging => 1,
                _ => 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_decodes() {
        let json = r#"{"Voltage": 3.81, "Impedance": 0.032, "IntTemp": 26.4,
                       "SurfaceTemp": 25.1, "Capacity": 0.93, "SoC": 64, "Status": 1}"#;
        let frame = TelemetryFrame::decode(json).unwrap();
        assert_eq!(frame.voltage, 3.81);
        assert_eq!(frame.status, 1);

        let sample = frame.into_sample();
        assert_eq!(sample.soc, 64);
        assert_eq!(sample.mode, OperatingMode::Charging);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let frame = TelemetryFrame::decode(r#"{"Voltage": 3.7}"#).unwrap();
        assert_eq!(frame.impedance, 0.0);
        assert_eq!(frame.soc, 0.0);
        // Status 0 means discharging
        assert_eq!(frame.into_sample().mode, OperatingMode::Discharging);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(TelemetryFrame::decode("voltage=3.7").is_err());
        assert!(TelemetryFrame::decode(r#"{"Voltage": "high"}"#).is_err());
    }

    #[test]
    fn hostile_values_are_clamped_on_conversion() {
        let json = r#"{"Voltage": -5.0, "SoC": 300, "Status": 7}"#;
        let sample = TelemetryFrame::decode(json).unwrap().into_sample();
        assert_eq!(sample.voltage, 0.0);
        assert_eq!(sample.soc, 100);
        // Any nonzero status other than 1 still reads as discharging
        assert_eq!(sample.mode, OperatingMode::Discharging);
    }

    #[test]
    fn sample_round_trips_through_a_frame() {
        let sample = TelemetrySample::new(3.7, 0.03, 25.0, 24.0, 0.95, 50.0, OperatingMode::Charging);
        let frame = TelemetryFrame::from(&sample);
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(TelemetryFrame::decode(&json).unwrap().into_sample(), sample);
    }
}
