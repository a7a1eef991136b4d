//! Sample and sensor kind types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// GATT characteristic for the standard heart rate measurement.
pub const HEART_RATE_CHARACTERISTIC: &str = "00002a37-0000-1000-8000-00805f9b34fb";

/// Vendor characteristic carrying the raw ECG stream.
pub const ECG_CHARACTERISTIC: &str = "fb005c51-02e7-f387-1cad-8acd2d8df0c8";

/// The kind of physiological stream a sensor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Heart rate in beats per minute, one reading per notification.
    #[default]
    HeartRate,
    /// Raw ECG voltage samples.
    Ecg,
}

impl SensorKind {
    /// Characteristic identifier to subscribe to for this kind.
    pub fn characteristic(self) -> &'static str {
        match self {
            SensorKind::HeartRate => HEART_RATE_CHARACTERISTIC,
            SensorKind::Ecg => ECG_CHARACTERISTIC,
        }
    }

    /// Standard deviation of the synthetic companion noise at this signal's scale.
    pub fn default_noise_std(self) -> f64 {
        match self {
            SensorKind::HeartRate => 2.0,
            SensorKind::Ecg => 50.0,
        }
    }

    /// Parse a kind from a CLI-style name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "heart-rate" | "hr" => Some(SensorKind::HeartRate),
            "ecg" => Some(SensorKind::Ecg),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            SensorKind::HeartRate => "heart rate",
            SensorKind::Ecg => "ECG",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single decoded reading.
///
/// `timestamp` is a monotonic index (or seconds for replayed data) assigned by
/// whoever produced the sample. Samples are never mutated once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A message from the upstream sensor link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A raw characteristic payload.
    Payload(Vec<u8>),
    /// The device went away and will not deliver more payloads.
    Lost(String),
}
