//! Decoding of raw notification payloads into samples.
//!
//! Pure functions of their input: malformed payloads are rejected, never
//! repaired.

use crate::error::DecodeError;
use crate::sensor::types::{Sample, SensorKind};

/// Bit 0 of the heart rate flag byte: value is a 16-bit integer.
const HR_VALUE_FORMAT_U16: u8 = 0x01;

/// Decode a raw payload of the given kind into a sample stamped with `timestamp`.
///
/// Heart rate payloads start with a flag byte. With bit 0 clear the value is
/// byte 1 as `u8`; with bit 0 set it is bytes 1-2 as little-endian `u16`.
/// ECG payloads are a little-endian `i16` in bytes 0-1 with no flag byte.
/// Trailing bytes are ignored.
pub fn decode(raw: &[u8], kind: SensorKind, timestamp: f64) -> Result<Sample, DecodeError> {
    let value = match kind {
        SensorKind::HeartRate => decode_heart_rate(raw)?,
        SensorKind::Ecg => decode_ecg(raw)?,
    };
    Ok(Sample::new(timestamp, value))
}

fn decode_heart_rate(raw: &[u8]) -> Result<f64, DecodeError> {
    let flags = *raw.first().ok_or_else(|| too_short(SensorKind::HeartRate, 2, 0))?;

    if flags & HR_VALUE_FORMAT_U16 == 0 {
        match raw.get(1) {
            Some(&bpm) => Ok(f64::from(bpm)),
            None => Err(too_short(SensorKind::HeartRate, 2, raw.len())),
        }
    } else {
        match raw.get(1..3) {
            Some(bytes) => Ok(f64::from(u16::from_le_bytes([bytes[0], bytes[1]]))),
            None => Err(too_short(SensorKind::HeartRate, 3, raw.len())),
        }
    }
}

fn decode_ecg(raw: &[u8]) -> Result<f64, DecodeError> {
    match raw.get(0..2) {
        Some(bytes) => Ok(f64::from(i16::from_le_bytes([bytes[0], bytes[1]]))),
        None => Err(too_short(SensorKind::Ecg, 2, raw.len())),
    }
}

fn too_short(kind: SensorKind, required: usize, actual: usize) -> DecodeError {
    DecodeError::TooShort {
        kind: kind.label(),
        required,
        actual,
    }
}

/// Encode a heart rate value the way a device would, choosing the smallest format.
///
/// Used by the simulated sensor.
pub fn encode_heart_rate(bpm: u16) -> Vec<u8> {
    match u8::try_from(bpm) {
        Ok(small) => vec![0x00, small],
        Err(_) => {
            let [lo, hi] = bpm.to_le_bytes();
            vec![HR_VALUE_FORMAT_U16, lo, hi]
        }
    }
}

/// Encode a raw ECG sample.
pub fn encode_ecg(value: i16) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}
