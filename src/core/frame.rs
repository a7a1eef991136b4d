//! Correlation frames and their wire format.
//!
//! One frame is built per tick and discarded after broadcast. On the wire a
//! frame is a flat JSON object:
//!
//! ```json
//! { "time": 12, "channel_a": 71.0, "channel_b": 72.4, "correlation": 0.83 }
//! ```

use crate::core::correlation::{Correlation, NeutralReason};
use crate::sensor::types::Sample;
use serde::{Deserialize, Serialize};

/// The synchrony result for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFrame {
    /// Tick index in whole seconds since the session started
    pub time: u64,
    /// Latest value on channel A
    #[serde(rename = "channel_a")]
    pub channel_a_value: f64,
    /// Latest value on channel B
    #[serde(rename = "channel_b")]
    pub channel_b_value: f64,
    /// Normalized synchrony in `[0, 1]`
    pub correlation: f64,
    /// Set when `correlation` is the neutral default. Not sent to subscribers.
    #[serde(skip)]
    pub neutral: Option<NeutralReason>,
}

impl CorrelationFrame {
    /// Build a frame from the latest sample on each channel and a correlation result.
    pub fn new(time: u64, latest_a: &Sample, latest_b: &Sample, correlation: Correlation) -> Self {
        Self {
            time,
            channel_a_value: latest_a.value,
            channel_b_value: latest_b.value,
            correlation: correlation.value,
            neutral: correlation.neutral_reason(),
        }
    }

    /// Whether the correlation is a neutral default.
    pub fn is_neutral(&self) -> bool {
        self.neutral.is_some()
    }

    /// Serialize to the wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
