//! Sensor ingestion for the synchrony pipeline.
//!
//! This module turns raw characteristic payloads into typed samples, derives
//! the synthetic companion channel, and defines the link a wearable must
//! provide.

pub mod decoder;
pub mod feed;
pub mod link;
pub mod simulated;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use decoder::decode;
pub use feed::{FeedBatch, LiveFeed};
pub use link::SensorLink;
pub use simulated::{SimulatedConfig, SimulatedSensor};
pub use synthetic::CompanionGenerator;
pub use types::{
    Notification, Sample, SensorKind, ECG_CHARACTERISTIC, HEART_RATE_CHARACTERISTIC,
};
