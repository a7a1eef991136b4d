//! Error taxonomy for the streaming pipeline.
//!
//! Decode and delivery errors are recovered where they happen. Ingestion
//! errors end a session through the scheduler's shutdown sequence.

use thiserror::Error;
use uuid::Uuid;

/// A sensor payload that could not be turned into a sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{kind} payload too short: got {actual} bytes, need {required}")]
    TooShort {
        kind: &'static str,
        required: usize,
        actual: usize,
    },
}

/// The upstream sensor link failed in a way the session cannot recover from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    #[error("Failed to subscribe to {characteristic}: {reason}")]
    Subscribe {
        characteristic: String,
        reason: String,
    },

    #[error("Failed to unsubscribe from {characteristic}: {reason}")]
    Unsubscribe {
        characteristic: String,
        reason: String,
    },

    #[error("Sensor disconnected: {0}")]
    Disconnected(String),

    #[error("Notification channel closed")]
    ChannelClosed,
}

/// Delivery of a frame to one subscriber failed. The subscriber is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Subscriber {0} connection closed")]
    Closed(Uuid),

    #[error("Subscriber {0} queue full")]
    Lagging(Uuid),
}

/// Errors raised before a session can run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("No data source attached")]
    NoDataSource,

    #[error("Scheduler already started")]
    AlreadyStarted,

    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),
}

/// Errors loading a replay dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid dataset: {0}")]
    Invalid(String),
}
