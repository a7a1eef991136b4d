//! Core functionality for the synchrony pipeline.
//!
//! This module contains:
//! - Rolling per-channel sample buffers
//! - Correlation computation between two channel windows
//! - Correlation frames and their wire format
//! - Finite replay datasets

pub mod correlation;
pub mod frame;
pub mod replay;
pub mod windowing;

// Re-export commonly used types
pub use correlation::{
    cross_correlation_valid, normalize, pearson, windowed_series, Correlation, CorrelationEngine,
    CorrelationMode, CorrelationStatus, NeutralReason, WindowedValue, DEFAULT_MIN_SAMPLES,
    NEUTRAL_CORRELATION,
};
pub use frame::CorrelationFrame;
pub use replay::{ReplayCursor, ReplayDataset};
pub use windowing::ChannelBuffer;
