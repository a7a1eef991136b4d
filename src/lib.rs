//! Pulse Sync - live physiological synchrony streaming.
//!
//! This library computes a rolling synchrony measure between two
//! physiological channels (heart rate or ECG from two people) and streams it
//! to any number of viewers, about once per second.
//!
//! # Guarantees
//!
//! - **Bounded history**: only the rolling window per channel is kept in memory
//! - **No bad frames**: malformed sensor payloads are skipped, never guessed at
//! - **Isolation**: a slow or broken viewer is dropped without stalling the rest
//! - **Clean teardown**: every session end releases the sensor subscription
//!   and closes all viewers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Pulse Sync                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Sensor    │──▶│  Decoder +  │──▶│  Rolling    │       │
//! │  │    Link     │   │  Companion  │   │  Buffers    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │              │
//! │                                             ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Viewers    │◀──│ Broadcaster │◀──│ Correlation │       │
//! │  │  (/ws)      │   │             │   │   Engine    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │           Scheduler drives one tick per second              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pulse_sync::{
//!     broadcast::Broadcaster,
//!     core::ReplayCursor,
//!     scheduler::{DataSource, SchedulerConfig, StreamScheduler},
//!     stats::create_shared_stats,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), pulse_sync::SchedulerError> {
//! let a: Vec<f64> = (0..600).map(|i| (i as f64 / 10.0).sin()).collect();
//! let cursor = ReplayCursor::new(a.clone(), a, 200);
//!
//! let broadcaster = Arc::new(Broadcaster::new());
//! let mut scheduler =
//!     StreamScheduler::new(SchedulerConfig::default(), broadcaster, create_shared_stats());
//! scheduler.attach(DataSource::Replay(cursor))?;
//! let reason = scheduler.run().await?;
//! println!("stopped: {reason}");
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod config;
pub mod core;
pub mod error;
pub mod scheduler;
pub mod sensor;
pub mod stats;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use broadcast::{Broadcaster, PublishReport, SubscriberId};
pub use config::{Config, ConfigError};
pub use core::{
    ChannelBuffer, Correlation, CorrelationEngine, CorrelationFrame, CorrelationMode,
    ReplayCursor, ReplayDataset,
};
pub use error::{DatasetError, DecodeError, DeliveryError, IngestionError, SchedulerError};
pub use scheduler::{
    DataSource, SchedulerConfig, SchedulerHandle, SchedulerState, StopReason, StreamScheduler,
};
pub use sensor::{decode, CompanionGenerator, LiveFeed, Sample, SensorKind, SensorLink};
pub use stats::{SessionStats, SharedStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown whenever channel B is generated rather than measured.
pub const SYNTHETIC_COMPANION_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              PULSE SYNC - SYNTHETIC COMPANION NOTICE             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Only one physical sensor is connected.                          ║
║                                                                  ║
║  Channel B is NOT a second person. It is channel A plus          ║
║  zero-mean Gaussian noise, generated on this machine.            ║
║                                                                  ║
║  Synchrony values in this session describe how much the noise    ║
║  obscures the original signal, not real inter-person synchrony.  ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
