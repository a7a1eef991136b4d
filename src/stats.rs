//! Session statistics.
//!
//! Counters shared between the scheduler, the broadcaster's callers and the
//! server. Nothing here is persisted past the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one streaming session.
#[derive(Debug)]
pub struct SessionStats {
    samples_ingested: AtomicU64,
    samples_rejected: AtomicU64,
    frames_published: AtomicU64,
    neutral_frames: AtomicU64,
    deliveries: AtomicU64,
    subscribers_dropped: AtomicU64,
    session_start: DateTime<Utc>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            samples_ingested: AtomicU64::new(0),
            samples_rejected: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            neutral_frames: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    /// Record samples pushed into the channel buffers.
    pub fn record_samples(&self, count: u64) {
        self.samples_ingested.fetch_add(count, Ordering::Relaxed);
    }

    /// Record payloads skipped because they failed to decode.
    pub fn record_rejected(&self, count: u64) {
        self.samples_rejected.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a published frame and the outcome of its fan-out.
    pub fn record_frame(&self, neutral: bool, delivered: u64, dropped: u64) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        if neutral {
            self.neutral_frames.fetch_add(1, Ordering::Relaxed);
        }
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        self.subscribers_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_ingested: self.samples_ingested.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            neutral_frames: self.neutral_frames.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Samples ingested: {}\n\
             - Samples rejected: {}\n\
             - Frames published: {} ({} neutral)\n\
             - Deliveries: {}\n\
             - Subscribers dropped: {}\n\
             - Session duration: {} seconds",
            stats.samples_ingested,
            stats.samples_rejected,
            stats.frames_published,
            stats.neutral_frames,
            stats.deliveries,
            stats.subscribers_dropped,
            stats.session_duration_secs
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub samples_ingested: u64,
    pub samples_rejected: u64,
    pub frames_published: u64,
    pub neutral_frames: u64,
    pub deliveries: u64,
    pub subscribers_dropped: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared session statistics.
pub type SharedStats = Arc<SessionStats>;

/// Create a new shared statistics handle.
pub fn create_shared_stats() -> SharedStats {
    Arc::new(SessionStats::new())
}
