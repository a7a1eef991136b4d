//! Stream scheduler: the tick loop tying ingestion, correlation and broadcast
//! together.
//!
//! ```text
//!   Idle ──start──▶ Running ──(exhausted | elapsed | cancelled | ingestion error)──▶ Stopped
//! ```
//!
//! Every exit from `Running` goes through the same teardown: a single
//! best-effort unsubscribe from the sensor, then every subscriber connection
//! is closed.

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::core::correlation::{CorrelationEngine, CorrelationMode};
use crate::core::frame::CorrelationFrame;
use crate::core::replay::ReplayCursor;
use crate::core::windowing::ChannelBuffer;
use crate::error::SchedulerError;
use crate::sensor::feed::LiveFeed;
use crate::stats::SharedStats;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Where samples come from.
pub enum DataSource {
    /// A live sensor feed with a synthetic companion channel
    Live(LiveFeed),
    /// A finite two-channel recording replayed one second per tick
    Replay(ReplayCursor),
}

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped(StopReason),
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The replay dataset has no full slice left
    ReplayExhausted,
    /// The configured maximum session duration elapsed
    SessionElapsed,
    /// A stop was requested
    Cancelled,
    /// The sensor link failed and the session cannot continue
    IngestionFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::ReplayExhausted => write!(f, "replay dataset exhausted"),
            StopReason::SessionElapsed => write!(f, "session duration elapsed"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::IngestionFailed(e) => write!(f, "ingestion failed: {e}"),
        }
    }
}

/// Timing and window settings for a scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// Stop after this long; `None` runs until the source ends or a stop request
    pub max_session: Option<Duration>,
    /// Samples retained per channel for live sources
    pub window_capacity: usize,
    pub min_samples: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval,
            max_session: config.max_session(),
            window_capacity: config.window_capacity,
            min_samples: config.min_samples,
        }
    }
}

/// Cloneable handle for observing and stopping a scheduler from elsewhere.
#[derive(Clone)]
pub struct SchedulerHandle {
    state: Arc<RwLock<SchedulerState>>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        self.state.read().clone()
    }

    /// Request the tick loop to stop. Takes effect within one tick interval.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether a stop has been requested, even if the loop has not yet noticed.
    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_stopped(&self) -> bool {
        matches!(*self.state.read(), SchedulerState::Stopped(_))
    }
}

/// Drives one streaming session.
pub struct StreamScheduler {
    config: SchedulerConfig,
    engine: CorrelationEngine,
    broadcaster: Arc<Broadcaster>,
    stats: SharedStats,
    source: Option<DataSource>,
    state: Arc<RwLock<SchedulerState>>,
    cancel: CancellationToken,
    channel_a: ChannelBuffer,
    channel_b: ChannelBuffer,
    window: usize,
    tick: u64,
}

impl StreamScheduler {
    pub fn new(config: SchedulerConfig, broadcaster: Arc<Broadcaster>, stats: SharedStats) -> Self {
        let engine = CorrelationEngine::new(config.min_samples);
        let capacity = config.window_capacity;
        Self {
            config,
            engine,
            broadcaster,
            stats,
            source: None,
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            cancel: CancellationToken::new(),
            channel_a: ChannelBuffer::new(capacity),
            channel_b: ChannelBuffer::new(capacity),
            window: capacity,
            tick: 0,
        }
    }

    /// Attach the data source. Only allowed before the session starts.
    pub fn attach(&mut self, source: DataSource) -> Result<(), SchedulerError> {
        if self.state() != SchedulerState::Idle {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.source = Some(source);
        Ok(())
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            state: self.state.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state.read().clone()
    }

    /// Move from `Idle` to `Running`, subscribing to the sensor for live sources.
    ///
    /// A failed subscription stops the session and is returned as an error.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.state() != SchedulerState::Idle {
            return Err(SchedulerError::AlreadyStarted);
        }

        let subscribed = match self.source.as_mut() {
            None => return Err(SchedulerError::NoDataSource),
            Some(DataSource::Live(feed)) => feed.start(),
            Some(DataSource::Replay(cursor)) => {
                // One full slice per window so each frame covers one second of data
                self.window = cursor.slice_len();
                self.channel_a = ChannelBuffer::new(self.window);
                self.channel_b = ChannelBuffer::new(self.window);
                Ok(())
            }
        };

        if let Err(e) = subscribed {
            self.teardown(StopReason::IngestionFailed(e.to_string()));
            return Err(e.into());
        }

        self.set_state(SchedulerState::Running);
        Ok(())
    }

    /// Run the session to completion and return why it stopped.
    ///
    /// Starts the session first if it is still idle.
    pub async fn run(mut self) -> Result<StopReason, SchedulerError> {
        match self.state() {
            SchedulerState::Idle => self.start()?,
            SchedulerState::Running => {}
            SchedulerState::Stopped(_) => return Err(SchedulerError::AlreadyStarted),
        }

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let max_session = self.config.max_session;
        let deadline = async move {
            match max_session {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let cancel = self.cancel.clone();
        let reason = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = &mut deadline => break StopReason::SessionElapsed,
                _ = ticker.tick() => {
                    if let Err(reason) = self.step() {
                        break reason;
                    }
                }
            }
        };

        self.teardown(reason.clone());
        Ok(reason)
    }

    /// One tick: ingest, compute, publish.
    fn step(&mut self) -> Result<(), StopReason> {
        let time = self.tick;
        self.tick += 1;

        self.ingest()?;

        let (latest_a, latest_b) = match (self.channel_a.latest(), self.channel_b.latest()) {
            (Some(a), Some(b)) => (*a, *b),
            _ => {
                tracing::debug!(tick = time, "No samples yet, skipping frame");
                return Ok(());
            }
        };

        let window_a = self.channel_a.window_values(self.window);
        let window_b = self.channel_b.window_values(self.window);
        let correlation = self
            .engine
            .compute(&window_a, &window_b, CorrelationMode::Pearson);
        if let Some(reason) = correlation.neutral_reason() {
            tracing::debug!(tick = time, ?reason, "Neutral correlation");
        }

        let frame = CorrelationFrame::new(time, &latest_a, &latest_b, correlation);
        let report = self.broadcaster.publish(&frame);
        self.stats.record_frame(
            frame.is_neutral(),
            report.delivered as u64,
            report.dropped.len() as u64,
        );
        Ok(())
    }

    fn ingest(&mut self) -> Result<(), StopReason> {
        match self.source.as_mut() {
            Some(DataSource::Live(feed)) => {
                let batch = feed
                    .drain()
                    .map_err(|e| StopReason::IngestionFailed(e.to_string()))?;
                self.stats.record_rejected(batch.rejected as u64);
                self.stats.record_samples(batch.pairs.len() as u64);
                for (a, b) in batch.pairs {
                    self.channel_a.push(a);
                    self.channel_b.push(b);
                }
                Ok(())
            }
            Some(DataSource::Replay(cursor)) => {
                let (a, b) = cursor.next_slice().ok_or(StopReason::ReplayExhausted)?;
                self.stats.record_samples(a.len() as u64);
                self.channel_a.extend(a);
                self.channel_b.extend(b);
                Ok(())
            }
            None => Err(StopReason::IngestionFailed("no data source".to_string())),
        }
    }

    fn teardown(&mut self, reason: StopReason) {
        if let Some(DataSource::Live(feed)) = self.source.as_mut() {
            if let Err(e) = feed.release() {
                tracing::warn!("Could not stop sensor notifications: {}", e);
            }
        }
        self.broadcaster.close_all();

        match &reason {
            StopReason::IngestionFailed(_) => tracing::error!("Stream stopped: {}", reason),
            _ => tracing::info!("Stream stopped: {}", reason),
        }
        self.set_state(SchedulerState::Stopped(reason));
    }

    fn set_state(&self, state: SchedulerState) {
        tracing::info!(?state, "Scheduler state changed");
        *self.state.write() = state;
    }
}
